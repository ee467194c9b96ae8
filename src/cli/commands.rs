//! Command dispatch: settings, services, rendering.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::CommandFactory;
use tracing::debug;

use crate::application::services::{
    CheckRequest, PruneOutcome, PruneRequest, PruneService, Progress,
};
use crate::application::{ApplicationError, IoResultExt};
use crate::cli::args::{
    Cli, Commands, ConfigCommands, DomainArgs, FilterArgs, OutputArgs, ProbeArgs, ScopeArgs,
    SortKey,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::cli::render::{self, CheckRow, ListRow, RemovalRow, TableRow};
use crate::config::{global_config_path, ProbeSettings, Settings};
use crate::domain::{expand_env_vars, DomainSet, PlanCriteria, ProbeResult, Query, Scope};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

/// Parse-independent entry point used by `main`.
pub fn execute_command(cli: &Cli, cancel: Arc<AtomicBool>) -> CliResult<()> {
    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => return config_path(cli),
            ConfigCommands::Init { force } => return config_init(cli, *force),
            ConfigCommands::Show => {}
        },
        _ => {}
    }

    let settings = load_settings(cli)?;
    let container = ServiceContainer::new(settings, cancel);
    dispatch(&cli.command, &container)
}

/// Effective settings: config file and env, then global and probe flags.
pub fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(CliError::Usage(format!(
                "config file not found: {}",
                path.display()
            )))
        }
        Some(path) => Settings::load_from(Some(path.as_path()))?,
        None => Settings::load()?,
    };

    if let Some(path) = &cli.bookmarks_path {
        settings.bookmarks_path = PathBuf::from(expand_env_vars(&path.to_string_lossy()));
    }
    if let Some(probe) = probe_args(&cli.command) {
        apply_probe_args(&mut settings.probe, probe);
        settings.validate()?;
    }
    debug!(path = %settings.bookmarks_path.display(), "settings loaded");
    Ok(settings)
}

fn probe_args(command: &Commands) -> Option<&ProbeArgs> {
    match command {
        Commands::Check { probe, .. } | Commands::Prune { probe, .. } => Some(probe),
        _ => None,
    }
}

fn apply_probe_args(probe: &mut ProbeSettings, args: &ProbeArgs) {
    if let Some(timeout) = args.timeout {
        probe.timeout_secs = timeout;
    }
    if let Some(workers) = args.workers {
        probe.workers = workers;
    }
    if let Some(retries) = args.retries {
        probe.max_attempts = retries.saturating_add(1);
    }
    if let Some(max_redirects) = args.max_redirects {
        probe.max_redirects = max_redirects;
    }
    if let Some(min_status) = args.min_status {
        probe.min_status = min_status;
    }
    if let Some(user_agent) = &args.user_agent {
        probe.user_agent = user_agent.clone();
    }
}

/// Run a store command against `container`.
pub fn dispatch(command: &Commands, container: &ServiceContainer) -> CliResult<()> {
    match command {
        Commands::List {
            filter,
            output,
            sort,
        } => list(container, filter, output, *sort),
        Commands::Check {
            filter,
            output,
            limit,
            broken_only,
            ..
        } => check(container, filter, output, *limit, *broken_only),
        Commands::Prune {
            domains,
            scope,
            output,
            dry_run,
            ..
        } => prune(container, domains, scope, output, true, *dry_run),
        Commands::Remove {
            domains,
            scope,
            output,
            dry_run,
        } => prune(
            container,
            &domains.clone().into(),
            scope,
            output,
            false,
            *dry_run,
        ),
        Commands::Tree { depth } => tree(container, *depth),
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            output::info(&container.settings.to_toml()?);
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::Usage(
            "command does not operate on the bookmark store".into(),
        )),
    }
}

fn domain_set(args: &DomainArgs) -> DomainSet {
    DomainSet::new(&args.domains, args.include_subdomains)
}

fn scope(args: &ScopeArgs) -> Scope {
    Scope::new(args.folder.as_deref(), &args.ignore_folders)
}

fn build_query(filter: &FilterArgs) -> Query {
    Query::new()
        .with_domains(domain_set(&filter.domains))
        .with_keywords(&filter.keywords)
        .with_scope(scope(&filter.scope))
}

fn list(
    container: &ServiceContainer,
    filter: &FilterArgs,
    out: &OutputArgs,
    sort: Option<SortKey>,
) -> CliResult<()> {
    let loaded = container
        .tree_store()
        .load(&container.settings.bookmarks_path)?;
    let query = build_query(filter);
    let mut rows: Vec<ListRow> = query.filter(&loaded.tree).map(|m| ListRow::from(&m)).collect();

    if let Some(key) = sort {
        sort_rows(&mut rows, key);
    }
    emit(container, &rows, out)?;
    output::success(&format!(
        "{} of {} bookmarks",
        rows.len(),
        loaded.tree.bookmark_count()
    ));
    Ok(())
}

fn sort_rows(rows: &mut [ListRow], key: SortKey) {
    match key {
        SortKey::Title => rows.sort_by_cached_key(|r| r.title.to_lowercase()),
        SortKey::Url => rows.sort_by(|a, b| a.url.cmp(&b.url)),
        SortKey::Domain => rows.sort_by(|a, b| a.domain.cmp(&b.domain).then(a.url.cmp(&b.url))),
        SortKey::Added => rows.sort_by_key(|r| r.added_at),
        SortKey::Path => rows.sort_by(|a, b| a.path.cmp(&b.path)),
    }
}

fn progress_reporter() -> impl FnMut(&ProbeResult, Progress) {
    |result, progress| {
        debug!(id = %result.id, outcome = ?result.outcome, "probed");
        output::progress(progress.done, progress.total);
    }
}

fn check(
    container: &ServiceContainer,
    filter: &FilterArgs,
    out: &OutputArgs,
    limit: Option<usize>,
    broken_only: bool,
) -> CliResult<()> {
    let service = container.prune_service()?;
    let request = CheckRequest {
        path: container.settings.bookmarks_path.clone(),
        query: build_query(filter),
        limit,
    };

    let outcome = service.check(&request, progress_reporter())?;
    output::progress_done();

    let min_status = container.settings.probe.min_status;
    let rows: Vec<CheckRow> = outcome
        .checked
        .iter()
        .map(|c| CheckRow::new(c, min_status))
        .filter(|row| !broken_only || row.broken)
        .collect();
    emit(container, &rows, out)?;

    let broken = outcome
        .checked
        .iter()
        .filter(|c| !c.result.is_alive(min_status))
        .count();
    output::header(&format!(
        "{} checked ({} matched), {} broken",
        outcome.checked.len(),
        outcome.matched,
        broken
    ));

    if outcome.cancelled {
        output::warning("interrupted, results are partial");
        return Err(ApplicationError::Cancelled.into());
    }
    Ok(())
}

fn prune(
    container: &ServiceContainer,
    domains: &DomainArgs,
    scope_args: &ScopeArgs,
    out: &OutputArgs,
    probe: bool,
    dry_run: bool,
) -> CliResult<()> {
    let service: PruneService = container.prune_service()?;
    let request = PruneRequest {
        path: container.settings.bookmarks_path.clone(),
        criteria: PlanCriteria {
            min_status: container.settings.probe.min_status,
            domains: domain_set(domains),
            scope: scope(scope_args),
        },
        probe,
        dry_run,
    };

    if let Some(notice) = destructive_notice(dry_run) {
        output::warning(notice);
    }
    let result = service.prune(&request, progress_reporter());
    if probe {
        output::progress_done();
    }
    let outcome = result?;

    let rows: Vec<RemovalRow> = outcome.planned.iter().map(RemovalRow::from).collect();
    if !rows.is_empty() {
        emit(container, &rows, out)?;
    }
    report_prune(&outcome);
    Ok(())
}

const SAFARI_NOTICE: &str =
    "quit Safari and pause iCloud bookmark sync first, or the rewrite may be overwritten";

/// Shown before runs that may rewrite the store.
fn destructive_notice(dry_run: bool) -> Option<&'static str> {
    (!dry_run).then_some(SAFARI_NOTICE)
}

fn report_prune(outcome: &PruneOutcome) {
    if outcome.planned.is_empty() {
        output::success("nothing to remove");
    } else if outcome.dry_run {
        output::header(&format!(
            "dry run: {} bookmark(s) would be removed",
            outcome.planned.len()
        ));
    } else {
        output::action("Removed", &format!("{} bookmark(s)", outcome.removed));
    }
    if let Some(backup) = &outcome.backup {
        output::action("Backup", &backup.display());
    }
}

fn tree(container: &ServiceContainer, depth: Option<usize>) -> CliResult<()> {
    let loaded = container
        .tree_store()
        .load(&container.settings.bookmarks_path)?;
    output::info(&render::folder_tree(&loaded.tree, depth));
    Ok(())
}

/// Render `rows` to the `-o` file or stdout.
fn emit<R: TableRow>(container: &ServiceContainer, rows: &[R], out: &OutputArgs) -> CliResult<()> {
    let mut buf = Vec::new();
    render::render(rows, out.format, &mut buf)
        .map_err(|e| InfraError::io("render report", e))?;

    match &out.output {
        Some(path) => {
            container
                .fs
                .ensure_parent(path)
                .with_path_context("create report directory", path)?;
            container
                .fs
                .write(path, &buf)
                .with_path_context("write report", path)?;
            output::action("Wrote", &path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&buf)
                .and_then(|_| stdout.flush())
                .map_err(|e| InfraError::io("write stdout", e))?;
        }
    }
    Ok(())
}

fn config_target(cli: &Cli) -> CliResult<PathBuf> {
    cli.config
        .clone()
        .or_else(global_config_path)
        .ok_or_else(|| CliError::Usage("cannot determine config directory".into()))
}

fn config_path(cli: &Cli) -> CliResult<()> {
    let path = config_target(cli)?;
    let state = if path.exists() { "exists" } else { "not created" };
    output::info(&format!("{} ({})", path.display(), state));
    Ok(())
}

fn config_init(cli: &Cli, force: bool) -> CliResult<()> {
    let path = config_target(cli)?;
    write_template(&RealFileSystem, &path, force)?;
    output::action("Created", &path.display());
    Ok(())
}

fn write_template(fs: &dyn FileSystem, path: &Path, force: bool) -> CliResult<()> {
    if fs.exists(path) && !force {
        return Err(CliError::Usage(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    fs.ensure_parent(path)
        .with_path_context("create config directory", path)?;
    fs.write(path, Settings::template().as_bytes())
        .with_path_context("write config", path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_write_run_when_pruning_then_safari_notice_shown() {
        let notice = destructive_notice(false).unwrap();

        assert!(notice.contains("Safari"));
        assert!(notice.contains("iCloud"));
    }

    #[test]
    fn given_dry_run_when_pruning_then_no_notice() {
        assert_eq!(destructive_notice(true), None);
    }
}
