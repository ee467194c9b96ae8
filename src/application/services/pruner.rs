//! Run orchestration: load, probe, plan, then report or back up and rewrite.
//!
//! ```text
//! LOAD ──► PROBE ──► PLAN ──┬──► REPORT                  (dry run / empty plan)
//!                           └──► BACKUP ──► APPLY ──► WRITE
//! ```
//!
//! Any failure before WRITE leaves the store untouched.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::services::backup::BackupManager;
use crate::application::services::prober::{LivenessProber, ProbeJob, ProbeOptions, Progress};
use crate::application::services::store::TreeStore;
use crate::application::services::writer::TreeWriter;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    plan, Bookmark, BookmarkTree, MutationPlan, NodeId, PlanCriteria, ProbeResult, Query,
    RemovalReason,
};
use crate::infrastructure::traits::{FileSystem, HttpClient};

/// A bookmark together with its probe result, owned so it outlives the tree.
#[derive(Debug, Clone)]
pub struct CheckedBookmark {
    pub id: NodeId,
    pub path: Vec<String>,
    pub bookmark: Bookmark,
    pub result: ProbeResult,
}

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub path: PathBuf,
    pub query: Query,
    /// Probe at most this many matches
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub struct CheckOutcome {
    /// In tree order
    pub checked: Vec<CheckedBookmark>,
    pub matched: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct PruneRequest {
    pub path: PathBuf,
    pub criteria: PlanCriteria,
    /// Probe bookmarks; without it only domain matches are removed
    pub probe: bool,
    pub dry_run: bool,
}

/// A planned removal as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRow {
    pub path: Vec<String>,
    pub title: String,
    pub url: String,
    pub reason: RemovalReason,
}

#[derive(Debug)]
pub struct PruneOutcome {
    pub planned: Vec<PlannedRow>,
    pub probed: usize,
    pub removed: usize,
    pub backup: Option<PathBuf>,
    pub dry_run: bool,
}

impl PruneOutcome {
    pub fn wrote(&self) -> bool {
        self.backup.is_some()
    }
}

/// Drives a check or prune run over one store file.
pub struct PruneService {
    store: TreeStore,
    backups: BackupManager,
    writer: TreeWriter,
    prober: LivenessProber,
    cancel: Arc<AtomicBool>,
}

impl PruneService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        client: Arc<dyn HttpClient>,
        options: ProbeOptions,
        cancel: Arc<AtomicBool>,
    ) -> ApplicationResult<Self> {
        Ok(Self {
            store: TreeStore::new(fs.clone()),
            backups: BackupManager::new(fs.clone()),
            writer: TreeWriter::new(fs),
            prober: LivenessProber::new(client, options, cancel.clone())?,
            cancel,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Probe the bookmarks selected by `request.query` without changing anything.
    ///
    /// A cancelled check returns the results gathered so far.
    #[instrument(level = "debug", skip_all, fields(path = %request.path.display()))]
    pub fn check<F>(&self, request: &CheckRequest, on_result: F) -> ApplicationResult<CheckOutcome>
    where
        F: FnMut(&ProbeResult, Progress),
    {
        let loaded = self.store.load(&request.path)?;
        let tree = &loaded.tree;

        let matches: Vec<_> = request.query.filter(tree).collect();
        let matched = matches.len();
        let selected = &matches[..request.limit.unwrap_or(matched).min(matched)];

        let jobs = selected
            .iter()
            .map(|m| ProbeJob {
                id: m.id,
                url: m.bookmark.url.clone(),
            })
            .collect();
        let mut report = self.prober.probe_all(jobs, on_result);

        let checked = selected
            .iter()
            .filter_map(|m| {
                report.results.remove(&m.id).map(|result| CheckedBookmark {
                    id: m.id,
                    path: m.path.clone(),
                    bookmark: m.bookmark.clone(),
                    result,
                })
            })
            .collect();

        Ok(CheckOutcome {
            checked,
            matched,
            cancelled: report.cancelled,
        })
    }

    /// Remove bookmarks matching the criteria, backing up first.
    ///
    /// # Errors
    /// - load errors from [`TreeStore::load`]
    /// - [`ApplicationError::Cancelled`] when interrupted before the write
    /// - [`ApplicationError::Backup`] / [`ApplicationError::Write`]
    #[instrument(level = "debug", skip_all, fields(path = %request.path.display(), dry_run = request.dry_run))]
    pub fn prune<F>(&self, request: &PruneRequest, on_result: F) -> ApplicationResult<PruneOutcome>
    where
        F: FnMut(&ProbeResult, Progress),
    {
        let mut loaded = self.store.load(&request.path)?;
        let criteria = &request.criteria;

        let mut probed = 0;
        let results = if request.probe {
            // domain matches are removed anyway, no need to probe them
            let jobs: Vec<ProbeJob> = loaded
                .tree
                .bookmarks()
                .filter(|(id, b)| {
                    criteria.scope.admits(&loaded.tree.full_path(*id))
                        && !criteria.domains.matches(b.domain_str())
                })
                .map(|(id, b)| ProbeJob {
                    id,
                    url: b.url.clone(),
                })
                .collect();
            let report = self.prober.probe_all(jobs, on_result);
            if report.cancelled {
                warn!(probed = report.results.len(), "probing cancelled");
                return Err(ApplicationError::Cancelled);
            }
            probed = report.results.len();
            report.results
        } else {
            Default::default()
        };

        let removal_plan = plan(&loaded.tree, &results, criteria);
        let planned = planned_rows(&loaded.tree, &removal_plan);
        let mut outcome = PruneOutcome {
            planned,
            probed,
            removed: 0,
            backup: None,
            dry_run: request.dry_run,
        };

        if request.dry_run {
            info!(planned = outcome.planned.len(), "dry run, nothing written");
            return Ok(outcome);
        }
        if removal_plan.is_empty() {
            info!("nothing to remove");
            return Ok(outcome);
        }
        if self.is_cancelled() {
            return Err(ApplicationError::Cancelled);
        }

        let snapshot = self.backups.snapshot(&loaded.handle)?;
        outcome.removed = self.writer.apply(&mut loaded.tree, &removal_plan);
        self.writer.commit(&loaded.handle, &snapshot, &loaded.tree)?;
        outcome.backup = Some(snapshot.path().to_path_buf());

        info!(
            removed = outcome.removed,
            backup = %snapshot.path().display(),
            "bookmarks pruned"
        );
        Ok(outcome)
    }
}

fn planned_rows(tree: &BookmarkTree, plan: &MutationPlan) -> Vec<PlannedRow> {
    plan.iter()
        .filter_map(|removal| {
            tree.bookmark(removal.id).map(|b| PlannedRow {
                path: tree.full_path(removal.id),
                title: b.title.clone(),
                url: b.url.clone(),
                reason: removal.reason.clone(),
            })
        })
        .collect()
}
