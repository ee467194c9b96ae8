//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

/// Inspect, probe and safely prune Safari bookmarks
#[derive(Parser, Debug)]
#[command(name = "bmprune")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Bookmark store (default: ~/Library/Safari/Bookmarks.plist)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub bookmarks_path: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/bmprune/bmprune.toml)
    #[arg(long, global = true, env = "BMPRUNE_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List bookmarks, optionally filtered
    List {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Sort rows instead of keeping tree order
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
    },

    /// Probe bookmarks and report broken links (read-only)
    Check {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        probe: ProbeArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Probe at most N bookmarks
        #[arg(long)]
        limit: Option<usize>,
        /// Only report broken links
        #[arg(long)]
        broken_only: bool,
    },

    /// Probe bookmarks and remove dead ones (backup first)
    Prune {
        #[command(flatten)]
        domains: DomainArgs,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        probe: ProbeArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Show what would be removed, change nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Remove bookmarks by domain, without probing
    Remove {
        #[command(flatten)]
        domains: RequiredDomainArgs,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Show what would be removed, change nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show the folder hierarchy with bookmark counts
    Tree {
        /// Maximum folder depth shown
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective config
    Show,

    /// Show config path
    Path,

    /// Create global config template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct DomainArgs {
    /// Domain to match (repeatable or comma separated)
    #[arg(short = 'd', long = "domain", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Let a domain also match its subdomains
    #[arg(long)]
    pub include_subdomains: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequiredDomainArgs {
    /// Domain to remove (repeatable or comma separated)
    #[arg(short = 'd', long = "domain", value_delimiter = ',', required = true)]
    pub domains: Vec<String>,

    /// Let a domain also match its subdomains
    #[arg(long)]
    pub include_subdomains: bool,
}

impl From<RequiredDomainArgs> for DomainArgs {
    fn from(args: RequiredDomainArgs) -> Self {
        Self {
            domains: args.domains,
            include_subdomains: args.include_subdomains,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Restrict to the subtree at this folder path, e.g. "BookmarksBar/Dev"
    #[arg(long)]
    pub folder: Option<String>,

    /// Skip folders with this name anywhere in the tree (repeatable)
    #[arg(long = "ignore-folder")]
    pub ignore_folders: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[command(flatten)]
    pub domains: DomainArgs,

    /// Keyword matched against title and url, all must match (repeatable)
    #[arg(short = 's', long = "search")]
    pub keywords: Vec<String>,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

/// Overrides for the `[probe]` config section.
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Concurrent connections
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Retries after a timeout or dropped connection
    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long)]
    pub max_redirects: Option<usize>,

    /// Lowest HTTP status counted as broken
    #[arg(long, value_parser = clap::value_parser!(u16).range(100..=599))]
    pub min_status: Option<u16>,

    #[arg(long)]
    pub user_agent: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Write to file instead of stdout
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Csv,
    Json,
    /// One JSON object per line
    Ndjson,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Url,
    Domain,
    Added,
    Path,
}
