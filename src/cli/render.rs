//! Row rendering for list/check/prune output: table, CSV, JSON, NDJSON.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use termtree::Tree;

use crate::application::services::{CheckedBookmark, PlannedRow};
use crate::cli::args::Format;
use crate::domain::{describe_status, BookmarkTree, Match, NodeId, NodeKind, ProbeOutcome};

const MAX_CELL_WIDTH: usize = 60;

/// A serializable output row with a fixed column layout.
pub trait TableRow: Serialize {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListRow {
    pub path: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub added_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<&Match<'_>> for ListRow {
    fn from(m: &Match<'_>) -> Self {
        Self {
            path: m.path_string(),
            title: m.bookmark.title.clone(),
            url: m.bookmark.url.clone(),
            domain: m.bookmark.domain_str().to_string(),
            added_at: m.bookmark.added_at,
            modified_at: m.bookmark.modified_at,
        }
    }
}

impl TableRow for ListRow {
    fn headers() -> &'static [&'static str] {
        &["path", "title", "url", "domain", "added_at", "modified_at"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.title.clone(),
            self.url.clone(),
            self.domain.clone(),
            format_date(self.added_at),
            format_date(self.modified_at),
        ]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckRow {
    pub path: String,
    pub title: String,
    pub url: String,
    pub status: Option<u16>,
    /// Status bucket or failure kind
    pub result: String,
    pub broken: bool,
    pub attempts: u32,
}

impl CheckRow {
    pub fn new(checked: &CheckedBookmark, min_status: u16) -> Self {
        let result = match checked.result.outcome {
            ProbeOutcome::Status(code) => describe_status(code).to_string(),
            ProbeOutcome::Failed(kind) => kind.to_string(),
        };
        Self {
            path: checked.path.join("/"),
            title: checked.bookmark.title.clone(),
            url: checked.bookmark.url.clone(),
            status: checked.result.status(),
            result,
            broken: !checked.result.is_alive(min_status),
            attempts: checked.result.attempts,
        }
    }
}

impl TableRow for CheckRow {
    fn headers() -> &'static [&'static str] {
        &["path", "title", "url", "status", "result", "attempts"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.title.clone(),
            self.url.clone(),
            self.status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            self.result.clone(),
            self.attempts.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RemovalRow {
    pub path: String,
    pub title: String,
    pub url: String,
    pub reason: String,
}

impl From<&PlannedRow> for RemovalRow {
    fn from(row: &PlannedRow) -> Self {
        Self {
            path: row.path.join("/"),
            title: row.title.clone(),
            url: row.url.clone(),
            reason: row.reason.to_string(),
        }
    }
}

impl TableRow for RemovalRow {
    fn headers() -> &'static [&'static str] {
        &["path", "title", "url", "reason"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.title.clone(),
            self.url.clone(),
            self.reason.clone(),
        ]
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Write `rows` to `out` in `format`.
pub fn render<R: TableRow>(rows: &[R], format: Format, out: &mut dyn Write) -> io::Result<()> {
    match format {
        Format::Table => render_table(rows, out),
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            if rows.is_empty() {
                writer.write_record(R::headers())?;
            }
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)?;
            writeln!(out)
        }
        Format::Ndjson => {
            for row in rows {
                serde_json::to_writer(&mut *out, row)?;
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn render_table<R: TableRow>(rows: &[R], out: &mut dyn Write) -> io::Result<()> {
    let headers = R::headers();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.cells().into_iter().map(|c| truncate(&c)).collect())
        .collect();

    let widths: Vec<usize> = (0..headers.len())
        .map(|col| {
            cells
                .iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(headers[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    writeln!(out, "{}", pad_line(headers.iter().copied(), &widths))?;
    writeln!(out, "{}", widths.iter().map(|w| "-".repeat(*w)).join("  "))?;
    for row in &cells {
        writeln!(out, "{}", pad_line(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}

fn pad_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(v, w)| format!("{:<w$}", v, w = *w))
        .join("  ")
        .trim_end()
        .to_string()
}

fn truncate(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let mut short: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    short.push('…');
    short
}

/// Folder hierarchy with per-folder bookmark counts (whole subtree).
pub fn folder_tree(tree: &BookmarkTree, max_depth: Option<usize>) -> Tree<String> {
    fn build(
        tree: &BookmarkTree,
        id: NodeId,
        label: String,
        depth: usize,
        max_depth: Option<usize>,
    ) -> Tree<String> {
        let mut node = Tree::new(format!("{} ({})", label, count_bookmarks(tree, id)));
        if max_depth.is_some_and(|max| depth >= max) {
            return node;
        }
        for &child in tree.children(id) {
            if let Some(NodeKind::Folder(folder)) = tree.get_node(child).map(|n| &n.kind) {
                node.push(build(tree, child, folder.name.clone(), depth + 1, max_depth));
            }
        }
        node
    }

    build(tree, tree.root(), "Bookmarks".to_string(), 0, max_depth)
}

fn count_bookmarks(tree: &BookmarkTree, id: NodeId) -> usize {
    tree.children(id)
        .iter()
        .map(|&child| match tree.get_node(child).map(|n| &n.kind) {
            Some(NodeKind::Bookmark(_)) => 1,
            Some(NodeKind::Folder(_)) => count_bookmarks(tree, child),
            _ => 0,
        })
        .sum()
}
