//! Bookmark selection: domain, keyword and folder-scope filters.
//!
//! The same [`Scope`] and [`DomainSet`] rules drive both read-only queries and
//! removal planning, so a listing and a prune over the same criteria agree.

use std::collections::HashSet;

use crate::domain::arena::{BookmarkTree, NodeId, TreeIterator};
use crate::domain::entities::Bookmark;

/// Set of target hosts.
///
/// Matching is exact host equality unless `include_subdomains` is set, in
/// which case `a.example.com` also matches `example.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    domains: Vec<String>,
    include_subdomains: bool,
}

impl DomainSet {
    pub fn new<I, S>(domains: I, include_subdomains: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for domain in domains {
            let domain = normalize_host(domain.as_ref());
            if !domain.is_empty() && !normalized.contains(&domain) {
                normalized.push(domain);
            }
        }
        Self {
            domains: normalized,
            include_subdomains,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Return the entry matching `host`, if any.
    pub fn matching(&self, host: &str) -> Option<&str> {
        let host = normalize_host(host);
        if host.is_empty() {
            return None;
        }
        self.domains
            .iter()
            .find(|domain| {
                host == **domain
                    || (self.include_subdomains
                        && host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            })
            .map(String::as_str)
    }

    pub fn matches(&self, host: &str) -> bool {
        self.matching(host).is_some()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_matches('.').to_lowercase()
}

/// Folder scope: an optional subtree to stay inside and folder names to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    folder: Option<Vec<String>>,
    ignore: HashSet<String>,
}

impl Scope {
    pub fn everything() -> Self {
        Self::default()
    }

    /// `folder` is a `/`-separated path such as `BookmarksBar/Dev`.
    pub fn new<I, S>(folder: Option<&str>, ignore_folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let folder = folder.map(parse_folder_path).filter(|path| !path.is_empty());
        Self {
            folder,
            ignore: ignore_folders.into_iter().map(Into::into).collect(),
        }
    }

    pub fn folder(&self) -> Option<&[String]> {
        self.folder.as_deref()
    }

    /// Whether a node whose folder path is `path` is selectable.
    ///
    /// Ignored folder names win over the scope, even inside it.
    pub fn admits(&self, path: &[String]) -> bool {
        if path.iter().any(|name| self.ignore.contains(name)) {
            return false;
        }
        match &self.folder {
            Some(prefix) => path.starts_with(prefix),
            None => true,
        }
    }
}

pub fn parse_folder_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read-only bookmark filter.
///
/// Domain and keyword filters combine with AND; within the domain set any
/// entry may match, while every keyword must be found.
#[derive(Debug, Clone, Default)]
pub struct Query {
    domains: DomainSet,
    keywords: Vec<String>,
    scope: Scope,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domains(mut self, domains: DomainSet) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn matches_bookmark(&self, bookmark: &Bookmark) -> bool {
        if !self.domains.is_empty() && !self.domains.matches(bookmark.domain_str()) {
            return false;
        }
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = bookmark.search_text();
        self.keywords.iter().all(|k| haystack.contains(k.as_str()))
    }

    /// Matching bookmarks in depth-first order. Clone the iterator to restart.
    pub fn filter<'a>(&'a self, tree: &'a BookmarkTree) -> Matches<'a> {
        Matches {
            query: self,
            tree,
            nodes: tree.iter(),
        }
    }
}

/// One query hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'a> {
    pub id: NodeId,
    pub bookmark: &'a Bookmark,
    /// Folder names from the root to the bookmark's folder
    pub path: Vec<String>,
}

impl Match<'_> {
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }

    /// `Folder/Sub / Title`, or just the title at top level.
    pub fn display_path(&self) -> String {
        if self.path.is_empty() {
            self.bookmark.title.clone()
        } else {
            format!("{} / {}", self.path_string(), self.bookmark.title)
        }
    }
}

#[derive(Clone)]
pub struct Matches<'a> {
    query: &'a Query,
    tree: &'a BookmarkTree,
    nodes: TreeIterator<'a>,
}

impl<'a> Iterator for Matches<'a> {
    type Item = Match<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (id, node) in self.nodes.by_ref() {
            let Some(bookmark) = node.as_bookmark() else {
                continue;
            };
            if !self.query.matches_bookmark(bookmark) {
                continue;
            }
            let path = self.tree.full_path(id);
            if self.query.scope.admits(&path) {
                return Some(Match { id, bookmark, path });
            }
        }
        None
    }
}
