//! Removal planning: a pure function from tree + probe results to a plan.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, instrument};

use crate::domain::arena::{BookmarkTree, NodeId};
use crate::domain::entities::{FailureKind, ProbeOutcome, ProbeResult};
use crate::domain::query::{DomainSet, Scope};

/// Default minimum status treated as broken.
pub const DEFAULT_MIN_STATUS: u16 = 300;

/// Why a bookmark is scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    DomainMatch { domain: String },
    ProbeFailure(FailureKind),
    StatusThreshold(u16),
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::DomainMatch { domain } => write!(f, "domain match ({})", domain),
            RemovalReason::ProbeFailure(kind) => write!(f, "probe failed ({})", kind),
            RemovalReason::StatusThreshold(code) => write!(f, "HTTP status {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRemoval {
    pub id: NodeId,
    pub reason: RemovalReason,
}

/// Bookmarks marked for removal, in tree order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    removals: Vec<PlannedRemoval>,
    index: HashSet<NodeId>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id`; a second mark for the same id is ignored.
    pub fn mark(&mut self, id: NodeId, reason: RemovalReason) {
        if self.index.insert(id) {
            self.removals.push(PlannedRemoval { id, reason });
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedRemoval> {
        self.removals.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.removals.iter().map(|r| r.id)
    }

    pub fn reason(&self, id: NodeId) -> Option<&RemovalReason> {
        self.removals.iter().find(|r| r.id == id).map(|r| &r.reason)
    }
}

/// Inputs besides the tree and probe results.
#[derive(Debug, Clone)]
pub struct PlanCriteria {
    pub min_status: u16,
    /// Hosts removed regardless of liveness
    pub domains: DomainSet,
    pub scope: Scope,
}

impl Default for PlanCriteria {
    fn default() -> Self {
        Self {
            min_status: DEFAULT_MIN_STATUS,
            domains: DomainSet::default(),
            scope: Scope::everything(),
        }
    }
}

/// Decide which bookmarks to remove.
///
/// A bookmark inside the scope is removed when its host is in the domain set,
/// its probe failed, or its recorded status is at least `min_status`.
/// Bookmarks without a probe result can only be removed by domain. Folders are
/// never targeted.
#[instrument(level = "debug", skip_all, fields(min_status = criteria.min_status))]
pub fn plan(
    tree: &BookmarkTree,
    probe_results: &HashMap<NodeId, ProbeResult>,
    criteria: &PlanCriteria,
) -> MutationPlan {
    let mut plan = MutationPlan::new();

    for (id, bookmark) in tree.bookmarks() {
        if !criteria.scope.admits(&tree.full_path(id)) {
            continue;
        }
        if let Some(domain) = criteria.domains.matching(bookmark.domain_str()) {
            plan.mark(
                id,
                RemovalReason::DomainMatch {
                    domain: domain.to_string(),
                },
            );
            continue;
        }
        match probe_results.get(&id).map(|r| r.outcome) {
            Some(ProbeOutcome::Failed(kind)) => plan.mark(id, RemovalReason::ProbeFailure(kind)),
            Some(ProbeOutcome::Status(code)) if code >= criteria.min_status => {
                plan.mark(id, RemovalReason::StatusThreshold(code))
            }
            _ => {}
        }
    }

    debug!(planned = plan.len(), "removal plan computed");
    plan
}
