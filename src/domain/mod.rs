//! Domain layer: bookmark tree model, selection and removal planning
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod codec;
pub mod entities;
pub mod error;
pub mod plan;
pub mod query;

pub use arena::{BookmarkTree, NodeId, NodeKind, TreeNode};
pub use codec::StoreFormat;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use plan::{plan, MutationPlan, PlanCriteria, PlannedRemoval, RemovalReason, DEFAULT_MIN_STATUS};
pub use query::{DomainSet, Match, Query, Scope};
