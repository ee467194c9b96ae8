//! bmprune: inspect, probe and safely prune Safari bookmarks.
//!
//! Layers, innermost first:
//! - [`domain`]: bookmark tree arena, plist codec, queries, removal planning
//! - [`application`]: store loading, liveness probing, backup, atomic rewrite
//! - [`infrastructure`]: filesystem and HTTP boundaries, service wiring
//! - [`cli`]: argument parsing, rendering, command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
