//! Dependency graph construction for a tree of Terraform stacks.
//!
//! Discovers configuration directories, indexes their backend coordinates,
//! asks a structural introspector for module calls and remote-state data
//! sources, and links directories into a [`stackgraph_core::graph::DependencyGraph`].

pub mod backend;
pub mod builder;
pub mod discovery;
pub mod inspect;

pub use builder::{BuildStats, BuiltGraph, GraphBuilder};
pub use inspect::{ConfigInspectTool, InspectError, Introspector, ModuleReport};
