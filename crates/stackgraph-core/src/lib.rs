//! Core types and storage for stackgraph.
//!
//! Provides the repository layout configuration ([`config::StackgraphConfig`]),
//! the directory dependency graph ([`graph::DependencyGraph`]) with its
//! forward and reverse adjacency, and JSON persistence of the graph dump.

pub mod config;
pub mod graph;
pub mod paths;
pub mod schema;
pub mod storage;
