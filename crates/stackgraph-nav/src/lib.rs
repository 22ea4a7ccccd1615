//! Queries over a finished dependency graph.
//!
//! Impact analysis (changed files → affected stacks), the runnable-target
//! filter with its environment view, changed-file list input, and DOT/Mermaid
//! export.

pub mod changes;
pub mod export;
pub mod impact;
pub mod targets;
