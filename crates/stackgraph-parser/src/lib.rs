//! Minimal scanning of Terraform configuration text.
//!
//! This is deliberately not an HCL parser. It tokenizes source text and pulls
//! out only the constructs dependency extraction needs: `backend` blocks,
//! `terraform_remote_state` config bodies, `variable` defaults, and flat
//! `.tfvars` assignments. Anything else is ignored.

pub mod extract;
pub mod files;
pub mod scanner;
pub mod vars;

pub use extract::{BackendCoordinate, RefValue, RemoteStateRef};
pub use scanner::ScanError;
