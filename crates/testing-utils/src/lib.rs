//! # Fastgets Testing Utils
//!
//! Shared testing utilities for the fastgets workspace: failure-mode store
//! mocks, a Redis test container, entity builders and small async helpers.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! fastgets-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
