//! # Quill Core
//!
//! The domain layer of the Quill blog.
//! This crate contains pure business logic with zero infrastructure dependencies:
//! entities, slug derivation, pagination, and the ports adapters implement.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{DomainError, RepoError};
