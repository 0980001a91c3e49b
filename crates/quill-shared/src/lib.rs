//! # Quill Shared
//!
//! Request forms and response types shared between the server and its clients.

pub mod dto;
pub mod forms;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, FieldErrors};
