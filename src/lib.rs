//! Structural payload validation for integration tests.
//!
//! A received payload is compared element by element against a control
//! payload. Control payloads may carry `@ignore@` placeholders, validation
//! matcher expressions such as `@contains('x')@` and `${variable}`
//! placeholders; whole subtrees can be excluded with ignore expressions
//! given as dotted paths, short node names or path queries.
//!
//! ```
//! use agenix_validation::{json, ValidationContext};
//!
//! let ctx = ValidationContext::new()
//!     .strict(false)
//!     .ignore("$.user.id");
//!
//! json::validate(
//!     r#"{"user": {"id": 42, "name": "John"}, "active": true}"#,
//!     r#"{"user": {"id": 1, "name": "John"}}"#,
//!     &ctx,
//! )
//! .unwrap();
//! ```
//!
//! The first mismatch aborts the call with a [`ValidationError`] carrying
//! the complete diagnostic; malformed payloads and bad expressions are
//! reported separately as [`SystemError`].

mod context;
mod error;
mod matcher;
mod report;
mod variables;

pub mod json;
pub mod xml;

pub use context::ValidationContext;
pub use error::{Error, Result, SystemError, ValidationError};
pub use variables::{replace_dynamic_content, Variables};
