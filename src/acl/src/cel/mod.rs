//! CEL (Common Expression Language) support for expression rules
//!
//! Conditions are compiled once and cached by source text, so many rule
//! instances sharing an [`Engine`] reuse the same compiled program.

pub mod context;
pub mod engine;
pub mod error;

pub use context::EvalContext;
pub use engine::{CacheStats, Engine};
pub use error::{CelError, Result};
