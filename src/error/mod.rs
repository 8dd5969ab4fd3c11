//! Error handling types for llm-relay.
//!
//! A single discriminated error type covers configuration, credential, transport and
//! orchestration failures, so the fallback walk can branch on [`ErrorKind`].

mod conversions;
pub mod types;

pub use types::*;
