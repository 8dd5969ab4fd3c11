//! Utility modules for llm-relay

pub mod cancel;
pub mod mask;

pub use mask::mask_sensitive_value;
