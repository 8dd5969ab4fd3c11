//! Core data types shared by every module.

pub mod capabilities;
pub mod chat;
pub mod config;
pub mod provider;

pub use capabilities::*;
pub use chat::*;
pub use config::*;
pub use provider::*;
