//! HTTP request handlers.

pub mod artifacts;
pub mod health;
pub mod manifest;

pub use artifacts::*;
pub use health::*;
pub use manifest::*;
