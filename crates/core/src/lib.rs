//! Core domain types and shared logic for the mountain LuaRocks gateway.
//!
//! This crate holds everything that does not touch the network:
//! - Artifact filename parsing
//! - The package catalog derived from a storage listing
//! - Manifest serializers (Lua, JSON, zip)
//! - Application configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod filename;
pub mod manifest;

pub use catalog::{Catalog, Package, Version};
pub use error::{Error, Result};
pub use filename::{ArtifactName, parse_artifact_name};
pub use manifest::ManifestFormat;
