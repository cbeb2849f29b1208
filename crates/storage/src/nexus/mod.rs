//! Nexus raw repository plumbing: REST client, payload models, asset index.

pub mod client;
pub mod index;
pub mod models;

pub use client::NexusClient;
pub use index::AssetIndex;
pub use models::{Asset, AssetChecksum, AssetPage, Component, Repository, SearchPage};
