//! Provider boundary
//!
//! Everything that talks to the external Assistants API lives here. The rest
//! of the crate only sees provider-assigned identifiers and parsed statuses.

pub mod client;
pub mod types;

pub use client::{ProviderClient, ProviderError};
