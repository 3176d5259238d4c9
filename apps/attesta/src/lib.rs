//! # Attesta App Library
//!
//! Configuration and mapping-file handling shared by the `attesta` binary
//! and its integration tests.

pub mod config;
pub mod input;

pub use config::{BackendKind, FileConfig, Overrides, Settings};
pub use input::{parse_mapping, parse_source_ids, read_mapping};
