//! Storage infrastructure.
//!
//! - `file`   – [`file::FileBlobStore`], one JSON file per key, written
//!   atomically.
//! - `memory` – in-process blob store and legacy settings sources, used by
//!   tests and by embedders that persist elsewhere.
//! - `config` – the tool's own TOML configuration (data directory, log level,
//!   legacy global values).

pub mod config;
pub mod file;
pub mod memory;
