//! Infrastructure layer for the profile store.
//!
//! Contains the adapters behind the application ports (file and in-memory
//! blob stores, legacy settings sources), the TOML tool configuration, and
//! the UI command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `profile_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod storage;
pub mod ui_bridge;
