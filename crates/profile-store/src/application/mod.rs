//! Application layer use cases for the profile store.
//!
//! The application layer sits between the pure domain (`profile-core`) and
//! the infrastructure (files, legacy settings, UI bridge).  Use cases here:
//!
//! - **Orchestrate** domain objects to fulfil a caller's goal (e.g. "save
//!   this profile and back-fill the settings it is missing").
//! - **Depend on abstractions** ([`ports::BlobStore`], [`ports::LegacySource`])
//!   rather than concrete adapters.
//! - **Contain no file system access** of their own.
//!
//! # Sub-modules
//!
//! - **`access_gate`**   – FIFO mutual exclusion for read-modify-write cycles
//!   on the persisted document.
//!
//! - **`migrate`**       – Runs pending migrations and writes each one through
//!   before starting the next.
//!
//! - **`profile_store`** – The public operation surface: list, save, load,
//!   delete, set current, mode bindings, reset, import/export, change events.
//!
//! - **`ports`**         – Traits implemented by the infrastructure layer.

pub mod access_gate;
pub mod migrate;
pub mod ports;
pub mod profile_store;
