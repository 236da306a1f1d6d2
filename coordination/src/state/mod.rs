//! Durable state for the swarm
//!
//! Two independent collections live side by side in one directory:
//!
//! - the **agent registry** (`.geist_swarm.json`): agent name → environment
//!   handle and metadata
//! - the **conversation log** (`.geist_conversations.json`): every completed
//!   dialogue, append-only, in completion order
//!
//! Each file is rewritten whole and atomically on every mutation, so a crash
//! between a registry change and a log append cannot corrupt either.
//!
//! # Usage
//!
//! ```ignore
//! use coordination::state::StateStore;
//!
//! let store = StateStore::open(".")?;
//! let registry = store.load_registry()?;
//! for record in registry.in_registration_order() {
//!     println!("{} -> {}", record.name, record.handle);
//! }
//! ```

pub mod schema;
pub mod store;
pub mod types;

pub use store::{SharedStateStore, StateStore, StoreError, StoreResult};
pub use types::{AgentRecord, PersistedDialogue, RegistrySnapshot};
