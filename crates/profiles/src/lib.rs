//! Per-user personalization for mirrorsense.
//!
//! Loads the profile table (`users` keyed by detector name plus an optional
//! `default`), keeps it hot-reloadable, and answers "what should this widget
//! show for this person" without doing any I/O on the lookup path.
//!
//! - `model.rs`   - Wire format of the profile table
//! - `lookup.rs`  - Identity → profile, capability enable checks (pure)
//! - `loader.rs`  - Reading the table from disk
//! - `store.rs`   - Swappable `Arc` snapshot with a generation counter
//! - `watcher.rs` - notify-based reload on file change

mod error;
mod loader;
mod lookup;
mod model;
mod store;
mod watcher;

pub use error::{ProfileError, Result};
pub use loader::{load_table, DEFAULT_PROFILES_FILE};
pub use lookup::{
    capability, lookup, Capability, CapabilityData, CapabilityLookup, ProfileSource,
    ResolvedProfile,
};
pub use model::{CalendarSettings, ProfileTable, TodoSettings, UserProfile};
pub use store::{ProfileStore, ProfileStoreRef};
pub use watcher::ProfileWatcher;
