// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. editor::EditorState)
    clippy::module_name_repetitions
)]

//! # edbridge
//!
//! Republishes an editor's update stream through a subscribe-with-replay
//! store, so UI code can observe editor state without touching the editor's
//! own listener API.
//!
//! ## Data flow
//!
//! editor update -> filter -> snapshot -> store -> subscribers
//!
//! Everything is single-threaded and synchronous: snapshots are published
//! from inside the editor's own notification callback.
//!
//! ## Modules
//!
//! - [`editor`]: Editor contract and a rope-backed reference editor
//! - [`bridge`]: Update filtering and snapshot publishing
//! - [`store`]: Subscribe-with-replay store
//! - [`lifecycle`]: Mount guards for activate/deactivate pairs
//! - [`script`]: Replay script format
//! - [`replay`]: Script-driven replay of an editor through a bridge
//! - [`config`]: Saved defaults
//! - [`watcher`]: Script file watching

pub mod bridge;
pub mod config;
pub mod editor;
pub mod lifecycle;
pub mod replay;
pub mod script;
pub mod store;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::{BridgeOptions, EditorSnapshot, EditorStateBridge};
    pub use crate::editor::{Editor, EditorState, RopeEditor, UpdateEvent};
    pub use crate::lifecycle::{Lifecycle, mount};
    pub use crate::store::{Readable, Subscription, Writable};
}
