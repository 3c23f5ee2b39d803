//! A deterministic, single-threaded host document for CSS tooling.
//!
//! Provides the slice of the browser platform a stylesheet-aware library
//! talks to: a [`Window`] with its [`Document`], CSSOM stylesheets, computed
//! style, mutation observers, animation frames, timers and events.

mod document;
mod error;
mod event;
mod mutation;
mod node;
mod style;
mod stylesheet;
mod window;

pub use document::Document;
pub use error::DomException;
pub use event::{Event, ListenerId};
pub use mutation::{
    MutationEntry, MutationObserveOptions, MutationObserver, MutationObserverInit, MutationRecord,
};
pub use style::ComputedStyle;
pub use stylesheet::{CssRule, CssStyleRule, CssStyleSheet};
pub use window::{FRAME_INTERVAL, FrameHandle, TimerHandle, Window, window};

/// Stable identifier of a node in a [`Document`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document node itself.
    pub const ROOT: Self = Self(0);
}
