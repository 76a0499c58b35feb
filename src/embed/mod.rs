//! Unity WebGL embed: one canvas, one runtime instance at a time.
//!
//! [`controller`] holds the lifecycle and is platform-independent; the
//! remaining modules bind it to the browser.
pub mod controller;
pub mod dom;
pub mod handle;
pub mod layout;
pub mod loader;
pub mod runtime;
pub mod state;
pub mod view;

pub use controller::{Callbacks, EmbedController};
pub use handle::EmbedHandle;
pub use state::{EmbedState, LoadState};
