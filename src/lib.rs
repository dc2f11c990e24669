//! popup-blocker
//!
//! Watches the X11 session's client list and gracefully closes windows whose
//! owning process name or WM_CLASS matches a configurable blacklist.
//!
//! The crate exposes two surfaces:
//!
//! - [`PopupBlocker`], the instance API: create one, feed it a blacklist,
//!   call [`PopupBlocker::start`] to run the background monitor, and use the
//!   one-shot operations ([`PopupBlocker::taskbar_windows`],
//!   [`PopupBlocker::close_window`], ...) from any thread.
//! - [`ffi`], a C-linkage shim over a single shared instance, for callers
//!   loading the crate as a `cdylib`.
//!
//! Closing is always cooperative: the monitor sends a `WM_DELETE_WINDOW`
//! client message and then waits for the window to leave the client list on
//! its own. Windows that ignore the request stay in a pending set so the
//! request is not re-sent every poll tick.

mod atoms;
mod backend;
mod blocker;
pub mod ffi;
mod procfs;
mod title;

pub use backend::{WindowId, WindowRecord, WindowSystem, X11Backend};
pub use blocker::PopupBlocker;
pub use procfs::{ProcFs, ProcessNameLookup};

use thiserror::Error;

/// Errors surfaced by operations that talk to the X server.
///
/// Per-window property reads never produce these: a window that vanishes
/// between being listed and being queried degrades to empty/placeholder
/// fields instead of failing the batch.
#[derive(Debug, Error)]
pub enum Error {
    /// The X server could not be reached at all.
    #[error("failed to connect to the X server: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    /// The connection broke while a request was being issued.
    #[error("X connection failed: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    /// The X server rejected a request.
    #[error("X request failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),
}
