//! Windowing-system accessor and enumerator.
//!
//! [`X11Backend`] wraps one `RustConnection` and exposes exactly two
//! operations: list the managed top-level windows with resolved metadata,
//! and send a graceful close request to one of them. Every per-window
//! property read is individually error-scoped, so a window destroyed
//! between being listed and being queried degrades to empty/placeholder
//! fields instead of aborting the batch.

use std::sync::Arc;

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::atoms::Atoms;
use crate::procfs::ProcessNameLookup;
use crate::title::{self, UNTITLED};
use crate::Error;

/// Opaque X11 window handle.
pub type WindowId = u32;

/// Metadata snapshot for one managed window, produced fresh per enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub id: WindowId,
    pub title: String,
    pub process_name: String,
    pub wm_class: String,
}

/// The seam between the monitor and the windowing system.
///
/// The monitor loop and the one-shot operations are written against this
/// trait; production code uses [`X11Backend`], tests substitute a fake.
pub trait WindowSystem: Send {
    /// Current ordered list of managed top-level windows with resolved
    /// metadata. `Err` means the connection itself failed; an unreadable
    /// client list yields an empty `Ok`.
    fn list_windows(&self) -> Result<Vec<WindowRecord>, Error>;

    /// Send one graceful close request to `window` and flush.
    fn close_window(&self, window: WindowId) -> Result<(), Error>;
}

/// Accessor over one dedicated X11 connection.
///
/// Connections are not shared across threads: the monitor owns one for its
/// whole lifetime, foreground operations open a transient one each.
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
    lookup: Arc<dyn ProcessNameLookup>,
}

impl X11Backend {
    /// Connect to the default display and intern the required atoms.
    pub fn connect(lookup: Arc<dyn ProcessNameLookup>) -> Result<Self, Error> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms::new(&conn)?;
        debug!("connected to X server, root window 0x{:x}", root);
        Ok(Self {
            conn,
            root,
            atoms,
            lookup,
        })
    }

    /// Read `_NET_CLIENT_LIST` from the root window.
    fn client_list(&self) -> Result<Vec<WindowId>, Error> {
        let reply = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms.net_client_list,
                AtomEnum::WINDOW,
                0,
                1024,
            )?
            .reply();

        let Ok(reply) = reply else {
            return Ok(Vec::new());
        };
        match reply.value32() {
            Some(values) => Ok(values.collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Resolve a window's advertised name: `_NET_WM_NAME` (UTF-8), then
    /// legacy `WM_NAME`, then the `"(untitled)"` placeholder.
    fn window_name(&self, window: Window) -> String {
        if let Ok(cookie) = self.conn.get_property(
            false,
            window,
            self.atoms.net_wm_name,
            self.atoms.utf8_string,
            0,
            1024,
        ) {
            if let Ok(reply) = cookie.reply() {
                if !reply.value.is_empty() {
                    return String::from_utf8_lossy(&reply.value).to_string();
                }
            }
        }

        if let Ok(cookie) = self.conn.get_property(
            false,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            0,
            1024,
        ) {
            if let Ok(reply) = cookie.reply() {
                if !reply.value.is_empty() {
                    return String::from_utf8_lossy(&reply.value).to_string();
                }
            }
        }

        UNTITLED.to_string()
    }

    /// Read the class half of `WM_CLASS` (instance\0class\0).
    fn window_class(&self, window: Window) -> String {
        if let Ok(cookie) = self.conn.get_property(
            false,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            0,
            1024,
        ) {
            if let Ok(reply) = cookie.reply() {
                return class_half(&reply.value);
            }
        }
        String::new()
    }

    /// Read `_NET_WM_PID`, 0 when absent or unreadable.
    fn window_pid(&self, window: Window) -> u32 {
        if let Ok(cookie) = self.conn.get_property(
            false,
            window,
            self.atoms.net_wm_pid,
            AtomEnum::CARDINAL,
            0,
            1,
        ) {
            if let Ok(reply) = cookie.reply() {
                if reply.format == 32 {
                    if let Some(mut values) = reply.value32() {
                        if let Some(pid) = values.next() {
                            return pid;
                        }
                    }
                }
            }
        }
        0
    }
}

/// Class half of a raw `WM_CLASS` value (instance\0class\0). The instance
/// half is never used as a substitute; a hint without a class half yields an
/// empty string.
fn class_half(value: &[u8]) -> String {
    let mut parts = value.split(|&b| b == 0);
    let _instance = parts.next();
    match parts.next() {
        Some(class) if !class.is_empty() => String::from_utf8_lossy(class).to_string(),
        _ => String::new(),
    }
}

impl WindowSystem for X11Backend {
    fn list_windows(&self) -> Result<Vec<WindowRecord>, Error> {
        let handles = self.client_list()?;
        let mut windows = Vec::with_capacity(handles.len());
        for window in handles {
            // A window destroyed mid-query still lands in the snapshot with
            // placeholder fields; its handle may need pending reconciliation.
            let name = self.window_name(window);
            windows.push(WindowRecord {
                id: window,
                title: title::application_name(&name).to_string(),
                process_name: self.lookup.name_for_pid(self.window_pid(window)),
                wm_class: self.window_class(window),
            });
        }
        Ok(windows)
    }

    fn close_window(&self, window: WindowId) -> Result<(), Error> {
        // WM_DELETE_WINDOW client message, addressed directly to the target
        // window (not the root), timestamp 0 = CurrentTime.
        let event = ClientMessageEvent::new(
            32,
            window,
            self.atoms.wm_protocols,
            [self.atoms.wm_delete_window, 0, 0, 0, 0],
        );
        let cookie = self
            .conn
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        self.conn.flush()?;
        // Retrieve the asynchronous error: a stale handle comes back as
        // BadWindow, which the caller treats as advisory.
        cookie.check()?;
        Ok(())
    }
}
