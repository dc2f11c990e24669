//! Interned X11 atoms used by the accessor.
//!
//! Only the atoms this crate actually queries are interned; predefined atoms
//! (WM_NAME, WM_CLASS, STRING, CARDINAL, WINDOW) go through `AtomEnum`.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use crate::Error;

#[derive(Debug)]
pub struct Atoms {
    pub net_client_list: Atom,
    pub net_wm_name: Atom,
    pub net_wm_pid: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    /// Intern all required atoms on the given connection.
    pub fn new<C: Connection>(conn: &C) -> Result<Self, Error> {
        let intern = |name: &str| -> Result<Atom, Error> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_pid: intern("_NET_WM_PID")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            utf8_string: intern("UTF8_STRING")?,
        })
    }
}
