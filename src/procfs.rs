//! Process-name lookup for window owners.
//!
//! The enumerator maps `_NET_WM_PID` to a short process name through this
//! trait. The default implementation reads `/proc/<pid>/comm`; everything is
//! best-effort and degrades to an empty string.

use std::fs;

pub trait ProcessNameLookup: Send + Sync {
    /// Short process name for `pid`, or an empty string on any failure.
    fn name_for_pid(&self, pid: u32) -> String;
}

/// `/proc`-backed lookup.
#[derive(Debug, Default)]
pub struct ProcFs;

impl ProcessNameLookup for ProcFs {
    fn name_for_pid(&self, pid: u32) -> String {
        if pid == 0 {
            return String::new();
        }
        fs::read_to_string(format!("/proc/{pid}/comm"))
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    }
}
