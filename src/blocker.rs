//! Blacklist auto-closer and its shared configuration store.
//!
//! [`PopupBlocker`] owns all mutable state behind one mutex (blacklist +
//! pending-close set) plus two atomic flags (running, debug). The background
//! monitor polls the windowing system once per period, matches every window
//! against the blacklist and sends close requests; foreground operations run
//! on the caller's thread over transient connections.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{WindowId, WindowRecord, WindowSystem, X11Backend};
use crate::procfs::ProcFs;
use crate::Error;

/// Default monitor poll period.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Factory for backend connections. The monitor calls it once per `start`
/// for its dedicated connection; every foreground operation calls it for a
/// transient one.
type Connector = Arc<dyn Fn() -> Result<Box<dyn WindowSystem>, Error> + Send + Sync>;

/// Mutex-guarded configuration: the blacklist and the pending-close set.
#[derive(Default)]
struct State {
    blacklist: Vec<String>,
    pending: HashSet<WindowId>,
}

struct Shared {
    state: Mutex<State>,
    running: AtomicBool,
    debug: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Auto-closes blacklisted windows; one instance drives at most one monitor
/// thread. All operations are callable concurrently from any thread.
///
/// Dropping the instance stops the monitor.
pub struct PopupBlocker {
    shared: Arc<Shared>,
    connector: Connector,
    poll_interval: Duration,
}

impl PopupBlocker {
    /// Instance backed by the default X11 display and `/proc` name lookup.
    pub fn new() -> Self {
        Self::with_connector(|| {
            let backend = X11Backend::connect(Arc::new(ProcFs))?;
            Ok(Box::new(backend) as Box<dyn WindowSystem>)
        })
    }

    /// Instance backed by a custom [`WindowSystem`] factory.
    pub fn with_connector<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Box<dyn WindowSystem>, Error> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                running: AtomicBool::new(false),
                debug: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
            connector: Arc::new(connector),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the monitor poll period (default 1 second). Takes effect on
    /// the next `start`.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Start the background monitor. A no-op when already running.
    ///
    /// The dedicated connection is opened before the worker spawns, so a
    /// connection failure is returned here and monitoring does not start.
    pub fn start(&self) -> Result<(), Error> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let backend = match (self.connector)() {
            Ok(backend) => backend,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                warn!("monitor failed to start: {e}");
                return Err(e);
            }
        };

        let shared = Arc::clone(&self.shared);
        let poll = self.poll_interval;
        let handle = thread::spawn(move || run_monitor(shared, backend, poll));
        *self.shared.worker.lock().unwrap() = Some(handle);
        info!("popup monitor started");
        Ok(())
    }

    /// Stop the monitor and reset configuration.
    ///
    /// Clears the blacklist and the pending-close set even when the monitor
    /// was not running, so a later `start` always begins from a clean slate.
    /// Latency is bounded by the poll period plus one in-flight enumeration.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = self.shared.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
            info!("popup monitor stopped");
        }

        let mut state = self.shared.state.lock().unwrap();
        state.blacklist.clear();
        state.pending.clear();
    }

    /// Whether the monitor thread is active.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Toggle verbose per-window logging. Advisory: reads of the flag are
    /// deliberately unsynchronized with in-flight operations.
    pub fn set_debug_logging(&self, enable: bool) {
        self.shared.debug.store(enable, Ordering::SeqCst);
    }

    /// Replace the blacklist. Each call discards the previous list.
    pub fn set_blacklist<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        let mut state = self.shared.state.lock().unwrap();
        state.blacklist = entries;
        if self.shared.debug.load(Ordering::SeqCst) {
            debug!("blacklist replaced, {} entries", state.blacklist.len());
        }
    }

    /// Ordered copy of the current blacklist.
    pub fn blacklist(&self) -> Vec<String> {
        self.shared.state.lock().unwrap().blacklist.clone()
    }

    /// One-shot enumeration of the managed top-level windows over a
    /// transient connection. Reconciles the pending-close set against the
    /// live list as a side effect.
    pub fn taskbar_windows(&self) -> Result<Vec<WindowRecord>, Error> {
        let backend = (self.connector)()?;
        enumerate(&self.shared, backend.as_ref())
    }

    /// Titles-only projection of [`Self::taskbar_windows`].
    pub fn window_titles(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .taskbar_windows()?
            .into_iter()
            .map(|w| w.title)
            .collect())
    }

    /// Send one graceful close request to `window`, independent of the
    /// monitor. Handle 0 is a no-op that never opens a connection. While the
    /// monitor runs, the handle is marked pending even when the send fails,
    /// so the loop will not re-target it.
    pub fn close_window(&self, window: WindowId) -> Result<(), Error> {
        if window == 0 {
            return Ok(());
        }
        if self.shared.debug.load(Ordering::SeqCst) {
            debug!("manual close requested for window 0x{:x}", window);
        }

        let backend = (self.connector)()?;
        if let Err(e) = backend.close_window(window) {
            if self.shared.debug.load(Ordering::SeqCst) {
                warn!("close request for window 0x{:x} failed (window gone?): {e}", window);
            }
        }

        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.state.lock().unwrap().pending.insert(window);
        }
        Ok(())
    }
}

impl Default for PopupBlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PopupBlocker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Enumerate through `ws` and drop pending handles that are no longer in
/// the live list (the close took effect, or the window exited on its own).
fn enumerate(shared: &Shared, ws: &dyn WindowSystem) -> Result<Vec<WindowRecord>, Error> {
    let windows = ws.list_windows()?;
    let mut state = shared.state.lock().unwrap();
    reconcile_pending(&mut state.pending, &windows);
    Ok(windows)
}

/// Remove pending handles absent from the current live list.
fn reconcile_pending(pending: &mut HashSet<WindowId>, live: &[WindowRecord]) {
    pending.retain(|id| live.iter().any(|w| w.id == *id));
}

/// Pick the windows to close this tick: not already pending, and with a
/// process name or WM_CLASS exactly equal to some blacklist entry. Matched
/// handles are inserted into the pending set immediately, so a close request
/// is sent at most once per presence episode even when the send fails.
fn select_targets(
    windows: &[WindowRecord],
    blacklist: &[String],
    pending: &mut HashSet<WindowId>,
) -> Vec<WindowRecord> {
    let mut targets = Vec::new();
    for window in windows {
        if pending.contains(&window.id) {
            continue;
        }
        let matched = blacklist
            .iter()
            .any(|entry| window.process_name == *entry || window.wm_class == *entry);
        if matched {
            pending.insert(window.id);
            targets.push(window.clone());
        }
    }
    targets
}

/// Monitor loop: enumerate, match, close, sleep. Owns its backend for the
/// whole `Running` episode; exits when the running flag clears.
fn run_monitor(shared: Arc<Shared>, backend: Box<dyn WindowSystem>, poll: Duration) {
    while shared.running.load(Ordering::SeqCst) {
        match enumerate(&shared, backend.as_ref()) {
            Ok(windows) => {
                let targets = {
                    let mut state = shared.state.lock().unwrap();
                    let State { blacklist, pending } = &mut *state;
                    if blacklist.is_empty() {
                        Vec::new()
                    } else {
                        select_targets(&windows, blacklist, pending)
                    }
                };

                // Close requests go out after the lock is released.
                for target in targets {
                    if shared.debug.load(Ordering::SeqCst) {
                        debug!(
                            "auto-closing blacklisted window 0x{:x} ({})",
                            target.id, target.title
                        );
                    }
                    if let Err(e) = backend.close_window(target.id) {
                        if shared.debug.load(Ordering::SeqCst) {
                            warn!("close request for window 0x{:x} failed: {e}", target.id);
                        }
                    }
                }
            }
            Err(e) => warn!("window enumeration failed: {e}"),
        }

        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn record(id: WindowId, process_name: &str, wm_class: &str) -> WindowRecord {
        WindowRecord {
            id,
            title: format!("window {id}"),
            process_name: process_name.to_string(),
            wm_class: wm_class.to_string(),
        }
    }

    struct FakeWindowSystem {
        windows: Arc<Mutex<Vec<WindowRecord>>>,
        closed: Arc<Mutex<Vec<WindowId>>>,
        fail_close: Arc<AtomicBool>,
    }

    impl WindowSystem for FakeWindowSystem {
        fn list_windows(&self) -> Result<Vec<WindowRecord>, Error> {
            Ok(self.windows.lock().unwrap().clone())
        }

        fn close_window(&self, window: WindowId) -> Result<(), Error> {
            self.closed.lock().unwrap().push(window);
            if self.fail_close.load(Ordering::SeqCst) {
                // Stale handle: the server rejected the request.
                return Err(Error::Connection(
                    x11rb::errors::ConnectionError::UnknownError,
                ));
            }
            Ok(())
        }
    }

    struct Fixture {
        blocker: PopupBlocker,
        windows: Arc<Mutex<Vec<WindowRecord>>>,
        closed: Arc<Mutex<Vec<WindowId>>>,
        fail_close: Arc<AtomicBool>,
        connects: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let windows = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));
        let fail_close = Arc::new(AtomicBool::new(false));
        let connects = Arc::new(AtomicUsize::new(0));

        let (w, c, f, n) = (
            Arc::clone(&windows),
            Arc::clone(&closed),
            Arc::clone(&fail_close),
            Arc::clone(&connects),
        );
        let mut blocker = PopupBlocker::with_connector(move || {
            n.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeWindowSystem {
                windows: Arc::clone(&w),
                closed: Arc::clone(&c),
                fail_close: Arc::clone(&f),
            }) as Box<dyn WindowSystem>)
        });
        blocker.set_poll_interval(Duration::from_millis(5));

        Fixture {
            blocker,
            windows,
            closed,
            fail_close,
            connects,
        }
    }

    fn settle() {
        thread::sleep(Duration::from_millis(100));
    }

    #[test]
    fn blacklist_round_trip_preserves_order() {
        let fx = fixture();
        fx.blocker.set_blacklist(["a", "b"]);
        assert_eq!(fx.blocker.blacklist(), vec!["a", "b"]);
    }

    #[test]
    fn stop_clears_blacklist() {
        let fx = fixture();
        fx.blocker.set_blacklist(["x"]);
        fx.blocker.stop();
        assert!(fx.blocker.blacklist().is_empty());
    }

    #[test]
    fn start_is_idempotent() {
        let fx = fixture();
        fx.blocker.start().unwrap();
        fx.blocker.start().unwrap();
        assert!(fx.blocker.is_running());
        // One dedicated connection for one worker.
        assert_eq!(fx.connects.load(Ordering::SeqCst), 1);
        fx.blocker.stop();
        assert!(!fx.blocker.is_running());
        fx.blocker.stop();
    }

    #[test]
    fn start_fails_without_connection() {
        let blocker = PopupBlocker::with_connector(|| {
            Err(Error::Connection(
                x11rb::errors::ConnectionError::UnknownError,
            ))
        });
        assert!(blocker.start().is_err());
        assert!(!blocker.is_running());
    }

    #[test]
    fn blacklisted_window_closed_once_per_presence_episode() {
        let fx = fixture();
        fx.windows
            .lock()
            .unwrap()
            .push(record(7, "popup-app", "Popup"));
        fx.blocker.start().unwrap();
        fx.blocker.set_blacklist(["popup-app"]);
        settle();

        // Still listed (the app ignores the request): no re-send.
        assert_eq!(*fx.closed.lock().unwrap(), vec![7]);
        fx.blocker.stop();
    }

    #[test]
    fn reappearing_window_gets_a_fresh_close() {
        let fx = fixture();
        fx.windows.lock().unwrap().push(record(9, "ad", "Ad"));
        fx.blocker.start().unwrap();
        fx.blocker.set_blacklist(["Ad"]);
        settle();
        assert_eq!(*fx.closed.lock().unwrap(), vec![9]);

        // Window disappears: pending entry is reconciled away...
        fx.windows.lock().unwrap().clear();
        settle();

        // ...so the same handle showing up again is a new presence episode.
        fx.windows.lock().unwrap().push(record(9, "ad", "Ad"));
        settle();
        assert_eq!(*fx.closed.lock().unwrap(), vec![9, 9]);
        fx.blocker.stop();
    }

    #[test]
    fn failed_close_request_still_marks_pending() {
        let fx = fixture();
        fx.fail_close.store(true, Ordering::SeqCst);
        fx.windows
            .lock()
            .unwrap()
            .push(record(11, "stuck", "Stuck"));
        fx.blocker.start().unwrap();
        fx.blocker.set_blacklist(["stuck"]);
        settle();

        // The send failed, but the handle went pending anyway: exactly one
        // attempt, no hot-loop retries against a window that cannot close.
        assert_eq!(*fx.closed.lock().unwrap(), vec![11]);
        fx.blocker.stop();
    }

    #[test]
    fn failed_manual_close_still_marks_pending() {
        let fx = fixture();
        fx.windows.lock().unwrap().push(record(13, "gone", "Gone"));
        fx.blocker.start().unwrap();

        fx.fail_close.store(true, Ordering::SeqCst);
        fx.blocker.close_window(13).unwrap();
        assert_eq!(*fx.closed.lock().unwrap(), vec![13]);

        // The monitor treats the manually closed window as already handled.
        fx.blocker.set_blacklist(["gone"]);
        settle();
        assert_eq!(*fx.closed.lock().unwrap(), vec![13]);
        fx.blocker.stop();
    }

    #[test]
    fn manual_close_marks_window_pending_for_the_monitor() {
        let fx = fixture();
        fx.windows.lock().unwrap().push(record(42, "chat", "Chat"));
        fx.blocker.start().unwrap();
        fx.blocker.close_window(42).unwrap();
        assert_eq!(*fx.closed.lock().unwrap(), vec![42]);

        // The monitor must not re-target the manually closed window.
        fx.blocker.set_blacklist(["chat"]);
        settle();
        assert_eq!(*fx.closed.lock().unwrap(), vec![42]);
        fx.blocker.stop();
    }

    #[test]
    fn close_window_zero_is_a_no_op() {
        let fx = fixture();
        fx.blocker.close_window(0).unwrap();
        assert_eq!(fx.connects.load(Ordering::SeqCst), 0);
        assert!(fx.closed.lock().unwrap().is_empty());
    }

    #[test]
    fn taskbar_windows_snapshots_current_list() {
        let fx = fixture();
        fx.windows
            .lock()
            .unwrap()
            .push(record(3, "editor", "Editor"));
        let snapshot = fx.blocker.taskbar_windows().unwrap();
        assert_eq!(snapshot, vec![record(3, "editor", "Editor")]);
        assert_eq!(
            fx.blocker.window_titles().unwrap(),
            vec!["window 3".to_string()]
        );
    }

    #[test]
    fn select_targets_matches_process_or_class_exactly() {
        let blacklist = vec!["firefox".to_string(), "Popup".to_string()];
        let windows = vec![
            record(1, "firefox", "Navigator"), // process match
            record(2, "helper", "Popup"),      // class match
            record(3, "fire", "Nav"),          // no partial matches
            record(4, "Firefox", "popup"),     // case-sensitive
        ];
        let mut pending = HashSet::new();
        let targets = select_targets(&windows, &blacklist, &mut pending);
        let ids: Vec<WindowId> = targets.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(pending, HashSet::from([1, 2]));
    }

    #[test]
    fn select_targets_skips_pending_handles() {
        let blacklist = vec!["x".to_string()];
        let windows = vec![record(1, "x", ""), record(2, "x", "")];
        let mut pending = HashSet::from([1]);
        let targets = select_targets(&windows, &blacklist, &mut pending);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, 2);
    }

    #[test]
    fn reconcile_drops_handles_missing_from_live_list() {
        let mut pending = HashSet::from([1, 2, 3]);
        let live = vec![record(2, "", "")];
        reconcile_pending(&mut pending, &live);
        assert_eq!(pending, HashSet::from([2]));
    }
}
