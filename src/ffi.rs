//! C-linkage surface over one shared [`PopupBlocker`] instance.
//!
//! Everything inside the crate works with owned `Vec`/`String`; this module
//! is the only place raw arrays exist. Ownership is type-keyed: arrays from
//! `GetTaskbarWindows` go back through `FreeWindowInfoArray`, string arrays
//! from `GetBlacklist`/`GetTaskbarWindowTitles` go back through
//! `FreeStringArray`, exactly once each. All failures are encoded as
//! NULL/zero results; nothing unwinds across the boundary.

use std::ffi::{CStr, CString};
use std::sync::OnceLock;

use libc::{c_char, c_int, c_long};

use crate::blocker::PopupBlocker;
use crate::backend::{WindowId, WindowRecord};

/// Window metadata as seen by C callers. String fields are owned by the
/// array they arrived in and freed with it.
#[repr(C)]
pub struct WindowInfo {
    pub id: c_long,
    pub title: *mut c_char,
    pub process_name: *mut c_char,
    pub wm_class: *mut c_char,
}

fn instance() -> &'static PopupBlocker {
    static INSTANCE: OnceLock<PopupBlocker> = OnceLock::new();
    INSTANCE.get_or_init(PopupBlocker::new)
}

/// NUL-stripped C copy of a Rust string.
fn to_c_string(s: &str) -> *mut c_char {
    let cleaned;
    let bytes = if s.as_bytes().contains(&0) {
        cleaned = s.replace('\0', "");
        cleaned.as_bytes()
    } else {
        s.as_bytes()
    };
    // Cannot fail: interior NULs were just removed.
    CString::new(bytes).unwrap_or_default().into_raw()
}

fn into_raw_array<T>(v: Vec<T>) -> *mut T {
    Box::into_raw(v.into_boxed_slice()) as *mut T
}

unsafe fn free_raw_array<T>(ptr: *mut T, len: usize) {
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) });
}

/// NULL-terminated string array plus out-count.
unsafe fn export_strings(strings: Vec<String>, count: *mut c_int) -> *mut *mut c_char {
    if !count.is_null() {
        unsafe { *count = strings.len() as c_int };
    }
    if strings.is_empty() {
        return std::ptr::null_mut();
    }
    let mut array: Vec<*mut c_char> = strings.iter().map(|s| to_c_string(s)).collect();
    array.push(std::ptr::null_mut());
    into_raw_array(array)
}

/// Start the background auto-closer. Idempotent; a connection failure
/// leaves monitoring stopped.
#[unsafe(no_mangle)]
pub extern "C" fn StartMonitoring() {
    let _ = instance().start();
}

/// Stop the auto-closer and reset blacklist and pending state. Idempotent.
#[unsafe(no_mangle)]
pub extern "C" fn StopMonitoring() {
    instance().stop();
}

/// Toggle verbose library logging.
#[unsafe(no_mangle)]
pub extern "C" fn EnableDebugLogging(enable: bool) {
    instance().set_debug_logging(enable);
}

/// Send one graceful close request to `window_id`. 0 is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn CloseWindowById(window_id: c_long) {
    let Ok(window) = WindowId::try_from(window_id) else {
        return;
    };
    let _ = instance().close_window(window);
}

/// Replace the blacklist with a NULL-terminated array of strings. A NULL
/// array or malformed entries degrade to "no entries".
///
/// # Safety
/// `blacklist` must be NULL or a NULL-terminated array of valid C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SetBlacklist(blacklist: *const *const c_char) {
    let mut entries = Vec::new();
    if !blacklist.is_null() {
        let mut i = 0;
        loop {
            let entry = unsafe { *blacklist.add(i) };
            if entry.is_null() {
                break;
            }
            entries.push(unsafe { CStr::from_ptr(entry) }.to_string_lossy().into_owned());
            i += 1;
        }
    }
    instance().set_blacklist(entries);
}

/// Current blacklist as a NULL-terminated owned string array. Release with
/// `FreeStringArray`.
///
/// # Safety
/// `count` must be NULL or a valid out-pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetBlacklist(count: *mut c_int) -> *mut *mut c_char {
    unsafe { export_strings(instance().blacklist(), count) }
}

/// One-shot enumeration of the session's top-level windows. Returns NULL
/// (count 0) when the X server is unreachable. Release with
/// `FreeWindowInfoArray`.
///
/// # Safety
/// `count` must be NULL or a valid out-pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetTaskbarWindows(count: *mut c_int) -> *mut WindowInfo {
    let windows: Vec<WindowRecord> = instance().taskbar_windows().unwrap_or_default();
    if !count.is_null() {
        unsafe { *count = windows.len() as c_int };
    }
    if windows.is_empty() {
        return std::ptr::null_mut();
    }
    let array: Vec<WindowInfo> = windows
        .into_iter()
        .map(|w| WindowInfo {
            id: w.id as c_long,
            title: to_c_string(&w.title),
            process_name: to_c_string(&w.process_name),
            wm_class: to_c_string(&w.wm_class),
        })
        .collect();
    into_raw_array(array)
}

/// Titles-only projection of `GetTaskbarWindows`. Release with
/// `FreeStringArray`.
///
/// # Safety
/// `count` must be NULL or a valid out-pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetTaskbarWindowTitles(count: *mut c_int) -> *mut *mut c_char {
    unsafe { export_strings(instance().window_titles().unwrap_or_default(), count) }
}

/// Release an array returned by `GetTaskbarWindows`.
///
/// # Safety
/// `array`/`count` must be exactly what `GetTaskbarWindows` returned, passed
/// at most once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FreeWindowInfoArray(array: *mut WindowInfo, count: c_int) {
    if array.is_null() || count <= 0 {
        return;
    }
    let len = count as usize;
    for i in 0..len {
        let info = unsafe { &*array.add(i) };
        for ptr in [info.title, info.process_name, info.wm_class] {
            if !ptr.is_null() {
                drop(unsafe { CString::from_raw(ptr) });
            }
        }
    }
    unsafe { free_raw_array(array, len) };
}

/// Release a string array returned by `GetBlacklist` or
/// `GetTaskbarWindowTitles`.
///
/// # Safety
/// `array`/`count` must be exactly what the allocating call returned, passed
/// at most once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FreeStringArray(array: *mut *mut c_char, count: c_int) {
    if array.is_null() || count < 0 {
        return;
    }
    let len = count as usize;
    for i in 0..len {
        let ptr = unsafe { *array.add(i) };
        if !ptr.is_null() {
            drop(unsafe { CString::from_raw(ptr) });
        }
    }
    // The array itself carries one extra NULL terminator slot.
    unsafe { free_raw_array(array, len + 1) };
}
