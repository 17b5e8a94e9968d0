//! FFI (Foreign Function Interface) bindings for the native 3ds Max shim.
//!
//! The shim is a small C++ plugin that loads this library, hands it a table
//! of host callbacks and registers a MaxScript function that forwards menu
//! clicks to [`maxbridge_dispatch_action`].
//!
//! # Memory Management
//!
//! - Strings passed in are borrowed for the duration of the call only
//! - Strings returned by Rust MUST be released with [`maxbridge_free_string`]
//! - Strings are null-terminated UTF-8
//!
//! # Usage from C++
//!
//! ```cpp
//! MaxBridgeHostCallbacks callbacks = { &EvalMaxScript, &ListenerPrint, &VersionId,
//!                                      &MenuExists, &HasCapability, nullptr };
//! maxbridge_start(&callbacks, settingsJson);
//!
//! // from the MaxScript function registered as sgtk_dispatch_action
//! int code = maxbridge_dispatch_action(id);
//! ```

use crate::bootstrap;
use crate::discovery::Launcher;
use crate::engine::{self, DispatchOutcome};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{Advisory, AdvisoryResponse, HostBridge};
use crate::maxscript::{Script, Statement};
use crate::settings::EngineSettings;
use crate::version::{Capability, MaxVersion};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

// ============================================================================
// C-Compatible Types
// ============================================================================

/// Host functions provided by the shim. Only `eval_maxscript` is required.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CHostCallbacks {
    /// Evaluates MaxScript; returns 0 on success.
    pub eval_maxscript: Option<extern "C" fn(script: *const c_char) -> c_int>,
    pub print: Option<extern "C" fn(line: *const c_char)>,
    /// Returns `Get3DSMAXVersion()`.
    pub version_id: Option<extern "C" fn() -> u32>,
    /// Returns non-zero when a menu titled `label` is registered.
    pub menu_exists: Option<extern "C" fn(label: *const c_char) -> c_int>,
    /// Returns non-zero when the capability (see [`capability_code`]) is
    /// available.
    pub has_capability: Option<extern "C" fn(capability: c_int) -> c_int>,
    /// Shows a modal advisory. Returns 1 when "do not show again" was
    /// ticked, 0 when it was not, negative on failure.
    pub show_advisory:
        Option<extern "C" fn(title: *const c_char, message: *const c_char) -> c_int>,
}

/// Result code for operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CResultCode {
    Success = 0,
    Error = 1,
}

/// Result of [`maxbridge_dispatch_action`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CDispatchCode {
    Invoked = 0,
    Blocked = 1,
    NotFound = 2,
    Failed = 3,
    NoEngine = 4,
    InvalidArgument = 5,
}

impl From<DispatchOutcome> for CDispatchCode {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Invoked => CDispatchCode::Invoked,
            DispatchOutcome::Blocked => CDispatchCode::Blocked,
            DispatchOutcome::NotFound => CDispatchCode::NotFound,
            DispatchOutcome::Failed => CDispatchCode::Failed,
        }
    }
}

pub fn capability_code(capability: Capability) -> c_int {
    match capability {
        Capability::PanelDocking => 0,
        Capability::MenuPostLoadNotification => 1,
        Capability::WidgetAttach => 2,
    }
}

// ============================================================================
// Native host
// ============================================================================

/// [`HostBridge`] over the shim's callback table.
pub struct NativeHost {
    callbacks: CHostCallbacks,
}

impl NativeHost {
    pub fn new(callbacks: CHostCallbacks) -> BridgeResult<Self> {
        if callbacks.eval_maxscript.is_none() {
            return Err(BridgeError::Host("eval_maxscript callback is required".into()));
        }
        Ok(Self { callbacks })
    }
}

fn to_cstring(text: &str) -> BridgeResult<CString> {
    CString::new(text).map_err(|e| BridgeError::Host(format!("Interior nul byte: {}", e)))
}

impl HostBridge for NativeHost {
    fn eval_maxscript(&self, text: &str) -> BridgeResult<()> {
        let eval = self
            .callbacks
            .eval_maxscript
            .ok_or_else(|| BridgeError::Host("eval_maxscript callback is required".into()))?;
        let script = to_cstring(text)?;
        match eval(script.as_ptr()) {
            0 => Ok(()),
            code => Err(BridgeError::Script(format!(
                "MaxScript evaluation failed with code {}",
                code
            ))),
        }
    }

    fn menu_exists(&self, label: &str) -> bool {
        match (self.callbacks.menu_exists, to_cstring(label)) {
            (Some(exists), Ok(label)) => exists(label.as_ptr()) != 0,
            _ => false,
        }
    }

    fn unregister_menu(&self, label: &str) -> BridgeResult<()> {
        self.run_script(&Script::single(Statement::UnregisterMenu {
            label: label.to_string(),
        }))
    }

    fn version_id(&self) -> BridgeResult<u32> {
        self.callbacks
            .version_id
            .map(|version_id| version_id())
            .ok_or_else(|| BridgeError::MissingCapability("Get3DSMAXVersion".into()))
    }

    fn print(&self, line: &str) {
        match (self.callbacks.print, to_cstring(line)) {
            (Some(print), Ok(line)) => print(line.as_ptr()),
            _ => eprintln!("{}", line),
        }
    }

    fn show_advisory(&self, advisory: &Advisory) -> BridgeResult<AdvisoryResponse> {
        let show = self.callbacks.show_advisory.ok_or_else(|| {
            BridgeError::MissingCapability(format!("advisory dialog '{}'", advisory.title))
        })?;
        let title = to_cstring(&advisory.title)?;
        let message = to_cstring(&advisory.message)?;
        match show(title.as_ptr(), message.as_ptr()) {
            code if code < 0 => Err(BridgeError::Host(format!(
                "advisory dialog failed with code {}",
                code
            ))),
            code => Ok(AdvisoryResponse {
                never_again: code == 1,
            }),
        }
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.callbacks
            .has_capability
            .map_or(false, |has| has(capability_code(capability)) != 0)
    }
}

/// Borrows a C string. `None` for null or non-UTF-8 input.
///
/// # Safety
/// `ptr` must be null or point to a null-terminated string that outlives the
/// returned reference.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Starts the engine from the launch environment.
/// `settings_json` may be null, in which case defaults are used.
///
/// # Safety
/// `callbacks` must point to a valid callback table. `settings_json` must be
/// null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn maxbridge_start(
    callbacks: *const CHostCallbacks,
    settings_json: *const c_char,
) -> CResultCode {
    if callbacks.is_null() {
        return CResultCode::Error;
    }
    let callbacks = *callbacks;
    let settings_json = borrow_str(settings_json).map(str::to_owned);

    let started = catch_unwind(move || -> BridgeResult<()> {
        let host: Arc<dyn HostBridge> = Arc::new(NativeHost::new(callbacks)?);
        let settings = match settings_json {
            Some(raw) => EngineSettings::from_json(&raw)?,
            None => EngineSettings::default(),
        };
        bootstrap::bootstrap(host, settings)?;
        Ok(())
    });

    match started {
        Ok(Ok(())) => CResultCode::Success,
        Ok(Err(e)) => {
            log::error!("Shotgun: {}", e);
            CResultCode::Error
        }
        Err(_) => {
            eprintln!("Shotgun: engine startup panicked");
            CResultCode::Error
        }
    }
}

/// Tears down the current engine. Safe to call when none is running.
#[no_mangle]
pub extern "C" fn maxbridge_shutdown() {
    if catch_unwind(engine::shutdown).is_err() {
        eprintln!("Shotgun: engine shutdown panicked");
    }
}

/// Rebuilds the Shotgun menu of the current engine.
#[no_mangle]
pub extern "C" fn maxbridge_rebuild_menu() -> CResultCode {
    let Some(engine) = engine::current() else {
        return CResultCode::Error;
    };
    match catch_unwind(AssertUnwindSafe(|| engine.rebuild_menu())) {
        Ok(Ok(_)) => CResultCode::Success,
        Ok(Err(e)) => {
            log::error!("Failed to rebuild the menu: {}", e);
            CResultCode::Error
        }
        Err(_) => CResultCode::Error,
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Runs the menu action registered under `id`.
///
/// # Safety
/// `id` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn maxbridge_dispatch_action(id: *const c_char) -> CDispatchCode {
    let Some(id) = borrow_str(id) else {
        return CDispatchCode::InvalidArgument;
    };
    guard_dispatch(|| {
        let Some(engine) = engine::current() else {
            eprintln!("Shotgun: no engine running, ignoring action [{}]", id);
            return CDispatchCode::NoEngine;
        };
        engine.dispatch(id).into()
    })
}

/// Runs a dispatch body, reporting a panic anywhere in it as a failure
/// instead of unwinding into the host.
fn guard_dispatch<F>(body: F) -> CDispatchCode
where
    F: FnOnce() -> CDispatchCode,
{
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(code) => code,
        Err(_) => {
            eprintln!("Shotgun: menu action dispatch panicked");
            CDispatchCode::Failed
        }
    }
}

/// 1 when menu actions may run, 0 while a modal dialog is open or no engine
/// is running.
#[no_mangle]
pub extern "C" fn maxbridge_is_menu_enabled() -> c_int {
    match engine::current() {
        Some(engine) if engine.guard().is_enabled() => 1,
        _ => 0,
    }
}

// ============================================================================
// Versions & Discovery
// ============================================================================

/// Marketing year for a `Get3DSMAXVersion()` value.
#[no_mangle]
pub extern "C" fn maxbridge_version_year(version_id: u32) -> c_int {
    MaxVersion::from_version_id(version_id).year as c_int
}

/// Installed 3ds Max versions as a JSON array, or null on failure.
/// Caller MUST call maxbridge_free_string() when done.
///
/// # Safety
/// `engine_root` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn maxbridge_scan_software(engine_root: *const c_char) -> *mut c_char {
    let root = borrow_str(engine_root).unwrap_or(".");
    let launcher = Launcher::new(root, EngineSettings::default());
    let json = launcher
        .scan_software()
        .and_then(|found| Ok(serde_json::to_string(&found)?));
    match json.map(|json| CString::new(json)) {
        Ok(Ok(json)) => json.into_raw(),
        Ok(Err(_)) => ptr::null_mut(),
        Err(e) => {
            eprintln!("Error scanning for 3ds Max: {}", e);
            ptr::null_mut()
        }
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// `s` must be null or a pointer returned by this library that has not been
/// freed yet.
#[no_mangle]
pub unsafe extern "C" fn maxbridge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn eval_ok(_script: *const c_char) -> c_int {
        0
    }

    extern "C" fn eval_fail(_script: *const c_char) -> c_int {
        7
    }

    extern "C" fn version_2019() -> u32 {
        21000 << 16
    }

    extern "C" fn advisory_never_again(_title: *const c_char, _message: *const c_char) -> c_int {
        1
    }

    fn callbacks(eval: extern "C" fn(*const c_char) -> c_int) -> CHostCallbacks {
        CHostCallbacks {
            eval_maxscript: Some(eval),
            print: None,
            version_id: None,
            menu_exists: None,
            has_capability: None,
            show_advisory: None,
        }
    }

    #[test]
    fn test_version_year() {
        assert_eq!(maxbridge_version_year(17000 << 16), 2015);
        assert_eq!(maxbridge_version_year(21000 << 16), 2019);
    }

    #[test]
    fn test_null_arguments() {
        unsafe {
            assert_eq!(maxbridge_dispatch_action(ptr::null()), CDispatchCode::InvalidArgument);
            assert_eq!(maxbridge_start(ptr::null(), ptr::null()), CResultCode::Error);
            maxbridge_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_panicking_dispatch_is_contained() {
        assert_eq!(guard_dispatch(|| panic!("logger blew up")), CDispatchCode::Failed);
        assert_eq!(guard_dispatch(|| CDispatchCode::Blocked), CDispatchCode::Blocked);
    }

    #[test]
    fn test_native_host_requires_eval() {
        let mut table = callbacks(eval_ok);
        table.eval_maxscript = None;
        assert!(NativeHost::new(table).is_err());
    }

    #[test]
    fn test_native_host_maps_callbacks() {
        let mut table = callbacks(eval_fail);
        let host = NativeHost::new(table).unwrap();
        assert!(matches!(host.eval_maxscript("1 + 1"), Err(BridgeError::Script(_))));
        assert!(matches!(host.version_id(), Err(BridgeError::MissingCapability(_))));
        assert!(!host.menu_exists("Shotgun"));

        table.eval_maxscript = Some(eval_ok);
        table.version_id = Some(version_2019);
        table.show_advisory = Some(advisory_never_again);
        let host = NativeHost::new(table).unwrap();
        assert!(host.eval_maxscript("1 + 1").is_ok());
        assert_eq!(host.version_id().unwrap(), 21000 << 16);
        let advisory = Advisory {
            title: "t".into(),
            message: "m".into(),
        };
        assert!(host.show_advisory(&advisory).unwrap().never_again);
        assert!(!host.has_capability(Capability::PanelDocking));
    }
}
