//! The seam between the bridge and 3ds Max.
//!
//! The native shim that loads this library implements [`HostBridge`] on top
//! of the 3ds Max SDK. [`RecordingHost`] is an in-memory stand-in used by the
//! `maxbridge` dry-run CLI and by the tests.

use crate::error::{BridgeError, BridgeResult};
use crate::maxscript::{Script, Statement};
use crate::version::Capability;
use parking_lot::Mutex;
use std::collections::HashSet;

/// A non-fatal notice shown in a modal dialog with a "do not show this
/// again" checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvisoryResponse {
    /// The user ticked "do not show this again".
    pub never_again: bool,
}

/// Everything the bridge needs from the host application. All methods are
/// called on the host's main thread.
pub trait HostBridge: Send + Sync {
    /// Evaluates MaxScript text synchronously.
    fn eval_maxscript(&self, text: &str) -> BridgeResult<()>;

    /// Evaluates a generated program. Empty programs are not sent.
    fn run_script(&self, script: &Script) -> BridgeResult<()> {
        if script.is_empty() {
            return Ok(());
        }
        self.eval_maxscript(&script.render())
    }

    fn menu_exists(&self, label: &str) -> bool;

    fn unregister_menu(&self, label: &str) -> BridgeResult<()>;

    /// The raw `Get3DSMAXVersion()` value.
    fn version_id(&self) -> BridgeResult<u32>;

    /// Writes a line to the MAXScript listener.
    fn print(&self, line: &str);

    fn message_box(&self, title: &str, text: &str) -> BridgeResult<()> {
        self.run_script(&Script::single(Statement::MessageBox {
            title: title.to_string(),
            text: text.to_string(),
        }))
    }

    fn open_url(&self, url: &str) -> BridgeResult<()> {
        self.run_script(&Script::single(Statement::ShellLaunch {
            target: url.to_string(),
        }))
    }

    /// Shows `advisory` modally. Hosts without a dialog implementation report
    /// [`BridgeError::MissingCapability`].
    fn show_advisory(&self, advisory: &Advisory) -> BridgeResult<AdvisoryResponse> {
        Err(BridgeError::MissingCapability(format!(
            "advisory dialog '{}'",
            advisory.title
        )))
    }

    /// Whether an optional host API is present in this session.
    fn has_capability(&self, _capability: Capability) -> bool {
        false
    }
}

/// Default 3ds Max main menu bar, used by [`RecordingHost`].
pub const DEFAULT_MAIN_MENU_BAR: &[&str] = &[
    "&File",
    "&Edit",
    "&Tools",
    "&Group",
    "&Views",
    "&Create",
    "Modifiers",
    "Animation",
    "Graph Editors",
    "&Rendering",
    "Customize",
    "&Scripting",
    "&Help",
];

#[derive(Debug, Default)]
struct RecordingState {
    evaluated: Vec<String>,
    scripts: Vec<Script>,
    /// Registered menu labels, in creation order.
    menus: Vec<String>,
    main_menu_bar: Vec<String>,
    menu_enabled: Option<bool>,
    printed: Vec<String>,
    message_boxes: Vec<(String, String)>,
    launched: Vec<String>,
    advisories: Vec<Advisory>,
    menu_reload_hook: bool,
    fail_evals: usize,
}

/// Host double that records every call and keeps a minimal model of the
/// menu manager.
#[derive(Debug)]
pub struct RecordingHost {
    state: Mutex<RecordingState>,
    version_id: Option<u32>,
    capabilities: HashSet<Capability>,
    advisory_reply: AdvisoryResponse,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        let state = RecordingState {
            main_menu_bar: DEFAULT_MAIN_MENU_BAR.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            version_id: None,
            capabilities: HashSet::new(),
            advisory_reply: AdvisoryResponse::default(),
        }
    }

    /// Reports `release` (e.g. `21000` for 3ds Max 2019) as the host version.
    pub fn with_release(mut self, release: u32) -> Self {
        self.version_id = Some(release << 16);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// The answer given to every advisory dialog.
    pub fn with_advisory_reply(mut self, never_again: bool) -> Self {
        self.advisory_reply = AdvisoryResponse { never_again };
        self
    }

    /// Makes the next `count` evaluations fail.
    pub fn fail_next_evals(&self, count: usize) {
        self.state.lock().fail_evals = count;
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.state.lock().evaluated.clone()
    }

    pub fn scripts(&self) -> Vec<Script> {
        self.state.lock().scripts.clone()
    }

    pub fn menus(&self) -> Vec<String> {
        self.state.lock().menus.clone()
    }

    pub fn main_menu_bar(&self) -> Vec<String> {
        self.state.lock().main_menu_bar.clone()
    }

    /// Last value written to `sgtk_main_menu_enabled`, if any.
    pub fn menu_enabled(&self) -> Option<bool> {
        self.state.lock().menu_enabled
    }

    pub fn printed(&self) -> Vec<String> {
        self.state.lock().printed.clone()
    }

    pub fn message_boxes(&self) -> Vec<(String, String)> {
        self.state.lock().message_boxes.clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.state.lock().launched.clone()
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        self.state.lock().advisories.clone()
    }

    /// Whether a `#postLoadingMenus` callback is installed.
    pub fn has_menu_reload_hook(&self) -> bool {
        self.state.lock().menu_reload_hook
    }

    fn apply(state: &mut RecordingState, statement: &Statement) {
        match statement {
            Statement::CreateMenu { label, .. } => {
                state.menus.retain(|m| m != label);
                state.main_menu_bar.retain(|m| m != label);
                state.menus.push(label.clone());
            }
            Statement::UnregisterMenu { label } => {
                state.menus.retain(|m| m != label);
                state.main_menu_bar.retain(|m| m != label);
            }
            Statement::AttachToMainMenuBar { title, .. } => {
                let index = state.main_menu_bar.len().saturating_sub(1);
                state.main_menu_bar.insert(index, title.clone());
            }
            Statement::SetMenuEnabled(enabled) => state.menu_enabled = Some(*enabled),
            Statement::MessageBox { title, text } => {
                state.message_boxes.push((title.clone(), text.clone()))
            }
            Statement::ShellLaunch { target } => state.launched.push(target.clone()),
            Statement::Print(text) => state.printed.push(text.clone()),
            Statement::RegisterMenuReloadHook { .. } => state.menu_reload_hook = true,
            Statement::UnregisterMenuReloadHook => state.menu_reload_hook = false,
            Statement::AddSeparator { .. }
            | Statement::AddSubMenu { .. }
            | Statement::AddAction { .. }
            | Statement::LoadMaxFile { .. } => {}
        }
    }
}

impl HostBridge for RecordingHost {
    fn eval_maxscript(&self, text: &str) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.fail_evals > 0 {
            state.fail_evals -= 1;
            return Err(BridgeError::Script("-- Syntax error: simulated failure".into()));
        }
        state.evaluated.push(text.to_string());
        Ok(())
    }

    fn run_script(&self, script: &Script) -> BridgeResult<()> {
        if script.is_empty() {
            return Ok(());
        }
        self.eval_maxscript(&script.render())?;
        let mut state = self.state.lock();
        for statement in script.statements() {
            Self::apply(&mut state, statement);
        }
        state.scripts.push(script.clone());
        Ok(())
    }

    fn menu_exists(&self, label: &str) -> bool {
        self.state.lock().menus.iter().any(|m| m == label)
    }

    fn unregister_menu(&self, label: &str) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.menus.retain(|m| m != label);
        state.main_menu_bar.retain(|m| m != label);
        Ok(())
    }

    fn version_id(&self) -> BridgeResult<u32> {
        self.version_id
            .ok_or_else(|| BridgeError::MissingCapability("Get3DSMAXVersion".into()))
    }

    fn print(&self, line: &str) {
        self.state.lock().printed.push(line.to_string());
    }

    fn show_advisory(&self, advisory: &Advisory) -> BridgeResult<AdvisoryResponse> {
        self.state.lock().advisories.push(advisory.clone());
        Ok(self.advisory_reply)
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}
