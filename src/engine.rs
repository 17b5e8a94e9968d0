//! The toolkit engine for 3ds Max.
//!
//! An [`Engine`] owns the action registry and modal guard for one host
//! session, keeps the commands apps registered, builds the Shotgun menu and
//! dispatches menu clicks back to command callbacks. One engine at a time is
//! published as the current engine; that is the instance the FFI entry points
//! talk to.

use crate::allocator::ActionId;
use crate::command::{AppInstance, Command};
use crate::context::Context;
use crate::error::{BridgeError, BridgeResult};
use crate::guard::ModalGuard;
use crate::host::{Advisory, HostBridge};
use crate::logging;
use crate::maxscript::{Script, Statement};
use crate::menu::{MenuBuilder, MenuTree};
use crate::registry::{ActionRegistry, ActionTarget};
use crate::settings::{default_user_settings_path, EngineSettings, UserSettings};
use crate::version::{Capability, Compatibility, MaxVersion};
use anyhow::Context as _;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

pub const ENGINE_NAME: &str = "tk-3dsmaxplus";
pub const JUMP_TO_SHOTGUN: &str = "Jump to Shotgun";
pub const JUMP_TO_FILESYSTEM: &str = "Jump to File System";

/// Persistent registry id the host's post-load-menus callback dispatches.
pub const REBUILD_MENU_ACTION: &str = "sgtk_rebuild_menu";

const UNSUPPORTED_VERSION_MESSAGE: &str =
    "Warning - Shotgun Pipeline Toolkit!\n\nDoes not work with 3ds max versions prior to 2015.";
const UNTESTED_DISMISSED_YEAR_KEY: &str = "untested_version_dismissed_year";
const SKIP_UPDATE_DIALOG_KEY: &str = "skip_update_engine_dialog";
const UPDATE_ENGINE_MESSAGE: &str = "The tk-3dsmaxplus engine is deprecated. \
    Please switch your pipeline configuration to the tk-3dsmax engine, \
    which supports 3ds Max 2017 and later.";

static CURRENT: RwLock<Option<Arc<Engine>>> = RwLock::new(None);

/// What happened to a menu click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Invoked,
    /// A modal dialog is open.
    Blocked,
    NotFound,
    /// The callback returned an error or panicked.
    Failed,
}

pub struct Engine {
    host: Arc<dyn HostBridge>,
    settings: EngineSettings,
    context: RwLock<Context>,
    registry: ActionRegistry,
    guard: ModalGuard,
    version: Option<MaxVersion>,
    apps: RwLock<Vec<Arc<AppInstance>>>,
    commands: RwLock<Vec<Command>>,
    user_settings: Mutex<Option<UserSettings>>,
    menu: Mutex<Option<MenuTree>>,
}

impl Engine {
    pub fn new(host: Arc<dyn HostBridge>, settings: EngineSettings, context: Context) -> Self {
        let version = match host.version_id() {
            Ok(version_id) => Some(MaxVersion::from_version_id(version_id)),
            Err(e) => {
                log::debug!("Could not read the 3ds Max version: {}", e);
                None
            }
        };

        let guard = ModalGuard::new();
        let mirror = host.clone();
        guard.set_observer(move |enabled| {
            let script = Script::single(Statement::SetMenuEnabled(enabled));
            if let Err(e) = mirror.run_script(&script) {
                log::error!("Failed to set the menu enabled flag to {}: {}", enabled, e);
            }
        });

        Self {
            host,
            settings,
            context: RwLock::new(context),
            registry: ActionRegistry::new(),
            guard,
            version,
            apps: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            user_settings: Mutex::new(None),
            menu: Mutex::new(None),
        }
    }

    pub fn with_user_settings(self, user_settings: UserSettings) -> Self {
        *self.user_settings.lock() = Some(user_settings);
        self
    }

    pub fn host(&self) -> &Arc<dyn HostBridge> {
        &self.host
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &ModalGuard {
        &self.guard
    }

    pub fn version(&self) -> Option<MaxVersion> {
        self.version
    }

    pub fn context(&self) -> Context {
        self.context.read().clone()
    }

    /// The tree of the last successful menu build.
    pub fn menu(&self) -> Option<MenuTree> {
        self.menu.lock().clone()
    }

    // ------------------------------------------------------------------
    // lifecycle

    /// Checks the host version and arms the menu-enabled flag.
    pub fn init(&self) -> BridgeResult<Compatibility> {
        log::debug!("{}: Initializing...", ENGINE_NAME);

        self.host
            .run_script(&Script::single(Statement::SetMenuEnabled(self.guard.is_enabled())))?;

        let Some(version) = self.version else {
            log::debug!("3ds Max version unknown, skipping compatibility checks");
            return Ok(Compatibility::Supported);
        };

        let compatibility = version.compatibility(self.settings.max_tested_year);
        match compatibility {
            Compatibility::Supported => log::debug!("Running in {}", version),
            Compatibility::Unsupported => {
                log::warn!("{}", UNSUPPORTED_VERSION_MESSAGE);
                if let Err(e) = self
                    .host
                    .message_box("Shotgun Warning", UNSUPPORTED_VERSION_MESSAGE)
                {
                    log::error!("Could not show the version warning: {}", e);
                }
            }
            Compatibility::Untested => {
                log::warn!(
                    "The Shotgun Pipeline Toolkit has not yet been fully tested with {}. \
                     You can continue to use Toolkit but you may experience bugs or instability.",
                    version
                );
                self.show_untested_advisory(version);
            }
        }
        self.show_update_advisory();
        Ok(compatibility)
    }

    /// Builds the menu once all apps registered their commands.
    pub fn post_init(self: &Arc<Self>) -> BridgeResult<()> {
        if self.supports(Capability::MenuPostLoadNotification) {
            self.register_menu_reload_hook()?;
        }
        self.rebuild_menu()?;
        Ok(())
    }

    /// Removes the menu and the reload callback, then drops every registered
    /// action.
    pub fn destroy(&self) {
        log::debug!("{}: Destroying...", ENGINE_NAME);
        let label = &self.settings.menu_label;
        if self.host.menu_exists(label) {
            if let Err(e) = self.host.unregister_menu(label) {
                log::error!("Failed to remove the '{}' menu: {}", label, e);
            }
        }
        if self.registry.resolve(REBUILD_MENU_ACTION).is_some() {
            if let Err(e) = self
                .host
                .run_script(&Script::single(Statement::UnregisterMenuReloadHook))
            {
                log::error!("Failed to remove the menu reload callback: {}", e);
            }
        }
        self.registry.clear();
        self.guard.clear_observer();
        *self.menu.lock() = None;
    }

    // ------------------------------------------------------------------
    // commands

    pub fn register_app(&self, app: AppInstance) -> Arc<AppInstance> {
        let app = Arc::new(app);
        let mut apps = self.apps.write();
        apps.retain(|a| a.instance_name != app.instance_name);
        apps.push(app.clone());
        app
    }

    /// Registers a command. A command with the same name is replaced.
    pub fn register_command(&self, command: Command) {
        let mut commands = self.commands.write();
        match commands.iter_mut().find(|c| c.name == command.name) {
            Some(existing) => *existing = command,
            None => commands.push(command),
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.read().clone()
    }

    /// Switches context and rebuilds the menu for it.
    pub fn change_context(&self, context: Context) -> BridgeResult<MenuTree> {
        log::debug!("Changing context to {}", context);
        *self.context.write() = context;
        self.rebuild_menu()
    }

    // ------------------------------------------------------------------
    // menu

    pub fn rebuild_menu(&self) -> BridgeResult<MenuTree> {
        let context = self.context();
        let commands = self.commands();
        let builder = MenuBuilder::new(self.host.as_ref(), &self.registry, &self.settings);
        let tree = builder.build(
            &commands,
            &self.settings.menu_favourites,
            &context.label(),
            &self.context_actions(&context),
        )?;
        *self.menu.lock() = Some(tree.clone());
        Ok(tree)
    }

    /// The engine's own entries at the top of the context submenu.
    fn context_actions(&self, context: &Context) -> Vec<Command> {
        let mut actions = Vec::new();

        let host = self.host.clone();
        let url = context.shotgun_url.clone();
        actions.push(Command::new(JUMP_TO_SHOTGUN, move || {
            host.open_url(&url)
                .with_context(|| format!("Could not open {}", url))
        }));

        if !context.filesystem_locations.is_empty() {
            let paths = context.filesystem_locations.clone();
            actions.push(Command::new(JUMP_TO_FILESYSTEM, move || {
                jump_to_filesystem(&paths)
            }));
        }

        actions
    }

    fn register_menu_reload_hook(self: &Arc<Self>) -> BridgeResult<()> {
        let id = ActionId::parse(REBUILD_MENU_ACTION)?;
        let engine: Weak<Engine> = Arc::downgrade(self);
        self.registry.register_persistent(
            id.clone(),
            ActionTarget::new("Rebuild Shotgun menu", move || {
                let engine = engine.upgrade().context("engine has been destroyed")?;
                engine.rebuild_menu()?;
                Ok(())
            }),
        );
        self.host
            .run_script(&Script::single(Statement::RegisterMenuReloadHook {
                id,
                dispatch: self.settings.dispatch_ident()?,
            }))
    }

    // ------------------------------------------------------------------
    // dispatch

    /// Runs the action registered under `id`. Never panics and never returns
    /// an error: anything that goes wrong is logged, because the caller is
    /// host-native code.
    pub fn dispatch(&self, id: &str) -> DispatchOutcome {
        if !self.guard.is_enabled() {
            log::warn!(
                "You need to close the current window dialog before using any more commands."
            );
            return DispatchOutcome::Blocked;
        }

        let Some(target) = self.registry.resolve(id) else {
            log::error!(
                "Shotgun Error: Failed to find Action command in MAXScript callback for action [{}]!",
                id
            );
            return DispatchOutcome::NotFound;
        };

        log::debug!("Running menu action '{}'", target.display_name);
        match catch_unwind(AssertUnwindSafe(|| target.invoke())) {
            Ok(Ok(())) => DispatchOutcome::Invoked,
            Ok(Err(e)) => {
                log::error!("Failed to run '{}': {:?}", target.display_name, e);
                DispatchOutcome::Failed
            }
            Err(payload) => {
                log::error!(
                    "'{}' panicked: {}",
                    target.display_name,
                    panic_message(payload.as_ref())
                );
                DispatchOutcome::Failed
            }
        }
    }

    /// Runs `f` as a modal dialog: menu actions are disabled until it
    /// returns, unwinds, or errors.
    pub fn run_modal<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.guard.run_modal(f)
    }

    // ------------------------------------------------------------------
    // capabilities

    /// Whether an optional host API can be used. Absence is not an error;
    /// callers fall back to an older code path.
    pub fn supports(&self, capability: Capability) -> bool {
        let Some(version) = self.version else {
            log::debug!("Version unknown, not using {}", capability);
            return false;
        };
        if !version.at_least_year(capability.min_year()) {
            log::debug!("{} requires 3ds Max {} or later", capability, capability.min_year());
            return false;
        }
        if !self.host.has_capability(capability) {
            log::debug!("Host does not provide {}, falling back", capability);
            return false;
        }
        true
    }

    fn show_untested_advisory(&self, version: MaxVersion) {
        if !self.settings.compatibility_dialog {
            return;
        }

        let mut user_settings = self.user_settings.lock();
        let dismissed = user_settings
            .as_ref()
            .and_then(|s| s.retrieve_u32(UNTESTED_DISMISSED_YEAR_KEY));
        if dismissed.map_or(false, |year| year >= version.year) {
            log::debug!("Untested version advisory dismissed for {}", version.year);
            return;
        }

        let advisory = Advisory {
            title: "Shotgun Warning".to_string(),
            message: format!(
                "The Shotgun Pipeline Toolkit has not yet been fully tested with 3ds Max {}. \
                 You can continue to use Toolkit but you may experience bugs or instability. \
                 Please report any issues to support@shotgunsoftware.com",
                version.year
            ),
        };

        match self.run_modal(|| self.host.show_advisory(&advisory)) {
            Ok(response) if response.never_again => {
                if let Some(settings) = user_settings.as_mut() {
                    if let Err(e) = settings.store(UNTESTED_DISMISSED_YEAR_KEY, version.year) {
                        log::error!("Could not save the advisory preference: {}", e);
                    }
                }
            }
            Ok(_) => {}
            Err(BridgeError::MissingCapability(what)) => {
                log::debug!("No {} in this session, advisory logged only", what);
            }
            Err(e) => log::error!("Could not show the version advisory: {}", e),
        }
    }
}

impl Engine {
    /// Deprecation notice, unless the user asked never to see it again.
    fn show_update_advisory(&self) {
        if !self.settings.update_engine_dialog {
            return;
        }

        let mut user_settings = self.user_settings.lock();
        if user_settings
            .as_ref()
            .map_or(false, |s| s.retrieve_bool(SKIP_UPDATE_DIALOG_KEY, false))
        {
            return;
        }

        let advisory = Advisory {
            title: "Shotgun: Engine Update".to_string(),
            message: UPDATE_ENGINE_MESSAGE.to_string(),
        };
        match self.run_modal(|| self.host.show_advisory(&advisory)) {
            Ok(response) if response.never_again => {
                if let Some(settings) = user_settings.as_mut() {
                    if let Err(e) = settings.store(SKIP_UPDATE_DIALOG_KEY, true) {
                        log::error!("Could not save the advisory preference: {}", e);
                    }
                }
            }
            Ok(_) => {}
            Err(BridgeError::MissingCapability(_)) => log::info!("{}", UPDATE_ENGINE_MESSAGE),
            Err(e) => log::error!("Could not show the update advisory: {}", e),
        }
    }
}

/// Opens one file browser per location.
fn jump_to_filesystem(paths: &[PathBuf]) -> anyhow::Result<()> {
    for path in paths {
        let mut command = filesystem_launcher(path)?;
        match command.status() {
            Ok(status) if status.success() => {}
            Ok(status) => log::error!("Failed to launch '{:?}'! ({})", command, status),
            Err(e) => log::error!("Failed to launch '{:?}'! ({})", command, e),
        }
    }
    Ok(())
}

fn filesystem_launcher(path: &Path) -> anyhow::Result<std::process::Command> {
    #[cfg(target_os = "windows")]
    {
        let mut command = std::process::Command::new("cmd.exe");
        command.args(["/C", "start", "Folder"]).arg(path);
        Ok(command)
    }

    #[cfg(target_os = "macos")]
    {
        let mut command = std::process::Command::new("open");
        command.arg(path);
        Ok(command)
    }

    #[cfg(target_os = "linux")]
    {
        let mut command = std::process::Command::new("xdg-open");
        command.arg(path);
        Ok(command)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!(
            "Platform '{}' is not supported. Cannot open {}",
            std::env::consts::OS,
            path.display()
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ----------------------------------------------------------------------
// current engine

/// Starts an engine and publishes it as the current one. A running engine
/// is destroyed first.
pub fn start(
    host: Arc<dyn HostBridge>,
    settings: EngineSettings,
    context: Context,
) -> BridgeResult<Arc<Engine>> {
    settings.validate()?;
    logging::init();
    logging::attach(host.clone(), settings.debug_logging);

    let previous = CURRENT.write().take();
    if let Some(previous) = previous {
        log::debug!("Replacing the running engine");
        previous.destroy();
    }

    let mut engine = Engine::new(host, settings, context);
    match default_user_settings_path().and_then(|path| UserSettings::open(path, ENGINE_NAME)) {
        Ok(user_settings) => engine = engine.with_user_settings(user_settings),
        Err(e) => log::warn!("User preferences unavailable: {}", e),
    }

    let engine = Arc::new(engine);
    engine.init()?;
    engine.post_init()?;
    *CURRENT.write() = Some(engine.clone());
    Ok(engine)
}

pub fn current() -> Option<Arc<Engine>> {
    CURRENT.read().clone()
}

/// Destroys the current engine, if any.
pub fn shutdown() {
    let engine = CURRENT.write().take();
    if let Some(engine) = engine {
        engine.destroy();
    }
    logging::detach();
}
