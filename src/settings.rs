//! Engine configuration and persisted user preferences.

use crate::command::Favourite;
use crate::error::{BridgeError, BridgeResult};
use crate::maxscript::Ident;
use crate::version::DEFAULT_MAX_TESTED_YEAR;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from the engine's environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Label of the top-level menu.
    pub menu_label: String,
    pub menu_favourites: Vec<Favourite>,
    pub debug_logging: bool,
    /// MaxScript function the host shim registers to forward clicks to
    /// [`crate::ffi::maxbridge_dispatch_action`].
    pub dispatch_function: String,
    /// macroScript category our actions are filed under.
    pub macro_category: String,
    pub max_tested_year: u32,
    /// Show the untested-version advisory for releases newer than
    /// `max_tested_year`.
    pub compatibility_dialog: bool,
    /// Invite the user to move to the newer 3ds Max engine on startup.
    pub update_engine_dialog: bool,
    /// Extra command line arguments passed to 3ds Max at launch.
    pub launch_args: String,
    /// Toolkit plugins to load at launch instead of starting the engine
    /// from `TANK_ENGINE`/`TANK_CONTEXT`.
    pub launch_builtin_plugins: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            menu_label: "Shotgun".to_string(),
            menu_favourites: Vec::new(),
            debug_logging: false,
            dispatch_function: "sgtk_dispatch_action".to_string(),
            macro_category: "Shotgun Menu Actions".to_string(),
            max_tested_year: DEFAULT_MAX_TESTED_YEAR,
            compatibility_dialog: true,
            update_engine_dialog: true,
            launch_args: String::new(),
            launch_builtin_plugins: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn from_json(raw: &str) -> BridgeResult<Self> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.menu_label.trim().is_empty() {
            return Err(BridgeError::Settings("menu_label must not be empty".into()));
        }
        self.dispatch_ident()?;
        Ok(())
    }

    pub fn dispatch_ident(&self) -> BridgeResult<Ident> {
        Ident::parse(&self.dispatch_function)
    }
}

/// Default location of the user preference file.
pub fn default_user_settings_path() -> BridgeResult<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| BridgeError::Settings("APPDATA environment variable not set".into()))?;
        Ok(PathBuf::from(format!("{}\\Shotgun\\maxbridge\\user_settings.json", appdata)))
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME")
            .map_err(|_| BridgeError::Settings("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(format!(
            "{}/Library/Preferences/Shotgun/maxbridge/user_settings.json",
            home
        )))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let home = std::env::var("HOME")
            .map_err(|_| BridgeError::Settings("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(format!(
            "{}/.shotgun/maxbridge/user_settings.json",
            home
        )))
    }
}

/// Small JSON-file preference store, namespaced by plugin identity so
/// several bundles can share one file.
#[derive(Debug, Clone)]
pub struct UserSettings {
    path: PathBuf,
    scope: String,
    values: Map<String, Value>,
}

impl UserSettings {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, scope: impl Into<String>) -> BridgeResult<Self> {
        let path = path.into();
        let scope = scope.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let mut root: Map<String, Value> = serde_json::from_str(&raw)?;
            match root.remove(&scope) {
                Some(Value::Object(values)) => values,
                _ => Map::new(),
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path,
            scope,
            values,
        })
    }

    pub fn retrieve_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn retrieve_u32(&self, key: &str) -> Option<u32> {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Stores `value` and writes the file straight away, keeping other
    /// scopes intact.
    pub fn store<T: Serialize>(&mut self, key: &str, value: T) -> BridgeResult<()> {
        self.values
            .insert(key.to_string(), serde_json::to_value(value)?);

        let mut root: Map<String, Value> = if self.path.exists() {
            serde_json::from_str(&fs::read_to_string(&self.path)?)?
        } else {
            Map::new()
        };
        root.insert(self.scope.clone(), Value::Object(self.values.clone()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }
}
