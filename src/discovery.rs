//! Finding installed 3ds Max versions and preparing a launch that starts
//! the engine automatically.

use crate::bootstrap::{CONTEXT_VAR, ENGINE_VAR, FILE_TO_OPEN_VAR, LOAD_PLUGINS_VAR};
use crate::context::Context;
use crate::engine::ENGINE_NAME;
use crate::error::{BridgeError, BridgeResult};
use crate::settings::EngineSettings;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

pub const EXECUTABLE_NAME: &str = "3dsmax.exe";
pub const PRODUCT_NAME: &str = "3ds Max";
pub const MINIMUM_SUPPORTED_YEAR: u32 = 2016;
#[cfg(target_os = "windows")]
const MAX_REGISTRY_KEY: &str = r"SOFTWARE\Autodesk\3dsMax";

/// One installed 3ds Max.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftwareVersion {
    /// Version as it appears in the install folder, e.g. `2019`.
    pub version: String,
    pub product: String,
    pub path: PathBuf,
    pub icon: Option<PathBuf>,
}

impl SoftwareVersion {
    pub fn year(&self) -> Option<u32> {
        let digits: String = self
            .version
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// `Err` carries the reason the version cannot be used.
    pub fn check_supported(&self) -> Result<(), String> {
        match self.year() {
            Some(year) if year >= MINIMUM_SUPPORTED_YEAR => Ok(()),
            Some(year) => Err(format!(
                "{} is older than the minimum supported version {}",
                year, MINIMUM_SUPPORTED_YEAR
            )),
            None => Err(format!("Could not parse a version from '{}'", self.version)),
        }
    }
}

/// What to run and with which environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchInformation {
    pub path: PathBuf,
    pub args: String,
    pub environment: BTreeMap<String, String>,
}

/// Where 3ds Max is installed on this machine: the `Installdir` of every
/// version in the Windows registry, then the default Autodesk folders as a
/// fallback. 3ds Max only exists on Windows.
#[cfg(target_os = "windows")]
fn get_install_roots() -> Vec<PathBuf> {
    let mut roots = get_installation_paths_from_registry();

    for var in ["ProgramW6432", "ProgramFiles"] {
        if let Ok(dir) = env::var(var) {
            roots.push(PathBuf::from(dir).join("Autodesk"));
        }
    }
    roots.push(PathBuf::from(r"C:\Program Files\Autodesk"));

    let mut seen = BTreeSet::new();
    roots.retain(|root| seen.insert(root.clone()));
    roots
}

#[cfg(not(target_os = "windows"))]
fn get_install_roots() -> Vec<PathBuf> {
    Vec::new()
}

/// `Installdir` of each subkey of `HKLM\SOFTWARE\Autodesk\3dsMax`.
#[cfg(target_os = "windows")]
fn get_installation_paths_from_registry() -> Vec<PathBuf> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    log::debug!(
        "Querying windows registry for key HKEY_LOCAL_MACHINE\\{}",
        MAX_REGISTRY_KEY
    );
    let base = match RegKey::predef(HKEY_LOCAL_MACHINE).open_subkey(MAX_REGISTRY_KEY) {
        Ok(key) => key,
        Err(e) => {
            log::error!("error opening key {}: {}", MAX_REGISTRY_KEY, e);
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    for name in base.enum_keys().flatten() {
        let install_dir = base
            .open_subkey(&name)
            .and_then(|key| key.get_value::<String, _>("Installdir"));
        match install_dir {
            Ok(dir) if !dir.is_empty() => paths.push(PathBuf::from(dir)),
            Ok(_) => {}
            Err(e) => log::debug!("No Installdir under {}\\{}: {}", MAX_REGISTRY_KEY, name, e),
        }
    }
    paths
}

static VERSION_FOLDER: OnceLock<Option<Regex>> = OnceLock::new();

/// Finds the version folder (`3ds Max 2019`) in an executable path.
fn version_from_path(exec_path: &Path) -> Option<String> {
    let pattern = VERSION_FOLDER
        .get_or_init(|| Regex::new(r"^3ds max ([0-9]+[.0-9]*)$").ok())
        .as_ref()?;
    exec_path.components().find_map(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy().to_lowercase();
            pattern
                .captures(&part)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        }
        _ => None,
    })
}

/// Scans and launches 3ds Max on behalf of the engine installed at
/// `engine_root`.
#[derive(Debug, Clone)]
pub struct Launcher {
    engine_root: PathBuf,
    settings: EngineSettings,
}

impl Launcher {
    pub fn new(engine_root: impl Into<PathBuf>, settings: EngineSettings) -> Self {
        Self {
            engine_root: engine_root.into(),
            settings,
        }
    }

    /// Installed and supported 3ds Max versions in the default locations.
    pub fn scan_software(&self) -> BridgeResult<Vec<SoftwareVersion>> {
        log::debug!("Scanning for 3dsMax executables...");
        self.scan_roots(&get_install_roots())
    }

    /// Looks for `<root>/3dsmax.exe` and `<root>/<3ds Max NNNN>/3dsmax.exe`
    /// under each root. An executable reachable from several roots is
    /// reported once.
    pub fn scan_roots(&self, roots: &[PathBuf]) -> BridgeResult<Vec<SoftwareVersion>> {
        let mut supported = Vec::new();
        let mut seen = BTreeSet::new();

        for root in roots {
            if !root.exists() {
                continue;
            }

            let mut candidates = vec![root.clone()];
            match fs::read_dir(root) {
                Ok(entries) => {
                    for entry in entries {
                        let path = match entry {
                            Ok(entry) => entry.path(),
                            Err(e) => {
                                log::warn!("Skipping unreadable entry in {:?}: {}", root, e);
                                continue;
                            }
                        };
                        if path.is_dir() {
                            candidates.push(path);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to scan directory {:?}: {}", root, e);
                    continue;
                }
            }
            candidates.sort();

            for dir in candidates {
                let exec_path = dir.join(EXECUTABLE_NAME);
                if !exec_path.is_file() || !seen.insert(exec_path.clone()) {
                    continue;
                }
                log::debug!("found version in default installation path {:?}", exec_path);

                let Some(version) = version_from_path(&exec_path) else {
                    log::debug!("Could not resolve a version from {:?}", exec_path);
                    continue;
                };
                let icon = self.engine_root.join("icon_256.png");
                let software = SoftwareVersion {
                    version,
                    product: PRODUCT_NAME.to_string(),
                    path: exec_path,
                    icon: icon.exists().then_some(icon),
                };

                match software.check_supported() {
                    Ok(()) => supported.push(software),
                    Err(reason) => {
                        log::debug!("SoftwareVersion {} is not supported: {}", software.version, reason)
                    }
                }
            }
        }

        Ok(supported)
    }

    /// Builds the arguments and environment that make the new session load
    /// the engine on startup.
    pub fn prepare_launch(
        &self,
        exec_path: &Path,
        args: &str,
        context: &Context,
        file_to_open: Option<&Path>,
    ) -> BridgeResult<LaunchInformation> {
        let mut environment = BTreeMap::new();

        // Max's own DLLs must win over whatever the launching process ships.
        if let Some(max_root) = exec_path.parent() {
            let mut paths = vec![max_root.to_path_buf()];
            if let Some(current) = env::var_os("PATH") {
                paths.extend(env::split_paths(&current));
            }
            let joined = env::join_paths(paths)
                .map_err(|e| BridgeError::Bootstrap(format!("Invalid PATH entry: {}", e)))?;
            environment.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }

        let startup = self.engine_root.join("startup").join("bootstrap.ms");
        let mut all_args: Vec<String> = [self.settings.launch_args.as_str(), args]
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.trim().to_string())
            .collect();
        all_args.push(format!("-U MAXScript \"{}\"", startup.display()));

        if self.settings.launch_builtin_plugins.is_empty() {
            log::debug!("Preparing 3dsMax Launch via Toolkit Classic methodology ...");
            environment.insert(ENGINE_VAR.to_string(), ENGINE_NAME.to_string());
            environment.insert(CONTEXT_VAR.to_string(), context.to_json()?);
        } else {
            let mut plugins = Vec::new();
            for name in &self.settings.launch_builtin_plugins {
                let plugin = self.engine_root.join("plugins").join(name);
                if plugin.exists() {
                    log::debug!("Preparing to launch builtin plugin '{}'", plugin.display());
                    plugins.push(plugin);
                } else {
                    log::warn!("Resolved plugin path '{}' does not exist!", plugin.display());
                }
            }
            let joined = env::join_paths(plugins)
                .map_err(|e| BridgeError::Bootstrap(format!("Invalid plugin path: {}", e)))?;
            environment.insert(
                LOAD_PLUGINS_VAR.to_string(),
                joined.to_string_lossy().into_owned(),
            );
        }

        if let Some(file) = file_to_open {
            environment.insert(
                FILE_TO_OPEN_VAR.to_string(),
                file.to_string_lossy().into_owned(),
            );
        }

        Ok(LaunchInformation {
            path: exec_path.to_path_buf(),
            args: all_args.join(" "),
            environment,
        })
    }
}
