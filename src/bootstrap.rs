//! Engine startup from the launch environment.
//!
//! The launcher (see [`crate::discovery::Launcher::prepare_launch`]) hands the engine
//! name, the serialized context and an optional scene file to the new 3ds Max
//! session through environment variables. They are read once at startup and
//! removed so child processes do not inherit them.

use crate::context::Context;
use crate::engine::{self, Engine};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostBridge;
use crate::maxscript::{Script, Statement};
use crate::settings::EngineSettings;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

pub const ENGINE_VAR: &str = "TANK_ENGINE";
pub const CONTEXT_VAR: &str = "TANK_CONTEXT";
pub const FILE_TO_OPEN_VAR: &str = "SGTK_FILE_TO_OPEN";
/// Older launchers used this name.
pub const LEGACY_FILE_TO_OPEN_VAR: &str = "TANK_FILE_TO_OPEN";
pub const LOAD_PLUGINS_VAR: &str = "SGTK_LOAD_MAX_PLUGINS";

const CONSUMED_VARS: [&str; 5] = [
    ENGINE_VAR,
    CONTEXT_VAR,
    FILE_TO_OPEN_VAR,
    LEGACY_FILE_TO_OPEN_VAR,
    LOAD_PLUGINS_VAR,
];

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapMode {
    /// Start `engine_name` in the serialized context.
    Classic { engine_name: String, context: Context },
    /// Toolkit plugins resolve their own context; the engine starts in the
    /// site context.
    Plugins(Vec<PathBuf>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapInfo {
    pub mode: BootstrapMode,
    pub file_to_open: Option<PathBuf>,
}

/// Parses the launch variables through `lookup`.
pub fn from_vars<F>(lookup: F) -> BridgeResult<BootstrapInfo>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

    let mode = match non_empty(LOAD_PLUGINS_VAR) {
        Some(plugins) => BootstrapMode::Plugins(env::split_paths(&plugins).collect()),
        None => {
            let engine_name = non_empty(ENGINE_VAR).ok_or_else(|| {
                BridgeError::Bootstrap(format!(
                    "Missing required environment variable {}.",
                    ENGINE_VAR
                ))
            })?;
            let context = match non_empty(CONTEXT_VAR) {
                Some(raw) => Context::from_json(&raw).map_err(|e| {
                    BridgeError::Bootstrap(format!(
                        "Could not create context! sgtk will be disabled. Details: {}",
                        e
                    ))
                })?,
                None => Context::default(),
            };
            BootstrapMode::Classic {
                engine_name,
                context,
            }
        }
    };

    let file_to_open = non_empty(FILE_TO_OPEN_VAR)
        .or_else(|| non_empty(LEGACY_FILE_TO_OPEN_VAR))
        .map(PathBuf::from);

    Ok(BootstrapInfo { mode, file_to_open })
}

/// Reads the launch variables from the process environment and removes
/// them, whether or not they parse.
pub fn from_env() -> BridgeResult<BootstrapInfo> {
    let info = from_vars(|name| env::var(name).ok());
    for var in CONSUMED_VARS {
        env::remove_var(var);
    }
    info
}

/// Starts the engine for the current 3ds Max session and opens the
/// requested scene, if any.
pub fn bootstrap(
    host: Arc<dyn HostBridge>,
    settings: EngineSettings,
) -> BridgeResult<Arc<Engine>> {
    let info = from_env()?;
    start_from(host, settings, info)
}

pub fn start_from(
    host: Arc<dyn HostBridge>,
    settings: EngineSettings,
    info: BootstrapInfo,
) -> BridgeResult<Arc<Engine>> {
    let context = match info.mode {
        BootstrapMode::Classic {
            engine_name,
            context,
        } => {
            if engine_name != engine::ENGINE_NAME {
                log::warn!(
                    "{}={} but this library provides {}",
                    ENGINE_VAR,
                    engine_name,
                    engine::ENGINE_NAME
                );
            }
            context
        }
        BootstrapMode::Plugins(plugins) => {
            log::debug!("Launching 3dsMax in plugin mode");
            for plugin in &plugins {
                log::debug!("Plugin: {}", plugin.display());
            }
            Context::default()
        }
    };

    let engine = engine::start(host.clone(), settings, context)
        .map_err(|e| BridgeError::Bootstrap(format!("Could not start engine: {}", e)))?;

    if let Some(path) = info.file_to_open {
        log::debug!("Opening {}", path.display());
        host.run_script(&Script::single(Statement::LoadMaxFile {
            path: path.to_string_lossy().into_owned(),
        }))?;
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_classic_mode() {
        let info = from_vars(vars(&[
            (ENGINE_VAR, "tk-3dsmaxplus"),
            (CONTEXT_VAR, r#"{ "project": { "type": "Project", "id": 1, "name": "Demo" } }"#),
            (FILE_TO_OPEN_VAR, "C:/shots/abc.max"),
        ]))
        .unwrap();

        match info.mode {
            BootstrapMode::Classic {
                engine_name,
                context,
            } => {
                assert_eq!(engine_name, "tk-3dsmaxplus");
                assert_eq!(context.label(), "Demo");
            }
            other => panic!("unexpected mode {:?}", other),
        }
        assert_eq!(info.file_to_open, Some(PathBuf::from("C:/shots/abc.max")));
    }

    #[test]
    fn test_missing_engine_is_an_error() {
        let result = from_vars(vars(&[(CONTEXT_VAR, "{}")]));
        assert!(matches!(result, Err(BridgeError::Bootstrap(_))));
    }

    #[test]
    fn test_bad_context_is_an_error() {
        let result = from_vars(vars(&[(ENGINE_VAR, "tk-3dsmaxplus"), (CONTEXT_VAR, "not json")]));
        assert!(matches!(result, Err(BridgeError::Bootstrap(msg)) if msg.contains("context")));
    }

    #[test]
    fn test_plugin_mode_wins() {
        let joined = env::join_paths(["/plugins/basic", "/plugins/extra"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();
        let info = from_vars(vars(&[(LOAD_PLUGINS_VAR, joined.as_str()), (LEGACY_FILE_TO_OPEN_VAR, "a.max")]))
            .unwrap();
        assert_eq!(
            info.mode,
            BootstrapMode::Plugins(vec![
                PathBuf::from("/plugins/basic"),
                PathBuf::from("/plugins/extra")
            ])
        );
        assert_eq!(info.file_to_open, Some(PathBuf::from("a.max")));
    }
}
