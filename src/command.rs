//! Commands registered by toolkit apps, and the per-build wrapper the menu
//! builder works with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Zero-argument callable behind every menu action.
pub type Callback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// How a command wants to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    #[default]
    Default,
    /// Goes into the context submenu instead of the app section.
    ContextMenu,
    Panel,
    Node,
}

impl CommandKind {
    /// Parses the `type` tag apps attach to their commands. Unknown tags
    /// fall back to [`CommandKind::Default`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "context_menu" => CommandKind::ContextMenu,
            "panel" => CommandKind::Panel,
            "node" => CommandKind::Node,
            _ => CommandKind::Default,
        }
    }
}

/// An app instance as configured in the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInstance {
    /// Name of the instance in the environment, e.g. `tk-multi-workfiles2`.
    pub instance_name: String,
    /// Human readable name, used to group menu entries.
    pub display_name: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
}

impl AppInstance {
    pub fn new(instance_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            display_name: display_name.into(),
            documentation_url: None,
        }
    }

    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandProperties {
    /// Owning app. Commands registered by the engine itself have none.
    pub app: Option<Arc<AppInstance>>,
    pub kind: CommandKind,
    /// Shown as the macroScript tooltip.
    pub description: Option<String>,
}

/// A named, callable unit of functionality.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub callback: Callback,
    pub properties: CommandProperties,
}

impl Command {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(callback),
            properties: CommandProperties::default(),
        }
    }

    pub fn with_app(mut self, app: Arc<AppInstance>) -> Self {
        self.properties.app = Some(app);
        self
    }

    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.properties.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.properties.description = Some(description.into());
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// A favourite menu entry from the `menu_favourites` setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favourite {
    pub app_instance: String,
    pub name: String,
}

impl Favourite {
    pub fn new(app_instance: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_instance: app_instance.into(),
            name: name.into(),
        }
    }
}

/// Wraps a single [`Command`] for the duration of one menu build.
#[derive(Debug, Clone)]
pub struct AppCommand {
    pub command: Command,
    pub favourite: bool,
}

impl AppCommand {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            favourite: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.command.name
    }

    pub fn kind(&self) -> CommandKind {
        self.command.properties.kind
    }

    /// Display name of the app this command belongs to.
    pub fn app_name(&self) -> Option<&str> {
        self.command
            .properties
            .app
            .as_deref()
            .map(|app| app.display_name.as_str())
    }

    /// Instance name of the owning app, as defined in the environment.
    pub fn app_instance_name(&self) -> Option<&str> {
        self.command
            .properties
            .app
            .as_deref()
            .map(|app| app.instance_name.as_str())
    }

    pub fn documentation_url(&self) -> Option<&str> {
        self.command
            .properties
            .app
            .as_deref()
            .and_then(|app| app.documentation_url.as_deref())
    }

    pub fn matches_favourite(&self, favourite: &Favourite) -> bool {
        self.app_instance_name() == Some(favourite.app_instance.as_str())
            && self.name() == favourite.name
    }
}
