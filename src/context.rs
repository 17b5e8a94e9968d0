//! The working context the engine was started in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: u64,
    pub name: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: u64, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub project: Option<EntityRef>,
    #[serde(default)]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub step: Option<EntityRef>,
    #[serde(default)]
    pub task: Option<EntityRef>,
    /// Site page for the most specific entity.
    #[serde(default)]
    pub shotgun_url: String,
    #[serde(default)]
    pub filesystem_locations: Vec<PathBuf>,
}

impl Context {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Label used for the context submenu.
    ///
    /// - project only: `Big Buck Bunny`
    /// - entity only: `Shot ABC_123`
    /// - with a step or task: `Lighting, Shot ABC_123` (the task wins)
    pub fn label(&self) -> String {
        let Some(entity) = &self.entity else {
            return match &self.project {
                Some(project) => project.name.clone(),
                None => "Site".to_string(),
            };
        };

        let task_step = self
            .task
            .as_ref()
            .or(self.step.as_ref())
            .map(|e| e.name.as_str());

        match task_step {
            Some(task_step) => format!("{}, {} {}", task_step, entity.entity_type, entity.name),
            None => format!("{} {}", entity.entity_type, entity.name),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
