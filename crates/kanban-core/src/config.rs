use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::model::catalog::FieldRoles;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fields: FieldRoles,
    #[serde(default)]
    pub draft: DraftConfig,
}

/// Where the board lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Project root URL, e.g. `https://trac.example.com/myproject`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Board id (the wiki page holding the board definition).
    #[serde(default)]
    pub board: Option<String>,
    /// Project name used to recognise ticket links. Defaults to the last
    /// path segment of `base_url`.
    #[serde(default)]
    pub project: Option<String>,
}

impl ServerConfig {
    /// Fill unset values from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            base_url: self.base_url.or_else(|| fallback.base_url.clone()),
            board: self.board.or_else(|| fallback.board.clone()),
            project: self.project.or_else(|| fallback.project.clone()),
        }
    }

    #[must_use]
    pub fn project_name(&self) -> Option<String> {
        if let Some(project) = &self.project {
            return Some(project.clone());
        }
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .and_then(|url| url.rsplit('/').next())
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(ToString::to_string)
    }
}

/// Values given to a freshly created ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftConfig {
    #[serde(default = "default_initial_state")]
    pub initial_state: String,
    #[serde(default = "default_owner_placeholder")]
    pub owner_placeholder: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            initial_state: default_initial_state(),
            owner_placeholder: default_owner_placeholder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Identity recorded as reporter of new tickets.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".kanban/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("kanban/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config with user-level server settings filled in underneath.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let mut project = load_project_config(project_root)?;
    let user = load_user_config()?;
    project.server = project.server.or(&user.server);

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_initial_state() -> String {
    "new".to_string()
}

fn default_owner_placeholder() -> String {
    "somebody".to_string()
}
