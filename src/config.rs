//! Configuration loader and validator for the GitHub→Notion sync.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::RecordKind;

pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub notion: Notion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notion {
    pub token: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub databases: Databases,
}

/// One Notion database per record kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Databases {
    #[serde(default = "NotionDatabase::pull_requests")]
    pub pull_requests: NotionDatabase,
    #[serde(default = "NotionDatabase::issues")]
    pub issues: NotionDatabase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotionDatabase {
    #[serde(default)]
    pub id: String,
    pub fields: PropertyNames,
}

/// Notion property names the mapper writes. `None` disables an optional property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertyNames {
    pub title: String,
    pub number: String,
    pub status: String,
    pub author: String,
    pub url: String,
    pub created_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub assignees: Option<String>,
    #[serde(default)]
    pub milestone: Option<String>,
}

fn default_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}

impl PropertyNames {
    fn common(number: &str) -> Self {
        Self {
            title: "Title".into(),
            number: number.into(),
            status: "Status".into(),
            author: "Author".into(),
            url: "URL".into(),
            created_at: "Created At".into(),
            closed_at: Some("Closed At".into()),
            merged_at: None,
            labels: Some("Labels".into()),
            branch: None,
            assignees: None,
            milestone: None,
        }
    }

    pub fn pull_requests() -> Self {
        Self {
            merged_at: Some("Merged At".into()),
            branch: Some("Branch".into()),
            ..Self::common("PR Number")
        }
    }

    pub fn issues() -> Self {
        Self {
            assignees: Some("Assignees".into()),
            milestone: Some("Milestone".into()),
            ..Self::common("Issue Number")
        }
    }

    fn all_names(&self) -> impl Iterator<Item = &str> {
        [
            Some(&self.title),
            Some(&self.number),
            Some(&self.status),
            Some(&self.author),
            Some(&self.url),
            Some(&self.created_at),
            self.closed_at.as_ref(),
            self.merged_at.as_ref(),
            self.labels.as_ref(),
            self.branch.as_ref(),
            self.assignees.as_ref(),
            self.milestone.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }

    /// Every configured property name, in a stable order.
    pub fn names(&self) -> Vec<&str> {
        self.all_names().collect()
    }
}

impl NotionDatabase {
    pub fn pull_requests() -> Self {
        Self {
            id: String::new(),
            fields: PropertyNames::pull_requests(),
        }
    }

    pub fn issues() -> Self {
        Self {
            id: String::new(),
            fields: PropertyNames::issues(),
        }
    }
}

impl Databases {
    pub fn for_kind(&self, kind: RecordKind) -> &NotionDatabase {
        match kind {
            RecordKind::PullRequest => &self.pull_requests,
            RecordKind::Issue => &self.issues,
        }
    }
}

impl Config {
    /// Configuration built from defaults and environment variables only.
    pub fn from_env() -> Result<Config, ConfigError> {
        let mut cfg = Config {
            app: App {
                data_dir: ".".into(),
            },
            notion: Notion {
                token: String::new(),
                version: default_version(),
                databases: Databases {
                    pull_requests: NotionDatabase::pull_requests(),
                    issues: NotionDatabase::issues(),
                },
            },
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        validate(&cfg)?;
        Ok(cfg)
    }

    /// Overlay values taken from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("NOTION_TOKEN") {
            self.notion.token = v;
        }
        if let Some(v) = get("NOTION_VERSION") {
            self.notion.version = v;
        }
        if let Some(v) = get("NOTION_DATABASE_ID_PRS") {
            self.notion.databases.pull_requests.id = v;
        }
        if let Some(v) = get("NOTION_DATABASE_ID_ISSUES") {
            self.notion.databases.issues.id = v;
        }
        if let Some(v) = get("KB_DATA_DIR") {
            self.app.data_dir = v;
        }
    }

    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn database_url(&self) -> String {
        cache_url(&self.app.data_dir)
    }

    /// The database id is only needed for the kind actually being synced.
    pub fn require_database(&self, kind: RecordKind) -> Result<&NotionDatabase, ConfigError> {
        let db = self.notion.databases.for_kind(kind);
        if db.id.trim().is_empty() {
            return Err(ConfigError::Invalid(match kind {
                RecordKind::PullRequest => "notion.databases.pull_requests.id must be non-empty",
                RecordKind::Issue => "notion.databases.issues.id must be non-empty",
            }));
        }
        Ok(db)
    }
}

/// SQLite URL of the cache file kept under `data_dir`.
pub fn cache_url(data_dir: &str) -> String {
    format!("sqlite://{}/knowledge-base.db", data_dir.trim_end_matches('/'))
}

/// Load configuration from a YAML file, overlay the environment and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env(|key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.notion.token.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.token must be non-empty"));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if cfg
        .notion
        .databases
        .pull_requests
        .fields
        .all_names()
        .any(|n| n.trim().is_empty())
    {
        return Err(ConfigError::Invalid(
            "notion.databases.pull_requests.fields must not contain empty names",
        ));
    }
    if cfg
        .notion
        .databases
        .issues
        .fields
        .all_names()
        .any(|n| n.trim().is_empty())
    {
        return Err(ConfigError::Invalid(
            "notion.databases.issues.fields must not contain empty names",
        ));
    }
    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"

  databases:
    pull_requests:
      id: "NOTION_PR_DATABASE_ID"
      fields:
        title: "Title"
        number: "PR Number"
        status: "Status"
        author: "Author"
        url: "URL"
        created_at: "Created At"
        closed_at: "Closed At"
        merged_at: "Merged At"
        labels: "Labels"
        branch: "Branch"
    issues:
      id: "NOTION_ISSUE_DATABASE_ID"
      fields:
        title: "Title"
        number: "Issue Number"
        status: "Status"
        author: "Author"
        url: "URL"
        created_at: "Created At"
        closed_at: "Closed At"
        labels: "Labels"
        assignees: "Assignees"
        milestone: "Milestone"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.notion.databases.pull_requests.fields, PropertyNames::pull_requests());
        assert_eq!(cfg.notion.databases.issues.fields, PropertyNames::issues());
    }

    #[test]
    fn invalid_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("notion.token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_field_names() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.databases.pull_requests.fields.title = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("pull_requests.fields")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.databases.issues.fields.milestone = Some("".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn optional_fields_can_be_disabled() {
        let yaml = r#"
app:
  data_dir: "./data"
notion:
  token: "t"
  databases:
    pull_requests:
      id: "prs"
      fields:
        title: "Name"
        number: "Number"
        status: "State"
        author: "By"
        url: "Link"
        created_at: "Opened"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        let fields = &cfg.notion.databases.pull_requests.fields;
        assert!(fields.labels.is_none());
        assert!(fields.merged_at.is_none());
        assert_eq!(cfg.notion.version, DEFAULT_NOTION_VERSION);
        // issues section falls back to the default schema
        assert_eq!(cfg.notion.databases.issues.fields, PropertyNames::issues());
        assert!(cfg.require_database(RecordKind::Issue).is_err());
        assert_eq!(cfg.require_database(RecordKind::PullRequest).unwrap().id, "prs");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("NOTION_TOKEN", "secret"),
            ("NOTION_DATABASE_ID_PRS", "pr-db"),
            ("NOTION_DATABASE_ID_ISSUES", ""),
            ("KB_DATA_DIR", "/var/lib/kb"),
        ]);
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.notion.token, "secret");
        assert_eq!(cfg.notion.databases.pull_requests.id, "pr-db");
        // empty values never clear configured ones
        assert_eq!(cfg.notion.databases.issues.id, "NOTION_ISSUE_DATABASE_ID");
        assert_eq!(cfg.database_url(), "sqlite:///var/lib/kb/knowledge-base.db");
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.data_dir, "./data");
    }
}
