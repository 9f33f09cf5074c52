use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub validate: ValidateConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub projector: ProjectorConfig,
}

/// Directory overrides, relative to the repository root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_records")]
    pub records: PathBuf,
    #[serde(default = "default_schemas")]
    pub schemas: PathBuf,
    #[serde(default)]
    pub tag_registry: Option<PathBuf>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            records: default_records(),
            schemas: default_schemas(),
            tag_registry: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// `"error"` or `"warn"`.
    #[serde(default = "default_inline_source_ref")]
    pub inline_source_ref: String,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_true")]
    pub warn_missing_quote: bool,
    #[serde(default = "default_true")]
    pub check_non_canon_citations: bool,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            inline_source_ref: default_inline_source_ref(),
            strict: false,
            warn_missing_quote: default_true(),
            check_non_canon_citations: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// `"draft"` or `"export"`.
    #[serde(default = "default_tag_mode")]
    pub mode: String,
    /// `"accept"` or `"warn"`.
    #[serde(default = "default_alias_policy")]
    pub alias_policy: String,
    #[serde(default = "default_category_limits")]
    pub category_limits: BTreeMap<String, usize>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            mode: default_tag_mode(),
            alias_policy: default_alias_policy(),
            category_limits: default_category_limits(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// `"reader"` or `"character"`.
    #[serde(default = "default_view")]
    pub default_view: String,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            default_view: default_view(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Where every dataset file lives, resolved once at startup and passed
/// explicitly to loaders and validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub repo_root: PathBuf,
    pub records: PathBuf,
    pub schemas: PathBuf,
    pub tag_registry: PathBuf,
}

impl Layout {
    /// Default layout under `repo_root`.
    #[must_use]
    pub fn new(repo_root: &Path) -> Self {
        Self::from_config(repo_root, &LayoutConfig::default())
    }

    /// Layout with `[layout]` overrides applied.
    ///
    /// Without an explicit registry path, `tagging/tag_registry.json` is used,
    /// falling back to `<records>/tag_registry.json` when only that exists.
    #[must_use]
    pub fn from_config(repo_root: &Path, cfg: &LayoutConfig) -> Self {
        let records = repo_root.join(&cfg.records);
        let tag_registry = cfg.tag_registry.as_ref().map_or_else(
            || {
                let primary = repo_root.join("tagging/tag_registry.json");
                let fallback = records.join("tag_registry.json");
                if !primary.exists() && fallback.exists() {
                    fallback
                } else {
                    primary
                }
            },
            |p| repo_root.join(p),
        );
        Self {
            repo_root: repo_root.to_path_buf(),
            schemas: repo_root.join(&cfg.schemas),
            records,
            tag_registry,
        }
    }

    #[must_use]
    pub fn characters_dir(&self) -> PathBuf {
        self.records.join("characters")
    }

    #[must_use]
    pub fn scene_index_dir(&self) -> PathBuf {
        self.records.join("scene_index")
    }

    #[must_use]
    pub fn skills_file(&self) -> PathBuf {
        self.records.join("skills.json")
    }

    #[must_use]
    pub fn global_timeline_file(&self) -> PathBuf {
        self.records.join("global_event_timeline.json")
    }

    /// `records/characters/<name>/timeline.json`, where `<name>` drops any
    /// namespace before the first `.` (`ch.jake` and `jake` are the same).
    #[must_use]
    pub fn timeline_path(&self, character_id: &str) -> PathBuf {
        self.characters_dir()
            .join(character_dir_name(character_id))
            .join("timeline.json")
    }

    /// Every `records/characters/*/timeline.json` that exists, sorted.
    #[must_use]
    pub fn timeline_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.characters_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path().join("timeline.json"))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    }

    /// `path` relative to the repository root, for messages.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.repo_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[must_use]
pub fn character_dir_name(character_id: &str) -> &str {
    character_id
        .split_once('.')
        .map_or(character_id, |(_, rest)| rest)
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".canon/config.toml");
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

    let path = config_dir.join("canon/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config, user config and the output mode they resolve to.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub layout: Layout,
    pub resolved_output: String,
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;
    let layout = Layout::from_config(project_root, &project.layout);

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        layout,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

fn default_records() -> PathBuf {
    PathBuf::from("records")
}

fn default_schemas() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_inline_source_ref() -> String {
    "error".to_string()
}

fn default_tag_mode() -> String {
    "draft".to_string()
}

fn default_alias_policy() -> String {
    "warn".to_string()
}

fn default_view() -> String {
    "character".to_string()
}

fn default_category_limits() -> BTreeMap<String, usize> {
    [
        ("narrative_style", 3),
        ("character_tone", 2),
        ("scene_function", 2),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
