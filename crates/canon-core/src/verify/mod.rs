//! Cross-file consistency validation.
//!
//! [`validate_all`] runs every enabled [`Check`] over the dataset and
//! accumulates findings into one [`Report`]. No check aborts the pass: a
//! broken file becomes a violation and the walk moves on, so a single run
//! surfaces every problem.
//!
//! Check order: schema, ids, skills, registry, tags, provenance.

pub mod ids;
pub mod provenance;
pub mod schema;
pub mod skills;
pub mod tags;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::config::{Layout, ProjectConfig};
use crate::records::{SceneIndex, SkillCatalog, TagRegistry, check_registry};
use crate::report::{Check, Report, Violation};

/// What to do with `source_ref` blocks embedded in canonical record files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlinePolicy {
    #[default]
    Error,
    /// Migration mode: report as warnings.
    Warn,
}

/// Tag strictness. Export mode rejects anything not approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    #[default]
    Draft,
    Export,
}

/// What to do when a record uses an alias instead of the canonical tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasPolicy {
    Accept,
    #[default]
    Warn,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!(
                        concat!("invalid ", stringify!($ty), " '{}': expected one of ", $($name, " "),+),
                        other
                    )),
                }
            }
        }
    };
}

string_enum!(InlinePolicy { Error => "error", Warn => "warn" });
string_enum!(TagMode { Draft => "draft", Export => "export" });
string_enum!(AliasPolicy { Accept => "accept", Warn => "warn" });

/// Knobs for a validation run. Built from `[validate]` / `[tags]` config,
/// then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    pub strict: bool,
    pub inline_source_ref: InlinePolicy,
    pub warn_missing_quote: bool,
    pub check_non_canon_citations: bool,
    pub tag_mode: TagMode,
    pub alias_policy: AliasPolicy,
    pub category_limits: BTreeMap<String, usize>,
    /// Checks to run; empty means all.
    pub only: BTreeSet<Check>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        let cfg = ProjectConfig::default();
        Self {
            strict: cfg.validate.strict,
            inline_source_ref: InlinePolicy::default(),
            warn_missing_quote: cfg.validate.warn_missing_quote,
            check_non_canon_citations: cfg.validate.check_non_canon_citations,
            tag_mode: TagMode::default(),
            alias_policy: AliasPolicy::default(),
            category_limits: cfg.tags.category_limits,
            only: BTreeSet::new(),
        }
    }
}

impl VerifyOptions {
    /// # Errors
    ///
    /// Returns an error naming the config key when an enum-valued setting is
    /// not recognised.
    pub fn from_config(cfg: &ProjectConfig) -> Result<Self> {
        Ok(Self {
            strict: cfg.validate.strict,
            inline_source_ref: cfg
                .validate
                .inline_source_ref
                .parse()
                .map_err(|e| anyhow!("validate.inline_source_ref: {e}"))?,
            warn_missing_quote: cfg.validate.warn_missing_quote,
            check_non_canon_citations: cfg.validate.check_non_canon_citations,
            tag_mode: cfg
                .tags
                .mode
                .parse()
                .map_err(|e| anyhow!("tags.mode: {e}"))?,
            alias_policy: cfg
                .tags
                .alias_policy
                .parse()
                .map_err(|e| anyhow!("tags.alias_policy: {e}"))?,
            category_limits: cfg.tags.category_limits.clone(),
            only: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn enabled(&self, check: Check) -> bool {
        self.only.is_empty() || self.only.contains(&check)
    }
}

/// Reference datasets shared by the checks, loaded once per run.
#[derive(Debug)]
pub struct Dataset<'a> {
    pub layout: &'a Layout,
    pub scenes: SceneIndex,
    pub skills: Option<SkillCatalog>,
    pub registry: Option<TagRegistry>,
    /// Problems loading the datasets themselves, reported under the check
    /// that owns each dataset.
    load_violations: Vec<Violation>,
}

impl<'a> Dataset<'a> {
    /// Load the scene index, skills catalog and tag registry.
    #[must_use]
    pub fn load(layout: &'a Layout) -> Self {
        let (scenes, mut load_violations) =
            SceneIndex::load(&layout.scene_index_dir(), &layout.repo_root);

        let skills_path = layout.skills_file();
        let skills = if skills_path.is_file() {
            match SkillCatalog::load(&skills_path) {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    load_violations.push(Violation::error(
                        Check::Skills,
                        layout.display(&skills_path),
                        "",
                        e.to_string(),
                    ));
                    None
                }
            }
        } else {
            None
        };

        let registry_path = &layout.tag_registry;
        let registry = if registry_path.is_file() {
            match TagRegistry::load(registry_path) {
                Ok(reg) => Some(reg),
                Err(e) => {
                    load_violations.push(Violation::error(
                        Check::Registry,
                        layout.display(registry_path),
                        "",
                        e.to_string(),
                    ));
                    None
                }
            }
        } else {
            load_violations.push(Violation::error(
                Check::Registry,
                layout.display(registry_path),
                "",
                "tag registry not found",
            ));
            None
        };

        Self {
            layout,
            scenes,
            skills,
            registry,
            load_violations,
        }
    }

    /// `path` relative to the repository root.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        self.layout.display(path)
    }

    /// Every character timeline, then the global event timeline if present.
    pub(crate) fn timeline_sources(&self) -> Vec<PathBuf> {
        let mut files = self.layout.timeline_files();
        let global = self.layout.global_timeline_file();
        if global.is_file() {
            files.push(global);
        }
        files
    }

    fn load_violations_for(&self, check: Check) -> impl Iterator<Item = Violation> + '_ {
        self.load_violations
            .iter()
            .filter(move |v| v.check == check)
            .cloned()
    }
}

/// Run every enabled check over the dataset described by `layout`.
#[must_use]
pub fn validate_all(layout: &Layout, options: &VerifyOptions) -> Report {
    let data = Dataset::load(layout);
    let mut report = Report::new();

    for check in Check::ALL {
        if !options.enabled(check) {
            continue;
        }
        let before = report.violations.len();
        report.extend(data.load_violations_for(check));
        match check {
            Check::Schema => schema::check(&data, &mut report),
            Check::Ids => ids::check(&data, options, &mut report),
            Check::Skills => skills::check(&data, &mut report),
            Check::Registry => {
                if let Some(registry) = &data.registry {
                    report.extend(check_registry(
                        registry,
                        &data.display(&layout.tag_registry),
                    ));
                }
            }
            Check::Tags => tags::check(&data, options, &mut report),
            Check::Provenance => provenance::check(&data, options, &mut report),
        }
        let found = report.violations.len() - before;
        if found > 0 {
            warn!(check = %check, found, "check reported findings");
        }
    }

    info!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validation complete"
    );
    report
}
