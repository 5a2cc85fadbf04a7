use crate::model::Priority;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "STUDYDESK_CONFIG";

const DEFAULT_CATEGORIES: [&str; 6] = [
    "Study",
    "Exercises",
    "Review",
    "Reading",
    "Practice",
    "Other",
];
const DEFAULT_SUBJECTS: [&str; 6] = [
    "Math",
    "Portuguese",
    "History",
    "Geography",
    "Physics",
    "Chemistry",
];

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub categories: Vec<String>,
    pub subjects: Vec<String>,
    pub default_priority: Priority,
    pub default_category: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            default_priority: Priority::default(),
            default_category: None,
        }
    }
}

impl Config {
    /// Loads from `override_path`, then `$STUDYDESK_CONFIG`, then the platform
    /// config dir. A missing file yields the defaults.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(p) => Some(p.to_path_buf()),
            None => env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(default_config_path),
        };
        match path {
            Some(path) if path.exists() => {
                let config = Config::from_file(&path)?;
                tracing::info!(
                    path = %path.display(),
                    categories = config.categories.len(),
                    "loaded config"
                );
                Ok(config)
            }
            Some(path) => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        Config::parse(&text).with_context(|| format!("parsing {:?}", path))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.sanitize();
        Ok(config)
    }

    /// The category new tasks get when none is given.
    pub fn default_category(&self) -> &str {
        self.default_category
            .as_deref()
            .or_else(|| self.categories.first().map(String::as_str))
            .unwrap_or(DEFAULT_CATEGORIES[0])
    }

    pub fn is_known_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn is_known_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }

    fn sanitize(&mut self) {
        clean_list(&mut self.categories);
        if self.categories.is_empty() {
            self.categories = Config::default().categories;
        }
        clean_list(&mut self.subjects);
        if self.subjects.is_empty() {
            self.subjects = Config::default().subjects;
        }
        if let Some(category) = self.default_category.take() {
            let category = category.trim().to_string();
            if self.is_known_category(&category) {
                self.default_category = Some(category);
            } else {
                tracing::warn!(
                    %category,
                    "default_category is not a configured category; ignoring"
                );
            }
        }
    }
}

fn clean_list(items: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        let item = item.trim().to_string();
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    *items = seen;
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "studydesk").map(|dirs| dirs.config_dir().join("config.toml"))
}
