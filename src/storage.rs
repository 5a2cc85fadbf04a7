use crate::model::Planner;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".studydesk";
const PLANNER_FILE: &str = "planner.yml";
const LOG_FILE: &str = "studydesk.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerScope {
    Project,
    Global,
}

impl PlannerScope {
    pub fn label(&self) -> &'static str {
        match self {
            PlannerScope::Project => "project",
            PlannerScope::Global => "global",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerLocation {
    pub path: PathBuf,
    pub scope: PlannerScope,
}

pub fn init_project_planner(dir: &Path, name: Option<String>) -> Result<PlannerLocation> {
    let project_dir = dir.join(PROJECT_DIR);
    fs::create_dir_all(&project_dir)
        .with_context(|| format!("failed to create {:?}", project_dir))?;
    let location = PlannerLocation {
        path: project_dir.join(PLANNER_FILE),
        scope: PlannerScope::Project,
    };
    if location.path.exists() {
        tracing::info!(path = %location.path.display(), "planner already initialized");
    } else {
        let planner_name = name.unwrap_or_else(|| dir_name(dir, "project"));
        save_planner(&location, &Planner::new(planner_name))?;
    }
    Ok(location)
}

pub fn init_current_planner(name: Option<String>) -> Result<PlannerLocation> {
    let cwd = env::current_dir()?;
    init_project_planner(&cwd, name)
}

pub fn locate_planner(start: &Path) -> Result<PlannerLocation> {
    if let Some(project_path) = find_project_planner(start) {
        return Ok(PlannerLocation {
            path: project_path,
            scope: PlannerScope::Project,
        });
    }
    Ok(PlannerLocation {
        path: data_dir()?.join(PLANNER_FILE),
        scope: PlannerScope::Global,
    })
}

pub fn load_planner(location: &PlannerLocation) -> Result<Planner> {
    if location.path.exists() {
        let data = fs::read_to_string(&location.path)
            .with_context(|| format!("reading {:?}", location.path))?;
        let planner: Planner = serde_yaml::from_str(&data).context("parsing planner file")?;
        tracing::info!(
            path = %location.path.display(),
            scope = location.scope.label(),
            tasks = planner.tasks.total(),
            events = planner.events.len(),
            "loaded planner"
        );
        Ok(planner)
    } else {
        let fallback_name = match location.scope {
            PlannerScope::Project => location
                .path
                .parent()
                .and_then(|p| p.parent())
                .map(|p| dir_name(p, "project"))
                .unwrap_or_else(|| "project".to_string()),
            PlannerScope::Global => "default".to_string(),
        };
        let planner = Planner::new(fallback_name);
        save_planner(location, &planner)?;
        Ok(planner)
    }
}

pub fn save_planner(location: &PlannerLocation, planner: &Planner) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(planner).context("serializing planner")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    tracing::debug!(path = %location.path.display(), "saved planner");
    Ok(())
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(LOG_FILE))
}

fn find_project_planner(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(PLANNER_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "studydesk").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn dir_name(dir: &Path, fallback: &str) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    #[test]
    fn init_then_locate_from_subdirectory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("algebra");
        let nested = root.join("notes").join("week1");
        fs::create_dir_all(&nested).unwrap();

        let created = init_project_planner(&root, None).unwrap();
        assert_eq!(created.scope, PlannerScope::Project);

        let found = locate_planner(&nested).unwrap();
        assert_eq!(found.scope, PlannerScope::Project);
        assert_eq!(found.path, created.path);

        let planner = load_planner(&found).unwrap();
        assert_eq!(planner.name, "algebra");
        assert!(planner.tasks.is_empty());
    }

    #[test]
    fn init_keeps_existing_planner() {
        let temp = tempfile::tempdir().unwrap();
        let location = init_project_planner(temp.path(), Some("first".into())).unwrap();
        let mut planner = load_planner(&location).unwrap();
        planner.tasks.add("Keep me", Priority::High, "Study");
        save_planner(&location, &planner).unwrap();

        init_project_planner(temp.path(), Some("second".into())).unwrap();
        let reloaded = load_planner(&location).unwrap();
        assert_eq!(reloaded.name, "first");
        assert_eq!(reloaded.tasks.total(), 1);
    }

    #[test]
    fn missing_project_file_is_created_on_load() {
        let temp = tempfile::tempdir().unwrap();
        let location = PlannerLocation {
            path: temp.path().join("physics").join(PROJECT_DIR).join(PLANNER_FILE),
            scope: PlannerScope::Project,
        };
        let planner = load_planner(&location).unwrap();
        assert_eq!(planner.name, "physics");
        assert!(location.path.exists());
    }
}
