//! Project persistence.
//!
//! The simulation only needs `load`; `save` exists so decomposed projects
//! can be stored for later runs.

use crate::core::{Project, ProjectId};
use crate::{tplog_debug, Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// `Ok(None)` when the project does not exist.
    async fn load(&self, id: &ProjectId) -> Result<Option<Project>>;

    async fn save(&self, project: &Project) -> Result<()>;
}

/// In-process store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn load(&self, id: &ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn save(&self, project: &Project) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(())
    }
}

/// One pretty-printed `<id>.json` file per project.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `id`. Ids that are not plain file names are rejected.
    pub fn path_for(&self, id: &ProjectId) -> Result<PathBuf> {
        let name = id.as_str();
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(Error::Validation(format!("Invalid project id: {:?}", name)));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl ProjectStore for JsonFileStore {
    async fn load(&self, id: &ProjectId) -> Result<Option<Project>> {
        let path = self.path_for(id)?;
        tplog_debug!("JsonFileStore::load path={}", path.display());
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let project: Project = serde_json::from_str(&contents)?;
        tplog_debug!("Loaded project {} with {} tasks", project.id, project.task_count());
        Ok(Some(project))
    }

    async fn save(&self, project: &Project) -> Result<()> {
        let path = self.path_for(&project.id)?;
        let contents = serde_json::to_string_pretty(project)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        tplog_debug!("Saved project {} to {}", project.id, path.display());
        Ok(())
    }
}
