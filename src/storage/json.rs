//! One pretty-printed JSON file per item
//!
//! Layout: `<base>/users/<gid>.json` and `<base>/projects/<gid>.json`.
//! Files are written to `<gid>.json.tmp` first and renamed over the target, so
//! a reader never observes a half-written record.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::storage::{Storage, StorageError, StorageResult};
use crate::{Project, User};

const USERS_DIR: &str = "users";
const PROJECTS_DIR: &str = "projects";

/// Filesystem storage writing each item to its own JSON file.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_dir: PathBuf,
}

impl JsonStorage {
    /// Create the storage, creating `base_dir/users` and `base_dir/projects` if needed.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> StorageResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join(USERS_DIR))?;
        fs::create_dir_all(base_dir.join(PROJECTS_DIR))?;
        Ok(Self { base_dir })
    }

    /// Root output directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the record for `gid` under `dir`.
    pub fn item_path(&self, dir: &str, gid: &str) -> StorageResult<PathBuf> {
        if gid.is_empty() || gid.contains(['/', '\\']) || gid == "." || gid == ".." {
            return Err(StorageError::InvalidId(gid.to_string()));
        }
        Ok(self.base_dir.join(dir).join(format!("{gid}.json")))
    }

    fn write_json<T: Serialize>(&self, dir: &str, gid: &str, item: &T) -> StorageResult<()> {
        let target = self.item_path(dir, gid)?;
        let payload = serde_json::to_vec_pretty(item)?;

        let mut temp = target.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, payload)?;
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(path = %target.display(), "item written");
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn write_user(&self, user: &User) -> StorageResult<()> {
        self.write_json(USERS_DIR, &user.gid, user)
    }

    fn write_project(&self, project: &Project) -> StorageResult<()> {
        self.write_json(PROJECTS_DIR, &project.gid, project)
    }
}
