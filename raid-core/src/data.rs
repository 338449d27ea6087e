//! JSON data store with modification-time caching and hot reload.
//!
//! Layout under the data root:
//! - `maps/<name>.json`
//! - `bosses/<id>.json`
//! - `skills/skills.json`
//!
//! A file is re-parsed only when its mtime changes. Failures are logged and
//! degrade to a fallback: no map, an inert boss, or an empty skill book.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::boss::{BossCatalog, BossDefinition};
use crate::error::DataError;
use crate::grid::MapDefinition;
use crate::skills::SkillBook;

struct Cached<T> {
    mtime: Option<SystemTime>,
    value: Arc<T>,
}

type Cache<T> = Mutex<HashMap<String, Cached<T>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// File names come from the database and data files; keep them inside the root
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

pub struct DataStore {
    root: PathBuf,
    maps: Cache<MapDefinition>,
    bosses: Cache<BossDefinition>,
    skills: Cache<SkillBook>,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            maps: Mutex::new(HashMap::new()),
            bosses: Mutex::new(HashMap::new()),
            skills: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_path(&self, name: &str) -> PathBuf {
        self.root.join("maps").join(format!("{name}.json"))
    }

    fn boss_path(&self, id: &str) -> PathBuf {
        self.root.join("bosses").join(format!("{id}.json"))
    }

    fn skills_path(&self) -> PathBuf {
        self.root.join("skills").join("skills.json")
    }

    /// Load a map, surfacing io and parse errors
    pub fn try_map(&self, name: &str) -> Result<Arc<MapDefinition>, DataError> {
        let path = self.map_path(name);
        load_cached(&self.maps, name, &path, |mut map: MapDefinition| {
            if map.id.is_empty() {
                map.id = name.to_string();
            }
            map
        })
    }

    /// Map by name, or `None` when it is missing or malformed
    pub fn map(&self, name: &str) -> Option<Arc<MapDefinition>> {
        if !is_safe_name(name) {
            warn!(map = name, "Rejected map name");
            return None;
        }
        match self.try_map(name) {
            Ok(map) => Some(map),
            Err(DataError::Io { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Map file not found");
                None
            }
            Err(e) => {
                error!(map = name, error = %e, "Failed to load map");
                None
            }
        }
    }

    pub fn try_boss(&self, id: &str) -> Result<Arc<BossDefinition>, DataError> {
        let path = self.boss_path(id);
        load_cached(&self.bosses, id, &path, |mut def: BossDefinition| {
            if def.id.is_empty() {
                def.id = id.to_string();
            }
            def
        })
    }

    /// Boss definition, falling back to an inert one
    pub fn boss(&self, id: &str) -> Arc<BossDefinition> {
        if !is_safe_name(id) {
            warn!(boss = id, "Rejected boss id");
            return Arc::new(BossDefinition::inert(id));
        }
        self.try_boss(id).unwrap_or_else(|e| {
            warn!(boss = id, error = %e, "Boss definition unavailable, using inert boss");
            Arc::new(BossDefinition::inert(id))
        })
    }

    pub fn try_skills(&self) -> Result<Arc<SkillBook>, DataError> {
        let path = self.skills_path();
        load_cached(&self.skills, "skills", &path, |book| book)
    }

    /// Skill catalogue, empty when unavailable
    pub fn skills(&self) -> Arc<SkillBook> {
        self.try_skills().unwrap_or_else(|e| {
            warn!(error = %e, "Skill data unavailable, using empty skill book");
            Arc::new(SkillBook::default())
        })
    }

    /// Drop any cache entry backed by `path`
    pub fn invalidate(&self, path: &Path) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let evicted = match dir {
            "maps" => lock(&self.maps).remove(stem).is_some(),
            "bosses" => lock(&self.bosses).remove(stem).is_some(),
            "skills" => lock(&self.skills).remove("skills").is_some(),
            _ => false,
        };
        if evicted {
            debug!(path = %path.display(), "Evicted cached data file");
        }
    }
}

impl BossCatalog for DataStore {
    fn boss_definition(&self, id: &str) -> Arc<BossDefinition> {
        self.boss(id)
    }
}

fn load_cached<T, F>(cache: &Cache<T>, key: &str, path: &Path, finish: F) -> Result<Arc<T>, DataError>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> T,
{
    let io_err = |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mtime = std::fs::metadata(path).map_err(io_err)?.modified().ok();

    if let Some(entry) = lock(cache).get(key) {
        if entry.mtime.is_some() && entry.mtime == mtime {
            return Ok(Arc::clone(&entry.value));
        }
    }

    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let parsed: T = serde_json::from_str(&text).map_err(|source| DataError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let value = Arc::new(finish(parsed));

    lock(cache).insert(
        key.to_string(),
        Cached {
            mtime,
            value: Arc::clone(&value),
        },
    );
    Ok(value)
}

/// Filesystem watcher that evicts changed files from a [`DataStore`].
///
/// The watcher stops when this value is dropped.
pub struct DataWatcher {
    _watcher: RecommendedWatcher,
}

impl DataWatcher {
    pub fn spawn(store: Arc<DataStore>) -> Result<Self, DataError> {
        let root = store.root().to_path_buf();
        let target = Arc::clone(&store);
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        for path in &event.paths {
                            target.invalidate(path);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Data watcher error"),
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "Hot reload enabled for data files");
        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, body) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let store = DataStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_map_id_defaults_to_file_name() {
        let (_dir, store) = store_with(&[("maps/cave.json", r#"{ "n": 2, "tiles": [[0,0],[0,0]] }"#)]);
        let map = store.map("cave").unwrap();
        assert_eq!(map.id, "cave");
        assert!(store.map("nowhere").is_none());
    }

    #[test]
    fn test_cached_until_invalidated() {
        let (dir, store) = store_with(&[("bosses/golem.json", r#"{ "id": "golem", "hp": 400 }"#)]);
        let first = store.boss("golem");
        let second = store.boss("golem");
        assert!(Arc::ptr_eq(&first, &second), "Unchanged file served from cache");

        let path = dir.path().join("bosses/golem.json");
        fs::write(&path, r#"{ "id": "golem", "hp": 900 }"#).unwrap();
        store.invalidate(&path);
        assert_eq!(store.boss("golem").hp, Some(900));
    }

    #[test]
    fn test_malformed_boss_is_inert() {
        let (_dir, store) = store_with(&[("bosses/broken.json", "{ not json")]);
        let def = store.boss("broken");
        assert_eq!(def.id, "broken");
        assert!(def.phases.is_empty());
        assert!(matches!(store.try_boss("broken"), Err(DataError::Parse { .. })));
    }

    #[test]
    fn test_missing_skills_are_empty() {
        let (_dir, store) = store_with(&[]);
        assert!(store.skills().skills.is_empty());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (_dir, store) = store_with(&[("maps/town.json", r#"{ "n": 1, "tiles": [[0]] }"#)]);
        assert!(store.map("../maps/town").is_none());
        assert!(store.map("town").is_some());
    }

    #[test]
    fn test_catalog_uses_store() {
        let (_dir, store) = store_with(&[("bosses/imp.json", r#"{ "id": "imp", "name": "Imp" }"#)]);
        let catalog: &dyn BossCatalog = &store;
        assert_eq!(catalog.boss_definition("imp").name.as_deref(), Some("Imp"));
        assert!(catalog.boss_definition("ghost").phases.is_empty());
    }
}
