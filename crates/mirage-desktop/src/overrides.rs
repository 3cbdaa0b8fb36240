//! Persisted manual icon positions.
//!
//! Stored under a single storage key as a JSON object of
//! `name -> {x, y}`. When the map becomes empty the key is removed
//! entirely rather than left holding `{}`.
//!
//! Persistence is best effort: a write that fails is logged and the
//! in-memory map keeps the new value, and a missing or corrupt blob loads as
//! an empty map. Overrides are never pruned when their entry disappears.

use std::collections::BTreeMap;
use std::rc::Rc;

use mirage_platform::StorageService;
use mirage_types::Point;

pub struct IconOverrides {
    positions: BTreeMap<String, Point>,
    storage: Rc<dyn StorageService>,
    key: String,
}

impl std::fmt::Debug for IconOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconOverrides")
            .field("key", &self.key)
            .field("positions", &self.positions)
            .finish()
    }
}

impl IconOverrides {
    /// Load the map stored under `key`.
    pub fn load(storage: Rc<dyn StorageService>, key: impl Into<String>) -> Self {
        let key = key.into();
        let positions = match storage.get(&key) {
            Ok(Some(json)) => match serde_json::from_str::<BTreeMap<String, Point>>(&json) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("Ignoring corrupt icon positions in {key}: {e}");
                    BTreeMap::new()
                },
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("Icon positions unavailable ({key}): {e}");
                BTreeMap::new()
            },
        };
        log::debug!("Loaded {} icon override(s) from {key}", positions.len());
        Self {
            positions,
            storage,
            key,
        }
    }

    pub fn get(&self, name: &str) -> Option<Point> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Point)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record a position and persist the whole map.
    pub fn set(&mut self, name: &str, position: Point) {
        self.positions.insert(name.to_string(), position);
        self.persist();
    }

    /// Drop every override and remove the storage key.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.persist();
    }

    fn persist(&self) {
        let result = if self.positions.is_empty() {
            self.storage.remove(&self.key)
        } else {
            match serde_json::to_string(&self.positions) {
                Ok(json) => self.storage.set(&self.key, &json),
                Err(e) => Err(e.into()),
            }
        };
        if let Err(e) = result {
            log::warn!("Could not persist icon positions to {}: {e}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use mirage_platform::MemoryStorage;

    use super::*;

    const KEY: &str = "mirage.desktop.icon-positions";

    fn storage() -> Rc<MemoryStorage> {
        Rc::new(MemoryStorage::new())
    }

    fn as_dyn(storage: &Rc<MemoryStorage>) -> Rc<dyn StorageService> {
        Rc::clone(storage) as Rc<dyn StorageService>
    }

    #[test]
    fn missing_key_loads_empty() {
        let overrides = IconOverrides::load(as_dyn(&storage()), KEY);
        assert!(overrides.is_empty());
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let store = storage();
        store.set(KEY, "{\"Notes\": [1, 2]").unwrap();
        let overrides = IconOverrides::load(as_dyn(&store), KEY);
        assert!(overrides.is_empty());
    }

    #[test]
    fn set_persists_json_object() {
        let store = storage();
        let mut overrides = IconOverrides::load(as_dyn(&store), KEY);
        overrides.set("Notes", Point::new(90, 200));
        let json = store.get(KEY).unwrap().unwrap();
        assert_eq!(json, r#"{"Notes":{"x":90,"y":200}}"#);

        let reloaded = IconOverrides::load(as_dyn(&store), KEY);
        assert_eq!(reloaded.get("Notes"), Some(Point::new(90, 200)));
    }

    #[test]
    fn clear_removes_key_entirely() {
        let store = storage();
        let mut overrides = IconOverrides::load(as_dyn(&store), KEY);
        overrides.set("a", Point::new(10, 10));
        overrides.set("b", Point::new(100, 10));
        overrides.set("c", Point::new(190, 10));
        assert_eq!(overrides.len(), 3);
        overrides.clear();
        assert!(overrides.is_empty());
        assert_eq!(store.get(KEY).unwrap(), None);
        assert!(!store.contains(KEY).unwrap());
    }

    #[test]
    fn storage_failure_is_swallowed() {
        let store = Rc::new(MemoryStorage::with_quota(8));
        let mut overrides = IconOverrides::load(as_dyn(&store), KEY);
        overrides.set("Projects", Point::new(45, 50));
        // Nothing persisted, but the in-memory value still applies.
        assert_eq!(store.get(KEY).unwrap(), None);
        assert_eq!(overrides.get("Projects"), Some(Point::new(45, 50)));
    }

    #[test]
    fn iter_is_name_ordered() {
        let store = storage();
        let mut overrides = IconOverrides::load(as_dyn(&store), KEY);
        overrides.set("b", Point::new(2, 2));
        overrides.set("a", Point::new(1, 1));
        let names: Vec<&str> = overrides.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
