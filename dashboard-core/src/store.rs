//! Saved locations: an ordered, duplicate-free list of city names kept in
//! durable key-value storage.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
};

use tokio::sync::watch;

use crate::error::StorageError;

/// Key under which the saved city list is stored.
pub const SAVED_CITIES_KEY: &str = "savedCities";

/// Synchronous string storage addressed by key.
pub trait KeyValueStorage: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process storage, mostly for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        Self { values }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        // Whole-file replace so a crash never leaves half a list behind.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Saved city names in insertion order, compared by exact string match.
pub struct SavedLocationStore {
    storage: Box<dyn KeyValueStorage>,
    cities: Vec<String>,
    changes: watch::Sender<Vec<String>>,
}

impl SavedLocationStore {
    /// Loads the saved list. Absent, unreadable or unparsable data is an
    /// empty list.
    pub fn load(storage: Box<dyn KeyValueStorage>) -> Self {
        let cities = match read_cities(storage.as_ref()) {
            Ok(cities) => cities,
            Err(e) => {
                tracing::warn!("Ignoring saved locations: {e}");
                Vec::new()
            }
        };

        tracing::debug!("Loaded {} saved location(s)", cities.len());
        let (changes, _) = watch::channel(cities.clone());
        Self { storage, cities, changes }
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStorage::new()))
    }

    pub fn list(&self) -> &[String] {
        &self.cities
    }

    pub fn first(&self) -> Option<&str> {
        self.cities.first().map(String::as_str)
    }

    pub fn is_saved(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Appends `city` unless already saved. Returns whether the list changed.
    pub fn add(&mut self, city: &str) -> Result<bool, StorageError> {
        if self.is_saved(city) {
            return Ok(false);
        }

        let mut updated = self.cities.clone();
        updated.push(city.to_string());
        self.commit(updated)?;

        tracing::info!("Saved location '{city}'");
        Ok(true)
    }

    /// Removes every exact match of `city`. Returns whether the list changed.
    pub fn remove(&mut self, city: &str) -> Result<bool, StorageError> {
        if !self.is_saved(city) {
            return Ok(false);
        }

        let updated: Vec<String> = self.cities.iter().filter(|c| *c != city).cloned().collect();
        self.commit(updated)?;

        tracing::info!("Removed saved location '{city}'");
        Ok(true)
    }

    /// Receiver of the saved list, marked changed after every add or remove
    /// that altered it. Drop it to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<Vec<String>> {
        self.changes.subscribe()
    }

    /// Persists `updated`, then makes it current and notifies. On a write
    /// failure the in-memory list is left untouched.
    fn commit(&mut self, updated: Vec<String>) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(&updated).map_err(StorageError::Encode)?;
        self.storage.set(SAVED_CITIES_KEY, &encoded)?;

        self.cities = updated;
        self.changes.send_replace(self.cities.clone());
        Ok(())
    }
}

impl std::fmt::Debug for SavedLocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedLocationStore")
            .field("cities", &self.cities)
            .field("subscribers", &self.changes.receiver_count())
            .finish_non_exhaustive()
    }
}

fn read_cities(storage: &dyn KeyValueStorage) -> Result<Vec<String>, StorageError> {
    let Some(raw) = storage.get(SAVED_CITIES_KEY)? else {
        return Ok(Vec::new());
    };

    let parsed: Option<Vec<String>> =
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;

    // `null` is treated like an absent value; duplicates written by older
    // versions collapse to their first occurrence.
    let mut cities: Vec<String> = Vec::new();
    for city in parsed.unwrap_or_default() {
        if !cities.contains(&city) {
            cities.push(city);
        }
    }
    Ok(cities)
}
