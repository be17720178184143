//! Stockage clé-valeur des données de l'appareil, en mémoire ou sauvegardé en JSON

use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, ErrorKind::NotFound, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stockage inaccessible: {0}")]
    Io(#[from] io::Error),
    #[error("Données corrompues sous la clé {key}: {source}")]
    Corrupted {
        key: String,
        source: serde_json::Error,
    },
    #[error("La clé {0} ne contient pas une liste")]
    NotAList(String),
    #[error("Impossible d'encoder la valeur: {0}")]
    Encode(serde_json::Error),
}

/// Accès au stockage local. Chaque clé contient une valeur JSON.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Remplace la valeur d'une clé. En cas d'erreur, l'ancienne valeur est conservée.
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Ajoute un élément à la liste d'une clé (créée si absente)
    fn append(&mut self, key: &str, item: Value) -> Result<(), StorageError> {
        let mut items = match self.get(key)? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(StorageError::NotAList(key.to_owned())),
        };
        items.push(item);
        self.set(key, Value::Array(items))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StorageError::Corrupted {
                    key: key.to_owned(),
                    source,
                }),
        }
    }

    fn store<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(value).map_err(StorageError::Encode)?;
        self.set(key, value)
    }

    fn append_item<T: Serialize>(&mut self, key: &str, item: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let item = serde_json::to_value(item).map_err(StorageError::Encode)?;
        self.append(key, item)
    }
}

/// Stockage volatile, pour les tests et les sessions sans disque
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: BTreeMap<String, Value>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Stockage persistant: tout le contenu est réécrit dans un fichier JSON à chaque modification
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStorage {
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        match File::open(&path) {
            Ok(f) => {
                let entries = serde_json::from_reader(io::BufReader::new(f)).map_err(|source| {
                    StorageError::Corrupted {
                        key: path.display().to_string(),
                        source,
                    }
                })?;
                info!("Opened store {}", path.display());
                Ok(Self { path, entries })
            }

            // Fichier non existant, on le crée
            Err(not_found) if not_found.kind() == NotFound => {
                info!("Store file {} not found, creating new empty store", path.display());
                let store = Self {
                    path,
                    entries: BTreeMap::new(),
                };

                // On vérifie la sauvegarde immédiatement pour détecter un stockage inutilisable
                write_entries(&store.path, &store.entries)?;
                Ok(store)
            }

            Err(other) => Err(other.into()),
        }
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut updated = self.entries.clone();
        updated.insert(key.to_owned(), value);

        if let Err(e) = write_entries(&self.path, &updated) {
            warn!("Write to {} failed: {e}", self.path.display());
            return Err(e);
        }
        self.entries = updated;
        Ok(())
    }
}

/// Écrit dans un fichier voisin puis renomme, pour ne jamais laisser un fichier à moitié écrit
fn write_entries(path: &Path, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = File::create(&tmp)?;
    let written = write_then_rename(file, &tmp, path, entries);
    if written.is_err() {
        // Le fichier temporaire est le nôtre: on ne le laisse pas traîner
        if let Err(e) = fs::remove_file(&tmp) {
            warn!("Could not remove {}: {e}", tmp.display());
        }
    }
    written
}

fn write_then_rename(
    file: File,
    tmp: &Path,
    path: &Path,
    entries: &BTreeMap<String, Value>,
) -> Result<(), StorageError> {
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, entries).map_err(|e| StorageError::Io(e.into()))?;
    writer.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    mod memory_tests {
        use super::*;

        #[test]
        fn test_get_missing_key() {
            let store = MemoryStorage::default();
            assert!(store.get("nothing").unwrap().is_none());
            assert!(store.load::<Vec<u32>>("nothing").unwrap().is_none());
        }

        #[test]
        fn test_append_creates_and_extends() {
            let mut store = MemoryStorage::default();
            store.append("list", json!(1)).unwrap();
            store.append("list", json!(2)).unwrap();
            assert_eq!(store.get("list").unwrap(), Some(json!([1, 2])));
        }

        #[test]
        fn test_append_to_non_list() {
            let mut store = MemoryStorage::default();
            store.set("scalar", json!("text")).unwrap();

            let result = store.append("scalar", json!(1));
            assert!(
                matches!(result, Err(StorageError::NotAList(_))),
                "Appending to a scalar should fail, but got: {:?}",
                result
            );
            assert_eq!(store.get("scalar").unwrap(), Some(json!("text")));
        }

        #[test]
        fn test_load_corrupted() {
            let mut store = MemoryStorage::default();
            store.set("numbers", json!({"not": "numbers"})).unwrap();
            assert!(matches!(
                store.load::<Vec<u32>>("numbers"),
                Err(StorageError::Corrupted { .. })
            ));
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_open_creates_file() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("nested").join("kisan.json");

            let store = JsonFileStorage::open(path.clone()).unwrap();
            assert!(path.exists());
            assert!(store.get("anything").unwrap().is_none());
        }

        #[test]
        fn test_values_survive_reopen() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("kisan.json");

            let mut store = JsonFileStorage::open(path.clone()).unwrap();
            store.store("plant_image", &"https://example.org/leaf.jpg").unwrap();
            store.append_item("active_treatments", &json!({"id": "a"})).unwrap();
            store.append_item("active_treatments", &json!({"id": "b"})).unwrap();
            drop(store);

            let reopened = JsonFileStorage::open(path).unwrap();
            assert_eq!(
                reopened.load::<String>("plant_image").unwrap().as_deref(),
                Some("https://example.org/leaf.jpg")
            );
            assert_eq!(
                reopened.get("active_treatments").unwrap(),
                Some(json!([{"id": "a"}, {"id": "b"}]))
            );
        }

        #[test]
        fn test_open_corrupted_file() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("kisan.json");
            fs::write(&path, "{ not json").unwrap();

            assert!(matches!(
                JsonFileStorage::open(path),
                Err(StorageError::Corrupted { .. })
            ));
        }

        #[test]
        fn test_failed_write_keeps_previous_state() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("kisan.json");

            let mut store = JsonFileStorage::open(path.clone()).unwrap();
            store.set("key", json!("before")).unwrap();

            // Un répertoire à la place du fichier temporaire fait échouer l'écriture
            let mut tmp = path.as_os_str().to_owned();
            tmp.push(".tmp");
            fs::create_dir(PathBuf::from(tmp)).unwrap();

            assert!(store.set("key", json!("after")).is_err());
            assert_eq!(store.get("key").unwrap(), Some(json!("before")));

            let on_disk: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(on_disk["key"], "before");
        }

        #[test]
        fn test_failed_rename_removes_temp_file() {
            let temp = TempDir::new().unwrap();
            // Un répertoire non vide à la place du fichier final fait échouer le renommage
            let path = temp.path().join("kisan.json");
            fs::create_dir(&path).unwrap();
            fs::write(path.join("occupied"), "x").unwrap();

            let mut entries = BTreeMap::new();
            entries.insert("key".to_owned(), json!("value"));

            assert!(write_entries(&path, &entries).is_err());
            assert!(!temp.path().join("kisan.json.tmp").exists());
            assert!(path.join("occupied").exists());
        }
    }
}
