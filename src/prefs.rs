use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::warn;

/// Small persisted key-value surface for sync timestamps and the PIN secret.
pub trait Preferences: Send + Sync {
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn put_i64(&self, key: &str, value: i64) -> Result<()>;
    fn get_string(&self, key: &str) -> Option<String>;
    fn put_string(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON document backed preferences. Without a path nothing touches disk.
pub struct JsonPreferences {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl JsonPreferences {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences directory {}", parent.display())
            })?;
        }

        let values = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(values) => values,
                Err(err) => {
                    warn!(
                        "ignoring unreadable preferences at {}: {err}",
                        path.display()
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read preferences {}", path.display()));
            }
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            values: Mutex::new(values),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(Map::new()),
        }
    }

    fn values(&self) -> Result<MutexGuard<'_, Map<String, Value>>> {
        self.values
            .lock()
            .map_err(|_| anyhow!("preferences lock poisoned"))
    }

    fn read(&self, key: &str) -> Option<Value> {
        self.values().ok()?.get(key).cloned()
    }

    /// Applies `edit` to a copy and swaps it in only once it is on disk.
    fn write(&self, edit: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let mut values = self.values()?;
        let mut next = values.clone();
        edit(&mut next);

        if let Some(path) = self.path.as_deref() {
            let raw = serde_json::to_string_pretty(&next)?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, raw)
                .with_context(|| format!("failed to write preferences {}", tmp.display()))?;
            fs::rename(&tmp, path)
                .with_context(|| format!("failed to replace preferences {}", path.display()))?;
        }

        *values = next;
        Ok(())
    }
}

impl Preferences for JsonPreferences {
    fn get_i64(&self, key: &str) -> Option<i64> {
        self.read(key)?.as_i64()
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.write(|values| {
            values.insert(key.to_string(), Value::from(value));
        })
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.read(key)? {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(|values| {
            values.insert(key.to_string(), Value::from(value));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write(|values| {
            values.remove(key);
        })
    }
}
