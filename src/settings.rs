use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Key under which the admin panel persists the Bitrix webhook URL.
pub const BITRIX_WEBHOOK_KEY: &str = "bitrix_webhook_url";

/// Small persistent key/value store for operator settings, kept as a JSON
/// object on disk.
pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        let values = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        tracing::debug!(
            "Loaded {} setting(s) from {}",
            values.len(),
            path.display()
        );

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    /// Sets a value and writes the store through to disk.
    pub async fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.write().await;
        let previous = values.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&values).await {
            // Keep memory and disk in agreement
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }

    /// Writes to a sibling temp file, then renames it over the target.
    async fn persist(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        let serialized = serde_json::to_vec_pretty(values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}
