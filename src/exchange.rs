use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key-value store that carries datasets from one task to the next, addressed
/// by the producing task's id and a key.
pub trait Exchange: Send + Sync {
    fn push_json(&self, task_id: &str, key: &str, json: String) -> Result<()>;
    fn pull_json(&self, task_id: &str, key: &str) -> Result<String>;
}

pub fn push<T: Serialize + ?Sized>(
    exchange: &dyn Exchange,
    task_id: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("serialize {task_id}/{key}"))?;
    exchange.push_json(task_id, key, json)
}

pub fn pull<T: DeserializeOwned>(exchange: &dyn Exchange, task_id: &str, key: &str) -> Result<T> {
    let json = exchange.pull_json(task_id, key)?;
    serde_json::from_str(&json).with_context(|| format!("decode {task_id}/{key}"))
}

#[derive(Debug, Default)]
pub struct MemoryExchange {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Exchange for MemoryExchange {
    fn push_json(&self, task_id: &str, key: &str, json: String) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("exchange lock poisoned"))?;
        entries.insert((task_id.to_string(), key.to_string()), json);
        Ok(())
    }

    fn pull_json(&self, task_id: &str, key: &str) -> Result<String> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("exchange lock poisoned"))?;
        entries
            .get(&(task_id.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no value for {task_id}/{key}"))
    }
}

/// Stores each value as `<root>/<task_id>/<key>.json`, so separate processes
/// can hand datasets to each other.
#[derive(Debug, Clone)]
pub struct DirExchange {
    root: PathBuf,
}

impl DirExchange {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, task_id: &str, key: &str) -> Result<PathBuf> {
        for part in [task_id, key] {
            let valid = !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(anyhow!("invalid exchange path component {part:?}"));
            }
        }
        Ok(self.root.join(task_id).join(format!("{key}.json")))
    }
}

impl Exchange for DirExchange {
    fn push_json(&self, task_id: &str, key: &str, json: String) -> Result<()> {
        let path = self.path_for(task_id, key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create exchange dir {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    fn pull_json(&self, task_id: &str, key: &str) -> Result<String> {
        let path = self.path_for(task_id, key)?;
        fs::read_to_string(&path)
            .with_context(|| format!("no value for {task_id}/{key} at {}", path.display()))
    }
}
