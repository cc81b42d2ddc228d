//! Append-only JSON array files.
//!
//! Each append rewrites the whole array through a temporary file and an
//! atomic rename, so a crash leaves either the old or the new array on disk
//! and existing entries are never modified.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Result, StoreError};

/// An append-only sequence of records.
pub trait AppendLog<T> {
    /// Append one entry after all existing ones.
    fn append(&mut self, entry: &T) -> Result<()>;

    /// All entries in append order.
    fn entries(&self) -> Result<Vec<T>>;
}

impl<T: Clone> AppendLog<T> for Vec<T> {
    fn append(&mut self, entry: &T) -> Result<()> {
        self.push(entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<T>> {
        Ok(self.clone())
    }
}

/// A JSON array file of `T`.
#[derive(Debug)]
pub struct JsonLog<T> {
    path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

impl<T> JsonLog<T> {
    /// Log backed by `path`. The file is created on first append.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _entry: PhantomData,
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> JsonLog<T> {
    fn read_raw(&self) -> Result<Vec<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("read", &self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| self.corrupt(e))
    }

    fn write_raw(&self, entries: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create dir", parent, e))?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|e| self.corrupt(e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::io("write", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io("rename", &self.path, e))?;
        Ok(())
    }

    fn corrupt(&self, e: serde_json::Error) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        }
    }
}

impl<T: Serialize + DeserializeOwned> AppendLog<T> for JsonLog<T> {
    fn append(&mut self, entry: &T) -> Result<()> {
        let mut entries = self.read_raw()?;
        entries.push(serde_json::to_value(entry).map_err(|e| self.corrupt(e))?);
        self.write_raw(&entries)
    }

    fn entries(&self) -> Result<Vec<T>> {
        self.read_raw()?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| self.corrupt(e)))
            .collect()
    }
}
