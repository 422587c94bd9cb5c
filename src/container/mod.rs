//! Self-describing data containers
//!
//! A container is a zip archive of named items. `content.json` identifies the
//! container (uuid, type and version, timestamps, content hash) and `meta.json`
//! describes it for humans. Every measurement, calibration and image the system
//! stores is written this way.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;
use zip::write::{FileOptions, ZipWriter};

use crate::domain::errors::DomainError;

pub const CONTENT_ITEM: &str = "content.json";
pub const META_ITEM: &str = "meta.json";

/// File extension of written containers
pub const EXTENSION: &str = "zdc";

/// Payload of one container item
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Item {
    fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        match self {
            Item::Json(value) => serde_json::to_vec_pretty(value)
                .map_err(|e| DomainError::Container(format!("Cannot encode JSON item: {}", e))),
            Item::Text(text) => Ok(text.as_bytes().to_vec()),
            Item::Binary(bytes) => Ok(bytes.clone()),
        }
    }

    fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Item, DomainError> {
        if name.ends_with(".json") {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| DomainError::Container(format!("Item {} is no valid JSON: {}", name, e)))?;
            Ok(Item::Json(value))
        } else if name.ends_with(".txt") {
            match String::from_utf8(bytes) {
                Ok(text) => Ok(Item::Text(text)),
                Err(e) => Ok(Item::Binary(e.into_bytes())),
            }
        } else {
            Ok(Item::Binary(bytes))
        }
    }
}

/// Human readable description stored in `meta.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMeta {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ContainerMeta {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            author: None,
            email: None,
        }
    }

    pub fn with_author(mut self, author: Option<String>, email: Option<String>) -> Self {
        self.author = author;
        self.email = email;
        self
    }
}

/// Zip-backed collection of JSON, text and binary items
#[derive(Debug, Clone, PartialEq)]
pub struct DataContainer {
    items: BTreeMap<String, Item>,
}

impl DataContainer {
    /// New container of the given type with a fresh uuid
    pub fn new(container_type: &str, version: f64, meta: ContainerMeta) -> Result<Self, DomainError> {
        let content = json!({
            "uuid": Uuid::new_v4().to_string(),
            "containerType": { "name": container_type, "version": version },
            "created": Utc::now().to_rfc3339(),
        });
        let meta = serde_json::to_value(&meta)
            .map_err(|e| DomainError::Container(format!("Cannot encode meta data: {}", e)))?;

        let mut items = BTreeMap::new();
        items.insert(CONTENT_ITEM.to_string(), Item::Json(content));
        items.insert(META_ITEM.to_string(), Item::Json(meta));
        Ok(Self { items })
    }

    pub fn insert_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), DomainError> {
        let value = serde_json::to_value(value)
            .map_err(|e| DomainError::Container(format!("Cannot encode item {}: {}", name, e)))?;
        self.items.insert(name.to_string(), Item::Json(value));
        Ok(())
    }

    pub fn insert_text(&mut self, name: &str, text: impl Into<String>) {
        self.items.insert(name.to_string(), Item::Text(text.into()));
    }

    pub fn insert_bytes(&mut self, name: &str, bytes: Vec<u8>) {
        self.items.insert(name.to_string(), Item::Binary(bytes));
    }

    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn item(&self, name: &str) -> Result<&Item, DomainError> {
        self.items
            .get(name)
            .ok_or_else(|| DomainError::NotFound(format!("Container item {}", name)))
    }

    pub fn json(&self, name: &str) -> Result<&Value, DomainError> {
        match self.item(name)? {
            Item::Json(value) => Ok(value),
            _ => Err(DomainError::Container(format!("Item {} is not JSON", name))),
        }
    }

    /// Decode a JSON item into a typed value
    pub fn json_as<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<T, DomainError> {
        serde_json::from_value(self.json(name)?.clone())
            .map_err(|e| DomainError::Container(format!("Unexpected structure of {}: {}", name, e)))
    }

    /// Raw bytes of any item
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>, DomainError> {
        self.item(name)?.to_bytes()
    }

    fn content(&self) -> Result<&Value, DomainError> {
        self.json(CONTENT_ITEM)
    }

    fn content_str(&self, key: &str) -> Option<&str> {
        self.content().ok()?.get(key)?.as_str()
    }

    pub fn uuid(&self) -> Result<&str, DomainError> {
        self.content_str("uuid")
            .ok_or_else(|| DomainError::Container("Container without uuid".to_string()))
    }

    pub fn hash(&self) -> Option<&str> {
        self.content_str("hash")
    }

    /// Container type name and version
    pub fn container_type(&self) -> Result<(&str, f64), DomainError> {
        let kind = self
            .content()?
            .get("containerType")
            .ok_or_else(|| DomainError::Container("Container without type".to_string()))?;
        let name = kind.get("name").and_then(Value::as_str);
        let version = kind.get("version").and_then(Value::as_f64);
        match (name, version) {
            (Some(name), Some(version)) => Ok((name, version)),
            _ => Err(DomainError::Container(format!("Malformed container type {}", kind))),
        }
    }

    /// Fail unless the container has the given type and version
    pub fn validate_type(&self, name: &str, version: f64) -> Result<(), DomainError> {
        let (actual_name, actual_version) = self.container_type()?;
        if actual_name != name || (actual_version - version).abs() > 1e-9 {
            return Err(DomainError::Container(format!(
                "Wrong container type {} {} (expected {} {})",
                actual_name, actual_version, name, version
            )));
        }
        Ok(())
    }

    /// SHA-256 over the length-prefixed names and bytes of all items except `content.json`
    /// and `meta.json`
    pub fn compute_hash(&self) -> Result<String, DomainError> {
        let mut hasher = Sha256::new();
        for (name, item) in &self.items {
            if name == CONTENT_ITEM || name == META_ITEM {
                continue;
            }
            let bytes = item.to_bytes()?;
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn stamp(&mut self) -> Result<(), DomainError> {
        let hash = self.compute_hash()?;
        match self.items.get_mut(CONTENT_ITEM) {
            Some(Item::Json(Value::Object(content))) => {
                content.insert("storageTime".to_string(), json!(Utc::now().to_rfc3339()));
                content.insert("hash".to_string(), json!(hash));
                Ok(())
            }
            _ => Err(DomainError::Container(format!("{} missing", CONTENT_ITEM))),
        }
    }

    /// Zip archive of all items; stamps storage time and hash first
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, DomainError> {
        self.stamp()?;
        let zip_err = |e: zip::result::ZipError| DomainError::Container(e.to_string());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, item) in &self.items {
            zip.start_file::<_, ()>(name.as_str(), FileOptions::default())
                .map_err(zip_err)?;
            zip.write_all(&item.to_bytes()?)?;
        }
        let cursor = zip.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        let zip_err = |e: zip::result::ZipError| DomainError::Container(e.to_string());
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;

        let mut items = BTreeMap::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(zip_err)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            items.insert(name.clone(), Item::from_bytes(&name, data)?);
        }

        let container = Self { items };
        container.container_type()?;
        container.uuid()?;
        Ok(container)
    }

    pub fn write(&mut self, path: &Path) -> Result<(), DomainError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bytes).map_err(|e| {
            DomainError::FsFail(format!("Failed to write container {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), uuid = self.uuid().unwrap_or("?"), "Container written");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, DomainError> {
        let bytes = std::fs::read(path).map_err(|e| {
            DomainError::FsFail(format!("Failed to read container {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataContainer {
        let mut container = DataContainer::new(
            "LayerPlane",
            1.1,
            ContainerMeta::new("Plane Detection Data", "Interface planes")
                .with_author(Some("Jane".into()), None),
        )
        .unwrap();
        container
            .insert_json("meas/result.json", &json!({"z0": 1.5}))
            .unwrap();
        container.insert_text("data/notes.txt", "hello");
        container.insert_bytes("data/raw.dat", vec![0, 1, 2, 255]);
        container
    }

    #[test]
    fn test_type_validation() {
        let container = sample();
        assert!(container.validate_type("LayerPlane", 1.1).is_ok());
        assert!(container.validate_type("LayerPlane", 1.0).is_err());
        assert!(container.validate_type("CameraImage", 1.1).is_err());
        assert_eq!(container.uuid().unwrap().len(), 36);
    }

    #[test]
    fn test_zip_restores_items() {
        let mut container = sample();
        let bytes = container.to_bytes().unwrap();
        let restored = DataContainer::from_bytes(&bytes).unwrap();

        assert_eq!(restored.json("meas/result.json").unwrap()["z0"], json!(1.5));
        assert_eq!(restored.item("data/notes.txt").unwrap(), &Item::Text("hello".into()));
        assert_eq!(restored.bytes("data/raw.dat").unwrap(), vec![0, 1, 2, 255]);
        assert_eq!(restored.json(META_ITEM).unwrap()["author"], json!("Jane"));
        assert_eq!(restored.uuid().unwrap(), container.uuid().unwrap());
        assert_eq!(restored.hash(), container.hash());
        assert_eq!(restored.compute_hash().unwrap(), restored.hash().unwrap());
    }

    #[test]
    fn test_hash_ignores_description() {
        let first = sample();
        let mut second = sample();
        second.insert_json(META_ITEM, &json!({"title": "other"})).unwrap();
        assert_eq!(first.compute_hash().unwrap(), second.compute_hash().unwrap());
        second.insert_text("data/notes.txt", "changed");
        assert_ne!(first.compute_hash().unwrap(), second.compute_hash().unwrap());
    }

    #[test]
    fn test_hash_separates_name_from_content() {
        let empty = || DataContainer::new("Raw", 1.0, ContainerMeta::new("Raw", "")).unwrap();
        let mut first = empty();
        first.insert_bytes("a", b"bc".to_vec());
        let mut second = empty();
        second.insert_bytes("ab", b"c".to_vec());
        assert_ne!(first.compute_hash().unwrap(), second.compute_hash().unwrap());
    }

    #[test]
    fn test_missing_and_mistyped_items() {
        let container = sample();
        assert!(matches!(container.json("nope.json"), Err(DomainError::NotFound(_))));
        assert!(matches!(container.json("data/raw.dat"), Err(DomainError::Container(_))));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plane").join("plane.zdc");
        let mut container = sample();
        container.write(&path).unwrap();
        let restored = DataContainer::read(&path).unwrap();
        assert!(restored.contains("data/raw.dat"));
        assert!(restored.json(CONTENT_ITEM).unwrap().get("storageTime").is_some());
    }

    #[test]
    fn test_rejects_foreign_zip() {
        assert!(DataContainer::from_bytes(b"not a zip").is_err());
    }
}
