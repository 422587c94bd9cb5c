//! Site configuration file (`~/nanofactory.json`)

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::errors::DomainError;

pub const DEFAULT_FILE_NAME: &str = "nanofactory.json";

const USER_PREFIX: &str = "user:";
const OBJECTIVE_PREFIX: &str = "objective:";

/// JSON object of plain keys and sections
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemConfig {
    config: Map<String, Value>,
}

impl SystemConfig {
    /// `~/nanofactory.json`, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_FILE_NAME))
    }

    pub fn from_json(text: &str) -> Result<Self, DomainError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DomainError::Config(format!("Invalid system configuration: {}", e)))?;
        match value {
            Value::Object(config) => Ok(Self { config }),
            _ => Err(DomainError::Config(
                "System configuration must be a JSON object".to_string(),
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Config(format!(
                "Cannot read system configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), keys = config.config.len(), "System configuration loaded");
        Ok(config)
    }

    /// Load from `path` or the default location
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, DomainError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path().ok_or_else(|| {
                    DomainError::Config("No home directory for the system configuration".to_string())
                })?;
                Self::load(&path)
            }
        }
    }

    /// Top level entries that are not sections
    pub fn keys(&self) -> Vec<&str> {
        self.config
            .iter()
            .filter(|(_, v)| !v.is_object())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn sections(&self) -> Vec<&str> {
        self.config
            .iter()
            .filter(|(_, v)| v.is_object())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn users(&self) -> Vec<&str> {
        self.prefixed(USER_PREFIX)
    }

    pub fn objectives(&self) -> Vec<&str> {
        self.prefixed(OBJECTIVE_PREFIX)
    }

    fn prefixed(&self, prefix: &str) -> Vec<&str> {
        self.config
            .keys()
            .filter_map(|k| k.strip_prefix(prefix))
            .collect()
    }

    fn keyed_section(&self, prefix: &str, what: &str, key: &str) -> Result<Map<String, Value>, DomainError> {
        let mut section = self
            .config
            .get(&format!("{}{}", prefix, key))
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| DomainError::Config(format!("Unknown {} '{}'!", what, key)))?;
        section.insert("key".to_string(), Value::String(key.to_string()));
        Ok(section)
    }

    /// User section with an added `key` entry
    pub fn user(&self, key: &str) -> Result<Map<String, Value>, DomainError> {
        self.keyed_section(USER_PREFIX, "user", key)
    }

    /// Objective section with an added `key` entry
    pub fn objective(&self, key: &str) -> Result<Map<String, Value>, DomainError> {
        self.keyed_section(OBJECTIVE_PREFIX, "objective", key)
    }

    pub fn value(&self, key: &str) -> Result<&Value, DomainError> {
        self.config
            .get(key)
            .filter(|v| !v.is_object())
            .ok_or_else(|| DomainError::Config(format!("Unknown attribute '{}'!", key)))
    }

    /// Copy of a plain section; missing sections are empty
    pub fn section(&self, name: &str) -> Map<String, Value> {
        self.config
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Author name and email of a user for container metadata
    pub fn author(&self, user: &str) -> Result<(Option<String>, Option<String>), DomainError> {
        let section = self.user(user)?;
        let text = |k: &str| section.get(k).and_then(Value::as_str).map(str::to_string);
        Ok((text("name"), text("email")))
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for SystemConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        let mut keys = self.keys();
        keys.sort_unstable();
        for key in keys {
            lines.push(format!("{} = {}", key, plain(&self.config[key])));
        }

        let mut sections = self.sections();
        sections.sort_unstable();
        for name in sections {
            lines.push(format!("[{}]", name));
            let section = self.section(name);
            let mut entries: Vec<_> = section.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                lines.push(format!("    {} = {}", key, plain(value)));
            }
        }
        write!(f, "{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "site": "Hannover",
        "version": 2,
        "camera": {"product": "mvBlueFOX3", "Gain": 0},
        "user:rc": {"name": "R. C.", "email": "rc@example.org"},
        "objective:zeiss-20x": {"cameraPitch": [[0.2, 0.0], [0.0, 0.2]], "cameraFocus": 10.0}
    }"#;

    #[test]
    fn test_keys_and_sections() {
        let config = SystemConfig::from_json(SAMPLE).unwrap();
        let mut keys = config.keys();
        keys.sort_unstable();
        assert_eq!(keys, vec!["site", "version"]);
        assert_eq!(config.sections().len(), 3);
        assert_eq!(config.users(), vec!["rc"]);
        assert_eq!(config.objectives(), vec!["zeiss-20x"]);
    }

    #[test]
    fn test_user_and_objective_get_key() {
        let config = SystemConfig::from_json(SAMPLE).unwrap();
        let user = config.user("rc").unwrap();
        assert_eq!(user["key"], "rc");
        assert_eq!(
            config.author("rc").unwrap(),
            (Some("R. C.".to_string()), Some("rc@example.org".to_string()))
        );
        assert_eq!(config.objective("zeiss-20x").unwrap()["cameraFocus"], 10.0);
        assert!(config.user("nobody").is_err());
        assert!(config.objective("zeiss-100x").is_err());
    }

    #[test]
    fn test_values_and_sections() {
        let config = SystemConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.value("site").unwrap(), "Hannover");
        assert!(config.value("camera").is_err());
        assert_eq!(config.section("camera")["product"], "mvBlueFOX3");
        assert!(config.section("dhm").is_empty());
    }

    #[test]
    fn test_display_is_sorted() {
        let config = SystemConfig::from_json(r#"{"b": 1, "a": "x", "s": {"z": 1, "y": "t"}}"#).unwrap();
        assert_eq!(config.to_string(), "a = x\nb = 1\n[s]\n    y = t\n    z = 1");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(SystemConfig::from_json("[1, 2]").is_err());
        assert!(SystemConfig::from_json("{").is_err());
    }
}
