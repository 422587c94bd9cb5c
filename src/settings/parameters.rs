//! Named parameters with defaults

use serde_json::{Map, Value};

use crate::domain::errors::DomainError;

/// Parameters of one component; only keys present in the defaults exist
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    params: Map<String, Value>,
}

impl ParameterSet {
    /// Start from `defaults` and apply `overrides`
    pub fn new(defaults: Map<String, Value>, overrides: Map<String, Value>) -> Result<Self, DomainError> {
        let mut set = Self { params: defaults };
        for (key, value) in overrides {
            set.set(&key, value)?;
        }
        Ok(set)
    }

    pub fn from_defaults(defaults: Map<String, Value>) -> Self {
        Self { params: defaults }
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), DomainError> {
        match self.params.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DomainError::Config(format!("Unknown item {}!", key))),
        }
    }

    pub fn get(&self, key: &str) -> Result<&Value, DomainError> {
        self.params
            .get(key)
            .ok_or_else(|| DomainError::Config(format!("Unknown item {}!", key)))
    }

    pub fn f64(&self, key: &str) -> Result<f64, DomainError> {
        self.get(key)?
            .as_f64()
            .ok_or_else(|| DomainError::Config(format!("Item {} is not a number", key)))
    }

    pub fn str(&self, key: &str) -> Result<&str, DomainError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| DomainError::Config(format!("Item {} is not a string", key)))
    }

    /// Copy of all parameters
    pub fn parameters(&self) -> Map<String, Value> {
        self.params.clone()
    }
}

/// Remove the named sections from an argument map, missing ones become empty
pub fn pop_sections(args: &mut Map<String, Value>, sections: &[&str]) -> Map<String, Value> {
    sections
        .iter()
        .map(|&name| {
            let section = args
                .remove(name)
                .unwrap_or_else(|| Value::Object(Map::new()));
            (name.to_string(), section)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> Map<String, Value> {
        match json!({"dzCoarseDefault": 100.0, "dzFineDefault": 10.0}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = Map::new();
        overrides.insert("dzFineDefault".to_string(), json!(5.0));
        let set = ParameterSet::new(defaults(), overrides).unwrap();
        assert_eq!(set.f64("dzFineDefault").unwrap(), 5.0);
        assert_eq!(set.f64("dzCoarseDefault").unwrap(), 100.0);
        assert_eq!(set.parameters().len(), 2);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut overrides = Map::new();
        overrides.insert("speed".to_string(), json!(1.0));
        assert!(ParameterSet::new(defaults(), overrides).is_err());
        assert!(ParameterSet::from_defaults(defaults()).get("speed").is_err());
    }

    #[test]
    fn test_pop_sections() {
        let mut args = match json!({"plane": {"dzFineDefault": 5.0}, "other": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let popped = pop_sections(&mut args, &["plane", "layer"]);
        assert_eq!(popped["plane"]["dzFineDefault"], 5.0);
        assert_eq!(popped["layer"], json!({}));
        assert!(!args.contains_key("plane"));
        assert!(args.contains_key("other"));
    }
}
