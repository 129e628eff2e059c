use std::{collections::HashMap, path::Path};

use anyhow::{anyhow, Context, Result};
use hocon::{Hocon, HoconLoader};

use crate::scoped_env_key;

/// Reads settings from a HOCON document, first from the named scope and then from the root.
/// Environment variables named `<SCOPE>_<NAME>` take precedence over both.
#[derive(Debug)]
pub struct ConfigLoader {
    hocon: Hocon,
    env: HashMap<String, String>,
    scope: String,
}

impl ConfigLoader {
    pub fn new(path: impl AsRef<Path>, scope: String) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(anyhow!("The config file {:?} was not found", path));
        }

        let hocon = HoconLoader::new()
            .load_file(path)
            .with_context(|| format!("Failed to find or load config file at: {:?}", path))?
            .hocon()?;

        Ok(Self::from_hocon(hocon, scope))
    }

    pub fn from_hocon_str(config: &str, scope: String) -> Result<Self> {
        let hocon = HoconLoader::new()
            .load_str(config)
            .context("Failed to parse config")?
            .hocon()?;

        Ok(Self::from_hocon(hocon, scope))
    }

    fn from_hocon(hocon: Hocon, scope: String) -> Self {
        let env = std::env::vars().collect::<HashMap<_, _>>();

        Self { hocon, env, scope }
    }

    /// Replaces the captured process environment.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.env.get(&scoped_env_key(&self.scope, name)) {
            return Some(Value::String(value.clone()));
        }

        let scope = &self.hocon[self.scope.as_str()];
        if matches!(scope, Hocon::Hash(_)) {
            if let Some(value) = Self::map_hocon(scope, name) {
                return Some(value);
            }
        }

        Self::map_hocon(&self.hocon, name)
    }

    pub fn load<T: Config>(&self) -> Result<T> {
        let res = T::load(self)?;
        Ok(res)
    }

    fn map_hocon(hocon: &Hocon, name: &str) -> Option<Value> {
        match &hocon[name] {
            Hocon::Real(f64) => Some(Value::Float(*f64)),
            Hocon::Integer(i64) => Some(Value::Integer(*i64)),
            Hocon::String(string) => Some(Value::String(string.clone())),
            Hocon::Boolean(bool) => Some(Value::Boolean(*bool)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(val) => Some(*val),
            Value::String(val) => val.parse::<bool>().ok(),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Integer(val) => usize::try_from(*val).ok(),
            Value::String(val) => val.parse::<usize>().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(val) => u64::try_from(*val).ok(),
            Value::String(val) => val.parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(val) => Some(*val),
            Value::Integer(val) => Some(*val as f64),
            Value::String(val) => val.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(val) => Some(val.clone()),
            Value::Boolean(val) => Some(val.to_string()),
            Value::Float(val) => Some(val.to_string()),
            Value::Integer(val) => Some(val.to_string()),
        }
    }
}

pub trait Config {
    fn load(config: &ConfigLoader) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
        consumer_delay_ms = 5
        harness {
            capacity_power = 12
            label = "segments"
        }
        other {
            capacity_power = 3
        }
    "#;

    #[test]
    fn scope_takes_precedence_over_root() {
        let config = ConfigLoader::from_hocon_str(CONFIG, "harness".to_string())
            .unwrap()
            .with_env(HashMap::new());

        assert_eq!(config.get("capacity_power").and_then(|v| v.as_usize()), Some(12));
        assert_eq!(config.get("consumer_delay_ms").and_then(|v| v.as_u64()), Some(5));
        assert_eq!(
            config.get("label").and_then(|v| v.as_string()),
            Some("segments".to_string())
        );
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn environment_overrides_file() {
        let env = HashMap::from([("HARNESS_CAPACITY_POWER".to_string(), "7".to_string())]);
        let config = ConfigLoader::from_hocon_str(CONFIG, "harness".to_string())
            .unwrap()
            .with_env(env);

        assert_eq!(config.get("capacity_power").and_then(|v| v.as_usize()), Some(7));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = ConfigLoader::new(file.path(), "other".to_string())
            .unwrap()
            .with_env(HashMap::new());

        assert_eq!(config.scope(), "other");
        assert_eq!(config.get("capacity_power").and_then(|v| v.as_usize()), Some(3));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ConfigLoader::new("./does/not/exist.conf", "harness".to_string()).is_err());
    }

    #[test]
    fn negative_integers_do_not_convert_to_unsigned() {
        assert_eq!(Value::Integer(-1).as_usize(), None);
        assert_eq!(Value::String("true".to_string()).as_bool(), Some(true));
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
    }
}
