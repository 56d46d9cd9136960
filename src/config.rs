//! Configuration of a connectome.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::ConnectomeError;
use crate::plasticity::PlasticityRule;
use crate::DEFAULT_EAGER_THRESHOLD;

fn default_eager_threshold() -> usize {
    DEFAULT_EAGER_THRESHOLD
}

/// Parameters shared by all populations of a connectome.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ConnectomeConfig {
    /// The connection probability between any two neurons.
    pub p: f64,
    /// Population pairs where both sides have at most this many neurons are sampled densely on initialization.
    #[serde(default = "default_eager_threshold")]
    pub eager_threshold: usize,
    /// The weight growth rule.
    #[serde(default)]
    pub plasticity: PlasticityRule,
}

impl ConnectomeConfig {
    /// Create a new configuration with the default eager threshold and unbounded plasticity.
    pub fn new(p: f64) -> Self {
        ConnectomeConfig {
            p,
            eager_threshold: DEFAULT_EAGER_THRESHOLD,
            plasticity: PlasticityRule::default(),
        }
    }

    pub fn with_eager_threshold(mut self, eager_threshold: usize) -> Self {
        self.eager_threshold = eager_threshold;
        self
    }

    pub fn with_plasticity(mut self, plasticity: PlasticityRule) -> Self {
        self.plasticity = plasticity;
        self
    }

    /// Returns an error if the connection probability is not in (0, 1] or the plasticity rule is ill-defined.
    pub fn validate(&self) -> Result<(), ConnectomeError> {
        if !(self.p > 0.0 && self.p <= 1.0) {
            return Err(ConnectomeError::InvalidParameter(format!(
                "connection probability must be in (0, 1], got {}",
                self.p
            )));
        }
        self.plasticity.validate()
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConnectomeError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a configuration from a JSON file. The configuration is validated.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConnectomeError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: ConnectomeConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate() {
        assert!(ConnectomeConfig::new(0.01).validate().is_ok());
        assert!(ConnectomeConfig::new(1.0).validate().is_ok());
        assert!(ConnectomeConfig::new(0.0).validate().is_err());
        assert!(ConnectomeConfig::new(1.01).validate().is_err());
        assert!(ConnectomeConfig::new(0.1)
            .with_plasticity(PlasticityRule::Bounded { max_weight: 0.0 })
            .validate()
            .is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = ConnectomeConfig::new(0.05)
            .with_eager_threshold(10)
            .with_plasticity(PlasticityRule::Bounded { max_weight: 4.0 });
        config.save_to(&path).unwrap();
        assert_eq!(ConnectomeConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "p": 0.01 }"#).unwrap();

        let config = ConnectomeConfig::load_from(&path).unwrap();
        assert_eq!(config, ConnectomeConfig::new(0.01));
    }

    #[test]
    fn test_load_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "p": 2.0 }"#).unwrap();
        assert!(matches!(
            ConnectomeConfig::load_from(&path),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            ConnectomeConfig::load_from(dir.path().join("missing.json")),
            Err(ConnectomeError::IOError(_))
        ));
    }
}
