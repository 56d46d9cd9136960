//! Module implementing the populations of a connectome, i.e., areas and stimuli.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ConnectomeError;
use crate::{DEFAULT_AREA_BETA, DEFAULT_STIMULUS_BETA};

fn validate_size(name: &str, n: usize) -> Result<(), ConnectomeError> {
    if n == 0 {
        return Err(ConnectomeError::InvalidParameter(format!(
            "population {} must have a positive number of neurons",
            name
        )));
    }
    Ok(())
}

fn validate_beta(name: &str, beta: f64) -> Result<(), ConnectomeError> {
    if !(0.0..=1.0).contains(&beta) {
        return Err(ConnectomeError::InvalidParameter(format!(
            "plasticity rate of {} must be in [0, 1], got {}",
            name, beta
        )));
    }
    Ok(())
}

/// The serialized form of an [`Area`], validated on conversion.
#[derive(Deserialize)]
struct AreaRecord {
    name: String,
    n: usize,
    k: usize,
    beta: f64,
    #[serde(default)]
    winners: Vec<usize>,
    #[serde(default)]
    support: BTreeSet<usize>,
}

impl TryFrom<AreaRecord> for Area {
    type Error = ConnectomeError;

    fn try_from(record: AreaRecord) -> Result<Self, Self::Error> {
        let mut area = Area::build(record.name, record.n, record.k, record.beta)?;
        if let Some(neuron) = record.support.iter().find(|&&neuron| neuron >= area.n) {
            return Err(ConnectomeError::InvalidParameter(format!(
                "neuron {} out of bounds for {} with {} neurons",
                neuron, area.name, area.n
            )));
        }
        if !record.winners.is_empty() {
            area.check_winners(&record.winners)?;
        }
        area.support = record.support;
        area.replace_winners(record.winners);
        Ok(area)
    }
}

/// A population of neurons with a fixed winner cap.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(try_from = "AreaRecord")]
pub struct Area {
    name: String,
    n: usize,
    k: usize,
    beta: f64,
    /// The currently active neurons, sorted by index.
    #[serde(default)]
    winners: Vec<usize>,
    /// All neurons that have ever been winners.
    #[serde(default)]
    support: BTreeSet<usize>,
}

impl Area {
    /// Create a new area with the specified parameters.
    /// Returns an error if `n` is zero, if `k` is not in `[1, n]`, or if `beta` is not in `[0, 1]`.
    pub fn build(name: impl Into<String>, n: usize, k: usize, beta: f64) -> Result<Self, ConnectomeError> {
        let name = name.into();
        validate_size(&name, n)?;
        if k == 0 || k > n {
            return Err(ConnectomeError::InvalidParameter(format!(
                "cap of area {} must be in [1, {}], got {}",
                name, n, k
            )));
        }
        validate_beta(&name, beta)?;

        Ok(Area {
            name,
            n,
            k,
            beta,
            winners: vec![],
            support: BTreeSet::new(),
        })
    }

    /// Create a new area with cap `floor(sqrt(n))` and the default plasticity rate (see DEFAULT_AREA_BETA).
    pub fn with_default_cap(name: impl Into<String>, n: usize) -> Result<Self, ConnectomeError> {
        let k = ((n as f64).sqrt().floor() as usize).max(1);
        Area::build(name, n, k, DEFAULT_AREA_BETA)
    }

    /// Returns the name of the area.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of neurons in the area.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Returns the winner cap of the area.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the plasticity rate of the area.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Returns the current winners, sorted by neuron index. Empty before the first firing.
    pub fn winners(&self) -> &[usize] {
        &self.winners
    }

    /// Returns the neurons that have been winners at least once.
    pub fn support(&self) -> &BTreeSet<usize> {
        &self.support
    }

    /// Returns true if the area has been selected as a destination (or activated) at least once.
    pub fn has_fired(&self) -> bool {
        !self.winners.is_empty()
    }

    /// Returns an error unless the neurons are exactly `k` distinct neurons of the area.
    pub fn check_winners(&self, neurons: &[usize]) -> Result<(), ConnectomeError> {
        let unique: BTreeSet<usize> = neurons.iter().copied().collect();
        if unique.len() != neurons.len() || neurons.len() != self.k {
            return Err(ConnectomeError::InvalidParameter(format!(
                "{} needs exactly {} distinct winners",
                self.name, self.k
            )));
        }
        if let Some(neuron) = unique.iter().find(|&&neuron| neuron >= self.n) {
            return Err(ConnectomeError::InvalidParameter(format!(
                "neuron {} out of bounds for {} with {} neurons",
                neuron, self.name, self.n
            )));
        }
        Ok(())
    }

    /// Replace the winners of the area. The caller guarantees exactly `k` distinct in-range neurons.
    pub(crate) fn replace_winners(&mut self, mut winners: Vec<usize>) {
        winners.sort_unstable();
        self.support.extend(winners.iter().copied());
        self.winners = winners;
    }
}

#[derive(Deserialize)]
struct StimulusRecord {
    name: String,
    n: usize,
    beta: f64,
}

impl TryFrom<StimulusRecord> for Stimulus {
    type Error = ConnectomeError;

    fn try_from(record: StimulusRecord) -> Result<Self, Self::Error> {
        Stimulus::build(record.name, record.n, record.beta)
    }
}

/// A fixed external input; all its neurons are active whenever it fires.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(try_from = "StimulusRecord")]
pub struct Stimulus {
    name: String,
    n: usize,
    beta: f64,
}

impl Stimulus {
    /// Create a new stimulus with the specified parameters.
    /// Returns an error if `n` is zero or if `beta` is not in `[0, 1]`.
    pub fn build(name: impl Into<String>, n: usize, beta: f64) -> Result<Self, ConnectomeError> {
        let name = name.into();
        validate_size(&name, n)?;
        validate_beta(&name, beta)?;
        Ok(Stimulus { name, n, beta })
    }

    /// Create a new stimulus with the default plasticity rate (see DEFAULT_STIMULUS_BETA).
    pub fn with_default_beta(name: impl Into<String>, n: usize) -> Result<Self, ConnectomeError> {
        Stimulus::build(name, n, DEFAULT_STIMULUS_BETA)
    }

    /// Returns the name of the stimulus.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of neurons in the stimulus.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Returns the plasticity rate of the stimulus.
    pub fn beta(&self) -> f64 {
        self.beta
    }
}

/// A population taking part in firings, either as a source or as a destination (areas only).
/// Deserialization goes through the validating constructors of [`Area`] and [`Stimulus`].
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Population {
    Area(Area),
    Stimulus(Stimulus),
}

impl Population {
    pub fn name(&self) -> &str {
        match self {
            Population::Area(area) => area.name(),
            Population::Stimulus(stimulus) => stimulus.name(),
        }
    }

    pub fn n(&self) -> usize {
        match self {
            Population::Area(area) => area.n(),
            Population::Stimulus(stimulus) => stimulus.n(),
        }
    }

    pub fn beta(&self) -> f64 {
        match self {
            Population::Area(area) => area.beta(),
            Population::Stimulus(stimulus) => stimulus.beta(),
        }
    }

    pub fn as_area(&self) -> Option<&Area> {
        match self {
            Population::Area(area) => Some(area),
            Population::Stimulus(_) => None,
        }
    }

    pub(crate) fn as_area_mut(&mut self) -> Option<&mut Area> {
        match self {
            Population::Area(area) => Some(area),
            Population::Stimulus(_) => None,
        }
    }

    /// Returns the neurons projecting activity when the population fires.
    /// A stimulus projects all its neurons, an area its current winners.
    pub fn active_neurons(&self) -> Vec<usize> {
        match self {
            Population::Area(area) => area.winners().to_vec(),
            Population::Stimulus(stimulus) => (0..stimulus.n()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_build() {
        let area = Area::build("A", 100, 10, 0.05).unwrap();
        assert_eq!(area.name(), "A");
        assert_eq!(area.n(), 100);
        assert_eq!(area.k(), 10);
        assert_eq!(area.beta(), 0.05);
        assert!(area.winners().is_empty());
        assert!(!area.has_fired());
    }

    #[test]
    fn test_area_build_invalid() {
        assert!(matches!(
            Area::build("A", 0, 1, 0.05),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            Area::build("A", 10, 11, 0.05),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            Area::build("A", 10, 0, 0.05),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            Area::build("A", 10, 5, 1.5),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            Area::build("A", 10, 5, f64::NAN),
            Err(ConnectomeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_area_default_cap() {
        let area = Area::with_default_cap("A", 10_000).unwrap();
        assert_eq!(area.k(), 100);
        assert_eq!(area.beta(), DEFAULT_AREA_BETA);

        let area = Area::with_default_cap("B", 3).unwrap();
        assert_eq!(area.k(), 1);
    }

    #[test]
    fn test_replace_winners() {
        let mut area = Area::build("A", 10, 3, 0.1).unwrap();
        area.replace_winners(vec![7, 2, 5]);
        assert_eq!(area.winners(), &[2, 5, 7]);
        area.replace_winners(vec![1, 2, 3]);
        assert_eq!(area.winners(), &[1, 2, 3]);
        assert_eq!(area.support().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 5, 7]);
    }

    #[test]
    fn test_stimulus_build() {
        let stimulus = Stimulus::with_default_beta("S", 5).unwrap();
        assert_eq!(stimulus.n(), 5);
        assert_eq!(stimulus.beta(), DEFAULT_STIMULUS_BETA);
        assert!(matches!(
            Stimulus::build("S", 0, 0.1),
            Err(ConnectomeError::InvalidParameter(_))
        ));
        assert!(matches!(
            Stimulus::build("S", 3, -0.1),
            Err(ConnectomeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let mut area = Area::build("A", 10, 2, 0.1).unwrap();
        area.replace_winners(vec![4, 1]);
        let json = serde_json::to_string(&Population::Area(area.clone())).unwrap();
        assert_eq!(serde_json::from_str::<Population>(&json).unwrap(), Population::Area(area));

        let area: Area = serde_json::from_str(r#"{ "name": "A", "n": 10, "k": 2, "beta": 0.1 }"#).unwrap();
        assert!(!area.has_fired());

        for json in [
            r#"{ "name": "A", "n": 10, "k": 11, "beta": 0.1 }"#,
            r#"{ "name": "A", "n": 0, "k": 0, "beta": 0.1 }"#,
            r#"{ "name": "A", "n": 10, "k": 2, "beta": 1.5 }"#,
            r#"{ "name": "A", "n": 10, "k": 2, "beta": 0.1, "winners": [1] }"#,
            r#"{ "name": "A", "n": 10, "k": 2, "beta": 0.1, "winners": [1, 1] }"#,
            r#"{ "name": "A", "n": 10, "k": 2, "beta": 0.1, "winners": [1, 10] }"#,
            r#"{ "name": "A", "n": 10, "k": 2, "beta": 0.1, "support": [12] }"#,
        ] {
            assert!(serde_json::from_str::<Area>(json).is_err(), "{}", json);
        }

        assert!(serde_json::from_str::<Stimulus>(r#"{ "name": "S", "n": 0, "beta": 0.1 }"#).is_err());
        assert!(serde_json::from_str::<Population>(r#"{ "Stimulus": { "name": "S", "n": 3, "beta": -1.0 } }"#).is_err());
        assert!(serde_json::from_str::<Population>(r#"{ "Stimulus": { "name": "S", "n": 3, "beta": 0.5 } }"#).is_ok());
    }

    #[test]
    fn test_check_winners() {
        let area = Area::build("A", 10, 3, 0.1).unwrap();
        assert!(area.check_winners(&[9, 0, 4]).is_ok());
        assert!(area.check_winners(&[0, 1]).is_err());
        assert!(area.check_winners(&[0, 1, 1]).is_err());
        assert!(area.check_winners(&[0, 1, 10]).is_err());
    }

    #[test]
    fn test_active_neurons() {
        let stimulus = Population::Stimulus(Stimulus::build("S", 3, 0.1).unwrap());
        assert_eq!(stimulus.active_neurons(), vec![0, 1, 2]);
        assert!(stimulus.as_area().is_none());

        let mut area = Area::build("A", 10, 2, 0.1).unwrap();
        area.replace_winners(vec![4, 1]);
        let area = Population::Area(area);
        assert_eq!(area.active_neurons(), vec![1, 4]);
        assert_eq!(area.name(), "A");
    }
}
