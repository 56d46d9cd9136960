//! Hebbian plasticity applied after each firing.
use serde::{Deserialize, Serialize};

use crate::error::ConnectomeError;
use crate::sampler::ActiveSource;
use crate::synapse::DestinationStore;
use crate::INITIAL_WEIGHT;

/// The weight growth rule for synapses feeding a new winner.
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PlasticityRule {
    /// Multiply the weight by `1 + beta`, without limit.
    #[default]
    Unbounded,
    /// Multiply the weight by `1 + beta`, saturating at `max_weight`.
    Bounded { max_weight: f64 },
}

impl PlasticityRule {
    /// Returns an error if the rule is ill-defined, e.g., a saturation weight below the initial weight.
    pub fn validate(&self) -> Result<(), ConnectomeError> {
        match self {
            PlasticityRule::Unbounded => Ok(()),
            PlasticityRule::Bounded { max_weight } => {
                if *max_weight >= INITIAL_WEIGHT {
                    Ok(())
                } else {
                    Err(ConnectomeError::InvalidParameter(format!(
                        "maximum weight must be at least {}, got {}",
                        INITIAL_WEIGHT, max_weight
                    )))
                }
            }
        }
    }

    /// The weight after one potentiation with rate `beta`. Never smaller than the current weight.
    pub fn potentiate(&self, weight: f64, beta: f64) -> f64 {
        let grown = weight * (1.0 + beta);
        match self {
            PlasticityRule::Unbounded => grown,
            PlasticityRule::Bounded { max_weight } => grown.min(*max_weight).max(weight),
        }
    }

    /// Potentiate every synapse from an active source neuron into one of the winners.
    /// Synapses into other neurons, or from inactive neurons, are left untouched.
    /// Returns the number of potentiated synapses.
    pub fn strengthen(
        &self,
        store: &mut DestinationStore,
        sources: &[ActiveSource],
        winners: &[usize],
        beta: f64,
    ) -> usize {
        let mut num_potentiated = 0;
        for source in sources {
            let tract = store.tract_mut(&source.name);
            for &target in winners {
                for &source_neuron in source.neurons.iter() {
                    if let Some(weight) = tract.weight_mut(source_neuron, target) {
                        *weight = self.potentiate(*weight, beta);
                        num_potentiated += 1;
                    }
                }
            }
        }
        num_potentiated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::Contact;

    #[test]
    fn test_potentiate() {
        assert_eq!(PlasticityRule::Unbounded.potentiate(1.0, 0.5), 1.5);
        assert_eq!(PlasticityRule::Unbounded.potentiate(2.0, 0.0), 2.0);

        let rule = PlasticityRule::Bounded { max_weight: 1.2 };
        assert_eq!(rule.potentiate(1.0, 0.5), 1.2);
        assert_eq!(rule.potentiate(1.5, 0.5), 1.5);
    }

    #[test]
    fn test_validate() {
        assert!(PlasticityRule::Unbounded.validate().is_ok());
        assert!(PlasticityRule::Bounded { max_weight: 2.0 }.validate().is_ok());
        assert!(matches!(
            PlasticityRule::Bounded { max_weight: 0.5 }.validate(),
            Err(ConnectomeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_strengthen_only_active_into_winners() {
        let mut store = DestinationStore::default();
        let tract = store.tract_mut("S");
        tract.decide(0, 0, true);
        tract.decide(1, 0, true);
        tract.decide(0, 1, true);
        tract.decide(2, 0, false);

        let sources = vec![ActiveSource::new("S", vec![0, 2])];
        let num = PlasticityRule::Unbounded.strengthen(&mut store, &sources, &[0], 0.1);
        assert_eq!(num, 1);

        let tract = store.tract("S").unwrap();
        assert_eq!(tract.contact(0, 0), Contact::Synapse(1.1));
        // inactive source neuron
        assert_eq!(tract.contact(1, 0), Contact::Synapse(1.0));
        // not a winner
        assert_eq!(tract.contact(0, 1), Contact::Synapse(1.0));
        assert_eq!(tract.contact(2, 0), Contact::Absent);
    }
}
