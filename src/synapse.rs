//! Sparse storage of the realized connectivity of a connectome.
//!
//! Connectivity is organized per destination population. Each destination keeps one [`Tract`]
//! per source population and the set of its explored neurons, i.e., neurons with at least one
//! decided incoming contact. A contact between two neurons is decided at most once: either a
//! synapse exists (with a weight of at least 1.0) or it is known to be absent.
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::sampler::ActiveSource;
use crate::INITIAL_WEIGHT;

/// The state of the (potential) connection between a source neuron and a destination neuron.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum Contact {
    /// The connection has not been drawn yet.
    Unsampled,
    /// The connection has been drawn and does not exist.
    Absent,
    /// The connection exists with the given weight.
    Synapse(f64),
}

impl Contact {
    /// Returns the weight of the synapse, if any.
    pub fn weight(&self) -> Option<f64> {
        match self {
            Contact::Synapse(weight) => Some(*weight),
            _ => None,
        }
    }
}

/// The decided contacts from one source population into one destination population.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tract {
    /// Keyed by (source neuron, destination neuron); `None` marks an absent connection.
    contacts: HashMap<(usize, usize), Option<f64>>,
}

impl Tract {
    pub fn contact(&self, source: usize, target: usize) -> Contact {
        match self.contacts.get(&(source, target)) {
            None => Contact::Unsampled,
            Some(None) => Contact::Absent,
            Some(Some(weight)) => Contact::Synapse(*weight),
        }
    }

    /// Record the outcome of a draw, unless the contact was already decided.
    /// Returns the weight the contact contributes (0.0 if absent).
    pub fn decide(&mut self, source: usize, target: usize, exists: bool) -> f64 {
        match self.contacts.entry((source, target)) {
            Entry::Occupied(entry) => entry.get().unwrap_or(0.0),
            Entry::Vacant(entry) => {
                let weight = exists.then_some(INITIAL_WEIGHT);
                entry.insert(weight);
                weight.unwrap_or(0.0)
            }
        }
    }

    /// A mutable reference to the weight of an existing synapse.
    pub fn weight_mut(&mut self, source: usize, target: usize) -> Option<&mut f64> {
        self.contacts
            .get_mut(&(source, target))
            .and_then(|weight| weight.as_mut())
    }

    /// The number of materialized synapses.
    pub fn num_synapses(&self) -> usize {
        self.contacts.values().filter(|weight| weight.is_some()).count()
    }

    /// The number of decided contacts, present or absent.
    pub fn num_contacts(&self) -> usize {
        self.contacts.len()
    }
}

/// An upper bound on the input of every never-explored neuron, valid for one active input set.
#[derive(Debug, Clone, PartialEq)]
struct InputCeiling {
    sources: Vec<ActiveSource>,
    ceiling: usize,
}

/// The connectivity into one destination population.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DestinationStore {
    tracts: BTreeMap<String, Tract>,
    explored: BTreeSet<usize>,
    ceiling: Option<InputCeiling>,
}

impl DestinationStore {
    pub fn tract(&self, source: &str) -> Option<&Tract> {
        self.tracts.get(source)
    }

    /// A mutable reference to the tract from the given source, created on first access.
    pub fn tract_mut(&mut self, source: &str) -> &mut Tract {
        self.tracts.entry(source.to_string()).or_default()
    }

    pub fn tracts_iter(&self) -> impl Iterator<Item = (&String, &Tract)> + '_ {
        self.tracts.iter()
    }

    /// The explored neurons, sorted by index.
    pub fn explored(&self) -> &BTreeSet<usize> {
        &self.explored
    }

    pub fn is_explored(&self, neuron: usize) -> bool {
        self.explored.contains(&neuron)
    }

    pub fn mark_explored(&mut self, neuron: usize) {
        self.explored.insert(neuron);
    }

    /// The first `count` neurons (in index order) of a population of size `n` that are not explored yet.
    pub fn lowest_unexplored(&self, n: usize, count: usize) -> Vec<usize> {
        (0..n)
            .filter(|neuron| !self.explored.contains(neuron))
            .take(count)
            .collect()
    }

    pub fn num_synapses(&self) -> usize {
        self.tracts.values().map(|tract| tract.num_synapses()).sum()
    }

    /// The largest input a never-explored neuron can receive from exactly these active sources,
    /// if a previous firing of the same sources bounded it.
    pub fn input_ceiling(&self, sources: &[ActiveSource]) -> Option<usize> {
        self.ceiling
            .as_ref()
            .filter(|record| record.sources == sources)
            .map(|record| record.ceiling)
    }

    /// Record that every never-explored neuron receives at most `ceiling` inputs from these active sources.
    /// A bound for another active input set is forgotten.
    pub fn bound_inputs(&mut self, sources: &[ActiveSource], ceiling: usize) {
        let ceiling = self.input_ceiling(sources).map_or(ceiling, |known| known.min(ceiling));
        self.ceiling = Some(InputCeiling {
            sources: sources.to_vec(),
            ceiling,
        });
    }
}

/// All the realized connectivity of a connectome, partitioned by destination population.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SynapseStore {
    destinations: BTreeMap<String, DestinationStore>,
}

impl SynapseStore {
    pub fn new() -> Self {
        SynapseStore::default()
    }

    /// Register an (empty) destination partition. Does nothing if it already exists.
    pub fn add_destination(&mut self, name: &str) {
        self.destinations.entry(name.to_string()).or_default();
    }

    pub fn destination(&self, name: &str) -> Option<&DestinationStore> {
        self.destinations.get(name)
    }

    pub fn destination_mut(&mut self, name: &str) -> Option<&mut DestinationStore> {
        self.destinations.get_mut(name)
    }

    /// Exclusive references to the partitions of the given destinations, in name order.
    pub fn destinations_mut<'a>(
        &'a mut self,
        names: &BTreeSet<&str>,
    ) -> Vec<(&'a String, &'a mut DestinationStore)> {
        self.destinations
            .iter_mut()
            .filter(|(name, _)| names.contains(name.as_str()))
            .collect()
    }

    /// The state of the connection from a source neuron to a destination neuron.
    pub fn contact(&self, source: &str, source_neuron: usize, destination: &str, target_neuron: usize) -> Contact {
        self.destinations
            .get(destination)
            .and_then(|store| store.tract(source))
            .map_or(Contact::Unsampled, |tract| tract.contact(source_neuron, target_neuron))
    }

    /// The total number of materialized synapses.
    pub fn num_synapses(&self) -> usize {
        self.destinations.values().map(|store| store.num_synapses()).sum()
    }
}
