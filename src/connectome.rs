//! The connectome: populations, their realized connectivity, and the firing dynamics.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ConnectomeConfig;
use crate::error::ConnectomeError;
use crate::plasticity::PlasticityRule;
use crate::population::{Area, Population, Stimulus};
use crate::sampler::{num_active, ActiveSource, ConnectivitySampler};
use crate::selector::{Candidate, KCap, Origin};
use crate::synapse::{Contact, DestinationStore, SynapseStore};
use crate::MIN_PARALLEL_DESTINATIONS;

/// Which destination areas each source population projects into during a firing.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Projection {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl Projection {
    pub fn new() -> Self {
        Projection::default()
    }

    /// Add destinations to a source. Repeated destinations are ignored.
    pub fn add<I, T>(mut self, source: impl Into<String>, destinations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.map
            .entry(source.into())
            .or_default()
            .extend(destinations.into_iter().map(Into::into));
        self
    }

    /// An iterator over the sources and their destinations, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> + '_ {
        self.map.iter()
    }

    /// The sources of every destination, sorted by name.
    pub fn sources_by_destination(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut inverted: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (source, destinations) in self.map.iter() {
            for destination in destinations.iter() {
                inverted.entry(destination.as_str()).or_default().push(source.as_str());
            }
        }
        inverted
    }
}

impl<S, I, T> FromIterator<(S, I)> for Projection
where
    S: Into<String>,
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    fn from_iter<It: IntoIterator<Item = (S, I)>>(iter: It) -> Self {
        iter.into_iter()
            .fold(Projection::new(), |projection, (source, destinations)| {
                projection.add(source, destinations)
            })
    }
}

/// Everything needed to fire into one destination area, independently of the others.
#[derive(Debug)]
struct Job {
    destination: String,
    n: usize,
    k: usize,
    beta: f64,
    sources: Vec<ActiveSource>,
    seed: u64,
}

/// The largest integer input strictly below the input of the last winner.
/// Never-explored neurons that lost a firing received at most that many inputs.
fn ceiling_below(input: f64) -> usize {
    if input > 0.0 {
        (input.ceil() as usize).saturating_sub(1)
    } else {
        0
    }
}

/// Compute the new winners of one destination. Contacts drawn on the way are recorded in the store.
fn fire_destination(
    sampler: &ConnectivitySampler,
    job: &Job,
    store: &mut DestinationStore,
) -> Result<Vec<usize>, ConnectomeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(job.seed);
    let num_explored_before = store.explored().len();

    let winners: Vec<usize> = if job.k >= job.n {
        // Every neuron wins: all contacts with the active inputs are drawn, no selection needed.
        (0..job.n).for_each(|neuron| store.mark_explored(neuron));
        sampler.explicit_inputs(store, &job.sources, &mut rng);
        (0..job.n).collect()
    } else {
        let cap = KCap::new(job.k);
        let explored: Vec<Candidate> = sampler
            .explicit_inputs(store, &job.sources, &mut rng)
            .into_iter()
            .map(|(neuron, input)| Candidate::explored(neuron, input))
            .collect();

        let floor = cap.boundary(&explored);
        let ceiling = store.input_ceiling(&job.sources);
        let inputs = sampler.never_explored_inputs(
            job.n - explored.len(),
            num_active(&job.sources),
            job.k,
            floor,
            ceiling,
            &mut rng,
        )?;
        // Never-explored neurons are exchangeable: the largest inputs go to the lowest indices.
        let fresh: Vec<Candidate> = store
            .lowest_unexplored(job.n, inputs.len())
            .into_iter()
            .zip(inputs)
            .map(|(neuron, input)| Candidate::never_explored(neuron, input as f64))
            .collect();
        log::trace!(
            "{}: {} explored candidates (boundary {}), {} never-explored candidates (ceiling {:?})",
            job.destination,
            explored.len(),
            floor,
            fresh.len(),
            ceiling
        );

        let selected = cap.select(explored.into_iter().chain(fresh));
        if let Some(last) = selected.last() {
            store.bound_inputs(&job.sources, ceiling_below(last.input));
        }
        for candidate in selected.iter().filter(|c| c.origin == Origin::NeverExplored) {
            sampler.materialize(
                store,
                &job.sources,
                candidate.neuron,
                candidate.input as usize,
                &mut rng,
            )?;
        }
        selected.into_iter().map(|candidate| candidate.neuron).collect()
    };

    if winners.len() != job.k {
        return Err(ConnectomeError::InvalidParameter(format!(
            "selected {} winners in {} instead of {}",
            winners.len(),
            job.destination,
            job.k
        )));
    }

    log::debug!(
        "{}: {} winners, {} newly explored neurons",
        job.destination,
        winners.len(),
        store.explored().len() - num_explored_before
    );
    Ok(winners)
}

/// Potentiate the synapses from the active sources of a job into its winners.
fn potentiate_destination(rule: &PlasticityRule, job: &Job, winners: &[usize], store: &mut DestinationStore) {
    let num_potentiated = rule.strengthen(store, &job.sources, winners, job.beta);
    log::debug!("{}: {} potentiated synapses", job.destination, num_potentiated);
}

/// A network of areas and stimuli connected by sparse, plastic, random synapses.
#[derive(Debug, Clone)]
pub struct Connectome {
    config: ConnectomeConfig,
    sampler: ConnectivitySampler,
    populations: BTreeMap<String, Population>,
    store: SynapseStore,
}

impl Connectome {
    /// Create an empty connectome from a configuration.
    /// Returns an error if the configuration is invalid.
    pub fn build(config: ConnectomeConfig) -> Result<Self, ConnectomeError> {
        config.validate()?;
        let sampler = ConnectivitySampler::build(config.p)?;
        Ok(Connectome {
            config,
            sampler,
            populations: BTreeMap::new(),
            store: SynapseStore::new(),
        })
    }

    /// Create an empty connectome with connection probability `p` and the default configuration.
    pub fn new(p: f64) -> Result<Self, ConnectomeError> {
        Connectome::build(ConnectomeConfig::new(p))
    }

    pub fn config(&self) -> &ConnectomeConfig {
        &self.config
    }

    /// Returns the connection probability.
    pub fn p(&self) -> f64 {
        self.sampler.p()
    }

    fn add_population(&mut self, population: Population) -> Result<(), ConnectomeError> {
        let name = population.name().to_string();
        if self.populations.contains_key(&name) {
            return Err(ConnectomeError::DuplicateName(name));
        }
        if population.as_area().is_some() {
            self.store.add_destination(&name);
        }
        log::info!("Registered {:?}", population);
        self.populations.insert(name, population);
        Ok(())
    }

    /// Register a new area. Returns an error if the name is already in use.
    pub fn add_area(&mut self, area: Area) -> Result<(), ConnectomeError> {
        self.add_population(Population::Area(area))
    }

    /// Register a new stimulus. Returns an error if the name is already in use.
    pub fn add_stimulus(&mut self, stimulus: Stimulus) -> Result<(), ConnectomeError> {
        self.add_population(Population::Stimulus(stimulus))
    }

    /// A reference to a population. Returns `None` if the population is not found.
    pub fn population(&self, name: &str) -> Option<&Population> {
        self.populations.get(name)
    }

    /// An iterator over the populations, sorted by name.
    pub fn populations_iter(&self) -> impl Iterator<Item = &Population> + '_ {
        self.populations.values()
    }

    /// A reference to an area.
    /// Returns an error if the name is unknown or refers to a stimulus.
    pub fn area(&self, name: &str) -> Result<&Area, ConnectomeError> {
        self.populations
            .get(name)
            .ok_or_else(|| ConnectomeError::UnknownPopulation(name.to_string()))?
            .as_area()
            .ok_or_else(|| ConnectomeError::InvalidParameter(format!("{} is not an area", name)))
    }

    fn area_mut(&mut self, name: &str) -> Result<&mut Area, ConnectomeError> {
        self.populations
            .get_mut(name)
            .ok_or_else(|| ConnectomeError::UnknownPopulation(name.to_string()))?
            .as_area_mut()
            .ok_or_else(|| ConnectomeError::InvalidParameter(format!("{} is not an area", name)))
    }

    /// The current winners of an area, sorted by index. Empty if the area never fired.
    pub fn winners(&self, area: &str) -> Result<&[usize], ConnectomeError> {
        Ok(self.area(area)?.winners())
    }

    /// The neurons that have been winners of an area at least once.
    pub fn support(&self, area: &str) -> Result<&BTreeSet<usize>, ConnectomeError> {
        Ok(self.area(area)?.support())
    }

    /// The fraction of the cap of an area currently occupied by the given neurons.
    pub fn overlap(&self, area: &str, neurons: &[usize]) -> Result<f64, ConnectomeError> {
        let area = self.area(area)?;
        let neurons: BTreeSet<usize> = neurons.iter().copied().collect();
        let num_shared = area
            .winners()
            .iter()
            .filter(|neuron| neurons.contains(neuron))
            .count();
        Ok(num_shared as f64 / area.k() as f64)
    }

    /// The number of explored neurons of an area, i.e., with at least one decided incoming contact.
    pub fn num_explored(&self, area: &str) -> Result<usize, ConnectomeError> {
        self.area(area)?;
        Ok(self
            .store
            .destination(area)
            .map_or(0, |store| store.explored().len()))
    }

    /// The total number of materialized synapses.
    pub fn num_synapses(&self) -> usize {
        self.store.num_synapses()
    }

    fn check_neuron(&self, name: &str, neuron: usize) -> Result<&Population, ConnectomeError> {
        let population = self
            .populations
            .get(name)
            .ok_or_else(|| ConnectomeError::UnknownPopulation(name.to_string()))?;
        if neuron >= population.n() {
            return Err(ConnectomeError::InvalidParameter(format!(
                "neuron {} out of bounds for {} with {} neurons",
                neuron,
                name,
                population.n()
            )));
        }
        Ok(population)
    }

    /// The state of the connection from a source neuron to a destination neuron.
    pub fn contact(
        &self,
        source: &str,
        source_neuron: usize,
        destination: &str,
        target_neuron: usize,
    ) -> Result<Contact, ConnectomeError> {
        self.check_neuron(source, source_neuron)?;
        if self.check_neuron(destination, target_neuron)?.as_area().is_none() {
            return Err(ConnectomeError::InvalidParameter(format!(
                "{} is not an area",
                destination
            )));
        }
        Ok(self.store.contact(source, source_neuron, destination, target_neuron))
    }

    /// The weight of the synapse from a source neuron to a destination neuron,
    /// or `None` if no synapse has been materialized between them.
    pub fn synapse_weight(
        &self,
        source: &str,
        source_neuron: usize,
        destination: &str,
        target_neuron: usize,
    ) -> Result<Option<f64>, ConnectomeError> {
        Ok(self
            .contact(source, source_neuron, destination, target_neuron)?
            .weight())
    }

    /// Draw in advance all the contacts between populations small enough.
    ///
    /// A pair (source, destination area) is sampled densely if both populations have at most
    /// `eager_threshold` neurons (the configured threshold if `None`). Larger pairs, and
    /// populations added later, are sampled lazily while firing. Does nothing if `eager` is false.
    pub fn initialize<R: Rng + ?Sized>(
        &mut self,
        eager: bool,
        eager_threshold: Option<usize>,
        rng: &mut R,
    ) {
        if !eager {
            log::info!("Lazy initialization: all contacts will be drawn while firing");
            return;
        }
        let threshold = eager_threshold.unwrap_or(self.config.eager_threshold);

        let mut num_blocks = 0;
        for (destination, area) in self
            .populations
            .iter()
            .filter_map(|(name, population)| population.as_area().map(|area| (name, area)))
        {
            if area.n() > threshold {
                continue;
            }
            let Some(store) = self.store.destination_mut(destination) else {
                continue;
            };
            for source in self.populations.values().filter(|source| source.n() <= threshold) {
                self.sampler
                    .sample_block(store, source.name(), source.n(), area.n(), rng);
                num_blocks += 1;
            }
        }

        log::info!(
            "Eager initialization: {} dense blocks (threshold {}), {} synapses",
            num_blocks,
            threshold,
            self.store.num_synapses()
        );
    }

    /// Check every population referenced by the projection and snapshot the active neurons of the sources.
    fn plan(&self, projection: &Projection) -> Result<Vec<Job>, ConnectomeError> {
        for (source, destinations) in projection.iter() {
            let population = self
                .populations
                .get(source)
                .ok_or_else(|| ConnectomeError::UnknownPopulation(source.clone()))?;
            if let Some(area) = population.as_area() {
                if !area.has_fired() && !destinations.is_empty() {
                    return Err(ConnectomeError::EmptySource(source.clone()));
                }
            }
            for destination in destinations.iter() {
                self.area(destination)?;
            }
        }

        let mut jobs = Vec::new();
        for (destination, sources) in projection.sources_by_destination() {
            let area = self.area(destination)?;
            let sources = sources
                .into_iter()
                .filter_map(|source| self.populations.get(source))
                .map(|source| ActiveSource::new(source.name(), source.active_neurons()))
                .collect();
            jobs.push(Job {
                destination: destination.to_string(),
                n: area.n(),
                k: area.k(),
                beta: area.beta(),
                sources,
                seed: 0,
            });
        }
        Ok(jobs)
    }

    /// Fire the projection: every destination area selects its `k` winners from the input of
    /// its sources, and the synapses feeding the winners are potentiated.
    ///
    /// All sources are read before any destination is updated, so the order of destinations does
    /// not matter and destinations are processed in parallel. The projection is fully validated
    /// before any mutation, and no winner or weight changes unless every destination succeeds.
    /// Returns the new winners of every destination area.
    pub fn fire<R: Rng + ?Sized>(
        &mut self,
        projection: &Projection,
        rng: &mut R,
    ) -> Result<BTreeMap<String, Vec<usize>>, ConnectomeError> {
        let mut jobs = self.plan(projection)?;
        // One generator per destination, seeded in name order, so that results do not depend on scheduling.
        jobs.iter_mut().for_each(|job| job.seed = rng.gen());
        log::debug!("Firing into {} destination areas", jobs.len());
        self.run(jobs)
    }

    /// Select the winners of every job, then potentiate and commit them once all jobs succeeded.
    fn run(&mut self, jobs: Vec<Job>) -> Result<BTreeMap<String, Vec<usize>>, ConnectomeError> {
        let names: BTreeSet<&str> = jobs.iter().map(|job| job.destination.as_str()).collect();
        let sampler = &self.sampler;
        let rule = &self.config.plasticity;
        let mut partitions = self.store.destinations_mut(&names);

        let parallel = jobs.len() >= MIN_PARALLEL_DESTINATIONS;
        let results: Vec<Vec<usize>> = if parallel {
            jobs.par_iter()
                .zip(partitions.par_iter_mut())
                .map(|(job, (_, store))| fire_destination(sampler, job, store))
                .collect::<Result<_, _>>()?
        } else {
            jobs.iter()
                .zip(partitions.iter_mut())
                .map(|(job, (_, store))| fire_destination(sampler, job, store))
                .collect::<Result<_, _>>()?
        };

        if parallel {
            jobs.par_iter()
                .zip(partitions.par_iter_mut())
                .zip(results.par_iter())
                .for_each(|((job, (_, store)), winners)| potentiate_destination(rule, job, winners, store));
        } else {
            jobs.iter()
                .zip(partitions.iter_mut())
                .zip(results.iter())
                .for_each(|((job, (_, store)), winners)| potentiate_destination(rule, job, winners, store));
        }

        let mut new_winners = BTreeMap::new();
        for (job, winners) in jobs.into_iter().zip(results) {
            let area = self.area_mut(&job.destination)?;
            area.replace_winners(winners);
            new_winners.insert(job.destination, area.winners().to_vec());
        }
        Ok(new_winners)
    }

    /// Fire the same projection `iterations` times in a row. Returns the winners after the last firing.
    pub fn fire_repeated<R: Rng + ?Sized>(
        &mut self,
        projection: &Projection,
        iterations: usize,
        rng: &mut R,
    ) -> Result<BTreeMap<String, Vec<usize>>, ConnectomeError> {
        if iterations == 0 {
            return Err(ConnectomeError::InvalidParameter(
                "the number of iterations must be positive".to_string(),
            ));
        }
        let mut new_winners = BTreeMap::new();
        for iteration in 0..iterations {
            log::trace!("Firing iteration {}/{}", iteration + 1, iterations);
            new_winners = self.fire(projection, rng)?;
        }
        Ok(new_winners)
    }

    /// Form an assembly in `destination` from the current activity of several sources.
    ///
    /// The destination starts silent: the first round is driven by the sources alone, and the
    /// `iterations - 1` following rounds also feed the destination back into itself.
    /// Returns the winners of the destination after the last round.
    pub fn merge<R: Rng + ?Sized>(
        &mut self,
        sources: &[&str],
        destination: &str,
        iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, ConnectomeError> {
        if iterations == 0 {
            return Err(ConnectomeError::InvalidParameter(
                "the number of iterations must be positive".to_string(),
            ));
        }
        if sources.is_empty() {
            return Err(ConnectomeError::InvalidParameter(format!(
                "nothing to project into {}",
                destination
            )));
        }
        if sources.contains(&destination) {
            return Err(ConnectomeError::InvalidParameter(format!(
                "{} cannot be projected into itself",
                destination
            )));
        }

        let feedforward: Projection = sources.iter().map(|&source| (source, [destination])).collect();
        self.fire(&feedforward, rng)?;
        if iterations > 1 {
            let recurrent = feedforward.add(destination, [destination]);
            self.fire_repeated(&recurrent, iterations - 1, rng)?;
        }
        log::info!("Projected {:?} into {} over {} rounds", sources, destination, iterations);
        Ok(self.winners(destination)?.to_vec())
    }

    /// Form an assembly in `destination` from the current activity of `source` (see [`Connectome::merge`]).
    pub fn project<R: Rng + ?Sized>(
        &mut self,
        source: &str,
        destination: &str,
        iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, ConnectomeError> {
        self.merge(&[source], destination, iterations, rng)
    }

    /// Project the assembly of area `source` into `destination`, then project the new assembly back
    /// into `source`, so that both are linked in both directions. Returns the winners of `destination`.
    pub fn reciprocal_project<R: Rng + ?Sized>(
        &mut self,
        source: &str,
        destination: &str,
        iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, ConnectomeError> {
        self.area(source)?;
        let projected = self.project(source, destination, iterations, rng)?;
        self.project(destination, source, iterations, rng)?;
        Ok(projected)
    }

    /// Activate a given assembly: set the winners of an area to exactly `k` distinct neurons.
    pub fn set_winners(&mut self, area: &str, neurons: &[usize]) -> Result<(), ConnectomeError> {
        self.area(area)?.check_winners(neurons)?;
        self.area_mut(area)?.replace_winners(neurons.to_vec());
        Ok(())
    }
}
