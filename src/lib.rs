//! This crate provides tools for simulating the assembly calculus in Rust: areas of neurons
//! connected by sparse random synapses, firing with a k-cap and learning with Hebbian plasticity.
//!
//! # Creating Connectomes
//!
//! ```rust
//! use assembly_calculus::connectome::Connectome;
//! use assembly_calculus::population::{Area, Stimulus};
//!
//! // Init an empty connectome with connection probability 0.01
//! let mut connectome = Connectome::new(0.01).unwrap();
//!
//! // Add a stimulus and two areas
//! connectome.add_stimulus(Stimulus::build("S", 100, 0.05).unwrap()).unwrap();
//! connectome.add_area(Area::build("A", 10_000, 100, 0.05).unwrap()).unwrap();
//! connectome.add_area(Area::with_default_cap("B", 10_000).unwrap()).unwrap();
//!
//! assert_eq!(connectome.area("B").unwrap().k(), 100);
//! assert_eq!(connectome.num_synapses(), 0);
//! ```
//!
//! # Firing
//!
//! ```rust
//! use assembly_calculus::connectome::{Connectome, Projection};
//! use assembly_calculus::population::{Area, Stimulus};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut connectome = Connectome::new(0.01).unwrap();
//! connectome.add_stimulus(Stimulus::build("S", 100, 0.05).unwrap()).unwrap();
//! connectome.add_area(Area::build("A", 100_000, 100, 0.05).unwrap()).unwrap();
//! connectome.add_area(Area::build("B", 100_000, 100, 0.05).unwrap()).unwrap();
//!
//! // Project the stimulus into A, then keep firing A into itself and into B
//! connectome.fire(&Projection::new().add("S", ["A"]), &mut rng).unwrap();
//! let projection = Projection::new().add("S", ["A"]).add("A", ["A", "B"]);
//! let winners = connectome.fire_repeated(&projection, 10, &mut rng).unwrap();
//!
//! assert_eq!(winners["A"].len(), 100);
//! assert_eq!(winners["B"].len(), 100);
//! ```

pub mod config;
pub mod connectome;
pub mod error;
pub mod plasticity;
pub mod population;
pub mod sampler;
pub mod selector;
pub mod synapse;

/// The weight of a synapse when it is first drawn.
pub const INITIAL_WEIGHT: f64 = 1.0;
/// The plasticity rate of an area when none is given.
pub const DEFAULT_AREA_BETA: f64 = 0.01;
/// The plasticity rate of a stimulus when none is given.
pub const DEFAULT_STIMULUS_BETA: f64 = 0.05;
/// The largest population size sampled densely on eager initialization (at most 10^6 pairs per block).
pub const DEFAULT_EAGER_THRESHOLD: usize = 1000;
/// Minimum number of destination areas to fire in parallel.
pub const MIN_PARALLEL_DESTINATIONS: usize = 4;
