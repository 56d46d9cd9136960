//! Winner selection (k-cap).
//!
//! The winners of a firing are the `k` neurons with the largest input. Ties are broken in favor of
//! the lower neuron index, so that the selection is fully determined by the inputs.
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Whether a candidate had decided contacts before the firing.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Origin {
    /// The input is exact, computed from the decided contacts.
    Explored,
    /// The input was drawn from the never-explored input distribution; contacts remain to be drawn.
    NeverExplored,
}

/// A neuron competing for the cap, with its total input.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Candidate {
    pub neuron: usize,
    pub input: f64,
    pub origin: Origin,
}

impl Candidate {
    pub fn explored(neuron: usize, input: f64) -> Self {
        Candidate {
            neuron,
            input,
            origin: Origin::Explored,
        }
    }

    pub fn never_explored(neuron: usize, input: f64) -> Self {
        Candidate {
            neuron,
            input,
            origin: Origin::NeverExplored,
        }
    }

    /// Ranking order: larger input first, then lower neuron index.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .input
            .total_cmp(&self.input)
            .then_with(|| self.neuron.cmp(&other.neuron))
    }
}

/// The k-cap selection rule of an area.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct KCap {
    k: usize,
}

impl KCap {
    pub fn new(k: usize) -> Self {
        KCap { k }
    }

    /// The smallest input a never-explored neuron needs to possibly enter the winners,
    /// i.e., the k-th largest explored input, or minus infinity if there are fewer than `k` explored neurons.
    pub fn boundary(&self, explored: &[Candidate]) -> f64 {
        if self.k == 0 || explored.len() < self.k {
            return f64::NEG_INFINITY;
        }
        let mut inputs: Vec<f64> = explored.iter().map(|candidate| candidate.input).collect();
        let (_, kth, _) = inputs.select_nth_unstable_by(self.k - 1, |a, b| b.total_cmp(a));
        *kth
    }

    /// Select the `k` best candidates, ranked by decreasing input and increasing neuron index.
    pub fn select(&self, candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .sorted_by(|a, b| a.rank(b))
            .take(self.k)
            .collect()
    }
}
