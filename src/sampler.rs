//! Random connectivity sampler.
//!
//! Connections follow a Bernoulli(p) model: every pair (source neuron, destination neuron) is
//! connected independently with probability `p`. The sampler never enumerates all pairs. Contacts
//! into explored neurons are drawn one by one, the first time they are needed, and cached in the
//! [`DestinationStore`]. The inputs of never-explored neurons are i.i.d. Binomial(s, p), with `s`
//! the number of active source neurons; only their largest order statistics are ever drawn.
//!
//! A never-explored neuron that loses a firing keeps no contacts, but the loss is remembered:
//! the [`DestinationStore`] records an input ceiling, the largest number of connections a
//! remaining never-explored neuron can receive from that exact active input set. When the same
//! set fires again, never-explored inputs are drawn from the Binomial truncated at the ceiling, so
//! repeating a firing without plasticity selects the same winners, as on a fixed graph. Only the
//! latest active set is remembered: after a different set fires, the inputs of never-explored
//! neurons from an older set are drawn afresh.
use rand::distributions::{Bernoulli, Distribution};
use rand::seq::index;
use rand::Rng;
use rand_distr::Binomial;

use crate::error::ConnectomeError;
use crate::synapse::{Contact, DestinationStore};

/// The neurons of one source population active during a firing.
#[derive(Debug, PartialEq, Clone)]
pub struct ActiveSource {
    pub name: String,
    pub neurons: Vec<usize>,
}

impl ActiveSource {
    pub fn new(name: impl Into<String>, neurons: Vec<usize>) -> Self {
        ActiveSource {
            name: name.into(),
            neurons,
        }
    }
}

/// Returns the total number of active neurons over all sources.
pub fn num_active(sources: &[ActiveSource]) -> usize {
    sources.iter().map(|source| source.neurons.len()).sum()
}

/// Numerically stable `ln(exp(a) + exp(b))`.
fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Returns the log-probabilities of Binomial(n, p) for all values in `0..=n`, with `0 < p < 1`.
/// The recurrence stays in log space to avoid underflow for large `n`.
pub fn binomial_log_pmf(n: usize, p: f64) -> Vec<f64> {
    let log_ratio = p.ln() - (-p).ln_1p();
    let mut log_pmf = Vec::with_capacity(n + 1);
    let mut current = n as f64 * (-p).ln_1p();
    log_pmf.push(current);
    for v in 0..n {
        current += ((n - v) as f64).ln() - ((v + 1) as f64).ln() + log_ratio;
        log_pmf.push(current);
    }
    log_pmf
}

/// Sampler of the random connectivity of a connectome.
#[derive(Debug, Clone)]
pub struct ConnectivitySampler {
    p: f64,
    bernoulli: Bernoulli,
}

impl ConnectivitySampler {
    /// Create a new sampler with connection probability `p`.
    /// Returns an error if `p` is not in `(0, 1]`.
    pub fn build(p: f64) -> Result<Self, ConnectomeError> {
        if !(p > 0.0 && p <= 1.0) {
            return Err(ConnectomeError::InvalidParameter(format!(
                "connection probability must be in (0, 1], got {}",
                p
            )));
        }
        let bernoulli = Bernoulli::new(p).map_err(|e| {
            ConnectomeError::InvalidParameter(format!("Invalid connection distribution: {}", e))
        })?;
        Ok(ConnectivitySampler { p, bernoulli })
    }

    /// Returns the connection probability.
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Decide all contacts from a source of size `num_sources` into a destination of size `num_targets`.
    /// Every destination neuron becomes explored.
    pub fn sample_block<R: Rng + ?Sized>(
        &self,
        store: &mut DestinationStore,
        source: &str,
        num_sources: usize,
        num_targets: usize,
        rng: &mut R,
    ) {
        let tract = store.tract_mut(source);
        for target in 0..num_targets {
            for source_neuron in 0..num_sources {
                if tract.contact(source_neuron, target) == Contact::Unsampled {
                    tract.decide(source_neuron, target, self.bernoulli.sample(rng));
                }
            }
        }
        (0..num_targets).for_each(|target| store.mark_explored(target));
    }

    /// Returns the exact input of every explored neuron, sorted by neuron index.
    /// Contacts from active neurons that were never drawn are drawn now and cached.
    pub fn explicit_inputs<R: Rng + ?Sized>(
        &self,
        store: &mut DestinationStore,
        sources: &[ActiveSource],
        rng: &mut R,
    ) -> Vec<(usize, f64)> {
        let explored: Vec<usize> = store.explored().iter().copied().collect();
        let mut totals = vec![0.0; explored.len()];

        for source in sources {
            let tract = store.tract_mut(&source.name);
            for (target, total) in explored.iter().zip(totals.iter_mut()) {
                for &source_neuron in source.neurons.iter() {
                    *total += match tract.contact(source_neuron, *target) {
                        Contact::Synapse(weight) => weight,
                        Contact::Absent => 0.0,
                        Contact::Unsampled => {
                            tract.decide(source_neuron, *target, self.bernoulli.sample(rng))
                        }
                    };
                }
            }
        }

        explored.into_iter().zip(totals).collect()
    }

    /// Draw the largest inputs among `num_unexplored` never-explored neurons, each receiving
    /// Binomial(`num_inputs`, p) inputs, in decreasing order.
    ///
    /// At most `need` values are returned, and values strictly below `floor` are never drawn:
    /// they cannot make it into the winners. If a `ceiling` is known, the inputs are conditioned
    /// to be at most `ceiling`. The values are drawn level by level from the largest possible
    /// input downwards; given that all remaining neurons have at most `v` inputs, the number of
    /// them with exactly `v` inputs is Binomial(remaining, P(X = v | X <= v)).
    pub fn never_explored_inputs<R: Rng + ?Sized>(
        &self,
        num_unexplored: usize,
        num_inputs: usize,
        need: usize,
        floor: f64,
        ceiling: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<usize>, ConnectomeError> {
        let need = need.min(num_unexplored);
        if need == 0 {
            return Ok(vec![]);
        }
        let top = ceiling.map_or(num_inputs, |ceiling| ceiling.min(num_inputs));

        // Every pair is connected, all never-explored neurons receive all inputs.
        if self.p >= 1.0 {
            if (num_inputs as f64) < floor || top < num_inputs {
                return Ok(vec![]);
            }
            return Ok(vec![num_inputs; need]);
        }

        let log_pmf = binomial_log_pmf(num_inputs, self.p);
        let log_cdf: Vec<f64> = log_pmf
            .iter()
            .scan(f64::NEG_INFINITY, |state, &log_p| {
                *state = log_add_exp(*state, log_p);
                Some(*state)
            })
            .collect();

        let mut remaining = num_unexplored as u64;
        let mut inputs = Vec::with_capacity(need);
        for v in (0..=top).rev() {
            if inputs.len() >= need || remaining == 0 || (v as f64) < floor {
                break;
            }

            let q = (log_pmf[v] - log_cdf[v]).exp();
            let count = if !q.is_finite() {
                return Err(ConnectomeError::InvalidParameter(format!(
                    "ill-defined input distribution at level {} of Binomial({}, {})",
                    v, num_inputs, self.p
                )));
            } else if q >= 1.0 {
                remaining
            } else if q <= 0.0 {
                0
            } else {
                Binomial::new(remaining, q)
                    .map_err(|e| {
                        ConnectomeError::InvalidParameter(format!("Invalid input distribution: {}", e))
                    })?
                    .sample(rng)
            };

            log::trace!("{} never-explored neurons with {} inputs", count, v);
            remaining -= count;
            let take = (count as usize).min(need - inputs.len());
            inputs.extend(std::iter::repeat(v).take(take));
        }

        Ok(inputs)
    }

    /// Draw the contacts of a never-explored neuron known to receive exactly `num_connected`
    /// of the active inputs. Given the total, the connected inputs are uniformly distributed.
    pub fn materialize<R: Rng + ?Sized>(
        &self,
        store: &mut DestinationStore,
        sources: &[ActiveSource],
        target: usize,
        num_connected: usize,
        rng: &mut R,
    ) -> Result<(), ConnectomeError> {
        let num_inputs = num_active(sources);
        if num_connected > num_inputs {
            return Err(ConnectomeError::InvalidParameter(format!(
                "cannot connect {} out of {} active inputs",
                num_connected, num_inputs
            )));
        }

        let mut connected = vec![false; num_inputs];
        index::sample(rng, num_inputs, num_connected)
            .into_iter()
            .for_each(|slot| connected[slot] = true);

        let mut slots = connected.into_iter();
        for source in sources {
            let tract = store.tract_mut(&source.name);
            for (&source_neuron, exists) in source.neurons.iter().zip(slots.by_ref()) {
                tract.decide(source_neuron, target, exists);
            }
        }
        store.mark_explored(target);
        Ok(())
    }
}
