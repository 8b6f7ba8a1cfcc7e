//! Seeded random request generation.
//!
//! Produces submission data only; it never touches a dispatcher. The same
//! seed and settings always yield the same requests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};
use crate::models::{RequestSpec, StopId, Tick, Topology};

/// Settings for [`RequestGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of requests to produce.
    pub count: usize,
    /// Submit times are drawn from `0..=horizon`.
    pub horizon: Tick,
    /// Probability that a request is an emergency (0.0..=1.0).
    pub emergency_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 10,
            horizon: 10,
            emergency_rate: 0.1,
            seed: 42,
        }
    }
}

/// Random generator of valid request specs over a topology.
///
/// # Example
/// ```
/// use shuttle_dispatch::generator::{GeneratorConfig, RequestGenerator};
/// use shuttle_dispatch::models::Topology;
///
/// let topology = Topology::default();
/// let config = GeneratorConfig { count: 5, ..Default::default() };
/// let mut generator = RequestGenerator::new(&topology, config).unwrap();
/// let specs = generator.generate();
/// assert_eq!(specs.len(), 5);
/// assert!(specs.iter().all(|s| s.origin != s.destination));
/// ```
#[derive(Debug, Clone)]
pub struct RequestGenerator<'a> {
    topology: &'a Topology,
    config: GeneratorConfig,
    rng: StdRng,
}

impl<'a> RequestGenerator<'a> {
    /// Fails if the topology has fewer than two stops or the rate is not a
    /// probability.
    pub fn new(topology: &'a Topology, config: GeneratorConfig) -> DispatchResult<Self> {
        if topology.len() < 2 {
            return Err(DispatchError::InvalidConfig(
                "request generation needs at least two stops".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.emergency_rate) {
            return Err(DispatchError::InvalidConfig(format!(
                "emergency_rate {} is outside 0..=1",
                config.emergency_rate
            )));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            topology,
            config,
            rng,
        })
    }

    /// Draws one request.
    pub fn next_spec(&mut self) -> RequestSpec {
        let stops = self.topology.len();
        let origin = self.rng.random_range(0..stops);
        // Shift past the origin so the destination is always different.
        let mut destination = self.rng.random_range(0..stops - 1);
        if destination >= origin {
            destination += 1;
        }
        let submit_time = self.rng.random_range(0..=self.config.horizon);
        let emergency = self.rng.random_bool(self.config.emergency_rate);

        RequestSpec {
            origin: self.stop_name(origin),
            destination: self.stop_name(destination),
            submit_time,
            emergency,
        }
    }

    /// Draws `config.count` requests, sorted by submit time.
    pub fn generate(&mut self) -> Vec<RequestSpec> {
        let mut specs: Vec<RequestSpec> = (0..self.config.count).map(|_| self.next_spec()).collect();
        specs.sort_by_key(|s| s.submit_time);
        specs
    }

    fn stop_name(&self, index: usize) -> String {
        self.topology.label(StopId::new(index))
    }
}
