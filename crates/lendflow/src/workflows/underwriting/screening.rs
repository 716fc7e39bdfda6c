use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the political-exposure flag drawn during compliance screening.
///
/// Production wires the sampled screen below; tests substitute a fixed
/// outcome so pipeline runs stay deterministic.
pub trait PoliticalExposureScreen: Send + Sync {
    fn flag(&self) -> bool;
}

/// Screen that flags applicants at a configured rate.
///
/// Stands in for the registry lookup the compliance team runs out of band;
/// the hit rate mirrors how often that lookup escalates.
pub struct SampledScreen {
    rng: Mutex<StdRng>,
    hit_rate: f64,
}

impl SampledScreen {
    pub fn new(hit_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            hit_rate,
        }
    }

    /// Seeded variant for reproducible demo and test runs.
    pub fn seeded(seed: u64, hit_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            hit_rate,
        }
    }
}

impl PoliticalExposureScreen for SampledScreen {
    fn flag(&self) -> bool {
        let mut rng = self.rng.lock().expect("screen rng mutex poisoned");
        rng.gen::<f64>() < self.hit_rate
    }
}

/// Screen pinned to one outcome.
pub struct FixedScreen(pub bool);

impl PoliticalExposureScreen for FixedScreen {
    fn flag(&self) -> bool {
        self.0
    }
}
