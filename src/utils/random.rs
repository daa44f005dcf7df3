//! Injectable randomness for draws.
//!
//! Every draw takes its randomness from a [`RandomSource`] handed in by the
//! caller instead of an ambient global generator, so the same catalog and the
//! same sequence of numbers always produce the same outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;

pub trait RandomSource {
    /// Uniform integer in `[0, upper)`. `upper` is never zero.
    fn next_below(&mut self, upper: u32) -> u32;
}

/// Adapter over any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_below(&mut self, upper: u32) -> u32 {
        self.rng.gen_range(0..upper)
    }
}

/// Replays a fixed list of values, cycling when exhausted. Values at or above
/// the requested bound are reduced modulo the bound.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    values: Vec<u32>,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Number of values handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedSource {
    fn next_below(&mut self, upper: u32) -> u32 {
        if self.values.is_empty() {
            self.cursor += 1;
            return 0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value % upper
    }
}

/// Generator shared by every draw of a service instance.
pub type SharedRandom = Arc<Mutex<Box<dyn RandomSource + Send>>>;

pub fn shared<S: RandomSource + Send + 'static>(source: S) -> SharedRandom {
    let boxed: Box<dyn RandomSource + Send> = Box::new(source);
    Arc::new(Mutex::new(boxed))
}

/// Builds the generator the services draw with.
pub fn source_from_seed(seed: Option<u64>) -> SharedRandom {
    match seed {
        Some(seed) => {
            log::info!("Draw generator seeded with fixed seed {seed}");
            shared(RngSource::seeded(seed))
        }
        None => shared(RngSource::from_entropy()),
    }
}
