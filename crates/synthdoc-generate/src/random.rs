use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::errors::GenerationError;
use crate::faker::{Faker, LocaleKey};

const MODEL_STREAM: &str = "model";

/// Deterministic random source plus fake-data generator for one model.
///
/// Every document gets its own ChaCha8 stream derived from the base seed and
/// the dispatch-time generation index, so completion order never changes
/// what a given index produces.
#[derive(Debug, Clone)]
pub struct SeededRandomContext {
    base_seed: u64,
    seeded: bool,
    faker: Faker,
}

impl SeededRandomContext {
    pub fn new(seed: Option<u64>, locale: LocaleKey) -> Result<Self, GenerationError> {
        let mut context = Self {
            base_seed: 0,
            seeded: false,
            faker: Faker::new(locale)?,
        };
        context.reseed(seed);
        Ok(context)
    }

    /// Reset the base seed; `None` draws a fresh one from the thread RNG.
    pub fn reseed(&mut self, seed: Option<u64>) {
        match seed {
            Some(seed) => {
                self.base_seed = seed;
                self.seeded = true;
            }
            None => {
                self.base_seed = rand::rng().random();
                self.seeded = false;
            }
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn document_rng(&self, index: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(hash_document_seed(self.base_seed, index))
    }

    /// Stream for model-level hooks (`pre_run`, `post_run`).
    pub fn model_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(hash_seed(self.base_seed, MODEL_STREAM))
    }

    pub fn faker(&self) -> &Faker {
        &self.faker
    }
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_document_seed(base_seed: u64, index: u64) -> u64 {
    let hash = base_seed ^ index.wrapping_add(1).wrapping_mul(0x9e3779b97f4a7c15);
    hash.wrapping_mul(0x100000001b3)
}
