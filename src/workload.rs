//! Work units submitted by the latency prober.

use crate::config::{GenerationSettings, ProbeParams};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prompt variants cycled through by unit index.
pub const PROMPTS: [&str; 5] = ["a landscape", "a cat", "a city", "abstract art", "a forest"];

/// Exclusive upper bound for generated seeds (31-bit range).
pub const SEED_LIMIT: u64 = 1 << 31;

/// One job to submit. Built fresh for each prober iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Position in the submission sequence, starting at zero.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub prompt: String,
    pub seed: u64,
    pub generation: GenerationSettings,
}

impl WorkUnit {
    /// Build the unit for `index` with a freshly drawn seed.
    pub fn for_index(index: usize, params: &ProbeParams) -> Self {
        let seed = rand::thread_rng().gen_range(0..SEED_LIMIT);
        Self::with_seed(index, params, seed)
    }

    /// Build the unit for `index` with an explicit seed.
    pub fn with_seed(index: usize, params: &ProbeParams, seed: u64) -> Self {
        Self {
            index,
            width: params.width,
            height: params.height,
            steps: params.steps,
            prompt: prompt_for(index).to_owned(),
            seed: seed % SEED_LIMIT,
            generation: params.generation.clone(),
        }
    }
}

/// Prompt used for the unit at `index`.
pub fn prompt_for(index: usize) -> &'static str {
    PROMPTS[index % PROMPTS.len()]
}
