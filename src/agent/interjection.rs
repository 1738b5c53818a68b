//! Interjection draws
//!
//! Whether an idle agent chimes in is a pure function of the agent id, the
//! turn it reacts to and the configured probability. The randomness comes
//! from an injected source so tests can pin the outcome.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::AgentId;

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn draw(&self, agent: &AgentId, turn_id: u64) -> f64;
}

/// Deterministic draws derived from a session seed
#[derive(Debug, Clone, Copy)]
pub struct SeededSource {
    seed: u64,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the thread RNG, for interactive sessions
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }
}

impl RandomSource for SeededSource {
    fn draw(&self, agent: &AgentId, turn_id: u64) -> f64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        agent.hash(&mut hasher);
        turn_id.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish()).random::<f64>()
    }
}

/// Decides which idle agents interject
#[derive(Clone)]
pub struct InterjectionPolicy {
    probability: f64,
    source: Arc<dyn RandomSource>,
}

impl InterjectionPolicy {
    pub fn new(probability: f64, source: Arc<dyn RandomSource>) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            source,
        }
    }

    /// Draw for `agent` reacting to the turn `turn_id`
    pub fn should_interject(&self, agent: &AgentId, turn_id: u64) -> bool {
        self.source.draw(agent, turn_id) < self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_are_deterministic() {
        let source = SeededSource::new(42);
        let agent = AgentId::new("elliot");
        assert_eq!(source.draw(&agent, 7), source.draw(&agent, 7));
    }

    #[test]
    fn test_draws_are_in_unit_interval() {
        let source = SeededSource::new(7);
        for turn in 0..200 {
            let d = source.draw(&AgentId::new("saul"), turn);
            assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn test_probability_bounds() {
        let source: Arc<dyn RandomSource> = Arc::new(SeededSource::new(1));
        let never = InterjectionPolicy::new(0.0, source.clone());
        let always = InterjectionPolicy::new(1.0, source);
        for turn in 0..50 {
            assert!(!never.should_interject(&AgentId::new("rick"), turn));
            assert!(always.should_interject(&AgentId::new("rick"), turn));
        }
    }

    #[test]
    fn test_rate_is_roughly_the_probability() {
        let policy = InterjectionPolicy::new(0.3, Arc::new(SeededSource::new(99)));
        let hits = (0..2000)
            .filter(|turn| policy.should_interject(&AgentId::new("wednesday"), *turn))
            .count();
        assert!((400..800).contains(&hits), "hits = {}", hits);
    }
}
