//! Two-tier seeding: a main stream that only mints episode seeds, and an
//! episode stream that drives every stochastic choice a task makes.

use rand::{Rng, RngCore, SeedableRng};
pub use rand_xoshiro::Xoshiro256StarStar;

/// Main seed used when the caller never provides one.
pub const DEFAULT_MAIN_SEED: u32 = 2022;

/// Episode random stream handed to task hooks.
///
/// Implements [`RngCore`], so every [`rand::Rng`] method is available.
#[derive(Debug, Clone)]
pub struct EpisodeRng(Xoshiro256StarStar);

impl EpisodeRng {
    pub fn from_seed(seed: u32) -> Self {
        Self(Xoshiro256StarStar::seed_from_u64(u64::from(seed)))
    }

    /// Generate a random float in the range [low, high).
    #[inline]
    pub fn uniform(&mut self, low: f32, high: f32) -> f32 {
        self.0.gen::<f32>() * (high - low) + low
    }

    /// `n` independent draws in [low, high).
    pub fn uniform_vec(&mut self, n: usize, low: f32, high: f32) -> Vec<f32> {
        (0..n).map(|_| self.uniform(low, high)).collect()
    }
}

impl RngCore for EpisodeRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

/// Main and episode streams plus the seeds they were created from.
#[derive(Debug, Clone)]
pub struct DualRng {
    main_seed: Option<u32>,
    main_rng: Xoshiro256StarStar,
    episode_seed: Option<u32>,
    episode_rng: EpisodeRng,
}

impl Default for DualRng {
    fn default() -> Self {
        Self::new(Some(DEFAULT_MAIN_SEED))
    }
}

impl DualRng {
    /// Create the manager, optionally seeding the main stream right away.
    pub fn new(main_seed: Option<u32>) -> Self {
        let mut rng = Self {
            main_seed: None,
            main_rng: Xoshiro256StarStar::seed_from_u64(0),
            episode_seed: None,
            episode_rng: EpisodeRng::from_seed(0),
        };
        if main_seed.is_some() {
            rng.set_main(main_seed);
        }
        rng
    }

    /// Reseed the main stream.
    ///
    /// A given seed always replaces the current one. Without a seed this is a
    /// no-op if a main seed already exists, otherwise one is drawn from OS
    /// entropy.
    pub fn set_main(&mut self, seed: Option<u32>) {
        let seed = match (seed, self.main_seed) {
            (Some(s), _) => s,
            (None, Some(_)) => return,
            (None, None) => rand::random::<u32>(),
        };
        self.main_seed = Some(seed);
        self.main_rng = Xoshiro256StarStar::seed_from_u64(u64::from(seed));
    }

    /// Reseed the episode stream, drawing the seed from the main stream when
    /// none is given. Returns the episode seed in use.
    pub fn set_episode(&mut self, seed: Option<u32>) -> u32 {
        let seed = seed.unwrap_or_else(|| self.main_rng.gen::<u32>());
        self.episode_seed = Some(seed);
        self.episode_rng = EpisodeRng::from_seed(seed);
        seed
    }

    /// Restart the episode stream from the current episode seed.
    pub fn reseed_episode(&mut self) {
        if let Some(seed) = self.episode_seed {
            self.episode_rng = EpisodeRng::from_seed(seed);
        }
    }

    /// Fresh stream seeded from the current episode seed, leaving the
    /// episode stream itself untouched.
    pub fn fork_episode(&self) -> EpisodeRng {
        EpisodeRng::from_seed(self.episode_seed.unwrap_or(0))
    }

    pub fn main_seed(&self) -> Option<u32> {
        self.main_seed
    }

    pub fn episode_seed(&self) -> Option<u32> {
        self.episode_seed
    }

    pub fn episode_rng(&mut self) -> &mut EpisodeRng {
        &mut self.episode_rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_range() {
        let mut rng = EpisodeRng::from_seed(42);
        for _ in 0..100 {
            let v = rng.uniform(5.0, 10.0);
            assert!((5.0..10.0).contains(&v));
        }
    }

    #[test]
    fn test_set_main_without_seed_keeps_existing() {
        let mut a = DualRng::new(Some(7));
        let mut b = DualRng::new(Some(7));
        a.set_main(None);
        assert_eq!(a.main_seed(), Some(7));
        assert_eq!(a.set_episode(None), b.set_episode(None));
    }

    #[test]
    fn test_set_main_without_any_seed_draws_entropy() {
        let mut rng = DualRng::new(None);
        assert!(rng.main_seed().is_none());
        rng.set_main(None);
        assert!(rng.main_seed().is_some());
    }

    #[test]
    fn test_explicit_episode_seed_is_used_directly() {
        let mut rng = DualRng::default();
        assert_eq!(rng.set_episode(Some(99)), 99);
        assert_eq!(rng.episode_seed(), Some(99));
    }

    #[test]
    fn test_reseed_episode_replays_stream() {
        let mut rng = DualRng::default();
        rng.set_episode(Some(5));
        let first = rng.episode_rng().uniform(0.0, 1.0);
        rng.episode_rng().uniform(0.0, 1.0);
        rng.reseed_episode();
        assert_eq!(rng.episode_rng().uniform(0.0, 1.0), first);
    }

    #[test]
    fn test_fork_does_not_advance_episode_stream() {
        let mut rng = DualRng::default();
        rng.set_episode(Some(11));
        let mut fork = rng.fork_episode();
        fork.uniform(0.0, 1.0);
        let mut fresh = EpisodeRng::from_seed(11);
        assert_eq!(rng.episode_rng().uniform(0.0, 1.0), fresh.uniform(0.0, 1.0));
    }
}
