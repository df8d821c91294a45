//! Deterministic parameter initialization.
//!
//! Construction fills every parameter tensor once from a seeded generator;
//! afterwards the values are mutated only by an external trainer, never by
//! the forward pass.

/// Xorshift-based random number generator.
#[derive(Debug)]
pub(crate) struct XorShiftRng {
    state: u64,
}

impl XorShiftRng {
    pub fn new(seed: u64) -> Self {
        // A zero state would lock the generator at zero forever.
        Self { state: seed.max(1) }
    }

    fn random_u32(&mut self) -> u32 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        ((self.state.wrapping_mul(0x2545F4914F6CDD1D)) >> 32) as u32
    }

    /// Returns a random float in [0, 1).
    fn random_f32(&mut self) -> f32 {
        (self.random_u32() >> 8) as f32 / 16777216.0
    }

    /// Returns a random float in [-bound, bound).
    fn uniform(&mut self, bound: f32) -> f32 {
        (self.random_f32() * 2.0 - 1.0) * bound
    }

    /// Standard normal draw via the Box-Muller transform.
    fn normal(&mut self) -> f32 {
        let u1 = self.random_f32().max(f32::MIN_POSITIVE);
        let u2 = self.random_f32();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    /// Fills a buffer with symmetric uniform draws.
    pub fn fill_uniform(&mut self, buf: &mut [f32], bound: f32) {
        buf.iter_mut().for_each(|v| *v = self.uniform(bound));
    }

    /// Fills a buffer with standard normal draws.
    pub fn fill_normal(&mut self, buf: &mut [f32]) {
        buf.iter_mut().for_each(|v| *v = self.normal());
    }
}
