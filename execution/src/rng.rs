use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform samples in `[0, 1)`.
///
/// Every random outcome in the engine is decided by one sample, so tests can
/// force outcomes by supplying a fixed sequence.
pub trait SampleSource {
    fn sample(&mut self) -> f64;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn sample(&mut self) -> f64 {
        (**self).sample()
    }
}

/// Adapts any [Rng] into a [SampleSource].
#[derive(Clone, Debug)]
pub struct RngSampler<R> {
    rng: R,
}

impl<R: Rng> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSampler<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SampleSource for RngSampler<R> {
    fn sample(&mut self) -> f64 {
        // The standard distribution for f64 is the half-open [0, 1).
        self.rng.gen::<f64>()
    }
}
