//! Process-wide random state
//!
//! Three generators are kept behind one lock: a general-purpose one, one for
//! ndarray sampling and one for tensor parameter initialization. They start
//! entropy-seeded. [`fix_random_seed`] is meant to be called once at startup,
//! before any model is initialized or any data is shuffled.

use candle_core::Device;
use ndarray::{Array, Dimension, ShapeBuilder};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::Result;

static GENERATORS: Lazy<Mutex<Generators>> = Lazy::new(|| Mutex::new(Generators::from_entropy()));

static DETERMINISTIC_KERNELS: AtomicBool = AtomicBool::new(false);

// Serializes tests that reseed the process-wide generators
#[cfg(test)]
pub(crate) static TEST_RNG_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// The general, array and tensor generators plus the seed they came from
#[derive(Debug, Clone)]
pub struct Generators {
    general: StdRng,
    array: StdRng,
    tensor: StdRng,
    seed: Option<u64>,
}

impl Generators {
    /// All three generators seeded from `seed`
    pub fn from_seed(seed: u64) -> Self {
        Self {
            general: StdRng::seed_from_u64(seed),
            array: StdRng::seed_from_u64(seed),
            tensor: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Generators seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            general: StdRng::from_os_rng(),
            array: StdRng::from_os_rng(),
            tensor: StdRng::from_os_rng(),
            seed: None,
        }
    }

    /// Seed in effect, if one was set
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// General-purpose generator
    pub fn general(&mut self) -> &mut StdRng {
        &mut self.general
    }

    /// Generator for ndarray sampling
    pub fn array(&mut self) -> &mut StdRng {
        &mut self.array
    }

    /// Generator for tensor parameter initialization
    pub fn tensor(&mut self) -> &mut StdRng {
        &mut self.tensor
    }
}

/// Seed every generator from `seed`.
///
/// On a GPU device the device generator is seeded as well and deterministic
/// kernel selection is switched on. Seeding again replaces the previous state
/// and is logged.
pub fn fix_random_seed(seed: u64, device: &Device) -> Result<()> {
    {
        let mut generators = GENERATORS.lock();
        if let Some(previous) = generators.seed() {
            warn!("Re-seeding random generators (previous seed {}, new seed {})", previous, seed);
        }
        *generators = Generators::from_seed(seed);
    }

    if !device.is_cpu() {
        device.set_seed(seed)?;
        DETERMINISTIC_KERNELS.store(true, Ordering::SeqCst);
    }

    info!("Random seed fixed to {}", seed);
    Ok(())
}

/// Whether deterministic (non-benchmarking) kernel selection is in force
pub fn deterministic_kernels() -> bool {
    DETERMINISTIC_KERNELS.load(Ordering::SeqCst)
}

/// Seed currently in effect, `None` while still entropy-seeded
pub fn current_seed() -> Option<u64> {
    GENERATORS.lock().seed()
}

/// Run `f` with the general-purpose generator
pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(GENERATORS.lock().general())
}

/// Run `f` with the array generator
pub fn with_array_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(GENERATORS.lock().array())
}

/// Run `f` with the tensor generator
pub fn with_tensor_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(GENERATORS.lock().tensor())
}

/// Array of the given shape sampled from `distribution` with the array generator
pub fn random_array<Sh, D, T>(shape: Sh, distribution: T) -> Array<f64, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    T: Distribution<f64>,
{
    with_array_rng(|rng| Array::from_shape_simple_fn(shape, || distribution.sample(rng)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand_distr::StandardNormal;

    fn draw(generators: &mut Generators) -> (u64, f64, f32) {
        (
            generators.general().random::<u64>(),
            generators.array().random::<f64>(),
            generators.tensor().random::<f32>(),
        )
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut first = Generators::from_seed(42);
        let mut second = Generators::from_seed(42);

        for _ in 0..8 {
            assert_eq!(draw(&mut first), draw(&mut second));
        }
    }

    #[test]
    fn test_different_seed_different_draws() {
        let mut first = Generators::from_seed(1);
        let mut second = Generators::from_seed(2);
        assert_ne!(draw(&mut first), draw(&mut second));
    }

    #[test]
    fn test_global_reseed_repeats_sequence() {
        let _guard = TEST_RNG_LOCK.lock();
        let device = Device::Cpu;

        fix_random_seed(7, &device).unwrap();
        let general: Vec<u32> = (0..4).map(|_| with_rng(|rng| rng.random())).collect();
        let array = random_array((2, 3), StandardNormal);
        let tensor: f32 = with_tensor_rng(|rng| rng.random());

        fix_random_seed(7, &device).unwrap();
        let general_again: Vec<u32> = (0..4).map(|_| with_rng(|rng| rng.random())).collect();
        let array_again = random_array((2, 3), StandardNormal);
        let tensor_again: f32 = with_tensor_rng(|rng| rng.random());

        assert_eq!(general, general_again);
        assert_eq!(array, array_again);
        assert_eq!(tensor, tensor_again);
        assert_eq!(current_seed(), Some(7));
    }

    #[test]
    fn test_cpu_leaves_kernel_selection_alone() {
        let _guard = TEST_RNG_LOCK.lock();
        fix_random_seed(3, &Device::Cpu).unwrap();
        assert!(!deterministic_kernels());
    }
}
