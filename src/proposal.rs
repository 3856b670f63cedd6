use rand::Rng;
use rand_distr::StandardNormal;

/// A symmetric proposal kernel for the random-walk chain.
///
/// Implementations must satisfy `q(x → y) = q(y → x)`, the Metropolis
/// acceptance rule in `chain` relies on it.
pub trait Proposal {
    fn propose<R: Rng + ?Sized>(&self, rng: &mut R, current: &[f64], out: &mut [f64]);
}

/// Isotropic Gaussian steps `y = x + step_size · z` with `z ~ N(0, I)`.
#[derive(Debug, Clone, Copy)]
pub struct GaussianProposal {
    pub step_size: f64,
}

impl Default for GaussianProposal {
    fn default() -> Self {
        Self { step_size: 0.2 }
    }
}

impl Proposal for GaussianProposal {
    fn propose<R: Rng + ?Sized>(&self, rng: &mut R, current: &[f64], out: &mut [f64]) {
        assert!(current.len() == out.len());
        current.iter().zip(out.iter_mut()).for_each(|(&x, y)| {
            let z: f64 = rng.sample(StandardNormal);
            *y = x + self.step_size * z;
        });
    }
}
