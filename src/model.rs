//! Core abstractions for probability models.
//!
//! Provides the `ProbabilityModel` trait, the capability every target of the
//! random-walk chain implements, and `TemperedModel`, which power-scales the
//! negative log likelihood of a base model.

use std::fmt::Debug;

/// Errors that happen when we evaluate the negative log likelihood.
pub trait LikelihoodError: std::error::Error + Send + Sync + 'static {
    /// Recoverable errors at a proposed point reject that proposal,
    /// unrecoverable errors stop sampling.
    fn is_recoverable(&self) -> bool;
}

/// Anything that can score a point by its negative log likelihood.
pub trait ProbabilityModel {
    type Err: Debug + LikelihoodError;

    /// The dimension of the points this model accepts.
    fn dim(&self) -> usize;

    fn negative_log_likelihood(&self, point: &[f64]) -> Result<f64, Self::Err>;
}

impl<T: ProbabilityModel + ?Sized> ProbabilityModel for &T {
    type Err = T::Err;

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn negative_log_likelihood(&self, point: &[f64]) -> Result<f64, Self::Err> {
        (**self).negative_log_likelihood(point)
    }
}

/// A base model whose negative log likelihood is raised to the power `beta`.
///
/// This is a power transform of the NLL value itself, not a scaling of the
/// log density: `beta = 0` maps every NLL to `1` and `beta = 1` is the
/// identity. Holds nothing but the base model and the exponent, so it is
/// cheap to rebuild for every command.
#[derive(Debug, Clone, Copy)]
pub struct TemperedModel<M> {
    base: M,
    beta: f64,
}

impl<M: ProbabilityModel> TemperedModel<M> {
    pub fn new(base: M, beta: f64) -> Self {
        TemperedModel { base, beta }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn base(&self) -> &M {
        &self.base
    }

    /// Score a point. Errors of the base model are returned unchanged.
    pub fn evaluate(&self, point: &[f64]) -> Result<f64, M::Err> {
        Ok(self.base.negative_log_likelihood(point)?.powf(self.beta))
    }
}

impl<M: ProbabilityModel> ProbabilityModel for TemperedModel<M> {
    type Err = M::Err;

    fn dim(&self) -> usize {
        self.base.dim()
    }

    fn negative_log_likelihood(&self, point: &[f64]) -> Result<f64, Self::Err> {
        self.evaluate(point)
    }
}
