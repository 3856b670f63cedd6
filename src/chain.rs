//! Random-walk Metropolis chain restricted to a polytope.

use rand::Rng;
use thiserror::Error;
use tracing::trace;

use crate::{
    model::{LikelihoodError, ProbabilityModel},
    polytope::Polytope,
    proposal::Proposal,
    settings::ChainSettings,
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("model evaluation failed")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("starting point is outside of the feasible region")]
    InfeasibleStart,
    #[error("expected a point of dimension {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid chain settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, SamplerError>;

/// Counters for the proposals made by a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub proposed: u64,
    pub accepted: u64,
    /// Proposals outside of the polytope. These are never scored.
    pub infeasible: u64,
    /// Proposals the model refused with a recoverable error.
    pub model_rejections: u64,
}

impl ChainStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    pub fn merge(&mut self, other: &ChainStats) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
        self.infeasible += other.infeasible;
        self.model_rejections += other.model_rejections;
    }
}

/// The terminal state of a chain run.
#[derive(Debug, Clone)]
pub struct Draw {
    pub position: Box<[f64]>,
    /// The score of the target model at `position`.
    pub score: f64,
    pub stats: ChainStats,
}

/// A Markov chain whose target density is `exp(-model(x))` on `region`.
///
/// Each step draws a candidate from the proposal, rejects it outright if it
/// leaves the region, and otherwise accepts it with probability
/// `min(1, exp(score(x) - score(y)))`.
pub struct MetropolisChain<'a, M, P> {
    model: M,
    region: &'a Polytope,
    proposal: P,
    position: Box<[f64]>,
    candidate: Box<[f64]>,
    score: f64,
    stats: ChainStats,
}

impl<'a, M: ProbabilityModel, P: Proposal> MetropolisChain<'a, M, P> {
    pub fn new(model: M, region: &'a Polytope, proposal: P) -> Self {
        let dim = region.dim();
        MetropolisChain {
            model,
            region,
            proposal,
            position: vec![0f64; dim].into(),
            candidate: vec![0f64; dim].into(),
            score: f64::NAN,
            stats: ChainStats::default(),
        }
    }

    /// Initialize the chain at a position. This must be called before
    /// `step` or `draw`.
    ///
    /// Fails if the position is infeasible or the model cannot score it.
    pub fn set_position(&mut self, position: &[f64]) -> Result<()> {
        if position.len() != self.region.dim() {
            return Err(SamplerError::DimensionMismatch {
                expected: self.region.dim(),
                found: position.len(),
            });
        }
        if !self.region.contains(position) {
            return Err(SamplerError::InfeasibleStart);
        }
        self.score = self
            .model
            .negative_log_likelihood(position)
            .map_err(|err| SamplerError::Model(Box::new(err)))?;
        self.position.copy_from_slice(position);
        Ok(())
    }

    /// Propose one move and accept or reject it. Returns whether the chain moved.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<bool> {
        self.stats.proposed += 1;
        self.proposal.propose(rng, &self.position, &mut self.candidate);

        if !self.region.contains(&self.candidate) {
            self.stats.infeasible += 1;
            trace!("proposal left the feasible region");
            return Ok(false);
        }

        let candidate_score = match self.model.negative_log_likelihood(&self.candidate) {
            Ok(score) => score,
            Err(err) if err.is_recoverable() => {
                self.stats.model_rejections += 1;
                trace!(error = %err, "model rejected proposal");
                return Ok(false);
            }
            Err(err) => return Err(SamplerError::Model(Box::new(err))),
        };

        let log_ratio = self.score - candidate_score;
        let accept = if log_ratio >= 0. {
            true
        } else {
            let u: f64 = rng.random();
            u.ln() < log_ratio
        };

        if accept {
            std::mem::swap(&mut self.position, &mut self.candidate);
            self.score = candidate_score;
            self.stats.accepted += 1;
        }
        Ok(accept)
    }

    /// Advance the chain by `thinning` steps, keeping only the last state.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R, thinning: u64) -> Result<&[f64]> {
        for _ in 0..thinning {
            self.step(rng)?;
        }
        Ok(&self.position)
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn stats(&self) -> ChainStats {
        self.stats
    }

    pub fn into_draw(self) -> Draw {
        Draw {
            position: self.position,
            score: self.score,
            stats: self.stats,
        }
    }
}

/// Run a fresh chain from `start` and return its last retained draw.
///
/// The chain retains `settings.num_draws` samples, discarding
/// `settings.thinning - 1` states between consecutive retained ones, so it
/// makes `num_draws * thinning` proposals in total.
pub fn run_chain<M, P, R>(
    model: M,
    region: &Polytope,
    proposal: P,
    start: &[f64],
    rng: &mut R,
    settings: &ChainSettings,
) -> Result<Draw>
where
    M: ProbabilityModel,
    P: Proposal,
    R: Rng + ?Sized,
{
    settings.validate()?;
    let mut chain = MetropolisChain::new(model, region, proposal);
    chain.set_position(start)?;
    for _ in 0..settings.num_draws {
        chain.draw(rng, settings.thinning)?;
    }
    Ok(chain.into_draw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gaussian::GaussianModel,
        model::{test_models::ConstantNll, TemperedModel},
        proposal::GaussianProposal,
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn simplex() -> Polytope {
        Polytope::from_rows(
            &[
                vec![1., 1., 1.],
                vec![-1., 0., 0.],
                vec![0., -1., 0.],
                vec![0., 0., -1.],
            ],
            &[1., 0., 0., 0.],
        )
        .unwrap()
    }

    fn settings() -> ChainSettings {
        ChainSettings::default()
    }

    #[test]
    fn deterministic() -> anyhow::Result<()> {
        let region = simplex();
        let base = GaussianModel::standard(&[0., 0., 0.]);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let draw1 = run_chain(
            TemperedModel::new(&base, 0.5),
            &region,
            GaussianProposal::default(),
            &[0., 0., 0.],
            &mut rng,
            &settings(),
        )?;

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let draw2 = run_chain(
            TemperedModel::new(&base, 0.5),
            &region,
            GaussianProposal::default(),
            &[0., 0., 0.],
            &mut rng,
            &settings(),
        )?;

        assert_eq!(draw1.position, draw2.position);
        assert_eq!(draw1.score.to_bits(), draw2.score.to_bits());
        assert_eq!(draw1.stats, draw2.stats);
        Ok(())
    }

    #[test]
    fn proposal_count_follows_thinning() -> anyhow::Result<()> {
        let region = simplex();
        let base = GaussianModel::standard(&[0., 0., 0.]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let settings = ChainSettings {
            num_draws: 3,
            thinning: 7,
            ..Default::default()
        };
        let draw = run_chain(
            &base,
            &region,
            GaussianProposal::default(),
            &[0.1, 0.1, 0.1],
            &mut rng,
            &settings,
        )?;
        assert_eq!(draw.stats.proposed, 21);
        assert!(draw.stats.accepted + draw.stats.infeasible <= 21);
        Ok(())
    }

    #[test]
    fn reported_score_matches_position() -> anyhow::Result<()> {
        let region = simplex();
        let base = GaussianModel::standard(&[0., 0., 0.]);
        let tempered = TemperedModel::new(&base, 1.7);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let draw = run_chain(
            tempered,
            &region,
            GaussianProposal::default(),
            &[0.2, 0.2, 0.2],
            &mut rng,
            &settings(),
        )?;
        assert_eq!(draw.score, tempered.evaluate(&draw.position)?);
        Ok(())
    }

    #[test]
    fn infeasible_start_is_rejected() {
        let region = simplex();
        let base = GaussianModel::standard(&[0., 0., 0.]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = run_chain(
            &base,
            &region,
            GaussianProposal::default(),
            &[1., 1., 1.],
            &mut rng,
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(err, SamplerError::InfeasibleStart));

        let err = run_chain(
            &base,
            &region,
            GaussianProposal::default(),
            &[0., 0.],
            &mut rng,
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SamplerError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn zero_thinning_is_invalid() {
        let region = simplex();
        let base = GaussianModel::standard(&[0., 0., 0.]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let settings = ChainSettings {
            thinning: 0,
            ..Default::default()
        };
        let err = run_chain(
            &base,
            &region,
            GaussianProposal::default(),
            &[0., 0., 0.],
            &mut rng,
            &settings,
        )
        .unwrap_err();
        assert!(matches!(err, SamplerError::InvalidSettings(_)));
    }

    #[test]
    fn start_errors_always_abort() {
        let region = simplex();
        for recoverable in [true, false] {
            let model = ConstantNll {
                dim: 3,
                value: 1.,
                fail: Some(recoverable),
            };
            let err = MetropolisChain::new(&model, &region, GaussianProposal::default())
                .set_position(&[0.1, 0.1, 0.1])
                .unwrap_err();
            assert!(matches!(err, SamplerError::Model(_)));
        }
    }

    #[test]
    fn flat_target_accepts_every_feasible_proposal() {
        let region = simplex();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let model = ConstantNll {
            dim: 3,
            value: 1.,
            fail: None,
        };
        let mut chain = MetropolisChain::new(&model, &region, GaussianProposal::default());
        chain.set_position(&[0.1, 0.1, 0.1]).unwrap();
        for _ in 0..50 {
            chain.step(&mut rng).unwrap();
        }
        let stats = chain.stats();
        assert_eq!(stats.proposed, 50);
        assert_eq!(stats.accepted + stats.infeasible, 50);
        assert_eq!(stats.model_rejections, 0);
        assert!(region.contains(chain.position()));
    }

    /// Scores only the point `[0.1, 0.1, 0.1]` and fails everywhere else.
    struct FailsAwayFromStart {
        recoverable: bool,
    }

    #[derive(thiserror::Error, Debug)]
    #[error("outside of support")]
    struct OutsideSupport {
        recoverable: bool,
    }

    impl LikelihoodError for OutsideSupport {
        fn is_recoverable(&self) -> bool {
            self.recoverable
        }
    }

    impl ProbabilityModel for FailsAwayFromStart {
        type Err = OutsideSupport;

        fn dim(&self) -> usize {
            3
        }

        fn negative_log_likelihood(
            &self,
            point: &[f64],
        ) -> std::result::Result<f64, OutsideSupport> {
            if point == [0.1, 0.1, 0.1] {
                Ok(1.)
            } else {
                Err(OutsideSupport {
                    recoverable: self.recoverable,
                })
            }
        }
    }

    #[test]
    fn recoverable_proposal_errors_count_as_rejections() {
        let region = simplex();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let draw = run_chain(
            FailsAwayFromStart { recoverable: true },
            &region,
            GaussianProposal::default(),
            &[0.1, 0.1, 0.1],
            &mut rng,
            &settings(),
        )
        .unwrap();
        assert_eq!(&*draw.position, &[0.1, 0.1, 0.1]);
        assert_eq!(draw.stats.accepted, 0);
        assert_eq!(draw.stats.infeasible + draw.stats.model_rejections, 10);
    }

    #[test]
    fn unrecoverable_proposal_errors_abort() {
        let region = simplex();
        // Tiny steps keep every proposal feasible, so the model is reached.
        let mut chain = MetropolisChain::new(
            FailsAwayFromStart { recoverable: false },
            &region,
            GaussianProposal { step_size: 1e-6 },
        );
        chain.set_position(&[0.1, 0.1, 0.1]).unwrap();
        let err = chain
            .step(&mut ChaCha8Rng::seed_from_u64(9))
            .unwrap_err();
        assert!(matches!(err, SamplerError::Model(_)));
    }

    #[test]
    fn nan_scores_never_move_the_chain() -> anyhow::Result<()> {
        let region = simplex();
        let base = ConstantNll {
            dim: 3,
            value: -2.,
            fail: None,
        };
        // A negative NLL raised to a fractional power is NaN everywhere.
        let tempered = TemperedModel::new(&base, 0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let draw = run_chain(
            tempered,
            &region,
            GaussianProposal::default(),
            &[0.3, 0.3, 0.3],
            &mut rng,
            &settings(),
        )?;
        assert_eq!(&*draw.position, &[0.3, 0.3, 0.3]);
        assert!(draw.score.is_nan());
        Ok(())
    }

    #[test]
    fn chain_mean_approaches_the_centroid() -> anyhow::Result<()> {
        // The target is close to uniform on the simplex, whose centroid is
        // at 0.25 in every coordinate.
        let region = simplex();
        let base = GaussianModel::standard(&[0.25, 0.25, 0.25]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut chain = MetropolisChain::new(&base, &region, GaussianProposal { step_size: 0.05 });
        chain.set_position(&[0., 0., 0.])?;
        let mut mean = [0f64; 3];
        let n = 4000;
        for i in 0..(2 * n) {
            let pos = chain.draw(&mut rng, 10)?;
            if i >= n {
                mean.iter_mut().zip(pos).for_each(|(m, p)| *m += p / n as f64);
            }
        }
        for m in mean {
            assert!((0.15..0.4).contains(&m), "mean {m} far from the centroid");
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn every_reachable_state_is_feasible(
            seed in any::<u64>(),
            beta in prop_oneof![0f64..4., Just(1e3), Just(1e300)],
            step_size in 0.01f64..3.,
        ) {
            let region = simplex();
            let base = GaussianModel::standard(&[0., 0., 0.]);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut position: Box<[f64]> = vec![0.; 3].into();
            for _ in 0..20 {
                let draw = run_chain(
                    TemperedModel::new(&base, beta),
                    &region,
                    GaussianProposal { step_size },
                    &position,
                    &mut rng,
                    &ChainSettings::default(),
                ).unwrap();
                prop_assert!(region.contains(&draw.position));
                position = draw.position;
            }
        }
    }
}
