//! The command loop tying the protocol to the tempered chain.

use std::io::{BufRead, Write};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    chain::{run_chain, SamplerError},
    gaussian::GaussianModel,
    model::{ProbabilityModel, TemperedModel},
    polytope::Polytope,
    protocol::{Command, CommandKind, ProtocolError, Response},
    session::Session,
    settings::{ChainSettings, Problem},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("malformed command")]
    Protocol(#[from] ProtocolError),
    #[error("sampling failed")]
    Sampler(#[from] SamplerError),
    #[error("model evaluation failed")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("could not talk to the controller")]
    Io(#[from] std::io::Error),
}

/// Everything that lives for the whole session with a controller: the base
/// model, the feasible region, the walker position and the one random
/// source shared by every sampling call.
pub struct Driver<M, R> {
    model: M,
    region: Polytope,
    session: Session,
    rng: R,
    settings: ChainSettings,
}

impl Driver<GaussianModel, ChaCha8Rng> {
    /// Build a driver for a validated problem with a freshly seeded random source.
    pub fn from_problem(
        problem: Problem,
        seed: u64,
        settings: ChainSettings,
    ) -> Result<Self, DriverError> {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        Self::new(
            problem.model,
            problem.region,
            &problem.starting_point,
            rng,
            settings,
        )
    }
}

impl<M: ProbabilityModel, R: Rng> Driver<M, R> {
    pub fn new(
        model: M,
        region: Polytope,
        start: &[f64],
        rng: R,
        settings: ChainSettings,
    ) -> Result<Self, DriverError> {
        settings.validate()?;
        for found in [model.dim(), start.len()] {
            if found != region.dim() {
                return Err(SamplerError::DimensionMismatch {
                    expected: region.dim(),
                    found,
                }
                .into());
            }
        }
        if !region.contains(start) {
            return Err(SamplerError::InfeasibleStart.into());
        }
        Ok(Driver {
            model,
            region,
            session: Session::new(start),
            rng,
            settings,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn region(&self) -> &Polytope {
        &self.region
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// The negated tempered score of the current position.
    ///
    /// Touches neither the session nor the random source.
    pub fn log_potential(&self, beta: f64) -> Result<f64, DriverError> {
        let tempered = TemperedModel::new(&self.model, beta);
        let score = tempered
            .evaluate(self.session.current_position())
            .map_err(|err| DriverError::Model(Box::new(err)))?;
        if !score.is_finite() {
            warn!(beta, score, "non-finite tempered score at the current position");
        }
        Ok(-score)
    }

    /// Advance the walker with a chain targeting the model tempered by `beta`.
    pub fn call_sampler(&mut self, beta: f64) -> Result<(), DriverError> {
        let tempered = TemperedModel::new(&self.model, beta);
        let draw = run_chain(
            tempered,
            &self.region,
            self.settings.proposal(),
            self.session.current_position(),
            &mut self.rng,
            &self.settings,
        )?;
        debug!(
            beta,
            score = draw.score,
            proposed = draw.stats.proposed,
            accepted = draw.stats.accepted,
            infeasible = draw.stats.infeasible,
            model_rejections = draw.stats.model_rejections,
            "sampler call finished"
        );
        self.session.record(draw.position, &draw.stats);
        Ok(())
    }

    pub fn handle(&mut self, command: Command) -> Result<Response, DriverError> {
        debug!(%command, invocation = self.session.invocation_count(), "dispatching");
        match command.kind {
            CommandKind::LogPotential => {
                let value = self.log_potential(command.beta)?;
                Ok(Response::LogPotential(value))
            }
            CommandKind::CallSampler => {
                self.call_sampler(command.beta)?;
                Ok(Response::Sampled)
            }
        }
    }

    /// Answer commands from `input` until it is exhausted.
    ///
    /// Each response is flushed before the next line is read. The first
    /// malformed command or failed evaluation ends the loop with an error
    /// and no response line for that command.
    pub fn serve<I: BufRead, O: Write>(
        &mut self,
        input: I,
        mut output: O,
    ) -> Result<(), DriverError> {
        for line in input.lines() {
            let command: Command = line?.parse()?;
            let response = self.handle(command)?;
            writeln!(output, "{response}")?;
            output.flush()?;
        }
        let totals = self.session.totals();
        info!(
            sampler_calls = self.session.invocation_count(),
            acceptance_rate = totals.acceptance_rate(),
            "controller closed the input"
        );
        Ok(())
    }
}
