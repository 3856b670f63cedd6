//! Drive a tempered random-walk Metropolis sampler over a line protocol.
//!
//! An external controller (a parallel tempering or annealing orchestrator)
//! asks for the tempered log potential of the current walker position with
//! `log_potential(beta)`, and moves the walker with `call_sampler!(beta)`,
//! which runs a short thinned Metropolis chain on the polytope `A x ≤ b`
//! targeting the base model's negative log likelihood raised to `beta`.
//!
//! ```
//! use tempered_walk::{ChainSettings, Driver, ProblemConfig};
//!
//! let problem = ProblemConfig::default().build()?;
//! let mut driver = Driver::from_problem(problem, 42, ChainSettings::default())?;
//!
//! let mut output = Vec::new();
//! driver.serve(&b"log_potential(1)\ncall_sampler!(0.5)\n"[..], &mut output)?;
//! assert_eq!(driver.session().invocation_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub(crate) mod chain;
pub(crate) mod driver;
pub(crate) mod gaussian;
pub(crate) mod model;
pub(crate) mod polytope;
pub(crate) mod proposal;
pub(crate) mod protocol;
pub(crate) mod session;
pub(crate) mod settings;

pub use chain::{run_chain, ChainStats, Draw, MetropolisChain, SamplerError};
pub use driver::{Driver, DriverError};
pub use gaussian::{GaussianError, GaussianModel};
pub use model::{LikelihoodError, ProbabilityModel, TemperedModel};
pub use polytope::{Polytope, PolytopeError};
pub use proposal::{GaussianProposal, Proposal};
pub use protocol::{Command, CommandKind, ProtocolError, Response};
pub use session::Session;
pub use settings::{ChainSettings, ConfigError, Problem, ProblemConfig};
