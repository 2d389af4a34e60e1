//! A stochastic, age-stratified COVID-19 epidemic exposed as a reinforcement-learning
//! environment.
//!
//! Every age cohort is tracked as seven compartments (susceptible, exposed, infectious,
//! severe, critical, fatal and recovered). Each step an agent chooses an isolation
//! intensity; the [`transition`] engine draws Poisson-distributed flows between
//! compartments, and the [`environment`] rewards the agent with the negative isolation
//! cost, ending the episode with a large penalty if critical cases overflow the ICU
//! capacity.
//!
//! ## Modules
//!
//! - [`parameters`]: severity assumptions, demographics and epidemiological rates
//! - [`compartments`]: per-cohort compartment counts
//! - [`transition`]: the per-step state-transition engine
//! - [`environment`]: the `reset`/`step` controller
//! - [`report`]: CSV trajectory reports
//! - [`runner`]: the command line runner behind the `covid19-gym` binary
//! - [`log`]: logging configuration
pub mod compartments;
pub mod environment;
pub mod error;
pub mod log;
pub mod parameters;
pub mod random;
pub mod report;
pub mod runner;
pub mod transition;

pub use compartments::{CohortFlows, Compartment, CompartmentCounts, PopulationState};
pub use environment::{
    BoxSpace, Covid19Env, Env, EnvStatus, Info, Observation, StepOutcome, ICU_OVERFLOW_PENALTY,
};
pub use error::Covid19GymError;
pub use parameters::{
    EpidemiologyParameters, GymConfig, GymConfigBuilder, PopulationParameters,
    SeverityAssumption, SeverityAssumptions,
};
pub use transition::TransitionEngine;
