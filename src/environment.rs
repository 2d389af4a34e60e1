//! The reinforcement-learning environment.
//!
//! [`Covid19Env`] wraps the transition engine in the usual `reset`/`step` contract. Each
//! step the agent picks an isolation intensity in [0, 1]; the reward is the negative
//! effective isolation, with a large penalty and immediate termination when the number of
//! critical cases exceeds the ICU capacity.
//!
//! ```
//! use covid19_gym::{Covid19Env, Env, GymConfig};
//!
//! let mut env = Covid19Env::new(GymConfig::default()).unwrap();
//! let observation = env.reset().unwrap();
//! assert_eq!(observation.len(), 45);
//! let (_observation, reward, _done, _info) = env.step(0.0).unwrap();
//! assert_eq!(reward, 0.0);
//! ```

use std::collections::HashMap;

use log::{debug, info, trace};

use crate::compartments::{Compartment, CompartmentCounts, PopulationState};
use crate::error::Covid19GymError;
use crate::parameters::GymConfig;
use crate::random::{sample_poisson, seeded_rng, GymRng};
use crate::transition::TransitionEngine;

/// Subtracted from the reward on the step the ICU capacity is exceeded.
pub const ICU_OVERFLOW_PENALTY: f64 = 1000.0;

/// Fractions of the total population, five per cohort in the order of
/// [`Compartment::OBSERVED`].
pub type Observation = Vec<f64>;

/// Auxiliary information returned by `step`. Always empty.
pub type Info = HashMap<String, String>;

/// `(observation, reward, done, info)`
pub type StepOutcome = (Observation, f64, bool, Info);

/// The standard episode contract.
pub trait Env {
    /// Starts a new episode and returns its first observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the warm-up run fails.
    fn reset(&mut self) -> Result<Observation, Covid19GymError>;

    /// Applies an isolation intensity for one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment is not running or the action is not finite.
    fn step(&mut self, action: f64) -> Result<StepOutcome, Covid19GymError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvStatus {
    Uninitialized,
    Running,
    Done,
}

/// A box-shaped space of reals, as declared to training harnesses.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxSpace {
    pub low: f64,
    pub high: f64,
    pub shape: Vec<usize>,
}

impl BoxSpace {
    #[must_use]
    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.shape.iter().product::<usize>()
            && values.iter().all(|v| (self.low..=self.high).contains(v))
    }
}

pub struct Covid19Env {
    config: GymConfig,
    rng: GymRng,
    state: PopulationState,
    steps: u64,
    status: EnvStatus,
}

impl Covid19Env {
    /// Creates an environment. The generator is seeded from `config.seed`; the population is
    /// empty until the first [`Env::reset`].
    ///
    /// # Errors
    ///
    /// Returns `Covid19GymError::InvalidConfiguration` if `config` fails validation.
    pub fn new(config: GymConfig) -> Result<Self, Covid19GymError> {
        config.validate()?;
        Ok(Covid19Env {
            rng: seeded_rng(config.seed),
            config,
            state: PopulationState::new(),
            steps: 0,
            status: EnvStatus::Uninitialized,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    /// Steps taken by the agent in the current episode. Warm-up transitions are not counted.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub fn status(&self) -> EnvStatus {
        self.status
    }

    #[must_use]
    pub fn observation_space(&self) -> BoxSpace {
        BoxSpace {
            low: 0.0,
            high: 1.0,
            shape: vec![Compartment::OBSERVED.len() * self.config.cohorts()],
        }
    }

    #[must_use]
    pub fn action_space(&self) -> BoxSpace {
        BoxSpace {
            low: 0.0,
            high: 1.0,
            shape: vec![1],
        }
    }

    /// Total critical cases exceed the ICU beds.
    #[must_use]
    pub fn icu_overflow(&self) -> bool {
        self.state.total(Compartment::Critical) > self.config.population.icu_beds
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn observation(&self) -> Observation {
        let population = self.config.population.population as f64;
        self.state
            .iter()
            .flat_map(|(_, counts)| {
                Compartment::OBSERVED
                    .into_iter()
                    .map(move |c| counts.get(c) as f64 / population)
            })
            .collect()
    }

    fn seed_population(&mut self) {
        let population = self.config.population.population;
        let mut state = PopulationState::new();
        for (row, fraction) in self
            .config
            .severity
            .iter()
            .zip(&self.config.population.age_distribution)
        {
            state.insert(&row.age, CompartmentCounts::seeded(population, *fraction));
        }
        self.state = state;
    }

    /// Runs a Poisson(`initial_days`) number of uncontrolled transitions. Neither the step
    /// counter nor the termination checks take part, so an episode cannot end before the
    /// agent acts.
    fn warm_up(&mut self) -> Result<u64, Covid19GymError> {
        let engine = TransitionEngine::new(&self.config);
        let days = sample_poisson(&mut self.rng, self.config.population.initial_days)?;
        for _ in 0..days {
            engine.advance(&mut self.state, 0.0, &mut self.rng)?;
        }
        Ok(days)
    }
}

impl Env for Covid19Env {
    fn reset(&mut self) -> Result<Observation, Covid19GymError> {
        self.seed_population();
        self.steps = 0;
        let days = self.warm_up()?;
        self.status = EnvStatus::Running;
        debug!(
            "reset: {} warm-up transitions, {} exposed, {} infectious",
            days,
            self.state.total(Compartment::Exposed),
            self.state.total(Compartment::Infectious)
        );
        Ok(self.observation())
    }

    fn step(&mut self, action: f64) -> Result<StepOutcome, Covid19GymError> {
        match self.status {
            EnvStatus::Uninitialized => return Err(Covid19GymError::NotInitialized),
            EnvStatus::Done => return Err(Covid19GymError::EpisodeDone),
            EnvStatus::Running => {}
        }
        if !action.is_finite() {
            return Err(Covid19GymError::InvalidAction(action));
        }

        let engine = TransitionEngine::new(&self.config);
        let isolation = engine.advance(&mut self.state, action, &mut self.rng)?;
        self.steps += 1;

        let mut reward = -isolation;
        let mut done = self.steps >= self.config.max_steps;
        if self.icu_overflow() {
            info!(
                "ICU overflow at step {}: {} critical for {} beds",
                self.steps,
                self.state.total(Compartment::Critical),
                self.config.population.icu_beds
            );
            done = true;
            reward -= ICU_OVERFLOW_PENALTY;
        }
        if done {
            self.status = EnvStatus::Done;
        }
        trace!(
            "step {}: action {} isolation {} reward {} done {}",
            self.steps,
            action,
            isolation,
            reward,
            done
        );

        Ok((self.observation(), reward, done, Info::new()))
    }
}
