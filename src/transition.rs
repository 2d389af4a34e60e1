//! The per-step state-transition engine.
//!
//! One call to [`TransitionEngine::advance`] moves every cohort forward by `time_delta`.
//! Each edge of the progression graph draws a Poisson count whose mean is proportional to
//! the size of the source compartment, and the count is capped so no compartment goes
//! negative:
//!
//! ```text
//! susceptible -> exposed -> infectious -> severe <-> critical -> fatal
//!                               |           |
//!                               +-----------+--> recovered
//! ```
//!
//! An infectious, severe or critical compartment has two outflows sharing one budget. The
//! first outflow is capped at the compartment size and the second at what the first left
//! over, so the draw order below is part of the model: for a fixed seed it determines the
//! trajectory.

use log::trace;
use rand::Rng;

use crate::compartments::{CohortFlows, Compartment, CompartmentCounts, PopulationState};
use crate::error::Covid19GymError;
use crate::parameters::{GymConfig, SeverityAssumption};
use crate::random::sample_poisson;

/// Rates derived from the epidemiological parameters, per day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rates {
    /// R0 / (infectious_period + latency_period)
    pub infection: f64,
    pub latency: f64,
    pub infectious_resolution: f64,
    pub hospital_discharge: f64,
    pub icu_discharge: f64,
}

pub struct TransitionEngine<'a> {
    config: &'a GymConfig,
    rates: Rates,
}

impl<'a> TransitionEngine<'a> {
    #[must_use]
    pub fn new(config: &'a GymConfig) -> Self {
        let epi = &config.epidemiology;
        let rates = Rates {
            infection: epi.r0 / (epi.infectious_period + epi.latency_period),
            latency: 1.0 / epi.latency_period,
            infectious_resolution: 1.0 / epi.infectious_period,
            hospital_discharge: 1.0 / epi.hospital_stay,
            icu_discharge: 1.0 / epi.icu_stay,
        };
        TransitionEngine { config, rates }
    }

    #[must_use]
    pub fn rates(&self) -> Rates {
        self.rates
    }

    /// The fraction of contacts removed by an isolation intensity of `action`. The action is
    /// clamped to [0, 1] first.
    #[must_use]
    pub fn effective_isolation(&self, action: f64) -> f64 {
        action.clamp(0.0, 1.0) * self.config.population.isolation_effectiveness
    }

    /// Advances `state` by one step under isolation intensity `action` and returns the
    /// effective isolation that was applied.
    ///
    /// All cohorts read the fraction infected of the state before this step. Every cohort's
    /// flows are drawn before any is applied, so a failed draw leaves `state` untouched.
    ///
    /// # Errors
    ///
    /// Propagates `Covid19GymError::Sampling`, which cannot occur for a validated
    /// configuration.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        state: &mut PopulationState,
        action: f64,
        rng: &mut R,
    ) -> Result<f64, Covid19GymError> {
        let isolation = self.effective_isolation(action);
        let fraction_infected = self.fraction_infected(state);

        let flows = state
            .iter()
            .zip(self.config.severity.iter())
            .map(|((_, counts), severity)| {
                self.draw_flows(counts, severity, fraction_infected, isolation, &mut *rng)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for ((counts, flows), severity) in state
            .counts_mut()
            .zip(&flows)
            .zip(self.config.severity.iter())
        {
            trace!("{}: {:?}", severity.age, flows);
            *counts = counts.apply(flows);
        }
        Ok(isolation)
    }

    /// (exposed + infectious) / configured population.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction_infected(&self, state: &PopulationState) -> f64 {
        let infected = state.total(Compartment::Exposed) + state.total(Compartment::Infectious);
        infected as f64 / self.config.population.population as f64
    }

    /// Draws the flows of one cohort from its counts before the step.
    ///
    /// # Errors
    ///
    /// Propagates `Covid19GymError::Sampling`.
    #[allow(clippy::cast_precision_loss)]
    pub fn draw_flows<R: Rng + ?Sized>(
        &self,
        counts: &CompartmentCounts,
        severity: &SeverityAssumption,
        fraction_infected: f64,
        isolation: f64,
        rng: &mut R,
    ) -> Result<CohortFlows, Covid19GymError> {
        let dt = self.config.time_delta;
        let rates = &self.rates;
        let contact = 1.0 - isolation;

        let susceptible = counts.susceptible as f64;
        let exposed = counts.exposed as f64;
        let infectious = counts.infectious as f64;
        let severe = counts.severe as f64;
        let critical = counts.critical as f64;

        let imported = sample_poisson(
            rng,
            self.config.population.imports_per_day * severity.pct_confirmed * dt * contact,
        )?;
        let local = sample_poisson(
            rng,
            susceptible * fraction_infected * rates.infection * dt * contact,
        )?;
        let susceptible_to_exposed = (imported + local).min(counts.susceptible);

        let exposed_to_infectious =
            sample_poisson(rng, rates.latency * exposed * dt)?.min(counts.exposed);

        let infectious_to_recovered = sample_poisson(
            rng,
            rates.infectious_resolution * (1.0 - severity.pct_severity) * infectious * dt,
        )?
        .min(counts.infectious);
        let infectious_to_severe = sample_poisson(
            rng,
            rates.infectious_resolution * severity.pct_severity * infectious * dt,
        )?
        .min(counts.infectious - infectious_to_recovered);

        let severe_to_recovered = sample_poisson(
            rng,
            severe * (1.0 - severity.pct_critical) * rates.hospital_discharge * dt,
        )?
        .min(counts.severe);
        let severe_to_critical = sample_poisson(
            rng,
            severe * severity.pct_critical * rates.hospital_discharge * dt,
        )?
        .min(counts.severe - severe_to_recovered);

        let critical_to_severe = sample_poisson(
            rng,
            critical * (1.0 - severity.pct_fatal) * rates.icu_discharge * dt,
        )?
        .min(counts.critical);
        let critical_to_fatal = sample_poisson(
            rng,
            critical * severity.pct_fatal * rates.icu_discharge * dt,
        )?
        .min(counts.critical - critical_to_severe);

        Ok(CohortFlows {
            susceptible_to_exposed,
            exposed_to_infectious,
            infectious_to_recovered,
            infectious_to_severe,
            severe_to_recovered,
            severe_to_critical,
            critical_to_severe,
            critical_to_fatal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{GymConfigBuilder, PopulationParameters, SeverityAssumptions};
    use crate::random::seeded_rng;
    use approx::assert_relative_eq;

    fn single_band_config(severity: SeverityAssumption) -> GymConfig {
        GymConfigBuilder::default()
            .population(PopulationParameters {
                population: 10_000,
                age_distribution: vec![1.0],
                ..PopulationParameters::default()
            })
            .severity(SeverityAssumptions(vec![severity]))
            .build()
            .unwrap()
    }

    fn busy_cohort() -> CompartmentCounts {
        CompartmentCounts {
            susceptible: 5_000,
            exposed: 2_000,
            infectious: 1_500,
            severe: 800,
            critical: 400,
            fatal: 100,
            recovered: 200,
        }
    }

    #[test]
    fn derived_rates() {
        let config = GymConfig::default();
        let rates = TransitionEngine::new(&config).rates();
        assert_relative_eq!(rates.infection, 2.7 / 8.0);
        assert_relative_eq!(rates.latency, 0.2);
        assert_relative_eq!(rates.infectious_resolution, 1.0 / 3.0);
        assert_relative_eq!(rates.hospital_discharge, 0.25);
        assert_relative_eq!(rates.icu_discharge, 1.0 / 14.0);
    }

    #[test]
    fn isolation_is_clamped_and_scaled() {
        let config = GymConfig::default();
        let engine = TransitionEngine::new(&config);
        assert_relative_eq!(engine.effective_isolation(0.5), 0.45);
        assert_relative_eq!(engine.effective_isolation(1.0), 0.9);
        assert_relative_eq!(engine.effective_isolation(7.0), 0.9);
        assert_relative_eq!(engine.effective_isolation(-3.0), 0.0);
    }

    #[test]
    fn shared_budgets_never_overdraw() {
        // With certain progression the second outflow of each pair gets everything the
        // first left.
        let mut config = single_band_config(SeverityAssumption::new("all", 1.0, 1.0, 1.0, 1.0));
        config.epidemiology.infectious_period = 1e-3;
        config.epidemiology.hospital_stay = 1e-3;
        config.epidemiology.icu_stay = 1e-3;
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(3);

        let counts = busy_cohort();
        for _ in 0..50 {
            let flows = engine
                .draw_flows(&counts, &config.severity.0[0], 0.35, 0.0, &mut rng)
                .unwrap();
            assert_eq!(flows.infectious_to_recovered, 0);
            assert_eq!(flows.infectious_to_severe, counts.infectious);
            assert_eq!(flows.severe_to_recovered, 0);
            assert_eq!(flows.severe_to_critical, counts.severe);
            assert_eq!(flows.critical_to_severe, 0);
            assert_eq!(flows.critical_to_fatal, counts.critical);
        }
    }

    #[test]
    fn flows_respect_caps() {
        let mut config = single_band_config(SeverityAssumption::new("all", 0.5, 0.5, 0.5, 0.5));
        // Tiny durations push every Poisson mean far above the compartment size.
        config.epidemiology.latency_period = 1e-4;
        config.epidemiology.infectious_period = 1e-4;
        config.epidemiology.hospital_stay = 1e-4;
        config.epidemiology.icu_stay = 1e-4;
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(11);

        let counts = busy_cohort();
        for _ in 0..50 {
            let flows = engine
                .draw_flows(&counts, &config.severity.0[0], 0.35, 0.0, &mut rng)
                .unwrap();
            assert_eq!(flows.susceptible_to_exposed, counts.susceptible);
            assert_eq!(flows.exposed_to_infectious, counts.exposed);
            assert_eq!(
                flows.infectious_to_recovered + flows.infectious_to_severe,
                counts.infectious
            );
            assert_eq!(
                flows.severe_to_recovered + flows.severe_to_critical,
                counts.severe
            );
            assert_eq!(
                flows.critical_to_severe + flows.critical_to_fatal,
                counts.critical
            );
        }
    }

    #[test]
    fn full_isolation_with_perfect_effectiveness_stops_infection() {
        let mut config = single_band_config(SeverityAssumption::new("all", 1.0, 0.1, 0.1, 0.1));
        config.population.isolation_effectiveness = 1.0;
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(5);

        let mut state = PopulationState::new();
        state.insert("all", busy_cohort());
        for _ in 0..20 {
            let susceptible = state.total(Compartment::Susceptible);
            let isolation = engine.advance(&mut state, 1.0, &mut rng).unwrap();
            assert_relative_eq!(isolation, 1.0);
            assert_eq!(state.total(Compartment::Susceptible), susceptible);
        }
    }

    #[test]
    fn empty_cohort_stays_empty() {
        let config = GymConfig::default();
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(0);
        let counts = CompartmentCounts::default();
        let flows = engine
            .draw_flows(&counts, &config.severity.0[4], 0.5, 0.0, &mut rng)
            .unwrap();
        assert_eq!(flows, CohortFlows::default());
    }

    #[test]
    fn failed_draw_leaves_every_cohort_untouched() {
        // The second cohort's import mean is out of the sampler's range, the first's is not.
        let config = GymConfigBuilder::default()
            .population(PopulationParameters {
                population: 10_000,
                age_distribution: vec![0.5, 0.5],
                imports_per_day: 1e20,
                ..PopulationParameters::default()
            })
            .severity(SeverityAssumptions(vec![
                SeverityAssumption::new("young", 1e-10, 0.1, 0.1, 0.1),
                SeverityAssumption::new("old", 1.0, 0.1, 0.1, 0.1),
            ]))
            .build()
            .unwrap();
        assert!(config.validate().is_err());
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(8);

        let mut state = PopulationState::new();
        state.insert("young", busy_cohort());
        state.insert("old", busy_cohort());
        let before = state.clone();

        let result = engine.advance(&mut state, 0.0, &mut rng);
        assert!(matches!(result, Err(Covid19GymError::Sampling(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn advance_conserves_each_cohort() {
        let config = GymConfig::default();
        let engine = TransitionEngine::new(&config);
        let mut rng = seeded_rng(99);

        let mut state = PopulationState::new();
        for (row, fraction) in config
            .severity
            .iter()
            .zip(&config.population.age_distribution)
        {
            let mut counts = CompartmentCounts::seeded(config.population.population, *fraction);
            counts.susceptible -= 10_000;
            counts.infectious += 10_000;
            state.insert(&row.age, counts);
        }
        let before: Vec<u64> = state.iter().map(|(_, c)| c.total()).collect();

        for step in 0..100 {
            let action = f64::from(step % 3) / 2.0;
            engine.advance(&mut state, action, &mut rng).unwrap();
            let after: Vec<u64> = state.iter().map(|(_, c)| c.total()).collect();
            assert_eq!(before, after);
        }
    }
}
