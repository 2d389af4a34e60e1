//! Per-age-cohort compartment counts.
//!
//! Each cohort is a closed population: the transition engine only moves people between the
//! seven compartments of a cohort, so the cohort total is fixed from reset onward. Fatal and
//! recovered are absorbing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infectious,
    Severe,
    Critical,
    Fatal,
    Recovered,
}

impl Compartment {
    /// The compartments exposed to the policy, in observation order.
    pub const OBSERVED: [Compartment; 5] = [
        Compartment::Infectious,
        Compartment::Severe,
        Compartment::Critical,
        Compartment::Fatal,
        Compartment::Recovered,
    ];
}

/// Number of people moving along each edge of the progression graph during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CohortFlows {
    pub susceptible_to_exposed: u64,
    pub exposed_to_infectious: u64,
    pub infectious_to_recovered: u64,
    pub infectious_to_severe: u64,
    pub severe_to_recovered: u64,
    pub severe_to_critical: u64,
    pub critical_to_severe: u64,
    pub critical_to_fatal: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompartmentCounts {
    pub susceptible: u64,
    pub exposed: u64,
    pub infectious: u64,
    pub severe: u64,
    pub critical: u64,
    pub fatal: u64,
    pub recovered: u64,
}

impl CompartmentCounts {
    /// Seeds a cohort holding `fraction` of `population`. One nominal index case is
    /// distributed by the same fraction and truncated, so every band with a fraction below
    /// one starts without exposed people.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn seeded(population: u64, fraction: f64) -> Self {
        const INITIAL_CASES: f64 = 1.0;
        let cohort_size = (population as f64 * fraction).floor() as u64;
        let exposed = ((INITIAL_CASES * fraction).floor() as u64).min(cohort_size);
        CompartmentCounts {
            susceptible: cohort_size - exposed,
            exposed,
            ..CompartmentCounts::default()
        }
    }

    #[must_use]
    pub fn get(&self, compartment: Compartment) -> u64 {
        match compartment {
            Compartment::Susceptible => self.susceptible,
            Compartment::Exposed => self.exposed,
            Compartment::Infectious => self.infectious,
            Compartment::Severe => self.severe,
            Compartment::Critical => self.critical,
            Compartment::Fatal => self.fatal,
            Compartment::Recovered => self.recovered,
        }
    }

    /// Total of all seven compartments.
    #[must_use]
    pub fn total(&self) -> u64 {
        Compartment::iter().map(|c| self.get(c)).sum()
    }

    /// Returns the counts after moving `flows`. The flows must have been capped against
    /// these counts, see `TransitionEngine::draw_flows`.
    #[must_use]
    pub fn apply(&self, flows: &CohortFlows) -> CompartmentCounts {
        debug_assert!(flows.susceptible_to_exposed <= self.susceptible);
        debug_assert!(flows.exposed_to_infectious <= self.exposed);
        debug_assert!(flows.infectious_to_recovered + flows.infectious_to_severe <= self.infectious);
        debug_assert!(flows.severe_to_recovered + flows.severe_to_critical <= self.severe);
        debug_assert!(flows.critical_to_severe + flows.critical_to_fatal <= self.critical);

        CompartmentCounts {
            susceptible: self.susceptible - flows.susceptible_to_exposed,
            exposed: self.exposed + flows.susceptible_to_exposed - flows.exposed_to_infectious,
            infectious: self.infectious + flows.exposed_to_infectious
                - flows.infectious_to_recovered
                - flows.infectious_to_severe,
            severe: self.severe + flows.infectious_to_severe + flows.critical_to_severe
                - flows.severe_to_recovered
                - flows.severe_to_critical,
            critical: self.critical + flows.severe_to_critical
                - flows.critical_to_severe
                - flows.critical_to_fatal,
            fatal: self.fatal + flows.critical_to_fatal,
            recovered: self.recovered + flows.infectious_to_recovered + flows.severe_to_recovered,
        }
    }
}

/// Compartment counts of every age cohort, keyed by age band. Iteration follows the
/// configuration order of the bands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationState {
    cohorts: IndexMap<String, CompartmentCounts>,
}

impl PopulationState {
    #[must_use]
    pub fn new() -> Self {
        PopulationState::default()
    }

    /// Adds a cohort at the end of the ordering, or replaces the counts of an existing one in place.
    pub fn insert(&mut self, age: &str, counts: CompartmentCounts) {
        self.cohorts.insert(age.to_string(), counts);
    }

    #[must_use]
    pub fn cohort(&self, age: &str) -> Option<&CompartmentCounts> {
        self.cohorts.get(age)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompartmentCounts)> {
        self.cohorts.iter()
    }

    pub(crate) fn counts_mut(&mut self) -> impl Iterator<Item = &mut CompartmentCounts> {
        self.cohorts.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    /// Sum of one compartment across all cohorts.
    #[must_use]
    pub fn total(&self, compartment: Compartment) -> u64 {
        self.cohorts.values().map(|c| c.get(compartment)).sum()
    }

    #[must_use]
    pub fn total_population(&self) -> u64 {
        self.cohorts.values().map(CompartmentCounts::total).sum()
    }
}
