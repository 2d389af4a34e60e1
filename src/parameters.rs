//! Static configuration of the environment: severity assumptions per age band, population
//! demographics and epidemiological rate constants.
//!
//! The defaults are illustrative values for Germany early in the COVID-19 pandemic, heavily
//! based on the [covid19_scenarios](https://github.com/neherlab/covid19_scenarios) tables.
//! They are not calibrated inputs.
//!
//! A [`GymConfig`] is either built in code with [`GymConfigBuilder`] or loaded from a JSON
//! file with [`GymConfig::from_json_file`]. Either way it must pass [`GymConfig::validate`]
//! before an environment will accept it.

use std::fs;
use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::Covid19GymError;

/// Maximum allowed deviation of the sum of the age distribution from 1.
pub const AGE_DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Largest Poisson mean the sampler accepts (`rand_distr::Poisson` rejects anything above
/// roughly `u64::MAX`).
pub const MAX_POISSON_MEAN: f64 = 1.844e19;

/// One row of the severity table. The first column is the fraction of infections that are
/// reflected in the statistics, the following columns the fraction of the previous category
/// that deteriorates to the next.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SeverityAssumption {
    pub age: String,
    pub pct_confirmed: f64,
    pub pct_severity: f64,
    /// Given severe.
    pub pct_critical: f64,
    /// Given critical.
    pub pct_fatal: f64,
}

impl SeverityAssumption {
    #[must_use]
    pub fn new(
        age: &str,
        pct_confirmed: f64,
        pct_severity: f64,
        pct_critical: f64,
        pct_fatal: f64,
    ) -> Self {
        SeverityAssumption {
            age: age.to_string(),
            pct_confirmed,
            pct_severity,
            pct_critical,
            pct_fatal,
        }
    }

    fn probabilities(&self) -> [(&'static str, f64); 4] {
        [
            ("pct_confirmed", self.pct_confirmed),
            ("pct_severity", self.pct_severity),
            ("pct_critical", self.pct_critical),
            ("pct_fatal", self.pct_fatal),
        ]
    }
}

/// The severity table, one row per age band in configuration order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct SeverityAssumptions(pub Vec<SeverityAssumption>);

impl SeverityAssumptions {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeverityAssumption> {
        self.0.iter()
    }
}

impl Default for SeverityAssumptions {
    fn default() -> Self {
        SeverityAssumptions(vec![
            SeverityAssumption::new("0-9", 0.05, 0.01, 0.05, 0.3),
            SeverityAssumption::new("10-19", 0.05, 0.03, 0.1, 0.3),
            SeverityAssumption::new("20-29", 0.1, 0.03, 0.1, 0.3),
            SeverityAssumption::new("30-39", 0.15, 0.03, 0.15, 0.3),
            SeverityAssumption::new("40-49", 0.2, 0.06, 0.2, 0.3),
            SeverityAssumption::new("50-59", 0.25, 0.1, 0.25, 0.4),
            SeverityAssumption::new("60-69", 0.3, 0.25, 0.35, 0.4),
            SeverityAssumption::new("70-79", 0.4, 0.35, 0.45, 0.5),
            SeverityAssumption::new("80+", 0.5, 0.5, 0.55, 0.5),
        ])
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PopulationParameters {
    pub population: u64,
    /// Fraction of the population in each age band, aligned with the severity table.
    pub age_distribution: Vec<f64>,
    /// Mean number of uncontrolled warm-up days run at reset.
    pub initial_days: f64,
    pub imports_per_day: f64,
    /// Carried with the demographics but not enforced by the transition engine.
    pub hospital_beds: u64,
    pub icu_beds: u64,
    pub isolation_effectiveness: f64,
}

impl Default for PopulationParameters {
    fn default() -> Self {
        PopulationParameters {
            population: 83_784_000,
            age_distribution: vec![
                0.093, 0.096, 0.112, 0.128, 0.125, 0.162, 0.124, 0.091, 0.069,
            ],
            initial_days: 14.0,
            imports_per_day: 12.2,
            hospital_beds: 500_680,
            icu_beds: 23_890,
            isolation_effectiveness: 0.9,
        }
    }
}

/// Durations are in days.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EpidemiologyParameters {
    #[serde(rename = "R0", alias = "r0")]
    pub r0: f64,
    pub latency_period: f64,
    pub infectious_period: f64,
    pub hospital_stay: f64,
    pub icu_stay: f64,
}

impl Default for EpidemiologyParameters {
    fn default() -> Self {
        EpidemiologyParameters {
            r0: 2.7,
            latency_period: 5.0,
            infectious_period: 3.0,
            hospital_stay: 4.0,
            icu_stay: 14.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[serde(default)]
pub struct GymConfig {
    #[builder(default)]
    pub population: PopulationParameters,

    #[builder(default)]
    pub epidemiology: EpidemiologyParameters,

    #[builder(default)]
    pub severity: SeverityAssumptions,

    #[builder(default = "1.0")]
    pub time_delta: f64,

    #[builder(default = "150")]
    pub max_steps: u64,

    #[builder(default = "0")]
    pub seed: u64,
}

impl Default for GymConfig {
    fn default() -> Self {
        GymConfig {
            population: PopulationParameters::default(),
            epidemiology: EpidemiologyParameters::default(),
            severity: SeverityAssumptions::default(),
            time_delta: 1.0,
            max_steps: 150,
            seed: 0,
        }
    }
}

fn invalid(msg: String) -> Covid19GymError {
    Covid19GymError::InvalidConfiguration(msg)
}

fn check_probability(name: &str, value: f64) -> Result<(), Covid19GymError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), Covid19GymError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be strictly positive, got {value}")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), Covid19GymError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be non-negative, got {value}")))
    }
}

impl GymConfig {
    /// Loads a configuration from a JSON file. Fields missing from the file take their
    /// default values. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns a `Covid19GymError` if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_json_file(path: &Path) -> Result<GymConfig, Covid19GymError> {
        let data = fs::read_to_string(path)?;
        let config: GymConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of age cohorts.
    #[must_use]
    pub fn cohorts(&self) -> usize {
        self.severity.len()
    }

    /// # Errors
    ///
    /// Returns `Covid19GymError::InvalidConfiguration` describing the first field found to
    /// be out of range.
    pub fn validate(&self) -> Result<(), Covid19GymError> {
        let population = &self.population;
        let epidemiology = &self.epidemiology;

        if self.severity.is_empty() {
            return Err(invalid("severity table has no age bands".to_string()));
        }
        for (i, row) in self.severity.iter().enumerate() {
            if self.severity.0[..i].iter().any(|other| other.age == row.age) {
                return Err(invalid(format!("age band {} appears twice", row.age)));
            }
            for (name, value) in row.probabilities() {
                check_probability(&format!("{name} for age band {}", row.age), value)?;
            }
        }

        if population.age_distribution.len() != self.severity.len() {
            return Err(invalid(format!(
                "age distribution has {} entries but the severity table has {} age bands",
                population.age_distribution.len(),
                self.severity.len()
            )));
        }
        for fraction in &population.age_distribution {
            check_probability("age distribution fraction", *fraction)?;
        }
        let sum: f64 = population.age_distribution.iter().sum();
        if (sum - 1.0).abs() > AGE_DISTRIBUTION_TOLERANCE {
            return Err(invalid(format!(
                "age distribution must sum to 1, got {sum}"
            )));
        }

        if population.population == 0 {
            return Err(invalid("population must be positive".to_string()));
        }
        check_probability(
            "isolation_effectiveness",
            population.isolation_effectiveness,
        )?;
        check_non_negative("imports_per_day", population.imports_per_day)?;
        check_non_negative("initial_days", population.initial_days)?;

        check_non_negative("R0", epidemiology.r0)?;
        check_positive("latency_period", epidemiology.latency_period)?;
        check_positive("infectious_period", epidemiology.infectious_period)?;
        check_positive("hospital_stay", epidemiology.hospital_stay)?;
        check_positive("icu_stay", epidemiology.icu_stay)?;

        check_positive("time_delta", self.time_delta)?;
        self.check_poisson_means()
    }

    /// Every flow mean is bounded by its rate times the whole population times `time_delta`,
    /// and the import mean by `imports_per_day` times `time_delta`. Keeping those bounds within
    /// the sampler's range means no step can fail to sample.
    #[allow(clippy::cast_precision_loss)]
    fn check_poisson_means(&self) -> Result<(), Covid19GymError> {
        let epi = &self.epidemiology;
        let population = self.population.population as f64;
        let dt = self.time_delta;
        let bounds = [
            ("initial_days", self.population.initial_days),
            ("imports_per_day * time_delta", self.population.imports_per_day * dt),
            (
                "population * infection rate * time_delta",
                population * epi.r0 / (epi.infectious_period + epi.latency_period) * dt,
            ),
            (
                "population * time_delta / latency_period",
                population * dt / epi.latency_period,
            ),
            (
                "population * time_delta / infectious_period",
                population * dt / epi.infectious_period,
            ),
            (
                "population * time_delta / hospital_stay",
                population * dt / epi.hospital_stay,
            ),
            (
                "population * time_delta / icu_stay",
                population * dt / epi.icu_stay,
            ),
        ];
        for (name, mean) in bounds {
            if !(mean.is_finite() && mean <= MAX_POISSON_MEAN) {
                return Err(invalid(format!(
                    "{name} = {mean} exceeds the largest samplable Poisson mean {MAX_POISSON_MEAN}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GymConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cohorts(), 9);
        assert_eq!(config.severity.0[8].age, "80+");
    }

    #[test]
    fn builder_matches_default() {
        let config = GymConfigBuilder::default().build().unwrap();
        assert_eq!(config, GymConfig::default());

        let config = GymConfigBuilder::default()
            .max_steps(5)
            .seed(42)
            .build()
            .unwrap();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.population, PopulationParameters::default());
    }

    #[test]
    fn rejects_age_distribution_not_summing_to_one() {
        let mut config = GymConfig::default();
        config.population.age_distribution[0] += 0.01;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Covid19GymError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("sum to 1"));
    }

    #[test]
    fn rejects_mismatched_age_bands() {
        let mut config = GymConfig::default();
        config.population.age_distribution = vec![0.5, 0.5];
        assert!(matches!(
            config.validate(),
            Err(Covid19GymError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let mut config = GymConfig::default();
        config.severity.0[3].pct_fatal = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pct_fatal for age band 30-39"));

        let mut config = GymConfig::default();
        config.population.isolation_effectiveness = -0.1;
        assert!(config.validate().is_err());

        let mut config = GymConfig::default();
        config.severity.0[0].pct_severity = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_durations() {
        let mut config = GymConfig::default();
        config.epidemiology.icu_stay = 0.0;
        assert!(config.validate().is_err());

        let mut config = GymConfig::default();
        config.time_delta = -1.0;
        assert!(config.validate().is_err());

        let mut config = GymConfig::default();
        config.population.population = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_severity_table() {
        let mut config = GymConfig::default();
        config.severity = SeverityAssumptions(Vec::new());
        config.population.age_distribution = Vec::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no age bands"));
    }

    #[test]
    fn rejects_negative_rates() {
        let cases: [(&str, fn(&mut GymConfig)); 9] = [
            ("imports_per_day", |c| c.population.imports_per_day = -1.0),
            ("imports_per_day", |c| c.population.imports_per_day = f64::NAN),
            ("initial_days", |c| c.population.initial_days = -2.0),
            ("initial_days", |c| c.population.initial_days = f64::INFINITY),
            ("R0", |c| c.epidemiology.r0 = -0.5),
            ("R0", |c| c.epidemiology.r0 = f64::NAN),
            ("time_delta", |c| c.time_delta = f64::INFINITY),
            ("latency_period", |c| c.epidemiology.latency_period = f64::NAN),
            ("hospital_stay", |c| c.epidemiology.hospital_stay = f64::INFINITY),
        ];
        for (field, corrupt) in cases {
            let mut config = GymConfig::default();
            corrupt(&mut config);
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, Covid19GymError::InvalidConfiguration(_)),
                "{field}"
            );
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn rejects_unsamplable_means() {
        let mut config = GymConfig::default();
        config.population.imports_per_day = 1e20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("imports_per_day * time_delta"));

        // Each factor is fine on its own, the product is not.
        let mut config = GymConfig::default();
        config.population.imports_per_day = 1e10;
        config.time_delta = 1e10;
        assert!(config.validate().is_err());

        let mut config = GymConfig::default();
        config.epidemiology.icu_stay = 1e-15;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("icu_stay"));

        let mut config = GymConfig::default();
        config.epidemiology.r0 = 1e15;
        assert!(config.validate().is_err());

        let mut config = GymConfig::default();
        config.population.imports_per_day = 1e18;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_age_band() {
        let mut config = GymConfig::default();
        config.severity.0[1].age = "0-9".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("appears twice"));
    }

    #[test]
    fn loads_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "max_steps": 30,
                "seed": 7,
                "epidemiology": {{ "R0": 1.5 }},
                "population": {{ "icu_beds": 100 }}
            }}"#
        )
        .unwrap();

        let config = GymConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_steps, 30);
        assert_eq!(config.seed, 7);
        assert_eq!(config.epidemiology.r0, 1.5);
        assert_eq!(config.epidemiology.icu_stay, 14.0);
        assert_eq!(config.population.icu_beds, 100);
        assert_eq!(config.population.population, 83_784_000);
    }

    #[test]
    fn json_load_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "population": {{ "age_distribution": [1.0] }} }}"#).unwrap();
        assert!(matches!(
            GymConfig::from_json_file(file.path()),
            Err(Covid19GymError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn json_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            GymConfig::from_json_file(file.path()),
            Err(Covid19GymError::JsonError(_))
        ));
    }
}
