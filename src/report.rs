//! CSV trajectory reports.
//!
//! An [`EpisodeReport`] records one row per age cohort per step, so an episode can be
//! plotted or analysed after the fact.

use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::compartments::PopulationState;
use crate::error::Covid19GymError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortRecord {
    pub step: u64,
    pub age: String,
    pub susceptible: u64,
    pub exposed: u64,
    pub infectious: u64,
    pub severe: u64,
    pub critical: u64,
    pub fatal: u64,
    pub recovered: u64,
    pub action: f64,
    pub reward: f64,
    pub done: bool,
}

pub struct EpisodeReport<W: Write> {
    writer: Writer<W>,
}

impl EpisodeReport<File> {
    /// Creates the report file and all parent directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns a `Covid19GymError` if the path does not name a CSV file or cannot be created.
    pub fn create(path: &Path) -> Result<Self, Covid19GymError> {
        match path.extension().and_then(OsStr::to_str) {
            Some("csv") => {
                if let Some(parent) = path.parent() {
                    create_dir_all(parent)?;
                }
                let file = File::create(path)?;
                Ok(EpisodeReport::from_writer(file))
            }
            _ => Err(Covid19GymError::InvalidConfiguration(format!(
                "report output files must be CSVs, got {}",
                path.display()
            ))),
        }
    }
}

impl<W: Write> EpisodeReport<W> {
    pub fn from_writer(writer: W) -> Self {
        EpisodeReport {
            writer: Writer::from_writer(writer),
        }
    }

    /// Writes the counts of every cohort as of `step`. Step 0 is the state after reset,
    /// recorded with a zero action and reward.
    ///
    /// # Errors
    ///
    /// Returns a `Covid19GymError` if a row cannot be written.
    pub fn record(
        &mut self,
        step: u64,
        state: &PopulationState,
        action: f64,
        reward: f64,
        done: bool,
    ) -> Result<(), Covid19GymError> {
        for (age, counts) in state.iter() {
            self.writer.serialize(CohortRecord {
                step,
                age: age.clone(),
                susceptible: counts.susceptible,
                exposed: counts.exposed,
                infectious: counts.infectious,
                severe: counts.severe,
                critical: counts.critical,
                fatal: counts.fatal,
                recovered: counts.recovered,
                action,
                reward,
                done,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a `Covid19GymError` if buffered rows cannot be flushed.
    pub fn into_inner(self) -> Result<W, Covid19GymError> {
        self.writer
            .into_inner()
            .map_err(|e| Covid19GymError::IoError(e.into_error()))
    }
}
