use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use crate::compartments::Compartment;
use crate::environment::{Covid19Env, Env};
use crate::error::Covid19GymError;
use crate::log::LogSpec;
use crate::parameters::GymConfig;
use crate::report::EpisodeReport;

/// Name of the trajectory report written to `--output-dir`.
pub const EPISODE_REPORT_FILE: &str = "episode.csv";

/// Default cli arguments for the covid19-gym runner
#[derive(Parser, Debug, Default)]
#[command(name = "covid19-gym", about = "Run one episode of the COVID-19 isolation environment")]
pub struct BaseArgs {
    /// Random seed. Overrides the seed of the config file.
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a JSON config file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional path for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Constant isolation intensity applied every step
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub action: f64,

    /// Episode length. Overrides the config file.
    #[arg(short, long)]
    pub max_steps: Option<u64>,

    /// Enable logging: a level (`info`) or `module=level` pairs, comma separated
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// What happened during an episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub steps: u64,
    pub total_reward: f64,
    pub fatal: u64,
    pub recovered: u64,
    pub icu_overflow: bool,
    pub report: Option<PathBuf>,
}

impl std::fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "steps: {}", self.steps)?;
        writeln!(f, "total reward: {}", self.total_reward)?;
        writeln!(f, "fatal: {}", self.fatal)?;
        writeln!(f, "recovered: {}", self.recovered)?;
        write!(f, "icu overflow: {}", self.icu_overflow)?;
        if let Some(report) = &self.report {
            write!(f, "\nreport: {}", report.display())?;
        }
        Ok(())
    }
}

/// Builds the configuration for a run: the config file if one was given, else the defaults,
/// then the command line overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the result is invalid.
pub fn load_config(args: &BaseArgs) -> Result<GymConfig, Covid19GymError> {
    let mut config = if args.config.is_empty() {
        GymConfig::default()
    } else {
        info!("Loading config from: {}", args.config);
        GymConfig::from_json_file(Path::new(&args.config))?
    };
    if let Some(seed) = args.random_seed {
        config.seed = seed;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    config.validate()?;
    Ok(config)
}

/// Parses command line arguments and runs one episode.
///
/// # Errors
/// Returns an error if argument parsing or the episode fails
pub fn run_with_args() -> Result<EpisodeSummary, Covid19GymError> {
    let args = BaseArgs::parse();
    run_with_args_internal(&args)
}

/// Runs one episode to termination under the constant policy `args.action`.
///
/// # Errors
/// Returns an error if the configuration is invalid, the action is not finite or the report
/// cannot be written.
pub fn run_with_args_internal(args: &BaseArgs) -> Result<EpisodeSummary, Covid19GymError> {
    if let Some(log_level) = &args.log_level {
        log_level.parse::<LogSpec>()?.apply();
    }

    let config = load_config(args)?;
    let mut env = Covid19Env::new(config)?;

    let mut report = None;
    let mut report_path = None;
    if !args.output_dir.is_empty() {
        let path = PathBuf::from(&args.output_dir).join(EPISODE_REPORT_FILE);
        report = Some(EpisodeReport::create(&path)?);
        report_path = Some(path);
    }

    env.reset()?;
    if let Some(report) = report.as_mut() {
        report.record(0, env.state(), 0.0, 0.0, false)?;
    }

    let mut total_reward = 0.0;
    loop {
        let (_observation, reward, done, _info) = env.step(args.action)?;
        total_reward += reward;
        if let Some(report) = report.as_mut() {
            report.record(env.steps(), env.state(), args.action, reward, done)?;
        }
        if done {
            break;
        }
    }

    let summary = EpisodeSummary {
        steps: env.steps(),
        total_reward,
        fatal: env.state().total(Compartment::Fatal),
        recovered: env.state().total(Compartment::Recovered),
        icu_overflow: env.icu_overflow(),
        report: report_path,
    };
    info!(
        "episode finished after {} steps with reward {}",
        summary.steps, summary.total_reward
    );
    Ok(summary)
}
