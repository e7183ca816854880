//! Runtime configuration for the solver and the HTTP front end.

use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::SchedulingError;

pub const ENV_TIME_LIMIT: &str = "SHIFT_SOLVER_TIME_LIMIT_SECS";
pub const ENV_THREADS: &str = "SHIFT_SOLVER_THREADS";
pub const ENV_RANDOM_SEED: &str = "SHIFT_SOLVER_RANDOM_SEED";
pub const ENV_LOG_TO_CONSOLE: &str = "SHIFT_SOLVER_LOG_TO_CONSOLE";
pub const ENV_MIP_GAP: &str = "SHIFT_SOLVER_MIP_GAP";
pub const ENV_BIND: &str = "SHIFT_SOLVER_BIND";

/// Parameters handed to HiGHS for every stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Wall-clock budget per stage.
    pub time_limit_secs: f64,
    /// 1 keeps the search reproducible.
    pub threads: u32,
    pub random_seed: i32,
    /// Forward HiGHS progress output to the console.
    pub log_to_console: bool,
    pub mip_rel_gap: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 240.0,
            threads: 1,
            random_seed: 1234,
            log_to_console: true,
            mip_rel_gap: None,
        }
    }
}

impl SolverConfig {
    /// Defaults overridden by any `SHIFT_SOLVER_*` variable that is set.
    pub fn from_env() -> Result<Self, SchedulingError> {
        let mut config = Self::default();
        if let Some(v) = read_env(ENV_TIME_LIMIT)? {
            config.time_limit_secs = v;
        }
        if let Some(v) = read_env(ENV_THREADS)? {
            config.threads = v;
        }
        if let Some(v) = read_env(ENV_RANDOM_SEED)? {
            config.random_seed = v;
        }
        if let Some(v) = read_env(ENV_LOG_TO_CONSOLE)? {
            config.log_to_console = v;
        }
        if let Some(v) = read_env(ENV_MIP_GAP)? {
            config.mip_rel_gap = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    /// A request's own solver block, kept within this configuration's
    /// time limit and thread count.
    pub fn bounded_by(&self, limits: &SolverConfig) -> SolverConfig {
        let mut config = self.clone();
        if config.time_limit_secs > limits.time_limit_secs {
            warn!(
                "Requested time limit {}s exceeds the configured {}s, clamping",
                config.time_limit_secs, limits.time_limit_secs
            );
            config.time_limit_secs = limits.time_limit_secs;
        }
        if config.threads > limits.threads {
            warn!(
                "Requested {} solver threads exceeds the configured {}, clamping",
                config.threads, limits.threads
            );
            config.threads = limits.threads;
        }
        config
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if !(self.time_limit_secs.is_finite() && self.time_limit_secs > 0.0) {
            return Err(SchedulingError::Configuration(format!(
                "time limit must be positive, got {}",
                self.time_limit_secs
            )));
        }
        if self.threads == 0 {
            return Err(SchedulingError::Configuration(
                "solver needs at least one thread".to_string(),
            ));
        }
        if let Some(gap) = self.mip_rel_gap {
            if !(0.0..1.0).contains(&gap) {
                return Err(SchedulingError::Configuration(format!(
                    "mip gap must be in [0, 1), got {gap}"
                )));
            }
        }
        Ok(())
    }
}

/// Where the HTTP front end listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        match env::var(ENV_BIND) {
            Ok(bind) if !bind.trim().is_empty() => Self { bind },
            _ => Self::default(),
        }
    }
}

fn read_env<T: FromStr>(key: &str) -> Result<Option<T>, SchedulingError> {
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, SchedulingError> {
    raw.trim().parse().map_err(|_| {
        SchedulingError::Configuration(format!("invalid value {raw:?} for {key}"))
    })
}
