pub mod check;
pub mod overrides;
pub mod run;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use cycler_core::CyclerConfig;
use cycler_state::StateStore;

use crate::StoreArgs;

/// Used when neither `--state` nor `state_path` is given.
const DEFAULT_STATE_PATH: &str = "cycler-state.redb";

/// Parse `--at`, or read the local clock.
pub fn parse_clock(at: Option<&str>) -> anyhow::Result<DateTime<Local>> {
    match at {
        Some(text) => Ok(DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("invalid --at time {text:?}"))?
            .with_timezone(&Local)),
        None => Ok(Local::now()),
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<CyclerConfig> {
    let config = CyclerConfig::from_file(path)?;
    config.validate()?;
    Ok(config)
}

pub fn open_state(args: &StoreArgs, config: &CyclerConfig) -> anyhow::Result<StateStore> {
    let path = args
        .state
        .clone()
        .or_else(|| config.defaults.state_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));
    StateStore::open(&path).with_context(|| format!("opening state at {}", path.display()))
}
