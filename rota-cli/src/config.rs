use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use rota_core::config::WfmConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataSection,
    #[serde(flatten)]
    pub wfm: WfmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// IANA timezone the CSV exports use for local times.
    pub timezone: String,
    /// Default directory for seed files when --data-dir is omitted.
    pub data_dir: PathBuf,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os("ROTA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rota.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    let s = toml::to_string_pretty(&Config::default()).context("serialize defaults")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(back.data.timezone, "UTC");
        assert_eq!(back.wfm.monitor.queue_capacity, 1000);
    }

    #[test]
    fn partial_files_fill_with_defaults() {
        let cfg: Config = toml::from_str(
            "[data]\ntimezone = \"Europe/Moscow\"\n\n[monitor]\nrealtime_period_sec = 2\n",
        )
        .unwrap();
        assert_eq!(cfg.data.timezone, "Europe/Moscow");
        assert_eq!(cfg.wfm.monitor.realtime_period_sec, 2);
        assert_eq!(cfg.wfm.monitor.cooldown_sec, 3600);
    }
}
