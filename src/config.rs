use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = ".covidash";
const CONFIG_FILE: &str = "config.json";
const DATASET_FILE: &str = "covid_19_indonesia_time_series_all.csv";

pub const DEFAULT_TOP_PROVINCES: usize = 10;
pub const DEFAULT_TOP_ISLANDS: usize = 7;
pub const TOP_PROVINCES_RANGE: (usize, usize) = (5, 20);
pub const TOP_ISLANDS_RANGE: (usize, usize) = (3, 7);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub report_dir: PathBuf,
    pub api_port: u16,
    pub top_provinces: usize,
    pub top_islands: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            dataset_path: root.join("data").join(DATASET_FILE),
            report_dir: default_report_dir(),
            api_port: 8642,
            top_provinces: DEFAULT_TOP_PROVINCES,
            top_islands: DEFAULT_TOP_ISLANDS,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        // Hand-edited files may carry ranking sizes outside the dashboard's
        // slider ranges; pull them back in rather than failing.
        config.top_provinces = config
            .top_provinces
            .clamp(TOP_PROVINCES_RANGE.0, TOP_PROVINCES_RANGE.1);
        config.top_islands = config
            .top_islands
            .clamp(TOP_ISLANDS_RANGE.0, TOP_ISLANDS_RANGE.1);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.dataset_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.as_path().display()
            )
        })?;

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "dataset_path" => {
                self.dataset_path = expand_home(value);
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "top_provinces" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("top_provinces must be a number"))?;
                let (low, high) = TOP_PROVINCES_RANGE;
                if !(low..=high).contains(&parsed) {
                    bail!("top_provinces must be between {low} and {high}");
                }
                self.top_provinces = parsed;
            }
            "top_islands" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("top_islands must be a number"))?;
                let (low, high) = TOP_ISLANDS_RANGE;
                if !(low..=high).contains(&parsed) {
                    bail!("top_islands must be between {low} and {high}");
                }
                self.top_islands = parsed;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: dataset_path|dataset.path, report_dir|report.dir, api_port|api.port, top_provinces|dashboard.top_provinces, top_islands|dashboard.top_islands"
                );
            }
        }

        if normalized == "report_dir" {
            fs::create_dir_all(&self.report_dir).with_context(|| {
                format!(
                    "Failed to create report directory: {}",
                    self.report_dir.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "dataset_path" => Some(self.dataset_path.display().to_string()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "top_provinces" => Some(self.top_provinces.to_string()),
            "top_islands" => Some(self.top_islands.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "dataset_path" | "dataset.path" => "dataset_path",
        "report_dir" | "report.dir" => "report_dir",
        "api_port" | "api.port" => "api_port",
        "top_provinces" | "dashboard.top_provinces" => "top_provinces",
        "top_islands" | "dashboard.top_islands" => "top_islands",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("covidash")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
