//! Configuration loading and root folder resolution
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `WELLPATH_ROOT` environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and compiled
//! defaults are used. A malformed file is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_ENV_VAR: &str = "WELLPATH_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "wellpath.db";

/// Minimum 0-100 score for a fuzzy product match to be accepted
pub const DEFAULT_MATCH_ACCEPTANCE_SCORE: f64 = 30.0;
/// Score awarded when normalized names are identical
pub const DEFAULT_EXACT_MATCH_SCORE: f64 = 100.0;
/// Score awarded when two names resolve to the same synonym entry
pub const DEFAULT_SYNONYM_MATCH_SCORE: f64 = 90.0;
/// Multiplier applied to the 0-1 similarity ratio
pub const DEFAULT_SIMILARITY_WEIGHT: f64 = 80.0;
/// Suitability must be strictly greater than this to surface a candidate
pub const DEFAULT_MIN_SUITABILITY: u8 = 20;
/// Applicability points removed per matched medium contraindication
pub const DEFAULT_MEDIUM_DEDUCTION: u8 = 50;
/// Applicability points removed per matched low contraindication
pub const DEFAULT_LOW_DEDUCTION: u8 = 25;
/// Combined score at or above which a candidate is tiered `immediate`
pub const DEFAULT_IMMEDIATE_MIN_COMBINED: f64 = 70.0;
/// Combined score at or above which a candidate is tiered `foundation`
pub const DEFAULT_FOUNDATION_MIN_COMBINED: f64 = 40.0;
/// Currency all bundle arithmetic is carried out in
pub const DEFAULT_REFERENCE_CURRENCY: &str = "USD";

/// One step of the volume discount function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Smallest priced item count that qualifies for this step
    pub min_items: usize,
    /// Discount percentage (0-100)
    pub percentage: u32,
}

/// Default discount steps: 3-5 → 10%, 6-9 → 15%, 10+ → 20%
pub fn default_discount_tiers() -> Vec<DiscountTier> {
    vec![
        DiscountTier { min_items: 3, percentage: 10 },
        DiscountTier { min_items: 6, percentage: 15 },
        DiscountTier { min_items: 10, percentage: 20 },
    ]
}

/// Tunable engine thresholds
///
/// Every field defaults to the matching `DEFAULT_*` constant, so a TOML
/// `[engine]` table only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineThresholds {
    pub match_acceptance_score: f64,
    pub exact_match_score: f64,
    pub synonym_match_score: f64,
    pub similarity_weight: f64,
    pub min_suitability: u8,
    pub medium_deduction: u8,
    pub low_deduction: u8,
    pub immediate_min_combined: f64,
    pub foundation_min_combined: f64,
    pub discount_tiers: Vec<DiscountTier>,
    pub reference_currency: String,
}

impl Default for EngineThresholds {
    fn default() -> Self {
        Self {
            match_acceptance_score: DEFAULT_MATCH_ACCEPTANCE_SCORE,
            exact_match_score: DEFAULT_EXACT_MATCH_SCORE,
            synonym_match_score: DEFAULT_SYNONYM_MATCH_SCORE,
            similarity_weight: DEFAULT_SIMILARITY_WEIGHT,
            min_suitability: DEFAULT_MIN_SUITABILITY,
            medium_deduction: DEFAULT_MEDIUM_DEDUCTION,
            low_deduction: DEFAULT_LOW_DEDUCTION,
            immediate_min_combined: DEFAULT_IMMEDIATE_MIN_COMBINED,
            foundation_min_combined: DEFAULT_FOUNDATION_MIN_COMBINED,
            discount_tiers: default_discount_tiers(),
            reference_currency: DEFAULT_REFERENCE_CURRENCY.to_string(),
        }
    }
}

impl EngineThresholds {
    /// Reject out-of-range or non-monotonic values
    pub fn validate(&self) -> Result<()> {
        let percent_fields = [
            ("match_acceptance_score", self.match_acceptance_score),
            ("exact_match_score", self.exact_match_score),
            ("synonym_match_score", self.synonym_match_score),
            ("similarity_weight", self.similarity_weight),
            ("immediate_min_combined", self.immediate_min_combined),
            ("foundation_min_combined", self.foundation_min_combined),
        ];
        for (name, value) in percent_fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::Config(format!(
                    "engine.{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("min_suitability", self.min_suitability),
            ("medium_deduction", self.medium_deduction),
            ("low_deduction", self.low_deduction),
        ] {
            if value > 100 {
                return Err(Error::Config(format!(
                    "engine.{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }

        if self.foundation_min_combined > self.immediate_min_combined {
            return Err(Error::Config(format!(
                "engine.foundation_min_combined ({}) exceeds immediate_min_combined ({})",
                self.foundation_min_combined, self.immediate_min_combined
            )));
        }

        let mut previous: Option<DiscountTier> = None;
        for tier in &self.discount_tiers {
            if tier.percentage > 100 {
                return Err(Error::Config(format!(
                    "discount percentage must be within 0-100, got {}",
                    tier.percentage
                )));
            }
            if let Some(prev) = previous {
                if tier.min_items <= prev.min_items || tier.percentage < prev.percentage {
                    return Err(Error::Config(
                        "engine.discount_tiers must be sorted by min_items with non-decreasing percentages"
                            .to_string(),
                    ));
                }
            }
            previous = Some(*tier);
        }

        if self.reference_currency.trim().is_empty() {
            return Err(Error::Config(
                "engine.reference_currency must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level directive (overridden by `RUST_LOG`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `wellpath.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub engine: EngineThresholds,
}

/// Platform default config file path (`<config_dir>/wellpath/wellpath.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wellpath").join("wellpath.toml"))
}

/// Load and validate a TOML config file
///
/// A missing file yields defaults with a warning. Parse failures and invalid
/// engine thresholds are `Error::Config`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.engine.validate()?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    debug!(path = %path.display(), "Wrote config file");
    Ok(())
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            // %LOCALAPPDATA%\wellpath
            dirs::data_local_dir()
                .map(|d| d.join("wellpath"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wellpath"))
        } else if cfg!(target_os = "macos") {
            // ~/Library/Application Support/wellpath
            dirs::data_dir()
                .map(|d| d.join("wellpath"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wellpath"))
        } else {
            // ~/.local/share/wellpath
            dirs::data_local_dir()
                .map(|d| d.join("wellpath"))
                .unwrap_or_else(|| PathBuf::from("./wellpath_data"))
        };

        Self { root_folder }
    }
}

/// Resolves the root folder from the four configuration tiers
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command-line `--root` value
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// `root_folder` from a loaded TOML config
    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(path = %path.display(), "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!(path = %path, "Root folder from {}", ROOT_ENV_VAR);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(path = %path.display(), "Root folder from config file");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first run and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!(path = %self.root_folder.display(), "Created root folder");
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
