//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HgError, Result};

/// Full habitgrid configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub autoscroll: AutoScrollConfig,
    pub paths: PathsConfig,
}

/// Layout constants used for section height estimation.
///
/// The tracker grid renders a fixed number of icons per row regardless of
/// device width, so heights are a pure function of tracker count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Tracker icons per grid row.
    pub items_per_row: usize,
    /// Side length of one square tracker icon, in px.
    pub item_size: f64,
    /// Vertical spacing between icon rows, in px.
    pub item_spacing: f64,
    /// Height of a section's header chrome (title row + padding), in px.
    pub base_row_height: f64,
    /// Vertical gap between adjacent sections including border, in px.
    pub section_margin: f64,
}

/// Edge auto-scroll behavior during a drag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoScrollConfig {
    /// Distance from a screen edge at which auto-scroll engages, in px.
    pub edge_margin: f64,
    /// Scroll distance applied per tick, in px.
    pub scroll_step: f64,
    /// Tick period of the auto-scroll timer, in milliseconds.
    pub tick_interval_ms: u64,
}

/// Filesystem paths used by habitgrid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub sqlite_db: PathBuf,
    pub journal_log: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            items_per_row: 4,
            item_size: 76.0,
            item_spacing: 12.0,
            base_row_height: 66.666,
            section_margin: 17.0,
        }
    }
}

impl Default for AutoScrollConfig {
    fn default() -> Self {
        Self {
            edge_margin: 150.0,
            scroll_step: 5.0,
            tick_interval_ms: 16,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[HG-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("habitgrid").join("config.toml");
        let data = home_dir.join(".local").join("share").join("habitgrid");
        Self {
            config_file: cfg,
            sqlite_db: data.join("trackers.sqlite3"),
            journal_log: data.join("reorder.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HgError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // layout
        set_env_usize(
            "HABITGRID_LAYOUT_ITEMS_PER_ROW",
            &mut self.layout.items_per_row,
        )?;
        set_env_f64("HABITGRID_LAYOUT_ITEM_SIZE", &mut self.layout.item_size)?;
        set_env_f64(
            "HABITGRID_LAYOUT_ITEM_SPACING",
            &mut self.layout.item_spacing,
        )?;
        set_env_f64(
            "HABITGRID_LAYOUT_BASE_ROW_HEIGHT",
            &mut self.layout.base_row_height,
        )?;
        set_env_f64(
            "HABITGRID_LAYOUT_SECTION_MARGIN",
            &mut self.layout.section_margin,
        )?;

        // autoscroll
        set_env_f64(
            "HABITGRID_AUTOSCROLL_EDGE_MARGIN",
            &mut self.autoscroll.edge_margin,
        )?;
        set_env_f64(
            "HABITGRID_AUTOSCROLL_SCROLL_STEP",
            &mut self.autoscroll.scroll_step,
        )?;
        set_env_u64(
            "HABITGRID_AUTOSCROLL_TICK_INTERVAL_MS",
            &mut self.autoscroll.tick_interval_ms,
        )?;

        // paths
        if let Some(raw) = env_var("HABITGRID_SQLITE_DB") {
            self.paths.sqlite_db = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("HABITGRID_JOURNAL_LOG") {
            self.paths.journal_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.layout.items_per_row == 0 {
            return Err(HgError::InvalidConfig {
                details: "layout.items_per_row must be >= 1".to_string(),
            });
        }
        for (name, val) in [
            ("item_size", self.layout.item_size),
            ("item_spacing", self.layout.item_spacing),
            ("base_row_height", self.layout.base_row_height),
            ("section_margin", self.layout.section_margin),
        ] {
            if !val.is_finite() || val < 0.0 {
                return Err(HgError::InvalidConfig {
                    details: format!("layout.{name} must be a finite value >= 0, got {val}"),
                });
            }
        }
        if self.layout.item_size == 0.0 {
            return Err(HgError::InvalidConfig {
                details: "layout.item_size must be > 0".to_string(),
            });
        }

        if !self.autoscroll.edge_margin.is_finite() || self.autoscroll.edge_margin < 0.0 {
            return Err(HgError::InvalidConfig {
                details: format!(
                    "autoscroll.edge_margin must be a finite value >= 0, got {}",
                    self.autoscroll.edge_margin
                ),
            });
        }
        if !self.autoscroll.scroll_step.is_finite() || self.autoscroll.scroll_step <= 0.0 {
            return Err(HgError::InvalidConfig {
                details: format!(
                    "autoscroll.scroll_step must be > 0, got {}",
                    self.autoscroll.scroll_step
                ),
            });
        }
        if self.autoscroll.tick_interval_ms == 0 {
            return Err(HgError::InvalidConfig {
                details: "autoscroll.tick_interval_ms must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<f64>().map_err(|error| HgError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| HgError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| HgError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, HgError};
    use std::path::Path;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_items_per_row_rejected() {
        let mut cfg = Config::default();
        cfg.layout.items_per_row = 0;
        let err = cfg.validate().expect_err("expected items_per_row error");
        assert!(err.to_string().contains("items_per_row"));
    }

    #[test]
    fn zero_item_size_rejected() {
        let mut cfg = Config::default();
        cfg.layout.item_size = 0.0;
        let err = cfg.validate().expect_err("expected item_size error");
        assert!(err.to_string().contains("item_size"));
    }

    #[test]
    fn negative_section_margin_rejected() {
        let mut cfg = Config::default();
        cfg.layout.section_margin = -1.0;
        let err = cfg.validate().expect_err("expected section_margin error");
        assert!(err.to_string().contains("section_margin"));
    }

    #[test]
    fn non_finite_edge_margin_rejected() {
        let mut cfg = Config::default();
        cfg.autoscroll.edge_margin = f64::NAN;
        let err = cfg.validate().expect_err("expected edge_margin error");
        assert!(err.to_string().contains("edge_margin"));
    }

    #[test]
    fn zero_scroll_step_rejected() {
        let mut cfg = Config::default();
        cfg.autoscroll.scroll_step = 0.0;
        let err = cfg.validate().expect_err("expected scroll_step error");
        assert!(err.to_string().contains("scroll_step"));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let mut cfg = Config::default();
        cfg.autoscroll.tick_interval_ms = 0;
        let err = cfg.validate().expect_err("expected tick interval error");
        assert!(err.to_string().contains("tick_interval_ms"));
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/habitgrid/config.toml")));
        let err = result.unwrap_err();
        assert!(matches!(err, HgError::MissingConfig { .. }));
    }

    #[test]
    fn toml_round_trip_preserves_layout() {
        let cfg = Config::default();
        let raw = toml::to_string(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(parsed.layout, cfg.layout);
        assert_eq!(parsed.autoscroll, cfg.autoscroll);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[layout]\nitems_per_row = 5\n").expect("parse");
        assert_eq!(parsed.layout.items_per_row, 5);
        assert_eq!(parsed.layout.section_margin, 17.0);
        assert_eq!(parsed.autoscroll.tick_interval_ms, 16);
    }
}
