use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Relative weights of the label priority score. Higher scores claim space
/// first; only the ordering they induce matters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelWeights {
    /// Per pixel of event width.
    pub width: f64,
    /// Per unit of the event's explicit `priority`.
    pub priority: f64,
    /// Per natural-log unit of on-screen duration.
    pub duration: f64,
}

impl Default for LabelWeights {
    fn default() -> Self {
        Self {
            width: 1.0,
            priority: 50.0,
            duration: 10.0,
        }
    }
}

/// Every tunable of the layout engine. All fields have defaults, so a
/// config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of the vertical buckets shared by the spatial hash and the
    /// label resolver.
    pub bucket_width: f64,
    /// Events closer than this on screen merge into one cluster.
    pub cluster_threshold_px: f64,
    /// At or above this seconds-per-pixel the view is fully clustered.
    pub cluster_macro_spp: f64,
    /// At or below this seconds-per-pixel the view is fully expanded.
    pub cluster_meso_spp: f64,
    /// Hit radius of a cluster marker.
    pub cluster_radius: f64,
    /// Events narrower than this never get a label.
    pub label_min_width: f64,
    /// Gap between an event's left edge and its label.
    pub label_padding: f64,
    pub label_weights: LabelWeights,
    /// Event count at which lane assignment moves to the background worker.
    pub worker_threshold: usize,
    pub worker_timeout_ms: u64,
    pub lane_height: f64,
    pub lane_gap: f64,
    /// Height reserved above lane 0 for the time axis.
    pub axis_height: f64,
    pub point_event_width: f64,
    pub min_span_width: f64,
    /// Minimum distance between major time-axis ticks.
    pub tick_spacing_px: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            bucket_width: 50.0,
            cluster_threshold_px: 20.0,
            cluster_macro_spp: 31_557_600.0,
            cluster_meso_spp: 86_400.0,
            cluster_radius: 10.0,
            label_min_width: 30.0,
            label_padding: 4.0,
            label_weights: LabelWeights::default(),
            worker_threshold: 10_000,
            worker_timeout_ms: 5_000,
            lane_height: 24.0,
            lane_gap: 4.0,
            axis_height: 24.0,
            point_event_width: 12.0,
            min_span_width: 2.0,
            tick_spacing_px: 80.0,
        }
    }
}

impl LayoutConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("bucket_width", self.bucket_width),
            ("cluster_threshold_px", self.cluster_threshold_px),
            ("cluster_macro_spp", self.cluster_macro_spp),
            ("cluster_meso_spp", self.cluster_meso_spp),
            ("cluster_radius", self.cluster_radius),
            ("lane_height", self.lane_height),
            ("point_event_width", self.point_event_width),
            ("tick_spacing_px", self.tick_spacing_px),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("label_min_width", self.label_min_width),
            ("label_padding", self.label_padding),
            ("lane_gap", self.lane_gap),
            ("axis_height", self.axis_height),
            ("min_span_width", self.min_span_width),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if self.cluster_meso_spp >= self.cluster_macro_spp {
            return Err(ConfigError::Invalid(format!(
                "cluster_meso_spp ({}) must be below cluster_macro_spp ({})",
                self.cluster_meso_spp, self.cluster_macro_spp
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_override() {
        let config = LayoutConfig::from_json_str(
            r#"{"bucket_width": 64, "label_weights": {"priority": 5}}"#,
        )
        .expect("valid config");
        assert!((config.bucket_width - 64.0).abs() < f64::EPSILON);
        assert!((config.label_weights.priority - 5.0).abs() < f64::EPSILON);
        assert!((config.label_weights.width - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.worker_threshold, 10_000);
    }

    #[test]
    fn rejects_inverted_cluster_thresholds() {
        let err = LayoutConfig::from_json_str(r#"{"cluster_meso_spp": 1e9}"#);
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_bucket_width() {
        let err = LayoutConfig::from_json_str(r#"{"bucket_width": 0}"#);
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LayoutConfig::from_json_file(Path::new("/nonexistent/deeptime.json"));
        match err {
            Err(ConfigError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/deeptime.json"));
            }
            other => unreachable!("expected io error, got {other:?}"),
        }
    }
}
