use serde::{Deserialize, Serialize};

use crate::series::{SeriesError, SeriesResult};
use crate::source::Channel;

/// Grid spacing used to fill gaps before smoothing (15 minutes)
pub const HIGH_RES_PERIOD_SECS: f64 = 15.0 * 60.0;

/// Savitzky-Golay window length (1.5 days)
pub const SMOOTH_PERIOD_SECS: f64 = 1.5 * 24.0 * 3600.0;

/// Grid spacing after downsampling (6 hours)
pub const LOW_RES_PERIOD_SECS: f64 = 6.0 * 3600.0;

/// Savitzky-Golay polynomial order
pub const SMOOTH_POLY_ORDER: usize = 3;

/// Points per channel in one training sample
pub const WINDOW_SAMPLES: usize = 240;

/// Time covered by one training sample (240 low-res points, 60 days)
pub const WINDOW_SECS: f64 = WINDOW_SAMPLES as f64 * LOW_RES_PERIOD_SECS;

/// Parameters of the resample / smooth / window chain.
///
/// Every field has a default, so a config file only needs the overrides.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub high_res_period_secs: f64,
    pub smooth_period_secs: f64,
    pub low_res_period_secs: f64,
    pub poly_order: usize,
    pub window_secs: f64,
    pub window_samples: usize,
    /// Reading value used for every channel
    pub channel: Channel,
    /// Values above this are marked missing before resampling
    pub discard_above: Option<f64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            high_res_period_secs: HIGH_RES_PERIOD_SECS,
            smooth_period_secs: SMOOTH_PERIOD_SECS,
            low_res_period_secs: LOW_RES_PERIOD_SECS,
            poly_order: SMOOTH_POLY_ORDER,
            window_secs: WINDOW_SECS,
            window_samples: WINDOW_SAMPLES,
            channel: Channel::Raw,
            discard_above: None,
        }
    }
}

impl SamplingConfig {
    /// Check the parameters before a run starts
    pub fn validate(&self) -> SeriesResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.high_res_period_secs) || !positive(self.low_res_period_secs) {
            return Err(SeriesError::InvalidArgument {
                param: "period",
                details: "resampling periods must be finite and positive",
            });
        }
        if !positive(self.smooth_period_secs) {
            return Err(SeriesError::InvalidArgument {
                param: "smooth_period_secs",
                details: "smoothing period must be finite and positive",
            });
        }
        if self.window_samples < 2 {
            return Err(SeriesError::InvalidArgument {
                param: "window_samples",
                details: "a window needs at least 2 samples",
            });
        }
        // Windows advance by whole seconds
        if !(self.window_secs.is_finite() && self.window_secs >= 2.0) {
            return Err(SeriesError::InvalidArgument {
                param: "window_secs",
                details: "window must span at least 2 seconds",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SamplingConfig::default();
        assert_eq!(config.window_secs, 60.0 * 24.0 * 3600.0);
        assert_eq!(
            (config.smooth_period_secs / config.high_res_period_secs) as usize,
            144
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = SamplingConfig {
            window_samples: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SeriesError::InvalidArgument { param: "window_samples", .. })
        ));

        let config = SamplingConfig {
            low_res_period_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SamplingConfig {
            window_secs: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
