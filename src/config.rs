// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Decoder configuration.
//!
//! The configuration is supplied once when the driver is created and never
//! changes afterwards. [`DecoderConfig::validate`] rejects inconsistent
//! settings so a misconfigured decoder refuses to start.

use crate::{
    decoder::DISTANCE_MAX,
    lidar::{CHANNELS, Error},
    packet::BankPolicy,
    transform::AzimuthWindow,
};
use clap::ValueEnum;
use std::{f64::consts::TAU, fmt};
use tracing::warn;

/// How readings falling into the same layer scan bin are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ScanMerge {
    /// Keep the most recent reading
    #[default]
    Last,
    /// Average distance and intensity of all readings in the bin
    Mean,
}

impl fmt::Display for ScanMerge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanMerge::Last => write!(f, "last"),
            ScanMerge::Mean => write!(f, "mean"),
        }
    }
}

/// Which outputs the assembler produces for each completed sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputConfig {
    /// Emit the full point batch
    pub point_cloud: bool,
    /// Emit per-channel scan lines
    pub channel_scan: bool,
    /// Restrict channel scan lines to the active channel
    pub single_layer: bool,
    /// Emit a laser-scan style range image of the active channel
    pub layer_scan: bool,
    /// Initially active channel (0-15)
    pub active_channel: u8,
    /// Number of angular bins in the layer scan
    pub point_num: usize,
    pub scan_merge: ScanMerge,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            point_cloud: true,
            channel_scan: true,
            single_layer: false,
            layer_scan: false,
            active_channel: 8,
            point_num: 2000,
            scan_merge: ScanMerge::Last,
        }
    }
}

/// Full decoder configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderConfig {
    /// Minimum accepted distance in meters (inclusive)
    pub min_range: f64,
    /// Maximum accepted distance in meters (inclusive)
    pub max_range: f64,
    /// First azimuth exclusion window, radians
    pub angle_disable: AzimuthWindow,
    /// Second azimuth exclusion window, radians
    pub angle3_disable: AzimuthWindow,
    pub bank_policy: BankPolicy,
    /// Stamp sweeps with the device clock instead of the host clock
    pub use_gps_ts: bool,
    pub output: OutputConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_range: 0.15,
            max_range: DISTANCE_MAX,
            angle_disable: AzimuthWindow::disabled(),
            angle3_disable: AzimuthWindow::disabled(),
            bank_policy: BankPolicy::default(),
            use_gps_ts: true,
            output: OutputConfig::default(),
        }
    }
}

impl DecoderConfig {
    /// Check the configuration for settings the decoder cannot honor.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.min_range.is_finite() || !self.max_range.is_finite() {
            return Err(Error::Config(format!(
                "range limits must be finite: min_range={} max_range={}",
                self.min_range, self.max_range
            )));
        }

        if self.min_range <= 0.0 {
            return Err(Error::Config(format!(
                "min_range must be positive: {}",
                self.min_range
            )));
        }

        if self.min_range > self.max_range {
            return Err(Error::Config(format!(
                "min_range {} is greater than max_range {}",
                self.min_range, self.max_range
            )));
        }

        if self.max_range > DISTANCE_MAX {
            warn!(
                "max_range {} exceeds the sensor's reliable range of {} m",
                self.max_range, DISTANCE_MAX
            );
        }

        for (name, window) in [
            ("angle_disable", &self.angle_disable),
            ("angle3_disable", &self.angle3_disable),
        ] {
            let in_domain = |a: f64| a.is_finite() && (0.0..=TAU).contains(&a);
            if !in_domain(window.min) || !in_domain(window.max) {
                return Err(Error::Config(format!(
                    "{} window [{}, {}] must lie within [0, 2π] radians",
                    name, window.min, window.max
                )));
            }
        }

        if self.output.active_channel as usize >= CHANNELS {
            return Err(Error::Config(format!(
                "active channel {} must be below {}",
                self.output.active_channel, CHANNELS
            )));
        }

        if self.output.layer_scan && self.output.point_num == 0 {
            return Err(Error::Config(
                "point_num must be positive when the layer scan is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DecoderConfig::default();
        assert!(config.validate().is_ok());
        // Defaults stay within the reliable range, so startup is quiet
        assert!(config.max_range <= DISTANCE_MAX);
    }

    #[test]
    fn test_min_greater_than_max() {
        let config = DecoderConfig {
            min_range: 10.0,
            max_range: 5.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_equal_range_limits() {
        let config = DecoderConfig {
            min_range: 5.0,
            max_range: 5.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_min_range() {
        for min_range in [0.0, -1.0, f64::NAN] {
            let config = DecoderConfig {
                min_range,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "min_range {} accepted", min_range);
        }
    }

    #[test]
    fn test_window_outside_domain() {
        let config = DecoderConfig {
            angle3_disable: AzimuthWindow::new(1.0, 7.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_active_channel() {
        let mut config = DecoderConfig::default();
        config.output.active_channel = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_point_num() {
        let mut config = DecoderConfig::default();
        config.output.point_num = 0;
        assert!(config.validate().is_ok());

        config.output.layer_scan = true;
        assert!(config.validate().is_err());
    }
}
