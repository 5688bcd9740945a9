// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point transformer and filter.
//!
//! Converts one decoded reading into a [`CalibratedPoint`]:
//!
//! ```text
//! r = distance * cos(altitude)
//! x = r * cos(azimuth)
//! y = r * sin(azimuth)
//! z = distance * sin(altitude)
//! ```
//!
//! Readings outside `[min_range, max_range]` or inside an azimuth exclusion
//! window are dropped before any point is built.

use crate::{
    calibration::Calibration,
    config::DecoderConfig,
    decoder::{DecodedPacket, Firing},
    lidar::CalibratedPoint,
};
use std::sync::Arc;

/// Azimuth dead-zone in radians.
///
/// The window is inclusive on `min` and exclusive on `max`. A window with
/// `min == max` is disabled, and `min > max` wraps through 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AzimuthWindow {
    pub min: f64,
    pub max: f64,
}

impl AzimuthWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Window from bounds in degrees.
    pub fn from_degrees(min: f64, max: f64) -> Self {
        Self::new(min.to_radians(), max.to_radians())
    }

    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.min != self.max
    }

    #[inline]
    pub fn contains(&self, azimuth: f64) -> bool {
        if self.min < self.max {
            azimuth >= self.min && azimuth < self.max
        } else if self.min > self.max {
            azimuth >= self.min || azimuth < self.max
        } else {
            false
        }
    }
}

/// Reason a reading was not turned into a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Distance outside `[min_range, max_range]`
    OutOfRange,
    /// Azimuth inside an exclusion window
    Excluded,
}

/// Range and azimuth filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointFilter {
    pub min_range: f64,
    pub max_range: f64,
    pub windows: [AzimuthWindow; 2],
}

impl PointFilter {
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            min_range: config.min_range,
            max_range: config.max_range,
            windows: [config.angle_disable, config.angle3_disable],
        }
    }

    #[inline]
    pub fn in_range(&self, distance: f64) -> bool {
        distance >= self.min_range && distance <= self.max_range
    }

    #[inline]
    pub fn excluded(&self, azimuth: f64) -> bool {
        self.windows.iter().any(|w| w.contains(azimuth))
    }

    #[inline]
    pub fn check(&self, distance: f64, azimuth: f64) -> Result<(), DropReason> {
        if !self.in_range(distance) {
            return Err(DropReason::OutOfRange);
        }
        if self.excluded(azimuth) {
            return Err(DropReason::Excluded);
        }
        Ok(())
    }
}

/// Stateless reading to point converter.
#[derive(Clone, Debug)]
pub struct PointTransformer {
    calibration: Arc<Calibration>,
    filter: PointFilter,
}

impl PointTransformer {
    pub fn new(calibration: Arc<Calibration>, filter: PointFilter) -> Self {
        Self {
            calibration,
            filter,
        }
    }

    pub fn filter(&self) -> &PointFilter {
        &self.filter
    }

    /// Transform one reading.
    ///
    /// `time_offset_us` is the reading's offset from `packet_time_ns`, the
    /// same offset the decoder used for azimuth interpolation.
    #[inline]
    pub fn transform(
        &self,
        channel: usize,
        azimuth: f64,
        distance: f64,
        intensity: u8,
        packet_time_ns: u64,
        time_offset_us: f64,
    ) -> Result<CalibratedPoint, DropReason> {
        self.filter.check(distance, azimuth)?;

        let (sin_az, cos_az) = self.calibration.azimuth_sin_cos(azimuth);
        let horizontal = distance * self.calibration.cos_altitude(channel);

        Ok(CalibratedPoint {
            x: (horizontal * cos_az) as f32,
            y: (horizontal * sin_az) as f32,
            z: (distance * self.calibration.sin_altitude(channel)) as f32,
            intensity,
            channel: channel as u8,
            azimuth: azimuth as f32,
            distance: distance as f32,
            timestamp: packet_time_ns + (time_offset_us * 1000.0).round() as u64,
        })
    }

    /// Transform every channel of firing `fir_idx`, yielding only kept points.
    pub fn transform_firing<'a>(
        &'a self,
        firing: &'a Firing,
        fir_idx: usize,
        packet_time_ns: u64,
    ) -> impl Iterator<Item = Result<CalibratedPoint, DropReason>> + 'a {
        (0..firing.distance.len()).map(move |ch| {
            self.transform(
                ch,
                firing.channel_azimuth[ch],
                firing.distance[ch],
                firing.intensity[ch],
                packet_time_ns,
                DecodedPacket::time_offset_us(fir_idx, ch),
            )
        })
    }
}
