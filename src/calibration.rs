// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Calibration tables for the C16.
//!
//! The altitude angles are fixed by the sensor design. Their sine and cosine
//! are pre-computed once, together with an azimuth lookup table, and the
//! resulting [`Calibration`] is shared read-only between the decoder and the
//! transformer.

use crate::lidar::CHANNELS;
use std::f64::consts::TAU;

/// Vertical angle of each laser in firing order, in radians.
pub const SCAN_ALTITUDE: [f64; CHANNELS] = [
    -0.2617993877991494,
    0.017453292519943295,
    -0.22689280275926285,
    0.05235987755982989,
    -0.19198621771937624,
    0.08726646259971647,
    -0.15707963267948966,
    0.12217304763960307,
    -0.12217304763960307,
    0.15707963267948966,
    -0.08726646259971647,
    0.19198621771937624,
    -0.05235987755982989,
    0.22689280275926285,
    -0.017453292519943295,
    0.2617993877991494,
];

/// Azimuth lookup entries per radian (1 mrad resolution).
pub const AZIMUTH_TABLE_RESOLUTION: f64 = 1000.0;

/// Lookup entries needed to cover the closed interval [0, 2π].
const AZIMUTH_TABLE_SIZE: usize = (TAU * AZIMUTH_TABLE_RESOLUTION) as usize + 2;

/// Immutable calibration shared by the decoding pipeline.
#[derive(Clone, Debug)]
pub struct Calibration {
    altitude: [f64; CHANNELS],
    sin_altitude: [f64; CHANNELS],
    cos_altitude: [f64; CHANNELS],
    sin_azimuth: Vec<f64>,
    cos_azimuth: Vec<f64>,
}

impl Calibration {
    /// Build the factory calibration.
    pub fn new() -> Self {
        Self::with_altitudes(SCAN_ALTITUDE)
    }

    /// Build a calibration from custom altitude angles in radians.
    pub fn with_altitudes(altitude: [f64; CHANNELS]) -> Self {
        let (sin_azimuth, cos_azimuth) = (0..AZIMUTH_TABLE_SIZE)
            .map(|i| (i as f64 / AZIMUTH_TABLE_RESOLUTION).sin_cos())
            .unzip();

        Self {
            altitude,
            sin_altitude: altitude.map(f64::sin),
            cos_altitude: altitude.map(f64::cos),
            sin_azimuth,
            cos_azimuth,
        }
    }

    #[inline]
    pub fn altitude(&self, channel: usize) -> f64 {
        self.altitude[channel]
    }

    #[inline]
    pub fn sin_altitude(&self, channel: usize) -> f64 {
        self.sin_altitude[channel]
    }

    #[inline]
    pub fn cos_altitude(&self, channel: usize) -> f64 {
        self.cos_altitude[channel]
    }

    /// Sine and cosine of an azimuth in [0, 2π) from the lookup table.
    ///
    /// Out of range inputs are wrapped before the lookup.
    #[inline]
    pub fn azimuth_sin_cos(&self, azimuth: f64) -> (f64, f64) {
        let azimuth = if (0.0..TAU).contains(&azimuth) {
            azimuth
        } else {
            azimuth.rem_euclid(TAU)
        };
        let idx = ((azimuth * AZIMUTH_TABLE_RESOLUTION).round() as usize)
            .min(AZIMUTH_TABLE_SIZE - 1);
        (self.sin_azimuth[idx], self.cos_azimuth[idx])
    }

    /// Number of entries in the azimuth lookup table.
    pub fn azimuth_table_len(&self) -> usize {
        self.sin_azimuth.len()
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}
