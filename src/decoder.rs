// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Block and firing decoder.
//!
//! Each block carries two firings of 16 channels. Only the first firing of a
//! block has a measured rotation; the second is placed halfway to the next
//! block's rotation. The C16 fires its channels one after another, so every
//! channel azimuth is further advanced by its share of the firing window:
//!
//! ```text
//! azimuth[ch] = firing_azimuth + (ch * DSR_TOFFSET / FIRING_TOFFSET) * Δ
//! ```
//!
//! where `Δ` is the azimuth travelled until the next firing. Decoding applies
//! no filtering policy; zero distances are kept as zero-range readings.

use crate::{
    lidar::CHANNELS,
    packet::{
        BLOCKS_PER_PACKET, FIRINGS_PER_BLOCK, FIRINGS_PER_PACKET, ROTATION_MAX_UNITS,
        RawPacket, ReturnMode, SCANS_PER_BLOCK,
    },
};
use std::f64::consts::TAU;

/// Distance resolution in meters (2.5mm)
pub const DISTANCE_RESOLUTION: f64 = 0.0025;

/// Longest distance the sensor reports reliably, in meters
pub const DISTANCE_MAX: f64 = 130.0;

/// Duration of one block (two firings) in microseconds
pub const BLOCK_TDURATION: f64 = 110.592;

/// Time between two consecutive channels in microseconds
pub const DSR_TOFFSET: f64 = BLOCK_TDURATION / SCANS_PER_BLOCK as f64;

/// Time between two consecutive firings in microseconds
pub const FIRING_TOFFSET: f64 = DSR_TOFFSET * CHANNELS as f64;

/// One firing of all 16 channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Firing {
    /// Azimuth of the first channel, in radians
    pub azimuth: f64,
    /// Corrected azimuth per channel, in radians within [0, 2π)
    pub channel_azimuth: [f64; CHANNELS],
    /// Distance per channel in meters
    pub distance: [f64; CHANNELS],
    pub intensity: [u8; CHANNELS],
    /// Azimuth derived from an out-of-range block rotation
    pub anomalous: bool,
}

/// All firings of one packet.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedPacket {
    pub firings: [Firing; FIRINGS_PER_PACKET],
    /// Device timestamp of the first firing in microseconds
    pub timestamp_us: u32,
    pub return_mode: ReturnMode,
    /// Blocks whose raw rotation was outside [0, 35999]
    pub azimuth_anomalies: usize,
}

impl DecodedPacket {
    /// Microsecond offset of a reading from the packet timestamp.
    #[inline]
    pub fn time_offset_us(firing: usize, channel: usize) -> f64 {
        firing as f64 * FIRING_TOFFSET + channel as f64 * DSR_TOFFSET
    }
}

/// Convert a raw rotation (hundredths of a degree) to radians.
#[inline]
pub fn raw_azimuth_to_radians(raw: u16) -> f64 {
    (raw as f64 / 100.0).to_radians()
}

/// Wrap an angle into [0, 2π).
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Azimuth travelled going forward from `from` to `to`, in [0, 2π).
#[inline]
fn forward_delta(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Wrap a raw rotation into range, reporting whether it was out of range.
#[inline]
fn wrap_rotation(raw: u16) -> (u16, bool) {
    if raw < ROTATION_MAX_UNITS {
        (raw, false)
    } else {
        (raw % ROTATION_MAX_UNITS, true)
    }
}

/// Decode a validated packet into its 24 firings.
pub fn decode(packet: &RawPacket) -> DecodedPacket {
    let mut firings = [Firing::default(); FIRINGS_PER_PACKET];
    let mut azimuth_anomalies = 0;

    for (blk_idx, block) in packet.blocks().enumerate() {
        let (rotation, anomaly) = wrap_rotation(block.rotation());
        azimuth_anomalies += anomaly as usize;
        let firing = &mut firings[blk_idx * FIRINGS_PER_BLOCK];
        firing.azimuth = raw_azimuth_to_radians(rotation);
        firing.anomalous = anomaly;
    }

    // Second firing of each block sits halfway to the next block. The last
    // block has no successor and reuses the previous block's delta.
    for fir_idx in (1..FIRINGS_PER_PACKET).step_by(FIRINGS_PER_BLOCK) {
        let (left, right) = if fir_idx == FIRINGS_PER_PACKET - 1 {
            (fir_idx - 3, fir_idx - 1)
        } else {
            (fir_idx - 1, fir_idx + 1)
        };
        let delta = forward_delta(firings[left].azimuth, firings[right].azimuth);
        firings[fir_idx].azimuth = wrap_angle(firings[fir_idx - 1].azimuth + delta / 2.0);
        // Interpolating from a wrapped rotation taints this firing as well
        firings[fir_idx].anomalous = firings[fir_idx - 1].anomalous
            || firings[left].anomalous
            || firings[right].anomalous;
    }

    for blk_idx in 0..BLOCKS_PER_PACKET {
        let block = packet.block(blk_idx);

        for blk_fir_idx in 0..FIRINGS_PER_BLOCK {
            let fir_idx = blk_idx * FIRINGS_PER_BLOCK + blk_fir_idx;
            let delta = if fir_idx < FIRINGS_PER_PACKET - 1 {
                forward_delta(firings[fir_idx].azimuth, firings[fir_idx + 1].azimuth)
            } else {
                forward_delta(firings[fir_idx - 1].azimuth, firings[fir_idx].azimuth)
            };

            let firing = &mut firings[fir_idx];
            for ch in 0..CHANNELS {
                let (distance, intensity) = block.reading(blk_fir_idx, ch);
                let fraction = ch as f64 * DSR_TOFFSET / FIRING_TOFFSET;
                firing.channel_azimuth[ch] = wrap_angle(firing.azimuth + fraction * delta);
                firing.distance[ch] = distance as f64 * DISTANCE_RESOLUTION;
                firing.intensity[ch] = intensity;
            }
        }
    }

    DecodedPacket {
        firings,
        timestamp_us: packet.timestamp_us(),
        return_mode: packet.return_mode(),
        azimuth_anomalies,
    }
}
