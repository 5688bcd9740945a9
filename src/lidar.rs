// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR types, error handling and the driver trait.
//!
//! This module holds the types shared by every stage of the C16 pipeline:
//! the crate [`Error`], the [`CalibratedPoint`] produced by the transformer,
//! and the [`LidarDriver`] trait implemented by [`crate::driver::C16Driver`].

use crate::output::SweepOutput;
use std::fmt;

/// Number of vertical channels (lasers) on the C16.
pub const CHANNELS: usize = 16;

/// A single calibrated return in the sensor frame.
///
/// Points are only constructed for readings that passed the range and
/// azimuth exclusion filters, so consumers never see dropped readings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibratedPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Raw reflectivity as reported by the sensor
    pub intensity: u8,
    /// Firing slot of the laser within a firing (0-15)
    pub channel: u8,
    /// Corrected azimuth in radians, within [0, 2π)
    pub azimuth: f32,
    /// Measured distance in meters
    pub distance: f32,
    /// Device timestamp in nanoseconds
    pub timestamp: u64,
}

impl CalibratedPoint {
    /// Laser index ordered by elevation, bottom beam first.
    ///
    /// The C16 interleaves its lasers: even firing slots cover -15° to -1°
    /// and odd slots cover +1° to +15°.
    #[inline]
    pub fn ring(&self) -> u8 {
        if self.channel % 2 == 0 {
            self.channel / 2
        } else {
            self.channel / 2 + 8
        }
    }
}

/// Common error type for LiDAR operations
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Packet is not exactly the expected size
    PacketSize { expected: usize, actual: usize },
    /// Block header is neither the upper nor the lower bank sentinel
    BankHeader { block: usize, header: u16 },
    /// Block bank does not follow the configured bank policy
    BankAlternation { block: usize },
    /// Configuration error
    Config(String),
    /// Message serialization error
    Encode(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::PacketSize { expected, actual } => write!(
                f,
                "invalid packet size: {} bytes, expected {}",
                actual, expected
            ),
            Error::BankHeader { block, header } => {
                write!(f, "invalid bank header 0x{:04x} in block {}", header, block)
            }
            Error::BankAlternation { block } => {
                write!(f, "bank sequence broken at block {}", block)
            }
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Encode(msg) => write!(f, "encode error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<edgefirst_schemas::serde_cdr::Error> for Error {
    fn from(err: edgefirst_schemas::serde_cdr::Error) -> Self {
        Error::Encode(err.to_string())
    }
}

/// Trait for LiDAR driver implementations
///
/// This trait provides a unified interface for processing UDP packets.
/// Implementations handle packet validation, decoding and sweep assembly
/// internally.
pub trait LidarDriver: Send {
    /// Process a UDP packet, returning every sweep it completed.
    ///
    /// # Returns
    /// - `Ok(vec![])` if more packets are needed to complete the sweep
    /// - `Ok(outputs)` when one or more revolutions completed
    /// - `Err` on malformed packets; driver state is left untouched
    fn process_packet(&mut self, data: &[u8]) -> Result<Vec<SweepOutput>, Error>;
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|err| Error::Io(std::io::Error::other(err)))?;
    Ok(duration.as_nanos() as u64)
}
