// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Leishen C16 LiDAR Publisher Library
//!
//! This library decodes the MSOP data stream of the Leishen C16 16-beam
//! rotating LiDAR into calibrated points grouped by revolution.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │   C16Driver   │ ──► │   SweepOutput   │
//! │  (UDP/replay)   │     │ (decode/sweep)│     │  (per rotation) │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!                                                       │
//!                                                       ▼
//!                                      ┌─────────────────────────────────┐
//!                                      │  SweepSink / formats::encode_*  │
//!                                      │  (PointCloud2, LaserScan)       │
//!                                      └─────────────────────────────────┘
//! ```
//!
//! Every packet is processed synchronously: validated, decoded into 24
//! firings, transformed into points and accumulated. When the head rotates
//! past 0° the driver hands the completed revolution out, partitioned into a
//! point batch, per-channel scan lines and an optional single-layer scan.
//!
//! # Modules
//!
//! - [`lidar`]: Common types, traits, and error handling
//! - [`calibration`]: Per-channel elevation table and azimuth trigonometry
//! - [`packet`]: Packet layout and validation
//! - [`decoder`]: Firing and per-channel azimuth decoding
//! - [`transform`]: Point conversion and filtering
//! - [`sweep`]: Revolution boundary detection
//! - [`output`]: Output assembly and the [`output::SweepSink`] trait
//! - [`driver`]: The [`driver::C16Driver`] facade
//! - [`config`]: Decoder configuration
//! - [`formats`]: ROS message encoding
//! - [`packet_source`]: Packet source abstraction for replay and testing
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_lslidarpub::{config::DecoderConfig, driver::C16Driver};
//!
//! let mut driver = C16Driver::new(DecoderConfig::default())?;
//! let mut buf = [0u8; 2048];
//! loop {
//!     let len = socket.recv(&mut buf).await?;
//!     driver.receive(&buf[..len], &mut sink);
//! }
//! ```

pub mod calibration;
pub mod config;
pub mod decoder;
pub mod driver;
pub mod formats;
pub mod lidar;
pub mod output;
pub mod packet;
pub mod packet_source;
pub mod sweep;
pub mod transform;

pub use driver::C16Driver;
pub use lidar::{CalibratedPoint, Error, LidarDriver};
pub use output::{SweepOutput, SweepSink};
