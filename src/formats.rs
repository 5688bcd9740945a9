// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! ROS message encoding for sweep outputs.
//!
//! # Point format
//!
//! ```text
//! ┌───────┬───────┬───────┬───────────┬──────┬───────────────┐
//! │ x:f32 │ y:f32 │ z:f32 │ intensity │ ring │ timestamp:f64 │
//! │ 4B    │ 4B    │ 4B    │ 1B        │ 1B   │ 8B            │
//! └───────┴───────┴───────┴───────────┴──────┴───────────────┘
//! ```
//!
//! The timestamp is the point's device time in seconds. Point batches and
//! channel scan lines share this layout; the single-layer range image is
//! encoded as a `sensor_msgs/LaserScan`.

use crate::{
    lidar::{CalibratedPoint, Error},
    output::LayerScan,
};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    sensor_msgs::{PointCloud2, PointField},
    serde_cdr,
    std_msgs::Header,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zenoh::bytes::{Encoding, ZBytes};

/// Bytes per encoded point
pub const POINT_STEP: usize = 22;

/// Point field data types for PointCloud2 messages.
///
/// These values correspond to the ROS sensor_msgs/PointField datatype field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

fn field(name: &str, offset: u32, datatype: PointFieldType) -> PointField {
    PointField {
        name: String::from(name),
        offset,
        datatype: datatype as u8,
        count: 1,
    }
}

/// Point fields for the [`POINT_STEP`] byte layout.
pub fn point_fields() -> Vec<PointField> {
    vec![
        field("x", 0, PointFieldType::FLOAT32),
        field("y", 4, PointFieldType::FLOAT32),
        field("z", 8, PointFieldType::FLOAT32),
        field("intensity", 12, PointFieldType::UINT8),
        field("ring", 13, PointFieldType::UINT8),
        field("timestamp", 14, PointFieldType::FLOAT64),
    ]
}

/// Pack points into the [`POINT_STEP`] byte layout.
#[inline(never)]
pub fn format_points(points: &[CalibratedPoint]) -> Vec<u8> {
    let mut data = vec![0u8; POINT_STEP * points.len()];
    format_points_into(points, &mut data);
    data
}

/// Pack points into a pre-allocated buffer.
///
/// # Panics
///
/// Panics if `out` is shorter than `POINT_STEP * points.len()`.
#[inline(never)]
pub fn format_points_into(points: &[CalibratedPoint], out: &mut [u8]) {
    for (point, chunk) in points.iter().zip(out.chunks_exact_mut(POINT_STEP)) {
        chunk[0..4].copy_from_slice(&point.x.to_le_bytes());
        chunk[4..8].copy_from_slice(&point.y.to_le_bytes());
        chunk[8..12].copy_from_slice(&point.z.to_le_bytes());
        chunk[12] = point.intensity;
        chunk[13] = point.ring();
        chunk[14..22].copy_from_slice(&(point.timestamp as f64 / 1e9).to_le_bytes());
    }
}

/// Convert nanoseconds to a ROS time stamp.
pub fn time_from_nanos(nanos: u64) -> Time {
    Time {
        sec: (nanos / 1_000_000_000) as i32,
        nanosec: (nanos % 1_000_000_000) as u32,
    }
}

/// sensor_msgs/LaserScan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserScan {
    pub header: Header,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub time_increment: f32,
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

/// Build an unordered PointCloud2 from points.
pub fn point_cloud(points: &[CalibratedPoint], stamp: Time, frame_id: String) -> PointCloud2 {
    let n_points = points.len();
    PointCloud2 {
        header: Header { stamp, frame_id },
        height: 1,
        width: n_points as u32,
        fields: point_fields(),
        is_bigendian: false,
        point_step: POINT_STEP as u32,
        row_step: (POINT_STEP * n_points) as u32,
        data: format_points(points),
        is_dense: true,
    }
}

pub fn laser_scan(scan: &LayerScan, frame_id: String) -> LaserScan {
    LaserScan {
        header: Header {
            stamp: time_from_nanos(scan.start_timestamp),
            frame_id,
        },
        angle_min: scan.angle_min,
        angle_max: scan.angle_max,
        angle_increment: scan.angle_increment,
        time_increment: scan.time_increment,
        scan_time: scan.scan_time,
        range_min: scan.range_min,
        range_max: scan.range_max,
        ranges: scan.ranges.clone(),
        intensities: scan.intensities.clone(),
    }
}

/// Encode points as a CDR PointCloud2 Zenoh payload.
#[instrument(skip_all, fields(n_points = points.len()))]
pub fn encode_point_cloud(
    points: &[CalibratedPoint],
    stamp: Time,
    frame_id: String,
) -> Result<(ZBytes, Encoding), Error> {
    let msg = point_cloud(points, stamp, frame_id);
    let msg = ZBytes::from(serde_cdr::serialize(&msg)?);
    let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/PointCloud2");
    Ok((msg, enc))
}

/// Encode a layer scan as a CDR LaserScan Zenoh payload.
#[instrument(skip_all)]
pub fn encode_laser_scan(scan: &LayerScan, frame_id: String) -> Result<(ZBytes, Encoding), Error> {
    let msg = ZBytes::from(serde_cdr::serialize(&laser_scan(scan, frame_id))?);
    let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/LaserScan");
    Ok((msg, enc))
}
