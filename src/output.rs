// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Output assembly for completed sweeps.
//!
//! A finalized [`Sweep`] is partitioned into the shapes consumers ask for:
//!
//! - a flat point batch in time order,
//! - per-channel scan lines ordered by azimuth (all 16, or only the active
//!   channel in single-layer mode),
//! - a single-layer [`LayerScan`] range image of the active channel.
//!
//! Assembly never filters; every point it sees already passed the
//! transformer.

use crate::{
    config::{DecoderConfig, OutputConfig, ScanMerge},
    lidar::{CHANNELS, CalibratedPoint},
    sweep::Sweep,
};
use std::f32::consts::TAU;
use tracing::debug;

/// Points of one channel during one revolution, ordered by azimuth.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelScan {
    pub channel: u8,
    pub points: Vec<CalibratedPoint>,
}

/// Range image of one channel over a full revolution.
///
/// Bin `i` covers azimuths `[i, i + 1) * angle_increment`. Empty bins hold
/// `f32::INFINITY` for both range and intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerScan {
    pub channel: u8,
    pub start_timestamp: u64,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    /// Time between bins in seconds
    pub time_increment: f32,
    /// Duration of the revolution in seconds
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

/// Everything produced from one completed revolution.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepOutput {
    pub sweep_id: u32,
    pub start_timestamp: u64,
    /// Full point batch, when point cloud output is enabled
    pub points: Option<Vec<CalibratedPoint>>,
    pub channel_scans: Vec<ChannelScan>,
    pub layer_scan: Option<LayerScan>,
}

impl SweepOutput {
    /// Deliver this output to a sink.
    pub fn dispatch<S: SweepSink + ?Sized>(&self, sink: &mut S) {
        if let Some(points) = &self.points {
            sink.on_point_batch(points, self.start_timestamp);
        }
        for scan in &self.channel_scans {
            sink.on_channel_scan(scan.channel, &scan.points);
        }
        if let Some(scan) = &self.layer_scan {
            sink.on_layer_scan(scan);
        }
    }
}

/// Consumer of completed sweeps.
pub trait SweepSink {
    /// Called once per completed revolution with every kept point.
    fn on_point_batch(&mut self, points: &[CalibratedPoint], start_timestamp: u64);

    /// Called once per completed revolution for each emitted channel.
    fn on_channel_scan(&mut self, channel: u8, points: &[CalibratedPoint]);

    fn on_layer_scan(&mut self, _scan: &LayerScan) {}
}

/// Partitions finalized sweeps into their output shapes.
#[derive(Clone, Debug)]
pub struct OutputAssembler {
    config: OutputConfig,
    active_channel: u8,
    range_min: f32,
    range_max: f32,
}

impl OutputAssembler {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            config: config.output.clone(),
            active_channel: config.output.active_channel,
            range_min: config.min_range as f32,
            range_max: config.max_range as f32,
        }
    }

    pub fn active_channel(&self) -> u8 {
        self.active_channel
    }

    /// Select the channel used by single-layer outputs.
    ///
    /// Returns false and keeps the current selection if `channel` is not a
    /// valid channel index.
    pub fn set_active_channel(&mut self, channel: u8) -> bool {
        if channel as usize >= CHANNELS {
            debug!("ignoring invalid active channel {}", channel);
            return false;
        }
        self.active_channel = channel;
        true
    }

    /// Consume a finalized sweep and build its outputs.
    pub fn assemble(&self, sweep: Sweep) -> SweepOutput {
        let channel_scans = if self.config.channel_scan {
            self.channel_scans(&sweep.points)
        } else {
            Vec::new()
        };

        let layer_scan = self
            .config
            .layer_scan
            .then(|| self.layer_scan(&sweep.points, sweep.start_timestamp));

        SweepOutput {
            sweep_id: sweep.sweep_id,
            start_timestamp: sweep.start_timestamp,
            points: self.config.point_cloud.then_some(sweep.points),
            channel_scans,
            layer_scan,
        }
    }

    fn channel_scans(&self, points: &[CalibratedPoint]) -> Vec<ChannelScan> {
        let mut lines: Vec<Vec<CalibratedPoint>> = vec![Vec::new(); CHANNELS];
        for point in points {
            lines[point.channel as usize].push(*point);
        }

        lines
            .into_iter()
            .enumerate()
            .filter(|(channel, _)| {
                !self.config.single_layer || *channel == self.active_channel as usize
            })
            .map(|(channel, mut points)| {
                points.sort_by(|a, b| a.azimuth.total_cmp(&b.azimuth));
                ChannelScan {
                    channel: channel as u8,
                    points,
                }
            })
            .collect()
    }

    fn layer_scan(&self, points: &[CalibratedPoint], start_timestamp: u64) -> LayerScan {
        let point_num = self.config.point_num;
        let angle_increment = TAU / point_num as f32;

        let mut sums = vec![(0.0f32, 0.0f32, 0u32); point_num];
        let mut first = None;
        let mut last = None;

        for point in points.iter().filter(|p| p.channel == self.active_channel) {
            if first.is_none() {
                first = Some(point.timestamp);
            }
            last = Some(point.timestamp);

            let mut bin = (point.azimuth / angle_increment) as usize;
            if bin >= point_num {
                bin = 0;
            }

            let entry = &mut sums[bin];
            match self.config.scan_merge {
                ScanMerge::Last => *entry = (point.distance, point.intensity as f32, 1),
                ScanMerge::Mean => {
                    entry.0 += point.distance;
                    entry.1 += point.intensity as f32;
                    entry.2 += 1;
                }
            }
        }

        let (ranges, intensities): (Vec<f32>, Vec<f32>) = sums
            .into_iter()
            .map(|(distance, intensity, count)| mean_reading(distance, intensity, count))
            .unzip();

        let scan_time = match (first, last) {
            (Some(first), Some(last)) => (last - first) as f32 / 1e9,
            _ => 0.0,
        };

        LayerScan {
            channel: self.active_channel,
            start_timestamp,
            angle_min: 0.0,
            angle_max: TAU - angle_increment,
            angle_increment,
            time_increment: scan_time / point_num as f32,
            scan_time,
            range_min: self.range_min,
            range_max: self.range_max,
            ranges,
            intensities,
        }
    }
}

/// Mean distance and intensity of `count` merged readings.
#[inline]
fn mean_reading(distance_sum: f32, intensity_sum: f32, count: u32) -> (f32, f32) {
    if count == 0 {
        (f32::INFINITY, f32::INFINITY)
    } else {
        (distance_sum / count as f32, intensity_sum / count as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(channel: u8, azimuth: f32, distance: f32, timestamp: u64) -> CalibratedPoint {
        CalibratedPoint {
            x: distance * azimuth.cos(),
            y: distance * azimuth.sin(),
            z: 0.0,
            intensity: 10 * channel,
            channel,
            azimuth,
            distance,
            timestamp,
        }
    }

    fn sweep() -> Sweep {
        let mut points = Vec::new();
        let mut t = 0;
        for step in 0..10 {
            for channel in 0..CHANNELS as u8 {
                points.push(point(channel, step as f32 * 0.5, 5.0 + channel as f32, t));
                t += 1000;
            }
        }
        Sweep {
            sweep_id: 3,
            start_timestamp: 42,
            points,
        }
    }

    fn assembler(output: OutputConfig) -> OutputAssembler {
        OutputAssembler::new(&DecoderConfig {
            output,
            ..Default::default()
        })
    }

    #[derive(Default)]
    struct Recorder {
        batches: Vec<(usize, u64)>,
        channels: Vec<(u8, usize)>,
        layers: usize,
    }

    impl SweepSink for Recorder {
        fn on_point_batch(&mut self, points: &[CalibratedPoint], start_timestamp: u64) {
            self.batches.push((points.len(), start_timestamp));
        }

        fn on_channel_scan(&mut self, channel: u8, points: &[CalibratedPoint]) {
            self.channels.push((channel, points.len()));
        }

        fn on_layer_scan(&mut self, _scan: &LayerScan) {
            self.layers += 1;
        }
    }

    #[test]
    fn test_point_batch_preserves_order() {
        let sweep = sweep();
        let expected = sweep.points.clone();
        let output = assembler(OutputConfig::default()).assemble(sweep);

        assert_eq!(output.sweep_id, 3);
        assert_eq!(output.start_timestamp, 42);
        assert_eq!(output.points, Some(expected));
    }

    #[test]
    fn test_channel_scans_grouped_and_sorted() {
        let mut sweep = sweep();
        // Out of order azimuth on channel 2
        sweep.points.push(point(2, 0.25, 7.0, 1_000_000));

        let output = assembler(OutputConfig::default()).assemble(sweep);
        assert_eq!(output.channel_scans.len(), CHANNELS);

        for (i, scan) in output.channel_scans.iter().enumerate() {
            assert_eq!(scan.channel as usize, i);
            assert!(scan.points.iter().all(|p| p.channel == scan.channel));
            assert!(scan.points.windows(2).all(|w| w[0].azimuth <= w[1].azimuth));
        }
        assert_eq!(output.channel_scans[2].points.len(), 11);
        assert_eq!(output.channel_scans[2].points[1].azimuth, 0.25);
    }

    #[test]
    fn test_single_layer_mode() {
        let mut assembler = assembler(OutputConfig {
            single_layer: true,
            active_channel: 4,
            ..Default::default()
        });

        let output = assembler.assemble(sweep());
        assert_eq!(output.channel_scans.len(), 1);
        assert_eq!(output.channel_scans[0].channel, 4);

        assert!(assembler.set_active_channel(9));
        let output = assembler.assemble(sweep());
        assert_eq!(output.channel_scans[0].channel, 9);
    }

    #[test]
    fn test_invalid_active_channel_ignored() {
        let mut assembler = assembler(OutputConfig::default());
        assert!(assembler.set_active_channel(3));
        assert!(!assembler.set_active_channel(16));
        assert!(!assembler.set_active_channel(255));
        assert_eq!(assembler.active_channel(), 3);
    }

    #[test]
    fn test_disabled_outputs() {
        let output = assembler(OutputConfig {
            point_cloud: false,
            channel_scan: false,
            ..Default::default()
        })
        .assemble(sweep());

        assert!(output.points.is_none());
        assert!(output.channel_scans.is_empty());
        assert!(output.layer_scan.is_none());
    }

    #[test]
    fn test_dispatch() {
        let output = assembler(OutputConfig {
            layer_scan: true,
            ..Default::default()
        })
        .assemble(sweep());

        let mut recorder = Recorder::default();
        output.dispatch(&mut recorder);
        assert_eq!(recorder.batches, vec![(160, 42)]);
        assert_eq!(recorder.channels.len(), CHANNELS);
        assert!(recorder.channels.iter().all(|&(_, n)| n == 10));
        assert_eq!(recorder.layers, 1);
    }

    #[test]
    fn test_layer_scan_last() {
        let output = assembler(OutputConfig {
            layer_scan: true,
            active_channel: 1,
            point_num: 100,
            ..Default::default()
        })
        .assemble(sweep());

        let scan = output.layer_scan.unwrap();
        assert_eq!(scan.channel, 1);
        assert_eq!(scan.ranges.len(), 100);
        assert_eq!(scan.intensities.len(), 100);
        assert!((scan.angle_increment - TAU / 100.0).abs() < 1e-6);
        let last_bin = scan.angle_min + 99.0 * scan.angle_increment;
        assert!((scan.angle_max - last_bin).abs() < 1e-5);

        // Azimuth 0.5 lands in bin 7 (0.5 / 0.0628)
        assert_eq!(scan.ranges[7], 6.0);
        assert_eq!(scan.intensities[7], 10.0);
        assert!(scan.ranges[1].is_infinite());

        let filled = scan.ranges.iter().filter(|r| r.is_finite()).count();
        assert_eq!(filled, 10);
        // Channel 1 points are 16us apart across 10 steps
        assert!((scan.scan_time - 144e-6).abs() < 1e-9);
    }

    #[test]
    fn test_layer_scan_mean() {
        let sweep = Sweep {
            sweep_id: 0,
            start_timestamp: 0,
            points: vec![
                point(0, 1.0, 4.0, 0),
                point(0, 1.001, 6.0, 10),
                point(0, 3.0, 9.0, 20),
            ],
        };

        let config = OutputConfig {
            layer_scan: true,
            active_channel: 0,
            point_num: 360,
            scan_merge: ScanMerge::Mean,
            ..Default::default()
        };
        let scan = assembler(config.clone()).assemble(sweep.clone()).layer_scan.unwrap();
        let bin = (1.0 / scan.angle_increment) as usize;
        assert_eq!(scan.ranges[bin], 5.0);

        let config = OutputConfig {
            scan_merge: ScanMerge::Last,
            ..config
        };
        let scan = assembler(config).assemble(sweep).layer_scan.unwrap();
        assert_eq!(scan.ranges[bin], 6.0);
    }

    #[test]
    fn test_mean_reading() {
        assert_eq!(mean_reading(10.0, 30.0, 2), (5.0, 15.0));
        let (d, i) = mean_reading(0.0, 0.0, 0);
        assert!(d.is_infinite() && i.is_infinite());
    }
}
