// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Leishen C16 driver.
//!
//! The C16 is a mechanically rotating LiDAR with:
//! - 16 channels, ±15° vertical FOV in 2° steps
//! - 360° horizontal FOV, 5/10/20 Hz rotation
//! - ~28,800 points per revolution at 10 Hz
//! - 150m range, 2.5mm distance resolution
//!
//! [`C16Driver`] runs one decode cycle per packet:
//!
//! ```text
//! bytes ─► RawPacket ─► decode ─► PointTransformer ─► SweepAccumulator
//!          (validate)   (24 firings)  (filter)            │ boundary
//!                                                         ▼
//!                                               OutputAssembler ─► SweepSink
//! ```
//!
//! A packet that fails validation is rejected before any state changes.

use crate::{
    calibration::Calibration,
    config::DecoderConfig,
    decoder::{DecodedPacket, decode},
    lidar::{Error, LidarDriver},
    output::{OutputAssembler, SweepOutput, SweepSink},
    packet::{FIRINGS_PER_PACKET, RawPacket, ReturnMode},
    sweep::{SweepAccumulator, SweepClock},
    transform::{DropReason, PointFilter, PointTransformer},
};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Running counters kept by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Packets that passed validation
    pub packets: u64,
    /// Packets rejected by validation
    pub malformed: u64,
    /// Blocks whose rotation had to be wrapped into range
    pub azimuth_anomalies: u64,
    pub out_of_range: u64,
    pub excluded: u64,
    /// Completed sweeps handed to the caller
    pub sweeps: u64,
}

/// Leishen C16 packet decoder and sweep assembler.
pub struct C16Driver {
    config: DecoderConfig,
    transformer: PointTransformer,
    accumulator: SweepAccumulator,
    assembler: OutputAssembler,
    return_mode: Option<ReturnMode>,
    stats: DriverStats,
}

impl C16Driver {
    /// Create a driver with the default calibration.
    pub fn new(config: DecoderConfig) -> Result<Self, Error> {
        Self::with_calibration(config, Arc::new(Calibration::new()))
    }

    pub fn with_calibration(
        config: DecoderConfig,
        calibration: Arc<Calibration>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let clock = if config.use_gps_ts {
            SweepClock::Device
        } else {
            SweepClock::Host
        };

        debug!(
            "c16 driver: range [{}, {}] m, bank policy {}, clock {:?}",
            config.min_range, config.max_range, config.bank_policy, clock
        );

        Ok(Self {
            transformer: PointTransformer::new(calibration, PointFilter::from_config(&config)),
            accumulator: SweepAccumulator::new(clock),
            assembler: OutputAssembler::new(&config),
            return_mode: None,
            stats: DriverStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Points collected so far in the live sweep.
    pub fn live_len(&self) -> usize {
        self.accumulator.live_len()
    }

    pub fn active_channel(&self) -> u8 {
        self.assembler.active_channel()
    }

    /// Select the channel used by single-layer outputs (0-15).
    ///
    /// Out of range values are ignored and return false.
    pub fn set_active_channel(&mut self, channel: u8) -> bool {
        let accepted = self.assembler.set_active_channel(channel);
        if accepted {
            info!("active channel set to {}", channel);
        }
        accepted
    }

    /// Decode one packet and deliver every completed sweep to `sink`.
    ///
    /// Malformed packets are logged and dropped.
    pub fn receive<S: SweepSink + ?Sized>(&mut self, data: &[u8], sink: &mut S) {
        match self.process_packet(data) {
            Ok(outputs) => {
                for output in &outputs {
                    output.dispatch(sink);
                }
            }
            Err(err) => warn!("dropping packet: {}", err),
        }
    }

    fn track_return_mode(&mut self, mode: ReturnMode) {
        if self.return_mode != Some(mode) {
            info!("return mode: {:?}", mode);
            self.return_mode = Some(mode);
        }
    }

    fn accumulate(&mut self, decoded: &DecodedPacket) -> Vec<SweepOutput> {
        let packet_time_ns = decoded.timestamp_us as u64 * 1000;
        let mut outputs = Vec::new();

        for (fir_idx, firing) in decoded.firings.iter().enumerate() {
            let firing_time_ns =
                packet_time_ns + (DecodedPacket::time_offset_us(fir_idx, 0) * 1000.0) as u64;

            // A wrapped rotation must not move the revolution boundary
            let completed = if firing.anomalous {
                None
            } else {
                self.accumulator.observe_firing(firing.azimuth, firing_time_ns)
            };
            if let Some(sweep) = completed {
                trace!("sweep {} complete: {} points", sweep.sweep_id, sweep.len());
                self.stats.sweeps += 1;
                outputs.push(self.assembler.assemble(sweep));
            }

            if !self.accumulator.is_collecting() {
                continue;
            }

            for result in self
                .transformer
                .transform_firing(firing, fir_idx, packet_time_ns)
            {
                match result {
                    Ok(point) => self.accumulator.push(point),
                    Err(DropReason::OutOfRange) => self.stats.out_of_range += 1,
                    Err(DropReason::Excluded) => self.stats.excluded += 1,
                }
            }
        }

        outputs
    }
}

impl LidarDriver for C16Driver {
    fn process_packet(&mut self, data: &[u8]) -> Result<Vec<SweepOutput>, Error> {
        let packet = match RawPacket::new(data, self.config.bank_policy) {
            Ok(packet) => packet,
            Err(err) => {
                self.stats.malformed += 1;
                return Err(err);
            }
        };
        self.stats.packets += 1;

        let decoded = decode(&packet);
        debug_assert_eq!(decoded.firings.len(), FIRINGS_PER_PACKET);

        if decoded.azimuth_anomalies > 0 {
            self.stats.azimuth_anomalies += decoded.azimuth_anomalies as u64;
            warn!(
                "{} block rotation(s) out of range, wrapped",
                decoded.azimuth_anomalies
            );
        }

        self.track_return_mode(decoded.return_mode);

        Ok(self.accumulate(&decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lidar::CalibratedPoint,
        output::LayerScan,
        packet::{BankPolicy, PacketBuilder, UPPER_BANK},
    };

    /// `count` packets starting at `start` hundredths of a degree, 0.2° per
    /// block.
    fn packets(start: u32, count: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| {
                let first = start + i as u32 * 12 * 20;
                PacketBuilder::new(4000, 100)
                    .rotations(first, 20)
                    .timestamp_us(i as u32 * 1327)
                    .build()
            })
            .collect()
    }

    #[derive(Default)]
    struct Collector {
        batches: Vec<Vec<CalibratedPoint>>,
        channels: Vec<u8>,
        layers: Vec<LayerScan>,
    }

    impl SweepSink for Collector {
        fn on_point_batch(&mut self, points: &[CalibratedPoint], _start_timestamp: u64) {
            self.batches.push(points.to_vec());
        }

        fn on_channel_scan(&mut self, channel: u8, _points: &[CalibratedPoint]) {
            self.channels.push(channel);
        }

        fn on_layer_scan(&mut self, scan: &LayerScan) {
            self.layers.push(scan.clone());
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DecoderConfig {
            min_range: 2.0,
            max_range: 1.0,
            ..Default::default()
        };
        assert!(matches!(C16Driver::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_packet_leaves_state() {
        let mut driver = C16Driver::new(DecoderConfig::default()).unwrap();
        // Reach the collecting phase
        for packet in packets(35000, 10) {
            driver.process_packet(&packet).unwrap();
        }
        let live = driver.live_len();
        assert!(live > 0);

        let short = vec![0u8; 1205];
        assert!(matches!(
            driver.process_packet(&short),
            Err(Error::PacketSize {
                expected: 1206,
                actual: 1205
            })
        ));

        let bad_header = PacketBuilder::new(4000, 100).header(3, 0x1234).build();
        assert!(driver.process_packet(&bad_header).is_err());

        assert_eq!(driver.live_len(), live);
        assert_eq!(driver.stats().malformed, 2);
        assert_eq!(driver.stats().packets, 10);
    }

    #[test]
    fn test_receive_swallows_errors() {
        let mut driver = C16Driver::new(DecoderConfig::default()).unwrap();
        let mut sink = Collector::default();
        driver.receive(&[0u8; 10], &mut sink);
        driver.receive(&[], &mut sink);
        assert!(sink.batches.is_empty());
        assert_eq!(driver.stats().malformed, 2);
    }

    #[test]
    fn test_one_sweep_per_revolution() {
        let mut driver = C16Driver::new(DecoderConfig::default()).unwrap();
        let mut sink = Collector::default();

        // 150 packets at 2.4° each is exactly one revolution. Starting at
        // 180° crosses 0° at packets 75 and 225.
        for packet in packets(18000, 240) {
            driver.receive(&packet, &mut sink);
        }

        assert_eq!(sink.batches.len(), 1);
        assert_eq!(driver.stats().sweeps, 1);
        // 150 packets * 384 readings, all in range
        assert_eq!(sink.batches[0].len(), 150 * 384);
        assert_eq!(sink.channels.len(), 16);
        assert!(sink.layers.is_empty());

        let batch = &sink.batches[0];
        assert!(batch.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_out_of_range_rotation_keeps_revolution() {
        let mut driver = C16Driver::new(DecoderConfig::default()).unwrap();
        let mut sink = Collector::default();

        // Starting at 300° crosses 0° once at packet 25, which only opens the
        // first sweep. Packet 100 sits near 180° with one corrupt block that
        // wraps to 40°.
        let mut stream = packets(30000, 120);
        stream[100] = PacketBuilder::new(4000, 100)
            .rotations((30000 + 100 * 240) % 36000, 20)
            .rotation(6, 40000)
            .timestamp_us(100 * 1327)
            .build();

        for packet in &stream {
            driver.receive(packet, &mut sink);
        }

        assert_eq!(driver.stats().azimuth_anomalies, 1);
        assert_eq!(driver.stats().sweeps, 0);
        assert!(sink.batches.is_empty());
        // Readings of the corrupt block are still kept in the live sweep
        assert_eq!(driver.live_len(), 95 * 384);
    }

    #[test]
    fn test_range_filter_counts() {
        let config = DecoderConfig {
            min_range: 20.0,
            ..Default::default()
        };
        let mut driver = C16Driver::new(config).unwrap();
        for packet in packets(35000, 10) {
            driver.process_packet(&packet).unwrap();
        }
        // Every reading is 10m, below min_range
        assert_eq!(driver.live_len(), 0);
        assert!(driver.stats().out_of_range > 0);
    }

    #[test]
    fn test_uniform_bank_policy() {
        let config = DecoderConfig {
            bank_policy: BankPolicy::Uniform,
            ..Default::default()
        };
        let mut driver = C16Driver::new(config).unwrap();

        let uniform = PacketBuilder::new(4000, 1).uniform_bank(UPPER_BANK).build();
        assert!(driver.process_packet(&uniform).is_ok());

        let alternating = PacketBuilder::new(4000, 1).build();
        assert!(matches!(
            driver.process_packet(&alternating),
            Err(Error::BankAlternation { .. })
        ));
    }

    #[test]
    fn test_layer_scan_follows_active_channel() {
        let mut config = DecoderConfig::default();
        config.output.single_layer = true;
        config.output.layer_scan = true;
        config.output.point_num = 360;

        let mut driver = C16Driver::new(config).unwrap();
        assert!(driver.set_active_channel(3));
        assert!(!driver.set_active_channel(16));
        assert_eq!(driver.active_channel(), 3);

        let mut sink = Collector::default();
        for packet in packets(18000, 240) {
            driver.receive(&packet, &mut sink);
        }

        assert_eq!(sink.channels, vec![3]);
        assert_eq!(sink.layers.len(), 1);
        let scan = &sink.layers[0];
        assert_eq!(scan.channel, 3);
        assert_eq!(scan.ranges.len(), 360);
        assert!(scan.ranges.iter().all(|r| (r - 10.0).abs() < 1e-3));
    }
}
