// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_lslidarpub::{
    config::{DecoderConfig, OutputConfig, ScanMerge},
    packet::BankPolicy,
    transform::AzimuthWindow,
};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Local address receiving the MSOP data stream
    #[arg(long, env, default_value = "0.0.0.0:2368")]
    pub bind: String,

    /// Replay a raw capture of back-to-back 1206 byte packets instead of
    /// listening on the network
    #[arg(long, env)]
    pub replay: Option<String>,

    /// Minimum accepted distance in meters
    #[arg(long, env, default_value = "0.15")]
    pub min_range: f64,

    /// Maximum accepted distance in meters
    #[arg(long, env, default_value = "130.0")]
    pub max_range: f64,

    /// First azimuth exclusion window in degrees, "0 0" disables it.
    /// A start above the stop wraps through 0 degrees.
    #[arg(long, env, num_args = 2, value_names = ["START", "STOP"], value_delimiter = ' ', default_value = "0 0")]
    pub angle_disable: Vec<f64>,

    /// Second azimuth exclusion window in degrees, "0 0" disables it.
    #[arg(long, env, num_args = 2, value_names = ["START", "STOP"], value_delimiter = ' ', default_value = "0 0")]
    pub angle3_disable: Vec<f64>,

    /// Block bank sequence the sensor firmware emits
    #[arg(long, env, default_value = "alternating")]
    pub bank_policy: BankPolicy,

    /// Stamp sweeps with the sensor clock, otherwise the host clock
    #[arg(long, env, default_value = "true", action = clap::ArgAction::Set)]
    pub use_gps_ts: bool,

    /// Publish the full point cloud of each revolution
    #[arg(long, env, default_value = "true", action = clap::ArgAction::Set)]
    pub publish_point_cloud: bool,

    /// Publish per-channel scan lines
    #[arg(long, env, default_value = "true", action = clap::ArgAction::Set)]
    pub publish_channels: bool,

    /// Only publish the scan line of the active layer
    #[arg(long, env)]
    pub single_layer: bool,

    /// Publish a LaserScan of the active layer
    #[arg(long, env)]
    pub publish_scan: bool,

    /// Initially active layer (0-15)
    #[arg(long, env, default_value = "8")]
    pub layer_num: u8,

    /// Number of angular bins in the LaserScan
    #[arg(long, env, default_value = "2000")]
    pub point_num: usize,

    /// How returns falling into the same LaserScan bin are merged
    #[arg(long, env, default_value = "last")]
    pub scan_merge: ScanMerge,

    /// The name of the lidar frame
    #[arg(long, env, default_value = "lidar")]
    pub frame_id: String,

    /// lidar base topic
    #[arg(long, env, default_value = "rt/lidar")]
    pub lidar_topic: String,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    /// Decoder settings described by the command line.
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            min_range: self.min_range,
            max_range: self.max_range,
            angle_disable: window(&self.angle_disable),
            angle3_disable: window(&self.angle3_disable),
            bank_policy: self.bank_policy,
            use_gps_ts: self.use_gps_ts,
            output: OutputConfig {
                point_cloud: self.publish_point_cloud,
                channel_scan: self.publish_channels,
                single_layer: self.single_layer,
                layer_scan: self.publish_scan,
                active_channel: self.layer_num,
                point_num: self.point_num,
                scan_merge: self.scan_merge,
            },
        }
    }
}

fn window(degrees: &[f64]) -> AzimuthWindow {
    match degrees {
        [min, max] => AzimuthWindow::from_degrees(*min, *max),
        _ => AzimuthWindow::disabled(),
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .unwrap();

        if !args.connect.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.connect).to_string())
                .unwrap();
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .unwrap();
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .unwrap();
        }

        config
            .insert_json5("scouting/multicast/interface", &json!("lo").to_string())
            .unwrap();

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["lslidarpub"]);
        let config = args.decoder_config();
        assert_eq!(config, DecoderConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_windows_in_degrees() {
        let args = Args::parse_from([
            "lslidarpub",
            "--angle-disable",
            "90 120",
            "--angle3-disable",
            "350 10",
            "--layer-num",
            "3",
            "--scan-merge",
            "mean",
            "--use-gps-ts",
            "false",
        ]);
        let config = args.decoder_config();

        assert!((config.angle_disable.min - 90f64.to_radians()).abs() < 1e-12);
        assert!((config.angle_disable.max - 120f64.to_radians()).abs() < 1e-12);
        assert!(config.angle3_disable.min > config.angle3_disable.max);
        assert_eq!(config.output.active_channel, 3);
        assert_eq!(config.output.scan_merge, ScanMerge::Mean);
        assert!(!config.use_gps_ts);
    }
}
