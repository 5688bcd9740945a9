// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_lslidarpub::{
    driver::C16Driver,
    formats::{encode_laser_scan, encode_point_cloud, time_from_nanos},
    lidar::{CHANNELS, CalibratedPoint, LidarDriver as _},
    output::{LayerScan, SweepOutput, SweepSink},
    packet_source::{PacketSource, ReplaySource, UdpSource},
};
use edgefirst_schemas::builtin_interfaces::Time;
use kanal::{AsyncReceiver, AsyncSender, Receiver, Sender};
use tracing::{debug, error, info, info_span, trace, warn};
use zenoh::{
    bytes::{Encoding, ZBytes},
    pubsub::Publisher,
    qos::{CongestionControl, Priority},
    sample::Sample,
};

/// Completed sweeps waiting for the publisher task
const OUTPUT_QUEUE: usize = 4;

/// Destination of an encoded message
#[derive(Clone, Copy, Debug)]
enum Topic {
    Points,
    Channel(u8),
    Scan,
}

struct Publishers {
    points: Publisher<'static>,
    channels: Vec<Publisher<'static>>,
    scan: Publisher<'static>,
}

impl Publishers {
    async fn declare(session: &zenoh::Session, topic: &str) -> Result<Self, zenoh::Error> {
        let points = declare_publisher(session, format!("{}/points", topic)).await?;
        let scan = declare_publisher(session, format!("{}/scan", topic)).await?;

        let mut channels = Vec::with_capacity(CHANNELS);
        for channel in 0..CHANNELS {
            let key = format!("{}/channel/{}", topic, channel);
            channels.push(declare_publisher(session, key).await?);
        }

        Ok(Self {
            points,
            channels,
            scan,
        })
    }

    fn get(&self, topic: Topic) -> &Publisher<'static> {
        match topic {
            Topic::Points => &self.points,
            Topic::Channel(channel) => &self.channels[channel as usize],
            Topic::Scan => &self.scan,
        }
    }
}

async fn declare_publisher(
    session: &zenoh::Session,
    key: String,
) -> Result<Publisher<'static>, zenoh::Error> {
    match session
        .declare_publisher(key.clone())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
    {
        Ok(v) => Ok(v),
        Err(e) => {
            error!("Failed to create publisher {}: {:?}", key, e);
            Err(e)
        }
    }
}

/// Encodes every part of a sweep output into Zenoh payloads.
struct MessageBatch {
    stamp: Time,
    frame_id: String,
    messages: Vec<(Topic, ZBytes, Encoding)>,
}

impl MessageBatch {
    fn new(stamp: Time, frame_id: String) -> Self {
        Self {
            stamp,
            frame_id,
            messages: Vec::with_capacity(CHANNELS + 2),
        }
    }

    fn push(&mut self, topic: Topic, encoded: Result<(ZBytes, Encoding), impl std::fmt::Display>) {
        match encoded {
            Ok((msg, enc)) => self.messages.push((topic, msg, enc)),
            Err(e) => error!("Could not encode {:?}: {}", topic, e),
        }
    }
}

impl SweepSink for MessageBatch {
    fn on_point_batch(&mut self, points: &[CalibratedPoint], _start_timestamp: u64) {
        let encoded = encode_point_cloud(points, self.stamp.clone(), self.frame_id.clone());
        self.push(Topic::Points, encoded);
    }

    fn on_channel_scan(&mut self, channel: u8, points: &[CalibratedPoint]) {
        let encoded = encode_point_cloud(points, self.stamp.clone(), self.frame_id.clone());
        self.push(Topic::Channel(channel), encoded);
    }

    fn on_layer_scan(&mut self, scan: &LayerScan) {
        let encoded = encode_laser_scan(scan, self.frame_id.clone());
        self.push(Topic::Scan, encoded);
    }
}

async fn publish_thread(rx: AsyncReceiver<SweepOutput>, publishers: Publishers, frame_id: String) {
    while let Ok(output) = rx.recv().await {
        let stamp = time_from_nanos(output.start_timestamp);
        let mut batch = MessageBatch::new(stamp, frame_id.clone());
        info_span!("encode", sweep_id = output.sweep_id).in_scope(|| output.dispatch(&mut batch));

        for (topic, msg, enc) in batch.messages {
            match publishers.get(topic).put(msg).encoding(enc).await {
                Ok(_) => trace!("{:?} message sent", topic),
                Err(e) => error!("{:?} publish error: {:?}", topic, e),
            }
        }
    }
    debug!("publisher queue closed");
}

/// Parse a layer selection message.
fn layer_request(sample: &Sample) -> Option<u8> {
    let payload = sample.payload().try_to_string().ok()?;
    payload.trim().parse().ok()
}

async fn decode_loop(
    mut source: Box<dyn PacketSource>,
    mut driver: C16Driver,
    tx: AsyncSender<SweepOutput>,
    layer_rx: Receiver<u8>,
) {
    let mut buf = [0u8; 2048];

    while source.has_more() {
        let len = match source.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                error!("packet receive error: {}", e);
                continue;
            }
        };

        while let Ok(Some(channel)) = layer_rx.try_recv() {
            if !driver.set_active_channel(channel) {
                warn!("ignoring layer request {}", channel);
            }
        }

        let outputs = match driver.process_packet(&buf[..len]) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("dropping packet: {}", e);
                continue;
            }
        };

        for output in outputs {
            match tx.try_send(output) {
                Ok(true) => {}
                Ok(false) => warn!("publisher busy, dropping sweep"),
                Err(_) => return,
            }
        }
    }

    info!("packet source exhausted: {:?}", driver.stats());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let driver = C16Driver::new(args.decoder_config())?;

    let session = zenoh::open(zenoh::Config::from(args.clone())).await?;
    let publishers = Publishers::declare(&session, &args.lidar_topic).await?;

    let (layer_tx, layer_rx): (Sender<u8>, Receiver<u8>) = kanal::bounded(8);
    let layer_topic = format!("{}/layer", args.lidar_topic);
    let _layer_sub = session
        .declare_subscriber(layer_topic.clone())
        .callback(move |sample| match layer_request(&sample) {
            Some(channel) => {
                if let Err(e) = layer_tx.try_send(channel) {
                    error!("layer request dropped: {:?}", e);
                }
            }
            None => warn!("invalid layer request on {}", sample.key_expr()),
        })
        .await?;
    info!("listening for layer requests on {}", layer_topic);

    let source: Box<dyn PacketSource> = match &args.replay {
        Some(path) => Box::new(ReplaySource::from_capture(path)?),
        None => Box::new(UdpSource::bind(&args.bind).await?),
    };

    let (tx, rx) = kanal::bounded_async(OUTPUT_QUEUE);
    let publisher = tokio::spawn(publish_thread(rx, publishers, args.frame_id.clone()));

    decode_loop(source, driver, tx, layer_rx).await;

    publisher.await?;
    Ok(())
}
