// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for the C16 driver.
//!
//! This module provides a [`PacketSource`] trait that abstracts the source of
//! UDP packets, enabling:
//!
//! - **Live operation**: Reading from the MSOP UDP socket
//! - **Replay**: Feeding recorded or synthesized packets, once or looping
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_lslidarpub::packet_source::{PacketSource, ReplaySource};
//!
//! let mut source = ReplaySource::from_capture("c16.bin")?;
//!
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let len = source.recv(&mut buf).await?;
//!     driver.receive(&buf[..len], &mut sink);
//! }
//! ```

use crate::{lidar::Error, packet::PACKET_SIZE};
use std::{future::Future, path::Path, pin::Pin};
use tracing::debug;

/// Trait for packet sources.
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(len)` - Number of bytes received
    /// - `Err` - I/O or source error
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

    /// Check if more packets are available.
    ///
    /// For infinite sources (like UDP), always returns `true`.
    fn has_more(&self) -> bool;
}

/// UDP socket packet source for live sensor operation.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
}

impl UdpSource {
    pub fn new(socket: tokio::net::UdpSocket) -> Self {
        Self { socket }
    }

    /// Bind to an address and create a UDP source.
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        debug!("listening for MSOP packets on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let len = self.socket.recv(buf).await?;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        true
    }
}

/// Replays a fixed list of packets, optionally looping forever.
pub struct ReplaySource {
    packets: Vec<Vec<u8>>,
    index: usize,
    looping: bool,
}

impl ReplaySource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self {
            packets,
            index: 0,
            looping: false,
        }
    }

    /// Replay the packets indefinitely.
    pub fn looping(packets: Vec<Vec<u8>>) -> Self {
        Self {
            looping: true,
            ..Self::new(packets)
        }
    }

    /// Load a raw capture of back-to-back data packets.
    ///
    /// A trailing partial packet is kept as-is so the driver reports it.
    pub fn from_capture<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        let packets: Vec<Vec<u8>> = data.chunks(PACKET_SIZE).map(<[u8]>::to_vec).collect();
        debug!(
            "loaded {} packets from {}",
            packets.len(),
            path.as_ref().display()
        );
        Ok(Self::new(packets))
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packets delivered so far, counting every loop.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for ReplaySource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if !self.has_more() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets",
                )));
            }

            let packet = &self.packets[self.index % self.packets.len()];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        if self.looping {
            !self.packets.is_empty()
        } else {
            self.index < self.packets.len()
        }
    }
}
