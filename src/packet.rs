// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Leishen C16 MSOP packet layout and validation.
//!
//! # Packet Structure
//!
//! Data packets are 1206 bytes, sent to UDP port 2368:
//! - Data: 12 blocks × 100 bytes = 1200 bytes
//! - Timestamp: 4 bytes, little-endian, microseconds
//! - Factory: 2 bytes (return mode, model)
//!
//! Each block is:
//! - Header: 2 bytes, `0xeeff` (upper bank) or `0xddff` (lower bank)
//! - Rotation: 2 bytes, little-endian, hundredths of a degree (0-35999)
//! - Data: 32 readings × 3 bytes (distance LE u16, intensity u8), two
//!   firings of 16 channels each
//!
//! [`RawPacket`] is a validated, borrowed view over the bytes. Accessors use
//! fixed offsets into the length-checked buffer, so no read leaves the packet.

use crate::lidar::{CHANNELS, Error};
use clap::ValueEnum;
use std::fmt;

/// Data packet total size in bytes
pub const PACKET_SIZE: usize = 1206;

/// Number of blocks per data packet
pub const BLOCKS_PER_PACKET: usize = 12;

/// Size of each block in bytes
pub const BLOCK_SIZE: usize = 100;

/// Size of one channel reading in bytes
pub const RAW_SCAN_SIZE: usize = 3;

/// Readings carried by a block (two firings)
pub const SCANS_PER_BLOCK: usize = 32;

/// Firings carried by a block
pub const FIRINGS_PER_BLOCK: usize = 2;

/// Firings carried by a packet
pub const FIRINGS_PER_PACKET: usize = FIRINGS_PER_BLOCK * BLOCKS_PER_PACKET;

/// Upper bank block header
pub const UPPER_BANK: u16 = 0xeeff;

/// Lower bank block header
pub const LOWER_BANK: u16 = 0xddff;

/// One past the largest valid raw rotation (hundredths of a degree)
pub const ROTATION_MAX_UNITS: u16 = 36000;

const TIMESTAMP_OFFSET: usize = BLOCKS_PER_PACKET * BLOCK_SIZE;
const FACTORY_OFFSET: usize = TIMESTAMP_OFFSET + 4;
const BLOCK_HEADER_SIZE: usize = 4;

/// Channel bank identified by a block header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    Upper,
    Lower,
}

impl TryFrom<u16> for Bank {
    type Error = u16;

    fn try_from(header: u16) -> Result<Self, Self::Error> {
        match header {
            UPPER_BANK => Ok(Bank::Upper),
            LOWER_BANK => Ok(Bank::Lower),
            other => Err(other),
        }
    }
}

/// Rule the block banks of a packet must follow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BankPolicy {
    /// Consecutive blocks alternate between upper and lower bank
    #[default]
    Alternating,
    /// Every block in the packet carries the same bank
    Uniform,
}

impl fmt::Display for BankPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BankPolicy::Alternating => write!(f, "alternating"),
            BankPolicy::Uniform => write!(f, "uniform"),
        }
    }
}

/// Return mode reported in the factory field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReturnMode {
    Strongest,
    Last,
    Dual,
    #[default]
    Unknown,
}

impl From<u8> for ReturnMode {
    fn from(value: u8) -> Self {
        match value {
            0x37 => ReturnMode::Strongest,
            0x38 => ReturnMode::Last,
            0x39 => ReturnMode::Dual,
            _ => ReturnMode::Unknown,
        }
    }
}

/// Validated view over one data packet.
#[derive(Clone, Copy)]
pub struct RawPacket<'a> {
    data: &'a [u8; PACKET_SIZE],
}

impl<'a> RawPacket<'a> {
    /// Validate a candidate buffer and wrap it.
    ///
    /// Fails if the buffer is not exactly [`PACKET_SIZE`] bytes, if a block
    /// header is not a bank sentinel, or if the banks break `policy`.
    pub fn new(data: &'a [u8], policy: BankPolicy) -> Result<Self, Error> {
        let data: &[u8; PACKET_SIZE] = data.try_into().map_err(|_| Error::PacketSize {
            expected: PACKET_SIZE,
            actual: data.len(),
        })?;
        let packet = Self { data };

        let mut previous: Option<Bank> = None;
        for (block, raw) in packet.blocks().enumerate() {
            let bank = raw.bank().map_err(|header| Error::BankHeader { block, header })?;
            if let Some(previous) = previous {
                let consistent = match policy {
                    BankPolicy::Alternating => bank != previous,
                    BankPolicy::Uniform => bank == previous,
                };
                if !consistent {
                    return Err(Error::BankAlternation { block });
                }
            }
            previous = Some(bank);
        }

        Ok(packet)
    }

    /// Block `index` of the packet, `index < BLOCKS_PER_PACKET`.
    #[inline]
    pub fn block(&self, index: usize) -> RawBlock<'a> {
        let start = index * BLOCK_SIZE;
        RawBlock {
            data: &self.data[start..start + BLOCK_SIZE],
        }
    }

    pub fn blocks(self) -> impl Iterator<Item = RawBlock<'a>> {
        (0..BLOCKS_PER_PACKET).map(move |i| self.block(i))
    }

    /// Device timestamp in microseconds.
    #[inline]
    pub fn timestamp_us(&self) -> u32 {
        let d = self.data;
        u32::from_le_bytes([
            d[TIMESTAMP_OFFSET],
            d[TIMESTAMP_OFFSET + 1],
            d[TIMESTAMP_OFFSET + 2],
            d[TIMESTAMP_OFFSET + 3],
        ])
    }

    /// Raw two-byte factory field.
    #[inline]
    pub fn factory(&self) -> [u8; 2] {
        [self.data[FACTORY_OFFSET], self.data[FACTORY_OFFSET + 1]]
    }

    pub fn return_mode(&self) -> ReturnMode {
        ReturnMode::from(self.factory()[0])
    }
}

/// View over one 100-byte block.
#[derive(Clone, Copy)]
pub struct RawBlock<'a> {
    data: &'a [u8],
}

impl RawBlock<'_> {
    #[inline]
    pub fn header(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    /// Bank of this block, or the offending header value.
    #[inline]
    pub fn bank(&self) -> Result<Bank, u16> {
        Bank::try_from(self.header())
    }

    /// Raw rotation in hundredths of a degree, unchecked.
    #[inline]
    pub fn rotation(&self) -> u16 {
        u16::from_le_bytes([self.data[2], self.data[3]])
    }

    /// Raw distance and intensity of `channel` in `firing` (0 or 1).
    #[inline]
    pub fn reading(&self, firing: usize, channel: usize) -> (u16, u8) {
        debug_assert!(firing < FIRINGS_PER_BLOCK && channel < CHANNELS);
        let offset = BLOCK_HEADER_SIZE + RAW_SCAN_SIZE * (CHANNELS * firing + channel);
        let distance = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
        (distance, self.data[offset + 2])
    }
}

/// Builder for synthetic packets used by tests and benchmarks.
///
/// Every reading is filled with the same distance and intensity unless
/// overridden with [`PacketBuilder::reading`].
#[derive(Clone)]
pub struct PacketBuilder {
    data: Vec<u8>,
}

impl PacketBuilder {
    /// Start a packet with all blocks alternating banks, upper first.
    pub fn new(distance_raw: u16, intensity: u8) -> Self {
        let mut data = vec![0u8; PACKET_SIZE];
        for block in 0..BLOCKS_PER_PACKET {
            let start = block * BLOCK_SIZE;
            let header = if block % 2 == 0 { UPPER_BANK } else { LOWER_BANK };
            data[start..start + 2].copy_from_slice(&header.to_le_bytes());
            for scan in 0..SCANS_PER_BLOCK {
                let offset = start + BLOCK_HEADER_SIZE + scan * RAW_SCAN_SIZE;
                data[offset..offset + 2].copy_from_slice(&distance_raw.to_le_bytes());
                data[offset + 2] = intensity;
            }
        }
        data[FACTORY_OFFSET] = 0x37;
        data[FACTORY_OFFSET + 1] = 0x20;
        Self { data }
    }

    /// Set every block header to `header`.
    pub fn uniform_bank(mut self, header: u16) -> Self {
        for block in 0..BLOCKS_PER_PACKET {
            self = self.header(block, header);
        }
        self
    }

    pub fn header(mut self, block: usize, header: u16) -> Self {
        let start = block * BLOCK_SIZE;
        self.data[start..start + 2].copy_from_slice(&header.to_le_bytes());
        self
    }

    pub fn rotation(mut self, block: usize, rotation: u16) -> Self {
        let start = block * BLOCK_SIZE + 2;
        self.data[start..start + 2].copy_from_slice(&rotation.to_le_bytes());
        self
    }

    /// Rotations `start + i * step` for every block `i`, wrapped at 360°.
    pub fn rotations(mut self, start: u32, step: u32) -> Self {
        for block in 0..BLOCKS_PER_PACKET {
            let rotation = (start + block as u32 * step) % ROTATION_MAX_UNITS as u32;
            self = self.rotation(block, rotation as u16);
        }
        self
    }

    pub fn reading(
        mut self,
        block: usize,
        firing: usize,
        channel: usize,
        distance_raw: u16,
        intensity: u8,
    ) -> Self {
        let offset = block * BLOCK_SIZE
            + BLOCK_HEADER_SIZE
            + RAW_SCAN_SIZE * (CHANNELS * firing + channel);
        self.data[offset..offset + 2].copy_from_slice(&distance_raw.to_le_bytes());
        self.data[offset + 2] = intensity;
        self
    }

    pub fn timestamp_us(mut self, timestamp: u32) -> Self {
        self.data[TIMESTAMP_OFFSET..FACTORY_OFFSET].copy_from_slice(&timestamp.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_packet() {
        let data = PacketBuilder::new(400, 7)
            .rotations(100, 20)
            .timestamp_us(123_456)
            .build();
        let packet = RawPacket::new(&data, BankPolicy::Alternating).unwrap();

        assert_eq!(packet.timestamp_us(), 123_456);
        assert_eq!(packet.return_mode(), ReturnMode::Strongest);
        assert_eq!(packet.block(0).bank(), Ok(Bank::Upper));
        assert_eq!(packet.block(1).bank(), Ok(Bank::Lower));
        assert_eq!(packet.block(3).rotation(), 160);
        assert_eq!(packet.block(11).reading(1, 15), (400, 7));
    }

    #[test]
    fn test_invalid_packet_size() {
        let mut data = PacketBuilder::new(400, 7).build();
        data.pop();
        assert!(matches!(
            RawPacket::new(&data, BankPolicy::Alternating),
            Err(Error::PacketSize {
                expected: PACKET_SIZE,
                actual: 1205
            })
        ));

        data.extend_from_slice(&[0, 0]);
        assert!(RawPacket::new(&data, BankPolicy::Alternating).is_err());
    }

    #[test]
    fn test_invalid_bank_header() {
        let data = PacketBuilder::new(400, 7).header(5, 0x1234).build();
        assert!(matches!(
            RawPacket::new(&data, BankPolicy::Alternating),
            Err(Error::BankHeader {
                block: 5,
                header: 0x1234
            })
        ));
    }

    #[test]
    fn test_bank_alternation() {
        // Blocks 3 and 4 both upper bank
        let data = PacketBuilder::new(400, 7).header(3, UPPER_BANK).build();
        assert!(matches!(
            RawPacket::new(&data, BankPolicy::Alternating),
            Err(Error::BankAlternation { block: 3 })
        ));

        // Alternation may start on either bank
        let mut builder = PacketBuilder::new(400, 7);
        for block in 0..BLOCKS_PER_PACKET {
            let header = if block % 2 == 0 { LOWER_BANK } else { UPPER_BANK };
            builder = builder.header(block, header);
        }
        assert!(RawPacket::new(&builder.build(), BankPolicy::Alternating).is_ok());
    }

    #[test]
    fn test_uniform_bank_policy() {
        let data = PacketBuilder::new(400, 7).uniform_bank(UPPER_BANK).build();
        assert!(RawPacket::new(&data, BankPolicy::Uniform).is_ok());
        assert!(RawPacket::new(&data, BankPolicy::Alternating).is_err());

        let data = PacketBuilder::new(400, 7).build();
        assert!(matches!(
            RawPacket::new(&data, BankPolicy::Uniform),
            Err(Error::BankAlternation { block: 1 })
        ));
    }

    #[test]
    fn test_return_mode_from() {
        assert_eq!(ReturnMode::from(0x37), ReturnMode::Strongest);
        assert_eq!(ReturnMode::from(0x38), ReturnMode::Last);
        assert_eq!(ReturnMode::from(0x39), ReturnMode::Dual);
        assert_eq!(ReturnMode::from(0x00), ReturnMode::Unknown);
    }
}
