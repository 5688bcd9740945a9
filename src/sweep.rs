// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Revolution accumulator.
//!
//! The accumulator owns the single live [`Sweep`]. It watches the base
//! azimuth of every firing and declares a revolution boundary when the
//! azimuth falls back by more than [`WRAP_THRESHOLD`], i.e. the head rotated
//! past 360° to 0°.
//!
//! ```text
//!            boundary (no emit)            boundary (emit)
//! FirstSweep ──────────────────► Accumulating ───────────────┐
//!   (points discarded)               ▲                       │
//!                                    └───────────────────────┘
//! ```
//!
//! The partial revolution seen after startup is discarded, so the first
//! boundary emits nothing. Every later boundary moves the live sweep out to
//! the caller and starts a fresh one.

use crate::lidar::{CalibratedPoint, timestamp};
use std::f64::consts::PI;

/// Azimuth drop between consecutive firings that marks a new revolution.
pub const WRAP_THRESHOLD: f64 = PI;

/// Expected points per revolution (~28,800 at 10Hz)
pub const POINTS_PER_SWEEP: usize = 32_768;

/// Points collected during one revolution, in firing order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sweep {
    /// Sweep sequence ID (wraps at u32::MAX)
    pub sweep_id: u32,
    /// Timestamp of the first firing in nanoseconds
    pub start_timestamp: u64,
    pub points: Vec<CalibratedPoint>,
}

impl Sweep {
    fn with_capacity(sweep_id: u32, start_timestamp: u64, capacity: usize) -> Self {
        Self {
            sweep_id,
            start_timestamp,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Whether moving from `previous` to `current` azimuth crosses 0.
#[inline]
pub fn is_revolution_boundary(previous: f64, current: f64) -> bool {
    previous - current > WRAP_THRESHOLD
}

/// Clock used to stamp the start of each sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SweepClock {
    /// Device timestamp of the boundary firing
    #[default]
    Device,
    /// Host monotonic clock when the boundary is seen
    Host,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    FirstSweep,
    Accumulating,
}

/// Revolution boundary state machine.
pub struct SweepAccumulator {
    phase: Phase,
    /// Base azimuth of the last observed firing
    last_azimuth: Option<f64>,
    live: Sweep,
    clock: SweepClock,
    capacity: usize,
}

impl SweepAccumulator {
    pub fn new(clock: SweepClock) -> Self {
        Self::with_capacity(clock, POINTS_PER_SWEEP)
    }

    pub fn with_capacity(clock: SweepClock, capacity: usize) -> Self {
        Self {
            phase: Phase::FirstSweep,
            last_azimuth: None,
            live: Sweep::with_capacity(0, 0, capacity),
            clock,
            capacity,
        }
    }

    /// Observe the base azimuth of the next firing.
    ///
    /// Returns the finalized sweep when this firing starts a new revolution
    /// and a complete revolution was collected before it.
    pub fn observe_firing(&mut self, azimuth: f64, firing_time_ns: u64) -> Option<Sweep> {
        let previous = self.last_azimuth.replace(azimuth);
        let boundary = previous.is_some_and(|prev| is_revolution_boundary(prev, azimuth));
        if !boundary {
            return None;
        }

        let start = match self.clock {
            SweepClock::Device => firing_time_ns,
            SweepClock::Host => timestamp().unwrap_or(firing_time_ns),
        };

        match self.phase {
            Phase::FirstSweep => {
                self.phase = Phase::Accumulating;
                self.live.start_timestamp = start;
                None
            }
            Phase::Accumulating => {
                let next_id = self.live.sweep_id.wrapping_add(1);
                let next = Sweep::with_capacity(next_id, start, self.capacity);
                Some(std::mem::replace(&mut self.live, next))
            }
        }
    }

    /// Whether points are currently kept (false until the first boundary).
    #[inline]
    pub fn is_collecting(&self) -> bool {
        self.phase == Phase::Accumulating
    }

    /// Append a point to the live sweep. Ignored before the first boundary.
    #[inline]
    pub fn push(&mut self, point: CalibratedPoint) {
        if self.is_collecting() {
            self.live.points.push(point);
        }
    }

    /// Number of points in the live sweep.
    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn last_azimuth(&self) -> Option<f64> {
        self.last_azimuth
    }

    /// Drop the live sweep and return to the startup state.
    pub fn reset(&mut self) {
        self.phase = Phase::FirstSweep;
        self.last_azimuth = None;
        self.live = Sweep::with_capacity(0, 0, self.capacity);
    }
}
