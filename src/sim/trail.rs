//! Pointer trail ring buffer
//!
//! Holds the most recent `TRAIL_MAX` input samples (NDC) plus a smoothed
//! input speed. Samples closer than `min_segment` to the previous one are
//! coalesced into the newest slot so a resting pointer cannot flood the
//! history with jitter.

use glam::Vec2;

use crate::consts::{MIN_SEGMENT, SPEED_RANGE, SPEED_SMOOTHING, TRAIL_MAX};
use crate::lerp;

/// What a `push` did to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// First sample since construction or `clear`
    First,
    /// Stored in a new slot (evicting the oldest once full)
    Appended,
    /// Overwrote the newest slot
    Coalesced,
}

/// Fixed-capacity trail history
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    ring: [Vec2; TRAIL_MAX],
    /// Next write index
    head: usize,
    /// Valid samples, saturating at `TRAIL_MAX`
    count: usize,
    last: Option<Vec2>,
    speed: f32,
    min_segment: f32,
}

impl Default for TrailBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrailBuffer {
    pub fn new() -> Self {
        Self::with_min_segment(MIN_SEGMENT)
    }

    pub fn with_min_segment(min_segment: f32) -> Self {
        Self {
            ring: [Vec2::ZERO; TRAIL_MAX],
            head: 0,
            count: 0,
            last: None,
            speed: 0.0,
            min_segment,
        }
    }

    /// Record an input sample
    pub fn push(&mut self, point: Vec2) -> PushOutcome {
        let Some(last) = self.last else {
            self.ring[self.head] = point;
            self.head = (self.head + 1) % TRAIL_MAX;
            self.count = 1;
            self.last = Some(point);
            return PushOutcome::First;
        };

        let d = point.distance(last);
        let instant = (d / (self.min_segment * SPEED_RANGE)).min(1.0);
        // Per call, so responsiveness follows the input event rate
        self.speed = lerp(self.speed, instant, SPEED_SMOOTHING);
        self.last = Some(point);

        if d > self.min_segment {
            self.ring[self.head] = point;
            self.head = (self.head + 1) % TRAIL_MAX;
            self.count = (self.count + 1).min(TRAIL_MAX);
            PushOutcome::Appended
        } else {
            let newest = (self.head + TRAIL_MAX - 1) % TRAIL_MAX;
            self.ring[newest] = point;
            PushOutcome::Coalesced
        }
    }

    /// Forget all samples (pointer left / touch ended)
    pub fn clear(&mut self) {
        self.count = 0;
        self.head = 0;
        self.speed = 0.0;
        self.last = None;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        TRAIL_MAX
    }

    pub fn head(&self) -> usize {
        self.head
    }

    /// Smoothed input speed in [0, 1]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn min_segment(&self) -> f32 {
        self.min_segment
    }

    /// Most recently stored sample
    pub fn latest(&self) -> Option<Vec2> {
        if self.count == 0 {
            None
        } else {
            Some(self.ring[(self.head + TRAIL_MAX - 1) % TRAIL_MAX])
        }
    }

    /// Valid samples, oldest first
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Vec2> + '_ {
        let start = (self.head + TRAIL_MAX - self.count) % TRAIL_MAX;
        (0..self.count).map(move |i| self.ring[(start + i) % TRAIL_MAX])
    }

    /// Copy samples oldest-first into `out`, returning how many were written
    pub fn copy_ordered(&self, out: &mut [Vec2; TRAIL_MAX]) -> usize {
        for (slot, point) in out.iter_mut().zip(self.iter()) {
            *slot = point;
        }
        self.count
    }
}
