//! Stateful wrapper around [`DiffEngine`] for capture loops.
//!
//! Remembers the previous frame and decides when a full frame must be
//! sent: the first frame, the frame after [`FrameTracker::reset`] or
//! [`FrameTracker::request_full_frame`], and any frame whose geometry
//! differs from its predecessor.

use tracing::{debug, warn};

use crate::frame::diff::DiffEngine;
use crate::frame::types::{ChangeRegion, Frame};

// ── FrameDiff ────────────────────────────────────────────────────

/// Result of one tracker update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDiff {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Regions to crop and encode.
    pub regions: Vec<ChangeRegion>,
    /// When `true`, `regions` is the single full-frame rectangle.
    pub full_frame: bool,
}

impl FrameDiff {
    /// Nothing to transmit.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Fraction of the screen area covered by the regions (0.0 – 1.0).
    pub fn change_ratio(&self) -> f64 {
        if self.full_frame {
            return 1.0;
        }
        let total = self.width as f64 * self.height as f64;
        if total == 0.0 {
            return 0.0;
        }
        let changed: f64 = self.regions.iter().map(|r| r.area() as f64).sum();
        (changed / total).min(1.0)
    }
}

// ── FrameTracker ─────────────────────────────────────────────────

pub struct FrameTracker {
    engine: DiffEngine,
    previous: Option<Frame>,
    force_full: bool,
}

impl FrameTracker {
    pub fn new(engine: DiffEngine) -> Self {
        Self {
            engine,
            previous: None,
            force_full: true,
        }
    }

    /// Forget the previous frame; the next update is a full frame.
    pub fn reset(&mut self) {
        self.previous = None;
        self.force_full = true;
    }

    /// Make the next update a full frame while keeping history.
    pub fn request_full_frame(&mut self) {
        self.force_full = true;
    }

    /// Diff `current` against the remembered frame and keep it as the
    /// new reference.
    pub fn update(&mut self, current: Frame) -> FrameDiff {
        let geometry_changed = self.previous.as_ref().is_some_and(|p| {
            p.width() != current.width()
                || p.height() != current.height()
                || p.format() != current.format()
        });
        if geometry_changed {
            debug!(
                width = current.width(),
                height = current.height(),
                "capture geometry changed; sending full frame"
            );
        }

        let mut full_frame = self.force_full || geometry_changed || self.previous.is_none();
        let regions = if full_frame {
            vec![current.bounds()]
        } else {
            match self.engine.diff(Some(&current), self.previous.as_ref(), false) {
                Ok(regions) => regions,
                Err(e) => {
                    warn!("frame comparison failed: {e}; sending full frame");
                    full_frame = true;
                    vec![current.bounds()]
                }
            }
        };

        let diff = FrameDiff {
            width: current.width(),
            height: current.height(),
            regions,
            full_frame,
        };
        self.force_full = false;
        self.previous = Some(current);
        diff
    }
}

// ── Tests ────────────────────────────────────────────────────────
