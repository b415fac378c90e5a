//! # Frame differencing
//!
//! Turns two consecutive screen captures into the minimal set of
//! rectangles the capture pipeline has to crop, encode and send.
//!
//! | Module    | Purpose                                              |
//! |-----------|------------------------------------------------------|
//! | `types`   | `Frame`, `PixelFormat`, `ChangeRegion`               |
//! | `diff`    | Parallel band / grid comparison, padding, merging    |
//! | `tracker` | Previous-frame bookkeeping and full-frame decisions  |

pub mod diff;
pub mod tracker;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use diff::{DiffEngine, DiffStrategy, REGION_PADDING, merge_adjacent};
pub use tracker::{FrameDiff, FrameTracker};
pub use types::{BYTES_PER_PIXEL, ChangeRegion, Frame, PixelFormat};
