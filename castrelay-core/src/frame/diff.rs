//! Change-region detection between two captured frames.
//!
//! The frame is cut into horizontal bands (or, with
//! [`DiffStrategy::Grid`], into a grid of cells). Every band is scanned
//! on its own worker thread and reports the bounding box of the pixels
//! that differ. Boxes are padded by [`REGION_PADDING`] pixels so that
//! the encoder also picks up the anti-aliased edges of moving windows.
//!
//! ```text
//!  ┌──────────────────────────┐
//!  │ band 0     ┌──┐          │ ──► one region (padded bbox)
//!  ├────────────┼──┼──────────┤
//!  │ band 1     └──┘          │ ──► one region
//!  ├──────────────────────────┤
//!  │ band 2                   │ ──► nothing
//!  └──────────────────────────┘
//! ```

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{trace, warn};

use crate::error::RelayError;
use crate::frame::types::{BYTES_PER_PIXEL, ChangeRegion, Frame};

/// Margin added around every raw bounding box.
pub const REGION_PADDING: u32 = 5;

// ── DiffStrategy ─────────────────────────────────────────────────

/// How the frame is decomposed before scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffStrategy {
    /// Full-width horizontal bands, one region per band at most.
    #[default]
    RowBands,
    /// Column × row grid; touching cell regions are merged afterwards.
    Grid,
}

// ── BoundingBox ──────────────────────────────────────────────────

/// Inclusive pixel bounds of the changed pixels found in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoundingBox {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl BoundingBox {
    fn include_span(bbox: &mut Option<Self>, first: u32, last: u32, row: u32) {
        match bbox {
            Some(b) => {
                b.left = b.left.min(first);
                b.right = b.right.max(last);
                b.top = b.top.min(row);
                b.bottom = b.bottom.max(row);
            }
            None => {
                *bbox = Some(Self {
                    left: first,
                    top: row,
                    right: last,
                    bottom: row,
                })
            }
        }
    }

    /// Pad and clamp to the frame.
    ///
    /// `right`/`bottom` are inclusive pixel coordinates; after padding
    /// they are clamped to `width`/`height` and used as exclusive edges.
    fn padded(self, width: u32, height: u32) -> ChangeRegion {
        let left = self.left.saturating_sub(REGION_PADDING);
        let top = self.top.saturating_sub(REGION_PADDING);
        let right = self.right.saturating_add(REGION_PADDING).min(width);
        let bottom = self.bottom.saturating_add(REGION_PADDING).min(height);
        ChangeRegion::new(left, top, right - left, bottom - top)
    }
}

// ── DiffEngine ───────────────────────────────────────────────────

/// Computes the changed regions between two frames.
///
/// The engine holds no frame state; see
/// [`FrameTracker`](crate::frame::FrameTracker) for the stateful wrapper
/// used by capture loops.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    strategy: DiffStrategy,
    max_workers: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            strategy: DiffStrategy::default(),
            max_workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl DiffEngine {
    /// Row-band engine using every available core.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the decomposition strategy.
    pub fn with_strategy(mut self, strategy: DiffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cap the number of worker threads (at least one).
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Compare `current` against `previous`.
    ///
    /// - Either frame absent: no regions.
    /// - Size or format mismatch: error, the caller has a pipeline bug.
    /// - `full_frame_requested`: one region covering the frame, no scan.
    /// - Otherwise the padded bounding box of every band that changed,
    ///   top to bottom.
    pub fn diff(
        &self,
        current: Option<&Frame>,
        previous: Option<&Frame>,
        full_frame_requested: bool,
    ) -> Result<Vec<ChangeRegion>, RelayError> {
        let (Some(current), Some(previous)) = (current, previous) else {
            return Ok(Vec::new());
        };

        ensure_compatible(current, previous)?;

        if full_frame_requested {
            return Ok(vec![current.bounds()]);
        }

        let (width, height) = (current.width(), current.height());
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let cells = match self.strategy {
            DiffStrategy::RowBands => row_bands(width, height),
            DiffStrategy::Grid => grid_cells(width, height),
        };

        let regions: Vec<ChangeRegion> = self
            .scan_cells(current, previous, &cells)
            .into_iter()
            .map(|b| b.padded(width, height))
            .collect();

        trace!(
            cells = cells.len(),
            regions = regions.len(),
            "frame comparison finished"
        );

        Ok(match self.strategy {
            DiffStrategy::RowBands => regions,
            DiffStrategy::Grid => merge_adjacent(regions),
        })
    }

    fn scan_cells(
        &self,
        current: &Frame,
        previous: &Frame,
        cells: &[ChangeRegion],
    ) -> Vec<BoundingBox> {
        self.fork_join(cells, |cell| scan_cell(current, previous, cell))
    }

    /// Fork-join `scan` over the cells. Results come back in cell order.
    ///
    /// A cell whose scan panics is logged and contributes nothing.
    fn fork_join<F>(&self, cells: &[ChangeRegion], scan: F) -> Vec<BoundingBox>
    where
        F: Fn(&ChangeRegion) -> Option<BoundingBox> + Sync,
    {
        let guarded = |index: usize, cell: &ChangeRegion| {
            match panic::catch_unwind(AssertUnwindSafe(|| scan(cell))) {
                Ok(found) => found.map(|b| (index, b)),
                Err(_) => {
                    warn!(cell = index, top = cell.top, "cell scan panicked; region dropped");
                    None
                }
            }
        };

        let workers = self.max_workers.min(cells.len()).max(1);
        if workers == 1 {
            return cells
                .iter()
                .enumerate()
                .filter_map(|(index, cell)| guarded(index, cell))
                .map(|(_, b)| b)
                .collect();
        }

        let guarded = &guarded;
        let mut found: Vec<(usize, BoundingBox)> = Vec::with_capacity(cells.len());
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    scope.spawn(move || {
                        cells
                            .iter()
                            .enumerate()
                            .skip(worker)
                            .step_by(workers)
                            .filter_map(|(index, cell)| guarded(index, cell))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(boxes) => found.extend(boxes),
                    Err(_) => warn!(worker, "diff worker panicked; its cells are dropped"),
                }
            }
        });

        found.sort_unstable_by_key(|(index, _)| *index);
        found.into_iter().map(|(_, b)| b).collect()
    }
}

/// Both frames must share size and pixel layout.
fn ensure_compatible(current: &Frame, previous: &Frame) -> Result<(), RelayError> {
    if current.width() != previous.width() || current.height() != previous.height() {
        return Err(RelayError::DimensionMismatch {
            current_width: current.width(),
            current_height: current.height(),
            previous_width: previous.width(),
            previous_height: previous.height(),
        });
    }
    if current.format() != previous.format() {
        return Err(RelayError::FormatMismatch {
            current: current.format(),
            previous: previous.format(),
        });
    }
    Ok(())
}

// ── Decomposition ────────────────────────────────────────────────

/// Band height: `h/9`, `h/10` or `h/4` when they divide evenly, else `h`.
pub fn band_height(height: u32) -> u32 {
    if height == 0 {
        return 0;
    }
    [9, 10, 4]
        .into_iter()
        .find(|d| height % d == 0)
        .map_or(height, |d| height / d)
}

/// Grid column width: `w/8` or `w/2` when they divide evenly, else `w`.
pub fn column_width(width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    [8, 2]
        .into_iter()
        .find(|d| width % d == 0)
        .map_or(width, |d| width / d)
}

fn row_bands(width: u32, height: u32) -> Vec<ChangeRegion> {
    let band = band_height(height);
    (0..height)
        .step_by(band as usize)
        .map(|top| ChangeRegion::new(0, top, width, band.min(height - top)))
        .collect()
}

fn grid_cells(width: u32, height: u32) -> Vec<ChangeRegion> {
    let band = band_height(height);
    let column = column_width(width);
    (0..width)
        .step_by(column as usize)
        .flat_map(|left| {
            (0..height).step_by(band as usize).map(move |top| {
                ChangeRegion::new(
                    left,
                    top,
                    column.min(width - left),
                    band.min(height - top),
                )
            })
        })
        .collect()
}

// ── Scanning ─────────────────────────────────────────────────────

/// Bounding box of the changed pixels inside `cell`.
///
/// Each pixel is visited once: the forward search stops at the first
/// differing pixel of a row and the backward search stops at the last.
/// An out-of-range row ends the scan with whatever was found so far.
fn scan_cell(current: &Frame, previous: &Frame, cell: &ChangeRegion) -> Option<BoundingBox> {
    let start = cell.left as usize * BYTES_PER_PIXEL;
    let end = cell.right() as usize * BYTES_PER_PIXEL;
    let mut bbox = None;

    for row in cell.top..cell.bottom() {
        let spans = current
            .row(row)
            .and_then(|r| r.get(start..end))
            .zip(previous.row(row).and_then(|r| r.get(start..end)));
        let Some((cur, prev)) = spans else {
            warn!(row, "row outside frame buffer; keeping partial result");
            break;
        };

        let pixels = || {
            cur.chunks_exact(BYTES_PER_PIXEL)
                .zip(prev.chunks_exact(BYTES_PER_PIXEL))
        };
        let Some(first) = pixels().position(|(a, b)| a != b) else {
            continue;
        };
        let last = pixels().rposition(|(a, b)| a != b).unwrap_or(first);

        BoundingBox::include_span(
            &mut bbox,
            cell.left + first as u32,
            cell.left + last as u32,
            row,
        );
    }

    bbox
}

// ── Merging ──────────────────────────────────────────────────────

/// Union every region into the first accepted region whose bounds,
/// grown by one pixel, intersect it. Regions touching nothing are kept
/// as they are.
pub fn merge_adjacent(regions: Vec<ChangeRegion>) -> Vec<ChangeRegion> {
    let mut merged: Vec<ChangeRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        let neighbor = merged
            .iter()
            .position(|m| !m.is_empty() && m.inflate(1).intersects(&region));
        match neighbor {
            Some(index) => merged[index] = merged[index].union(&region),
            None => merged.push(region),
        }
    }
    merged
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::types::PixelFormat;

    fn frame(w: u32, h: u32) -> Frame {
        Frame::filled(w, h, PixelFormat::Bgra8, 0)
    }

    fn touch(frame: &mut Frame, x: u32, y: u32) {
        frame.pixel_mut(x, y).unwrap()[2] ^= 0xFF;
    }

    #[test]
    fn band_height_prefers_nine_then_ten_then_four() {
        assert_eq!(band_height(1080), 120);
        assert_eq!(band_height(100), 10);
        assert_eq!(band_height(20), 2);
        assert_eq!(band_height(8), 2);
        assert_eq!(band_height(7), 7);
    }

    #[test]
    fn column_width_prefers_eight_then_two() {
        assert_eq!(column_width(1920), 240);
        assert_eq!(column_width(6), 3);
        assert_eq!(column_width(7), 7);
    }

    #[test]
    fn bands_cover_frame_exactly() {
        let bands = row_bands(64, 90);
        assert_eq!(bands.len(), 9);
        assert_eq!(bands.iter().map(|b| b.height).sum::<u32>(), 90);
        assert!(bands.iter().all(|b| b.width == 64));
    }

    #[test]
    fn grid_cells_cover_frame_exactly() {
        let cells = grid_cells(64, 90);
        assert_eq!(cells.len(), 8 * 9);
        assert_eq!(cells.iter().map(|c| c.area()).sum::<u64>(), 64 * 90);
    }

    #[test]
    fn identical_frames_have_no_regions() {
        let a = frame(64, 36);
        let regions = DiffEngine::new().diff(Some(&a), Some(&a), false).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn absent_frame_is_a_no_op() {
        let a = frame(8, 8);
        let engine = DiffEngine::new();
        assert!(engine.diff(None, Some(&a), true).unwrap().is_empty());
        assert!(engine.diff(Some(&a), None, false).unwrap().is_empty());
    }

    #[test]
    fn full_frame_skips_comparison() {
        let a = frame(40, 30);
        let regions = DiffEngine::new().diff(Some(&a), Some(&a), true).unwrap();
        assert_eq!(regions, vec![ChangeRegion::new(0, 0, 40, 30)]);
    }

    #[test]
    fn single_pixel_is_padded_by_five() {
        let prev = frame(100, 90);
        let mut cur = prev.clone();
        touch(&mut cur, 50, 45);
        let regions = DiffEngine::new().diff(Some(&cur), Some(&prev), false).unwrap();
        assert_eq!(regions, vec![ChangeRegion::new(45, 40, 10, 10)]);
        assert!(regions[0].contains(50, 45));
    }

    #[test]
    fn padding_clamps_at_frame_edges() {
        let prev = frame(16, 7);
        let mut cur = prev.clone();
        touch(&mut cur, 15, 6);
        touch(&mut cur, 0, 0);
        let regions = DiffEngine::new().diff(Some(&cur), Some(&prev), false).unwrap();
        // 7 rows: one band; both pixels land in the same bounding box.
        assert_eq!(regions, vec![ChangeRegion::new(0, 0, 16, 7)]);
    }

    #[test]
    fn alpha_only_change_is_detected() {
        let prev = frame(10, 10);
        let mut cur = prev.clone();
        cur.pixel_mut(3, 3).unwrap()[3] = 1;
        let regions = DiffEngine::new().diff(Some(&cur), Some(&prev), false).unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn changes_in_two_bands_yield_two_ordered_regions() {
        let prev = frame(64, 90);
        let mut cur = prev.clone();
        touch(&mut cur, 60, 85);
        touch(&mut cur, 2, 3);
        let regions = DiffEngine::new()
            .with_max_workers(4)
            .diff(Some(&cur), Some(&prev), false)
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].contains(2, 3));
        assert!(regions[1].contains(60, 85));
        assert!(regions[0].top < regions[1].top);
    }

    #[test]
    fn single_worker_matches_parallel_result() {
        let prev = frame(80, 90);
        let mut cur = prev.clone();
        for (x, y) in [(1, 1), (40, 33), (79, 89), (10, 50)] {
            touch(&mut cur, x, y);
        }
        let serial = DiffEngine::new()
            .with_max_workers(1)
            .diff(Some(&cur), Some(&prev), false)
            .unwrap();
        let parallel = DiffEngine::new()
            .with_max_workers(8)
            .diff(Some(&cur), Some(&prev), false)
            .unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let a = frame(10, 10);
        let b = frame(10, 11);
        let err = DiffEngine::new().diff(Some(&a), Some(&b), true).unwrap_err();
        assert!(matches!(err, RelayError::DimensionMismatch { .. }));
    }

    #[test]
    fn format_mismatch_is_an_error() {
        let a = frame(10, 10);
        let b = Frame::filled(10, 10, PixelFormat::Rgba8, 0);
        let err = DiffEngine::new().diff(Some(&a), Some(&b), false).unwrap_err();
        assert!(matches!(err, RelayError::FormatMismatch { .. }));
    }

    #[test]
    fn grid_strategy_merges_touching_cells() {
        let prev = frame(64, 90);
        let mut cur = prev.clone();
        // Horizontal line crossing several grid columns in one row band.
        for x in 4..60 {
            touch(&mut cur, x, 12);
        }
        let regions = DiffEngine::new()
            .with_strategy(DiffStrategy::Grid)
            .diff(Some(&cur), Some(&prev), false)
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert!(regions[0].contains(4, 12));
        assert!(regions[0].contains(59, 12));
    }

    #[test]
    fn merge_keeps_distant_regions_apart() {
        let merged = merge_adjacent(vec![
            ChangeRegion::new(0, 0, 5, 5),
            ChangeRegion::new(50, 50, 5, 5),
            ChangeRegion::new(5, 0, 5, 5),
        ]);
        assert_eq!(
            merged,
            vec![ChangeRegion::new(0, 0, 10, 5), ChangeRegion::new(50, 50, 5, 5)]
        );
    }

    #[test]
    fn faulting_band_is_dropped_and_others_survive() {
        // 40 rows -> ten bands of four.
        let prev = frame(40, 40);
        let mut cur = prev.clone();
        touch(&mut cur, 3, 1);
        touch(&mut cur, 20, 9);
        touch(&mut cur, 30, 22);
        let cells = row_bands(40, 40);

        for workers in [1, 4] {
            let engine = DiffEngine::new().with_max_workers(workers);
            let boxes = engine.fork_join(&cells, |cell| {
                if cell.top == 8 {
                    panic!("scan fault in band at row 8");
                }
                scan_cell(&cur, &prev, cell)
            });
            let rows: Vec<u32> = boxes.iter().map(|b| b.top).collect();
            assert_eq!(rows, vec![1, 22], "workers = {workers}");
        }
    }
}
