//! Shared types for the frame differencing pipeline.
//!
//! A [`Frame`] is the raw, uncompressed capture handed over by the
//! capture pipeline. A [`ChangeRegion`] is the rectangle the differ
//! reports back; it never outlives a single comparison.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Bytes per pixel for every supported layout.
pub const BYTES_PER_PIXEL: usize = 4;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for captured frames. All layouts carry four channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Blue, Green, Red, Alpha (DXGI / GDI default).
    Bgra8,
    /// Red, Green, Blue, Alpha.
    Rgba8,
    /// Alpha, Red, Green, Blue.
    Argb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        BYTES_PER_PIXEL
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A captured screen frame.
///
/// Rows are tightly packed: the byte offset of pixel `(column, row)` is
/// `row * width * 4 + column * 4`. The constructor rejects buffers
/// whose length does not match, so every accessor can slice without
/// re-checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, RelayError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(RelayError::InvalidFrameBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A frame with every byte set to `fill`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, fill: u8) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![fill; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// The whole pixel buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the bytes of row `y`, or `None` if out of range.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let stride = self.stride();
        let start = y as usize * stride;
        self.data.get(start..start + stride)
    }

    /// Returns the pixel bytes at `(x, y)`, or `None` if out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        self.data.get(offset..offset + bpp)
    }

    /// Mutable access to the pixel at `(x, y)`.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        if x >= self.width {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        self.data.get_mut(offset..offset + bpp)
    }

    /// Region covering the whole frame.
    pub fn bounds(&self) -> ChangeRegion {
        ChangeRegion::new(0, 0, self.width, self.height)
    }
}

// ── ChangeRegion ─────────────────────────────────────────────────

/// An axis-aligned rectangle of changed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRegion {
    /// Left edge in pixels.
    pub left: u32,
    /// Top edge in pixels.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ChangeRegion {
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Exclusive right edge, saturating at `u32::MAX`.
    pub const fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `u32::MAX`.
    pub const fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `(x, y)` lies inside the rectangle.
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    /// Whether the two rectangles share any pixel.
    pub fn intersects(&self, other: &ChangeRegion) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &ChangeRegion) -> ChangeRegion {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        ChangeRegion::new(left, top, right - left, bottom - top)
    }

    /// Grow by `by` pixels on the left/top (saturating at zero) and on
    /// the right/bottom (unbounded).
    pub fn inflate(&self, by: u32) -> ChangeRegion {
        let left = self.left.saturating_sub(by);
        let top = self.top.saturating_sub(by);
        let right = self.right().saturating_add(by);
        let bottom = self.bottom().saturating_add(by);
        ChangeRegion::new(left, top, right - left, bottom - top)
    }
}

// ── Tests ────────────────────────────────────────────────────────
