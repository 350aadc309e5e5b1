//! Host rectangle -> guest size conversion.
//!
//! The host is measured in device pixels; the guest lays itself out in logical units of its
//! own rendering context. Converting between the two divides by the guest's device-scale
//! transform. Order matters:
//! * The chrome inset is a device-pixel quantity and is subtracted *before* dividing.
//! * The size correction is a guest-logical quantity and is applied *after* dividing.
//!
//! Rounding is half-to-even so that a 0.5 remainder does not systematically grow the guest.

use tracing::trace;

use crate::window_system::Rect;

/// Ratio of physical device pixels per logical unit on each axis (1.0 at 96 DPI).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaleTransform {
    pub m11: f64,
    pub m22: f64,
}

impl ScaleTransform {
    pub const IDENTITY: ScaleTransform = ScaleTransform { m11: 1.0, m22: 1.0 };

    pub fn uniform(factor: f64) -> Self {
        Self {
            m11: factor,
            m22: factor,
        }
    }

    pub fn from_dpi(dpi: u32) -> Self {
        Self::uniform(dpi as f64 / 96.0)
    }

    fn axis(v: f64) -> f64 {
        if v.is_finite() && v > 0.0 { v } else { 1.0 }
    }

    pub fn x(&self) -> f64 {
        Self::axis(self.m11)
    }

    pub fn y(&self) -> f64 {
        Self::axis(self.m22)
    }
}

impl Default for ScaleTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

/// Coordinate space a [`ScaledRect`] is expressed in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordSpace {
    /// Physical pixels of the host's monitor.
    Device,
    /// Logical units of the guest's rendering context.
    Logical,
}

/// Rectangle tagged with its coordinate space and the scale that converts it.
///
/// Two `ScaledRect`s in different spaces are never equal; convert explicitly first.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaledRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub space: CoordSpace,
    pub scale: ScaleTransform,
}

fn divide(v: i32, by: f64) -> i32 {
    (v as f64 / by).round_ties_even() as i32
}

fn multiply(v: i32, by: f64) -> i32 {
    (v as f64 * by).round_ties_even() as i32
}

impl ScaledRect {
    pub fn device(rect: Rect, scale: ScaleTransform) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            width: rect.width(),
            height: rect.height(),
            space: CoordSpace::Device,
            scale,
        }
    }

    pub fn to_logical(&self) -> ScaledRect {
        match self.space {
            CoordSpace::Logical => *self,
            CoordSpace::Device => ScaledRect {
                left: divide(self.left, self.scale.x()),
                top: divide(self.top, self.scale.y()),
                width: divide(self.width, self.scale.x()),
                height: divide(self.height, self.scale.y()),
                space: CoordSpace::Logical,
                scale: self.scale,
            },
        }
    }

    pub fn to_device(&self) -> ScaledRect {
        match self.space {
            CoordSpace::Device => *self,
            CoordSpace::Logical => ScaledRect {
                left: multiply(self.left, self.scale.x()),
                top: multiply(self.top, self.scale.y()),
                width: multiply(self.width, self.scale.x()),
                height: multiply(self.height, self.scale.y()),
                space: CoordSpace::Device,
                scale: self.scale,
            },
        }
    }
}

/// Host non-client thickness (borders + title bar) left uncovered, in device pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChromeInset {
    pub horizontal: i32,
    pub vertical: i32,
}

impl ChromeInset {
    /// Observed on a single theme/DPI configuration; prefer [`ChromeInset::from_frame`].
    pub const DEFAULT: ChromeInset = ChromeInset {
        horizontal: 42,
        vertical: 40,
    };

    /// Derive the inset from the difference between a window's outer and client rectangles.
    pub fn from_frame(window: Rect, client: Rect) -> Self {
        Self {
            horizontal: (window.width() - client.width()).max(0),
            vertical: (window.height() - client.height()).max(0),
        }
    }
}

impl Default for ChromeInset {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Final shrink applied to the guest window (guest logical units) so it does not occlude the
/// host's border.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SizeCorrection {
    pub width: i32,
    pub height: i32,
}

impl SizeCorrection {
    pub const DEFAULT: SizeCorrection = SizeCorrection {
        width: 1,
        height: 16,
    };
}

impl Default for SizeCorrection {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything the positioning step needs, computed off the UI context.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GuestGeometry {
    /// Host area available to the guest, in guest logical units.
    pub logical: ScaledRect,
    /// Size passed to the move/resize call (after the fixed correction).
    pub window_width: i32,
    pub window_height: i32,
    /// Size handed to the guest's own layout model (before the correction).
    pub layout: LogicalSize,
}

/// Host-side inputs of the guest geometry, gathered without touching the guest.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HostMeasurement {
    /// Screen-space host rectangle in device pixels.
    pub host: Rect,
    pub inset: ChromeInset,
    pub correction: SizeCorrection,
}

impl HostMeasurement {
    /// Finish the computation once the guest's own scale is known.
    pub fn geometry(&self, scale: ScaleTransform) -> GuestGeometry {
        guest_geometry(self.host, scale, self.inset, self.correction)
    }
}

/// Compute the guest's size for a host rectangle.
///
/// Negative insets and corrections count as zero. Degenerate results (host smaller than its
/// chrome) clamp to 1 so the move/resize call never receives a zero or negative extent.
pub fn guest_geometry(
    host: Rect,
    scale: ScaleTransform,
    inset: ChromeInset,
    correction: SizeCorrection,
) -> GuestGeometry {
    let usable = Rect::from_size(
        host.left,
        host.top,
        host.width().saturating_sub(inset.horizontal.max(0)),
        host.height().saturating_sub(inset.vertical.max(0)),
    );
    let mut logical = ScaledRect::device(usable, scale).to_logical();
    logical.width = logical.width.max(1);
    logical.height = logical.height.max(1);

    let window_width = logical.width.saturating_sub(correction.width.max(0)).max(1);
    let window_height = logical.height.saturating_sub(correction.height.max(0)).max(1);
    trace!(
        host_w = host.width(),
        host_h = host.height(),
        sx = scale.x(),
        sy = scale.y(),
        logical_w = logical.width,
        logical_h = logical.height,
        window_width,
        window_height,
        "guest geometry computed"
    );
    GuestGeometry {
        logical,
        window_width,
        window_height,
        layout: LogicalSize {
            width: logical.width as f64,
            height: logical.height as f64,
        },
    }
}
