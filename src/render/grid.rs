/// Adaptive grid lines - one level per power of 4, fading in as they grow
use super::{Rgba, Surface};
use crate::fractal::viewport::Viewport;
use crate::fractal::FractalSpace;

pub const DARKEST_GRIDLINE: f64 = 0.1;
pub const LIGHTEST_GRIDLINE: f64 = 0.9;
pub const BACKGROUND: f64 = 1.0;

/// Levels closer together than this (in pixels) are not drawn.
pub const MIN_VISIBLE_SPACING: f64 = 5.0;
/// Levels reach their full shade at this spacing.
pub const FULL_SHADE_SPACING: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLevel {
    /// 0 is the finest level.
    pub rank: usize,
    pub spacing: u64,
    /// Grayscale value before any fade-in.
    pub shade: f64,
}

impl GridLevel {
    pub fn pixel_spacing(&self, zoom: f64) -> f64 {
        self.spacing as f64 * zoom
    }

    pub fn is_visible(&self, zoom: f64) -> bool {
        self.pixel_spacing(zoom) >= MIN_VISIBLE_SPACING
    }

    /// Shade blended toward the background while the level is still small
    /// on screen. Only the finest visible level can fall in that range.
    pub fn shade_at(&self, zoom: f64) -> f64 {
        let spacing = self.pixel_spacing(zoom);
        if spacing < FULL_SHADE_SPACING {
            let fade = (spacing - MIN_VISIBLE_SPACING) / (FULL_SHADE_SPACING - MIN_VISIBLE_SPACING);
            self.shade * fade + BACKGROUND * (1.0 - fade)
        } else {
            self.shade
        }
    }
}

/// Every power of 4 up to and including the fractal size.
pub fn grid_levels(fractal_size: u64) -> Vec<GridLevel> {
    let mut spacings = Vec::new();
    let mut spacing = 1u64;
    while spacing <= fractal_size {
        spacings.push(spacing);
        match spacing.checked_mul(4) {
            Some(next) => spacing = next,
            None => break,
        }
    }

    let n = spacings.len();
    spacings
        .into_iter()
        .enumerate()
        .map(|(rank, spacing)| {
            let t = if n > 1 {
                rank as f64 / (n - 1) as f64
            } else {
                0.0
            };
            GridLevel {
                rank,
                spacing,
                shade: LIGHTEST_GRIDLINE * (1.0 - t) + DARKEST_GRIDLINE * t,
            }
        })
        .collect()
}

/// World-space bounds of the lines worth drawing for one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleWindow {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl VisibleWindow {
    /// The near edges snap outward onto the level's grid. The pan is
    /// rounded to whole pixels so lines do not shimmer while dragging.
    pub fn new(viewport: &Viewport, extent: (f64, f64), spacing: u64, fractal_size: u64) -> Self {
        let spacing = spacing as f64;
        let size = fractal_size as f64;
        let zoom = viewport.zoom;
        let pan_x = viewport.offset_x.round();
        let pan_y = viewport.offset_y.round();
        Self {
            left: (-pan_x / zoom / spacing).max(0.0).floor() * spacing,
            right: size.min(-pan_x / zoom + extent.0 / zoom),
            top: (-pan_y / zoom / spacing).max(0.0).floor() * spacing,
            bottom: size.min(-pan_y / zoom + extent.1 / zoom),
        }
    }
}

pub fn draw_grid<S: Surface + ?Sized>(
    surface: Option<&mut S>,
    viewport: &Viewport,
    space: &FractalSpace,
) {
    let Some(surface) = surface else {
        return;
    };
    let zoom = viewport.zoom;
    let extent = surface.size();

    // one screen pixel wide whatever the zoom
    surface.set_line_width(1.0 / zoom);

    for level in grid_levels(space.size()) {
        if !level.is_visible(zoom) {
            continue;
        }
        surface.set_stroke_color(Rgba::gray(level.shade_at(zoom)));

        let window = VisibleWindow::new(viewport, extent, level.spacing, space.size());
        if window.left > window.right || window.top > window.bottom {
            // measure is entirely off screen
            continue;
        }
        let (top, bottom) = (window.top.round(), window.bottom.round());
        let (left, right) = (window.left.round(), window.right.round());

        surface.begin_path();
        for x in line_positions(window.left, window.right, level.spacing) {
            surface.move_to(x, top);
            surface.line_to(x, bottom);
        }
        // odd measures have no finest row subdivision
        if !space.is_odd() || level.rank != 0 {
            for y in line_positions(window.top, window.bottom, level.spacing) {
                surface.move_to(left, y);
                surface.line_to(right, y);
            }
        }
        surface.stroke();
    }

    draw_border(surface, zoom, space.size());
}

/// World positions of the lines of one level between `from` and `to`.
/// Lines are counted by index so the count stays bounded where `f64` can
/// no longer tell neighbouring lines apart.
fn line_positions(from: f64, to: f64, spacing: u64) -> impl Iterator<Item = f64> {
    let step = spacing as f64;
    let first = (from / step).ceil().max(0.0) as u64;
    let last = (to / step).floor().max(0.0) as u64;
    (first..=last).map(move |k| k.saturating_mul(spacing) as f64)
}

fn draw_border<S: Surface + ?Sized>(surface: &mut S, zoom: f64, fractal_size: u64) {
    let size = fractal_size as f64;
    surface.set_line_width(2.0 / zoom);
    surface.set_stroke_color(Rgba::BLACK);
    surface.begin_path();
    surface.move_to(0.0, 0.0);
    surface.line_to(size, 0.0);
    surface.line_to(size, size);
    surface.line_to(0.0, size);
    surface.line_to(0.0, 0.0);
    surface.stroke();
}
