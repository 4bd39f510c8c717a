/// Pan and zoom state for looking into the fractal space
use super::{FractalError, FractalSpace};

pub const VIEWPORT_WIDTH: f64 = 800.0;
pub const VIEWPORT_HEIGHT: f64 = 600.0;

pub const MIN_ZOOM: f64 = 0.000_000_1;
pub const MAX_ZOOM: f64 = 60.0;

const ZOOM_IN_FACTOR: f64 = 1.1;
const ZOOM_OUT_FACTOR: f64 = 0.9;

// Fractal sizes between these two map log-linearly onto the zoom range below,
// so the whole measure starts roughly framed.
const SMALL_FRACTAL: f64 = 256.0;
const LARGE_FRACTAL: f64 = 65535.0;
const SMALL_FRACTAL_ZOOM: f64 = 2.0;
const LARGE_FRACTAL_ZOOM: f64 = 0.008;

/// Pixel offset of the world origin plus the world-to-pixel scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(offset_x: f64, offset_y: f64, zoom: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            zoom,
        }
    }

    /// Centre the whole measure in the default 800x600 view.
    pub fn initial(space: &FractalSpace) -> Self {
        let size = space.size() as f64;
        let zoom = initial_zoom(space.size());
        Self {
            offset_x: VIEWPORT_WIDTH / 2.0 - size * zoom / 2.0,
            offset_y: VIEWPORT_HEIGHT / 2.0 - size * zoom / 2.0,
            zoom,
        }
    }

    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            (screen_x - self.offset_x) / self.zoom,
            (screen_y - self.offset_y) / self.zoom,
        )
    }

    pub fn world_to_screen(&self, world_x: f64, world_y: f64) -> (f64, f64) {
        (
            self.offset_x + world_x * self.zoom,
            self.offset_y + world_y * self.zoom,
        )
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Scale the zoom by `factor`, keeping the world point under the screen
    /// position fixed.
    pub fn zoom_at(&mut self, screen_x: f64, screen_y: f64, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = new_zoom / self.zoom;
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.zoom = new_zoom;
    }

    /// One mouse wheel notch.
    pub fn zoom_step(&mut self, screen_x: f64, screen_y: f64, zoom_in: bool) {
        let factor = if zoom_in {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        self.zoom_at(screen_x, screen_y, factor);
    }
}

/// Starting zoom for a fractal of the given size. Sizes outside the
/// calibrated range extrapolate rather than clamp.
pub fn initial_zoom(fractal_size: u64) -> f64 {
    let t = ((fractal_size as f64).ln() - SMALL_FRACTAL.ln())
        / (LARGE_FRACTAL.ln() - SMALL_FRACTAL.ln());
    let log_zoom =
        SMALL_FRACTAL_ZOOM.ln() + t * (LARGE_FRACTAL_ZOOM.ln() - SMALL_FRACTAL_ZOOM.ln());
    log_zoom.exp()
}

/// Fractal space and framing viewport for a fresh measure.
pub fn initial_viewport(notes_per_measure: u32) -> Result<(FractalSpace, Viewport), FractalError> {
    let space = FractalSpace::new(notes_per_measure)?;
    Ok((space, Viewport::initial(&space)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_initial_zoom_endpoints() {
        assert!(close(initial_zoom(256), 2.0));
        assert!(close(initial_zoom(65535), 0.008));
        // 65536 sits just past the calibrated range
        let zoom = initial_zoom(65536);
        assert!(zoom < 0.008 && zoom > 0.0079);
    }

    #[test]
    fn test_initial_zoom_extrapolates() {
        assert!(initial_zoom(16) > 2.0);
        assert!(initial_zoom(4u64.pow(12)) < 0.008);
    }

    #[test]
    fn test_initial_viewport_centres_measure() {
        let (space, viewport) = initial_viewport(8).unwrap();
        assert_eq!(space.size(), 256);
        assert!(close(viewport.zoom, 2.0));
        assert!(close(viewport.offset_x, 400.0 - 256.0));
        assert!(close(viewport.offset_y, 300.0 - 256.0));

        let (cx, cy) = viewport.world_to_screen(128.0, 128.0);
        assert!(close(cx, 400.0));
        assert!(close(cy, 300.0));
    }

    #[test]
    fn test_initial_viewport_rejects_empty_measure() {
        assert_eq!(initial_viewport(0), Err(FractalError::EmptyMeasure));
    }

    #[test]
    fn test_zoom_keeps_point_under_cursor() {
        let mut viewport = Viewport::new(10.0, -20.0, 1.5);
        let before = viewport.screen_to_world(300.0, 200.0);
        viewport.zoom_step(300.0, 200.0, true);
        let after = viewport.screen_to_world(300.0, 200.0);
        assert!(close(viewport.zoom, 1.65));
        assert!(close(before.0, after.0));
        assert!(close(before.1, after.1));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut viewport = Viewport::new(0.0, 0.0, 59.0);
        viewport.zoom_step(0.0, 0.0, true);
        assert_eq!(viewport.zoom, MAX_ZOOM);

        let mut viewport = Viewport::new(0.0, 0.0, MIN_ZOOM);
        viewport.zoom_step(0.0, 0.0, false);
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_pan() {
        let mut viewport = Viewport::new(1.0, 2.0, 1.0);
        viewport.pan_by(-3.0, 4.0);
        assert_eq!(viewport, Viewport::new(-2.0, 6.0, 1.0));
    }
}
