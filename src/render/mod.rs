/// Drawing for the measure grid and the selected note boxes, through a
/// `Surface` in world units under a translate + uniform scale transform
use crate::fractal::viewport::Viewport;
use crate::fractal::{FractalSpace, NoteDigit};

pub mod grid;
pub mod measure;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgba = Rgba::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn gray(value: f64) -> Self {
        let v = value as f32;
        Self::rgb(v, v, v)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Channels as 0-255 bytes, alpha unmultiplied.
    pub fn to_rgba8(self) -> [u8; 4] {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [byte(self.r), byte(self.g), byte(self.b), byte(self.a)]
    }
}

/// Minimal 2D canvas the renderers need.
pub trait Surface {
    /// Pixel dimensions of the drawable area.
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    /// Translate by a pixel offset, then scale uniformly.
    fn set_transform(&mut self, offset_x: f64, offset_y: f64, scale: f64);
    fn set_stroke_color(&mut self, color: Rgba);
    fn set_fill_color(&mut self, color: Rgba);
    fn set_line_width(&mut self, width: f64);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke(&mut self);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        offset_x: 0.0,
        offset_y: 0.0,
        scale: 1.0,
    };

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A resolved draw operation in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: Rgba,
        width: f64,
    },
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    StrokeRect {
        rect: Rect,
        color: Rgba,
        width: f64,
    },
}

/// Recording surface.
#[derive(Debug, Clone)]
pub struct DrawList {
    width: f64,
    height: f64,
    transform: Transform,
    stroke_color: Rgba,
    fill_color: Rgba,
    line_width: f64,
    path: Vec<Vec<(f64, f64)>>,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            transform: Transform::IDENTITY,
            stroke_color: Rgba::BLACK,
            fill_color: Rgba::BLACK,
            line_width: 1.0,
            path: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    fn scaled_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Rect {
        let (x, y) = self.transform.apply(x, y);
        Rect {
            x,
            y,
            width: width * self.transform.scale,
            height: height * self.transform.scale,
        }
    }
}

impl Surface for DrawList {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.path.clear();
        self.transform = Transform::IDENTITY;
    }

    fn set_transform(&mut self, offset_x: f64, offset_y: f64, scale: f64) {
        self.transform = Transform {
            offset_x,
            offset_y,
            scale,
        };
    }

    fn set_stroke_color(&mut self, color: Rgba) {
        self.stroke_color = color;
    }

    fn set_fill_color(&mut self, color: Rgba) {
        self.fill_color = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.push(vec![self.transform.apply(x, y)]);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let point = self.transform.apply(x, y);
        match self.path.last_mut() {
            Some(subpath) => subpath.push(point),
            None => self.path.push(vec![point]),
        }
    }

    fn stroke(&mut self) {
        let width = self.line_width * self.transform.scale;
        for subpath in &self.path {
            for pair in subpath.windows(2) {
                self.commands.push(DrawCommand::Line {
                    from: pair[0],
                    to: pair[1],
                    color: self.stroke_color,
                    width,
                });
            }
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let rect = self.scaled_rect(x, y, width, height);
        self.commands.push(DrawCommand::FillRect {
            rect,
            color: self.fill_color,
        });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let rect = self.scaled_rect(x, y, width, height);
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color: self.stroke_color,
            width: self.line_width * self.transform.scale,
        });
    }
}

/// Draw one frame: clear, apply pan/zoom, grid, then the (partial) measure.
pub fn render_frame<S: Surface + ?Sized>(
    surface: Option<&mut S>,
    viewport: &Viewport,
    space: &FractalSpace,
    notes: &[NoteDigit],
) {
    let Some(surface) = surface else {
        return;
    };
    surface.clear();
    surface.set_transform(viewport.offset_x, viewport.offset_y, viewport.zoom);
    grid::draw_grid(Some(&mut *surface), viewport, space);
    measure::draw_measure(Some(surface), viewport.zoom, space.size(), notes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_resolves_subpaths() {
        let mut list = DrawList::new(100.0, 100.0);
        list.set_transform(10.0, 20.0, 2.0);
        list.set_line_width(0.5);
        list.begin_path();
        list.move_to(0.0, 0.0);
        list.line_to(5.0, 0.0);
        list.line_to(5.0, 5.0);
        list.move_to(1.0, 1.0);
        list.line_to(2.0, 1.0);
        list.stroke();

        let lines: Vec<_> = list
            .commands()
            .iter()
            .map(|c| match c {
                DrawCommand::Line { from, to, width, .. } => (*from, *to, *width),
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                ((10.0, 20.0), (20.0, 20.0), 1.0),
                ((20.0, 20.0), (20.0, 30.0), 1.0),
                ((12.0, 22.0), (14.0, 22.0), 1.0),
            ]
        );
    }

    #[test]
    fn test_rects_are_scaled() {
        let mut list = DrawList::new(100.0, 100.0);
        list.set_transform(1.0, 1.0, 3.0);
        list.set_fill_color(Rgba::WHITE);
        list.fill_rect(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            list.commands(),
            &[DrawCommand::FillRect {
                rect: Rect {
                    x: 4.0,
                    y: 7.0,
                    width: 9.0,
                    height: 12.0
                },
                color: Rgba::WHITE,
            }]
        );
    }

    #[test]
    fn test_clear_drops_commands() {
        let mut list = DrawList::new(10.0, 10.0);
        list.stroke_rect(0.0, 0.0, 1.0, 1.0);
        list.clear();
        assert!(list.commands().is_empty());
        assert_eq!(list.transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_render_frame_without_surface_is_noop() {
        let space = FractalSpace::default();
        let viewport = Viewport::initial(&space);
        render_frame::<DrawList>(None, &viewport, &space, &[NoteDigit::Bass]);
    }

    #[test]
    fn test_render_frame_applies_viewport() {
        let space = FractalSpace::default();
        let viewport = Viewport::initial(&space);
        let mut list = DrawList::new(800.0, 600.0);
        list.stroke_rect(0.0, 0.0, 1.0, 1.0);

        render_frame(Some(&mut list), &viewport, &space, &[]);

        assert_eq!(list.transform().scale, viewport.zoom);
        // the stale rect is gone, the border ends the frame
        assert!(!list
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::StrokeRect { .. })));
        let last = list.commands().last().unwrap();
        assert!(matches!(last, DrawCommand::Line { color, .. } if *color == Rgba::BLACK));
    }

    #[test]
    fn test_rgba_bytes() {
        assert_eq!(Rgba::from_rgb8(204, 51, 51).to_rgba8(), [204, 51, 51, 255]);
        assert_eq!(Rgba::gray(1.0).with_alpha(0.1).to_rgba8(), [255, 255, 255, 26]);
    }
}
