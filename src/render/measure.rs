/// Note boxes - nested highlights tracing a sequence down the quadtree
use super::{Rgba, Surface};
use crate::fractal::NoteDigit;

/// Opacity of the box fill; outlines are opaque.
pub const FILL_ALPHA: f32 = 0.1;

pub fn note_color(digit: NoteDigit) -> Rgba {
    match digit {
        NoteDigit::Bass => Rgba::from_rgb8(204, 51, 51),
        NoteDigit::Snare => Rgba::from_rgb8(51, 204, 51),
        NoteDigit::HiHat => Rgba::from_rgb8(51, 51, 204),
        NoteDigit::Rest => Rgba::from_rgb8(255, 123, 0),
    }
}

/// World-space box covering every point whose sequence starts with the
/// digits so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteBox {
    pub digit: NoteDigit,
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

// quarter / 4^exponent, where a negative exponent multiplies instead
fn subdivide(quarter: u64, exponent: i64) -> u64 {
    if exponent < 0 {
        return quarter.saturating_mul(4u64.saturating_pow(exponent.unsigned_abs() as u32));
    }
    match u32::try_from(exponent).ok().and_then(|e| 4u64.checked_pow(e)) {
        Some(divisor) => quarter / divisor,
        None => 0,
    }
}

/// Even steps move along x, odd steps along y; the height lags the width by
/// one step so the first box spans the full height of the measure.
pub fn note_boxes(fractal_size: u64, digits: &[NoteDigit]) -> Vec<NoteBox> {
    let quarter = fractal_size / 4;
    let (mut x0, mut y0) = (0u64, 0u64);

    digits
        .iter()
        .enumerate()
        .map(|(i, &digit)| {
            let i = i as i64;
            let width = subdivide(quarter, i.div_euclid(2));
            let height = subdivide(quarter, (i - 1).div_euclid(2));
            if i % 2 == 0 {
                x0 += digit.index() as u64 * width;
            } else {
                y0 += digit.index() as u64 * height;
            }
            NoteBox {
                digit,
                x: x0,
                y: y0,
                width,
                height,
            }
        })
        .collect()
}

pub fn draw_measure<S: Surface + ?Sized>(
    surface: Option<&mut S>,
    zoom: f64,
    fractal_size: u64,
    digits: &[NoteDigit],
) {
    let Some(surface) = surface else {
        return;
    };

    surface.set_line_width(2.0 / zoom);
    for note in note_boxes(fractal_size, digits) {
        let color = note_color(note.digit);
        let (x, y) = (note.x as f64, note.y as f64);
        let (w, h) = (note.width as f64, note.height as f64);

        surface.set_fill_color(color.with_alpha(FILL_ALPHA));
        surface.fill_rect(x, y, w, h);

        surface.set_stroke_color(color);
        surface.stroke_rect(x, y, w, h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, DrawList, Rect};
    use NoteDigit::*;

    #[test]
    fn test_first_box_spans_full_height() {
        let boxes = note_boxes(16, &[HiHat]);
        assert_eq!(
            boxes,
            vec![NoteBox {
                digit: HiHat,
                x: 8,
                y: 0,
                width: 4,
                height: 16
            }]
        );
    }

    #[test]
    fn test_boxes_nest() {
        let boxes = note_boxes(16, &[Snare, Bass, Snare, Rest]);
        let dims: Vec<_> = boxes.iter().map(|b| (b.x, b.y, b.width, b.height)).collect();
        assert_eq!(dims, vec![(4, 0, 4, 16), (4, 0, 4, 4), (5, 0, 1, 4), (5, 3, 1, 1)]);
    }

    #[test]
    fn test_last_box_is_the_selected_cell() {
        let boxes = note_boxes(256, &[Rest; 8]);
        let last = boxes.last().unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (255, 255, 1, 1));
    }

    #[test]
    fn test_empty_sequence_draws_nothing() {
        let mut list = DrawList::new(800.0, 600.0);
        draw_measure(Some(&mut list), 1.0, 16, &[]);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_fill_then_outline() {
        let mut list = DrawList::new(800.0, 600.0);
        draw_measure(Some(&mut list), 0.5, 16, &[HiHat]);

        let rect = Rect {
            x: 8.0,
            y: 0.0,
            width: 4.0,
            height: 16.0,
        };
        let blue = Rgba::from_rgb8(51, 51, 204);
        assert_eq!(
            list.commands(),
            &[
                DrawCommand::FillRect {
                    rect,
                    color: blue.with_alpha(FILL_ALPHA)
                },
                DrawCommand::StrokeRect {
                    rect,
                    color: blue,
                    width: 4.0
                },
            ]
        );
    }

    #[test]
    fn test_palette_is_distinct() {
        let colors: Vec<_> = NoteDigit::ALL.iter().map(|&d| note_color(d)).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
