/// Fractal coordinate mapping - turns a cell of the measure grid into drum notes
///
/// A measure is a square "fractal space" whose side is a power of 4. Every
/// point inside it addresses one sequence of base-4 note digits, alternating
/// between the x and y axis from the coarsest subdivision to the finest.
use std::fmt;
use thiserror::Error;

pub mod viewport;

/// Longest measure the digit arithmetic can address (4^31 still fits a u64).
pub const MAX_NOTES_PER_MEASURE: u32 = 62;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FractalError {
    #[error("measure has no notes")]
    EmptyMeasure,

    #[error("measure of {0} notes is longer than the 62 note limit")]
    MeasureTooLong(u32),

    #[error("note digit {0} is outside 0..=3")]
    InvalidDigit(u8),
}

/// One level of subdivision: which drum is hit on that note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NoteDigit {
    Bass = 0,
    Snare = 1,
    HiHat = 2,
    Rest = 3,
}

impl NoteDigit {
    pub const ALL: [NoteDigit; 4] = [
        NoteDigit::Bass,
        NoteDigit::Snare,
        NoteDigit::HiHat,
        NoteDigit::Rest,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> char {
        match self {
            NoteDigit::Bass => 'B',
            NoteDigit::Snare => 'S',
            NoteDigit::HiHat => 'H',
            NoteDigit::Rest => '-',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NoteDigit::Bass => "Bass",
            NoteDigit::Snare => "Snare",
            NoteDigit::HiHat => "Hi-hat",
            NoteDigit::Rest => "Rest",
        }
    }

    // Quotients come from a base-4 subdivision, so anything above 3 means the
    // fractal size handed in was not a power of 4.
    fn from_quotient(quotient: u64) -> Self {
        debug_assert!(quotient < 4, "quotient {quotient} is not a base-4 digit");
        Self::ALL[quotient.min(3) as usize]
    }
}

impl TryFrom<u8> for NoteDigit {
    type Error = FractalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(FractalError::InvalidDigit(value))
    }
}

impl fmt::Display for NoteDigit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A cell in world units, origin at the top-left corner of the measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: u64,
    pub y: u64,
}

impl Point {
    pub fn new(x: u64, y: u64) -> Self {
        Self { x, y }
    }

    /// Negative coordinates mean "nothing selected".
    pub fn from_signed(x: i64, y: i64) -> Option<Self> {
        if x < 0 || y < 0 {
            return None;
        }
        Some(Self::new(x as u64, y as u64))
    }
}

/// The square world representing one measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalSpace {
    size: u64,
    notes_per_measure: u32,
}

impl FractalSpace {
    pub fn new(notes_per_measure: u32) -> Result<Self, FractalError> {
        Ok(Self {
            size: fractal_size(notes_per_measure)?,
            notes_per_measure,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn notes_per_measure(&self) -> u32 {
        self.notes_per_measure
    }

    /// Odd measures have one less digit of resolution on the y axis.
    pub fn is_odd(&self) -> bool {
        self.notes_per_measure % 2 == 1
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x < self.size && point.y < self.size
    }

    pub fn note_digits(&self, point: Option<Point>) -> Vec<NoteDigit> {
        point_to_note_digits(point, self.size, self.notes_per_measure)
    }

    pub fn label(&self, point: Option<Point>) -> String {
        coords_to_label(point, self.notes_per_measure)
    }

    /// Snap a world position onto a selectable cell: floor, clamp into the
    /// measure and, for odd measures, round y down to a multiple of 4.
    pub fn snap(&self, world_x: f64, world_y: f64) -> Point {
        let max = (self.size - 1) as f64;
        let x = world_x.floor().clamp(0.0, max) as u64;
        let mut y = world_y.floor().clamp(0.0, max) as u64;
        if self.is_odd() {
            y = y / 4 * 4;
        }
        Point::new(x, y)
    }
}

impl Default for FractalSpace {
    /// A 4/4 measure of eighth notes.
    fn default() -> Self {
        Self {
            size: 256,
            notes_per_measure: 8,
        }
    }
}

/// Side of the fractal space for a measure: `4^ceil(notes / 2)`.
pub fn fractal_size(notes_per_measure: u32) -> Result<u64, FractalError> {
    if notes_per_measure == 0 {
        return Err(FractalError::EmptyMeasure);
    }
    if notes_per_measure > MAX_NOTES_PER_MEASURE {
        return Err(FractalError::MeasureTooLong(notes_per_measure));
    }
    Ok(4u64.pow(notes_per_measure.div_ceil(2)))
}

/// Walk the base-4 quadtree from the coarsest cell down, emitting an x digit
/// and then a y digit per level. The final y digit of an odd measure is never
/// emitted.
pub fn point_to_note_digits(
    point: Option<Point>,
    fractal_size: u64,
    notes_per_measure: u32,
) -> Vec<NoteDigit> {
    let Some(point) = point else {
        return Vec::new();
    };
    if point.x >= fractal_size || point.y >= fractal_size {
        log::debug!(
            "point ({}, {}) lies outside a fractal of size {}",
            point.x,
            point.y,
            fractal_size
        );
        return Vec::new();
    }

    let mut digits = Vec::with_capacity(notes_per_measure as usize);
    let mut note_size = fractal_size / 4;
    let mut notes_remaining = notes_per_measure as i64;
    let (mut tx, mut ty) = (point.x, point.y);

    while note_size > 0 {
        digits.push(NoteDigit::from_quotient(tx / note_size));
        if notes_remaining > 1 {
            digits.push(NoteDigit::from_quotient(ty / note_size));
        }
        tx %= note_size;
        ty %= note_size;
        note_size /= 4;
        notes_remaining -= 2;
    }

    digits
}

/// Human readable coordinate; odd measures report y in groups of 4.
pub fn coords_to_label(point: Option<Point>, notes_per_measure: u32) -> String {
    match point {
        None => String::new(),
        Some(p) if notes_per_measure % 2 == 0 => format!("{},{}", p.x, p.y),
        Some(p) => format!("{},{}", p.x, p.y / 4),
    }
}

pub fn digits_to_label(digits: &[NoteDigit]) -> String {
    digits.iter().map(|d| d.symbol()).collect()
}

/// Like [`digits_to_label`] for untrusted raw values; unknown digits show as '?'.
pub fn raw_digits_to_label(digits: &[u8]) -> String {
    digits
        .iter()
        .map(|&d| NoteDigit::try_from(d).map_or('?', NoteDigit::symbol))
        .collect()
}
