/// Core sequencer state - measure settings, view and the selected cell
/// The app reads and updates this single holder from its event handling
use std::time::Duration;

use crate::fractal::viewport::Viewport;
use crate::fractal::{FractalError, FractalSpace, NoteDigit, Point};

pub mod playback;

pub const COUNTS_RANGE: (u32, u32) = (1, 22);
pub const BEAT_NOTE_TYPES: [u32; 3] = [4, 8, 16];
pub const FRACTAL_NOTE_RANGE: (u32, u32) = (1, 32);
pub const BPM_RANGE: (u32, u32) = (1, 1000);

/// Whole notes in the measure divided by the length of one fractal note.
pub fn notes_per_measure(counts: u32, beat_note: u32, fractal_note: u32) -> u32 {
    (counts as f64 * fractal_note as f64 / beat_note as f64).round() as u32
}

pub struct Sequencer {
    counts: u32,
    beat_note: u32,
    fractal_note: u32,
    bpm: u32,
    looping: bool,
    space: FractalSpace,
    viewport: Viewport,
    selection: Option<Point>,
    notes: Vec<NoteDigit>,
}

impl Sequencer {
    /// 4/4 at 120 BPM, subdivided into eighth notes.
    pub fn new() -> Self {
        let space = FractalSpace::default();
        Self {
            counts: 4,
            beat_note: 4,
            fractal_note: 8,
            bpm: 120,
            looping: true,
            space,
            viewport: Viewport::initial(&space),
            selection: None,
            notes: Vec::new(),
        }
    }

    pub fn time_signature(&self) -> (u32, u32) {
        (self.counts, self.beat_note)
    }

    pub fn set_time_signature_counts(&mut self, counts: u32) -> Result<(), FractalError> {
        let counts = counts.clamp(COUNTS_RANGE.0, COUNTS_RANGE.1);
        self.apply_measure(counts, self.beat_note, self.fractal_note)
    }

    /// Only quarter, eighth and sixteenth beats; anything else becomes a quarter.
    pub fn set_time_signature_note_type(&mut self, beat_note: u32) -> Result<(), FractalError> {
        let beat_note = if BEAT_NOTE_TYPES.contains(&beat_note) {
            beat_note
        } else {
            4
        };
        self.apply_measure(self.counts, beat_note, self.fractal_note)
    }

    pub fn fractal_note_type(&self) -> u32 {
        self.fractal_note
    }

    pub fn set_fractal_note_type(&mut self, fractal_note: u32) -> Result<(), FractalError> {
        let fractal_note = fractal_note.clamp(FRACTAL_NOTE_RANGE.0, FRACTAL_NOTE_RANGE.1);
        self.apply_measure(self.counts, self.beat_note, fractal_note)
    }

    // Settings that produce an unusable measure are rejected whole.
    fn apply_measure(
        &mut self,
        counts: u32,
        beat_note: u32,
        fractal_note: u32,
    ) -> Result<(), FractalError> {
        let space = FractalSpace::new(notes_per_measure(counts, beat_note, fractal_note))?;
        self.counts = counts;
        self.beat_note = beat_note;
        self.fractal_note = fractal_note;

        if space != self.space {
            log::info!(
                "Measure is now {} notes (fractal size {})",
                space.notes_per_measure(),
                space.size()
            );
            self.space = space;
            self.reset_view();
        }
        Ok(())
    }

    pub fn notes_per_measure(&self) -> u32 {
        self.space.notes_per_measure()
    }

    pub fn space(&self) -> &FractalSpace {
        &self.space
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(BPM_RANGE.0, BPM_RANGE.1);
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Time between fractal notes, rounded to whole milliseconds.
    pub fn note_delay(&self) -> Duration {
        let beat_ms = 60_000.0 / self.bpm as f64;
        let ms = (beat_ms * self.beat_note as f64 / self.fractal_note as f64).round();
        Duration::from_millis(ms as u64)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn selection(&self) -> Option<Point> {
        self.selection
    }

    pub fn notes(&self) -> &[NoteDigit] {
        &self.notes
    }

    pub fn select(&mut self, point: Option<Point>) {
        if point == self.selection {
            return;
        }
        self.selection = point;
        self.notes = self.space.note_digits(point);
        log::debug!(
            "Selected {:?} -> {}",
            point,
            crate::fractal::digits_to_label(&self.notes)
        );
    }

    /// Select the cell under a pointer position given in viewport pixels.
    pub fn select_at_screen(&mut self, screen_x: f64, screen_y: f64) -> Point {
        let (world_x, world_y) = self.viewport.screen_to_world(screen_x, screen_y);
        let point = self.space.snap(world_x, world_y);
        self.select(Some(point));
        point
    }

    pub fn clear_selection(&mut self) {
        self.select(None);
    }

    /// Frame the whole measure again and drop the selection.
    pub fn reset_view(&mut self) {
        self.viewport = Viewport::initial(&self.space);
        self.clear_selection();
    }

    pub fn coordinate_label(&self) -> String {
        self.space.label(self.selection)
    }

    pub fn notes_label(&self) -> String {
        crate::fractal::digits_to_label(&self.notes)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
