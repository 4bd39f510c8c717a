/// FRACDRUM - a fractal drum machine library
///
/// This library provides the core components of the drum machine:
/// - Mapping between cells of a self-similar measure grid and drum notes
/// - Rendering of the adaptive grid and the selected note boxes
/// - Playback engine for timing and looping
/// - Audio and MIDI outputs for the drum hits

pub mod fractal;
pub mod render;
pub mod sequencer;
pub mod audio;
pub mod midi;

// Re-export commonly used types
pub use fractal::viewport::{initial_viewport, Viewport};
pub use fractal::{
    coords_to_label, digits_to_label, point_to_note_digits, raw_digits_to_label, FractalError,
    FractalSpace, NoteDigit, Point,
};
pub use render::{render_frame, DrawCommand, DrawList, Rgba, Surface};
pub use sequencer::Sequencer;
pub use sequencer::playback::{NoteSink, PlaybackEngine, PlaybackEvent};
pub use audio::{AudioOutput, KitSource, SampleLibrary, SamplePlayer};
pub use midi::MidiOutputDevice;
