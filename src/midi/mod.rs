/// MIDI output using midir - note digits as General MIDI drums
use midir::{MidiOutput, MidiOutputConnection};
use thiserror::Error;

use crate::fractal::NoteDigit;
use crate::sequencer::playback::NoteSink;

const CLIENT_NAME: &str = "fracdrum MIDI Output";

/// Channel 10, where General MIDI keeps its percussion.
pub const DRUM_CHANNEL: u8 = 9;
pub const DRUM_VELOCITY: u8 = 100;

pub const ACOUSTIC_BASS_DRUM: u8 = 36;
pub const ACOUSTIC_SNARE: u8 = 38;
pub const CLOSED_HI_HAT: u8 = 42;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to create MIDI output: {0}")]
    Init(#[from] midir::InitError),

    #[error("invalid port index {0}")]
    InvalidPort(usize),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to send: {0}")]
    Send(#[from] midir::SendError),
}

/// General MIDI percussion key for a digit; rests have none.
pub fn drum_note(digit: NoteDigit) -> Option<u8> {
    match digit {
        NoteDigit::Bass => Some(ACOUSTIC_BASS_DRUM),
        NoteDigit::Snare => Some(ACOUSTIC_SNARE),
        NoteDigit::HiHat => Some(CLOSED_HI_HAT),
        NoteDigit::Rest => None,
    }
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(MidiError::InvalidPort(port_index))?;

        let connection = midi_out
            .connect(port, "fracdrum")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("Connected MIDI output port {}", port_index);
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), MidiError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[0x90 | DRUM_CHANNEL, note, velocity])?;
        }
        Ok(())
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), MidiError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[0x80 | DRUM_CHANNEL, note, 0])?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            log::info!("Disconnected MIDI output");
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteSink for MidiOutputDevice {
    /// Drum hits are one-shots, so the note-off follows straight away.
    fn play_note(&mut self, digit: NoteDigit) {
        let Some(note) = drum_note(digit) else {
            return;
        };
        let result = self
            .send_note_on(note, DRUM_VELOCITY)
            .and_then(|()| self.send_note_off(note));
        if let Err(e) = result {
            log::warn!("MIDI drum hit dropped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drum_notes() {
        assert_eq!(drum_note(NoteDigit::Bass), Some(36));
        assert_eq!(drum_note(NoteDigit::Snare), Some(38));
        assert_eq!(drum_note(NoteDigit::HiHat), Some(42));
        assert_eq!(drum_note(NoteDigit::Rest), None);
    }

    #[test]
    fn test_unconnected_device_is_silent() {
        let mut device = MidiOutputDevice::new();
        assert!(!device.is_connected());
        device.play_note(NoteDigit::Snare);
        assert!(device.send_note_on(ACOUSTIC_SNARE, DRUM_VELOCITY).is_ok());
        device.disconnect();
    }
}
