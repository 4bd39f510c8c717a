use std::time::{Duration, Instant};

use fracdrum::render::measure::note_color;
use fracdrum::sequencer::playback::dispatch;
use fracdrum::{
    render_frame, AudioOutput, DrawCommand, DrawList, KitSource, NoteDigit, NoteSink,
    PlaybackEngine, PlaybackEvent, Point, SampleLibrary, SamplePlayer, Sequencer,
};
use pretty_assertions::assert_eq;

use NoteDigit::*;

#[derive(Default)]
struct Recorder {
    played: Vec<NoteDigit>,
}

impl NoteSink for Recorder {
    fn play_note(&mut self, digit: NoteDigit) {
        self.played.push(digit);
    }
}

fn overlay_colors(list: &DrawList) -> Vec<[u8; 4]> {
    list.commands()
        .iter()
        .filter_map(|c| match c {
            DrawCommand::StrokeRect { color, .. } => Some(color.to_rgba8()),
            _ => None,
        })
        .collect()
}

#[test]
fn selection_drives_labels_and_overlay() {
    let mut sequencer = Sequencer::new();
    sequencer.select(Some(Point::new(200, 70)));

    assert_eq!(
        sequencer.notes(),
        &[Rest, Snare, Bass, Bass, HiHat, Snare, Bass, HiHat]
    );
    assert_eq!(sequencer.coordinate_label(), "200,70");
    assert_eq!(sequencer.notes_label(), "-SBBHSBH");

    let mut list = DrawList::new(800.0, 600.0);
    render_frame(
        Some(&mut list),
        sequencer.viewport(),
        sequencer.space(),
        sequencer.notes(),
    );

    let fills = list
        .commands()
        .iter()
        .filter(|c| matches!(c, DrawCommand::FillRect { .. }))
        .count();
    assert_eq!(fills, 8);
    let expected: Vec<[u8; 4]> = sequencer
        .notes()
        .iter()
        .map(|d| note_color(*d).to_rgba8())
        .collect();
    assert_eq!(overlay_colors(&list), expected);
}

#[test]
fn playback_reveals_prefix_then_loops() {
    let mut sequencer = Sequencer::new();
    sequencer.set_bpm(240);
    sequencer.select(Some(Point::new(0, 0)));
    assert_eq!(sequencer.note_delay(), Duration::from_millis(125));

    let t0 = Instant::now();
    let delay = sequencer.note_delay();
    let mut engine = PlaybackEngine::new();
    let mut sink = Recorder::default();

    let events = engine.start(sequencer.notes().to_vec(), delay, true, t0);
    dispatch(&events, &mut sink);
    assert_eq!(engine.displayed(), Some(&[Bass][..]));

    for step in 1..8u32 {
        let events = engine.poll_events(t0 + delay * step);
        dispatch(&events, &mut sink);
    }
    assert_eq!(sink.played, vec![Bass; 8]);
    assert_eq!(engine.displayed().map(<[NoteDigit]>::len), Some(8));

    let events = engine.poll_events(t0 + delay * 8);
    assert_eq!(
        events,
        vec![
            PlaybackEvent::LoopRestarted,
            PlaybackEvent::NoteTriggered {
                index: 0,
                digit: Bass
            },
        ]
    );
    assert_eq!(engine.displayed(), Some(&[Bass][..]));
}

#[test]
fn new_selection_cancels_running_playback() {
    let mut sequencer = Sequencer::new();
    sequencer.select(Some(Point::new(255, 255)));

    let t0 = Instant::now();
    let delay = sequencer.note_delay();
    let mut engine = PlaybackEngine::new();
    let mut sink = Recorder::default();

    let events = engine.start(sequencer.notes().to_vec(), delay, true, t0);
    dispatch(&events, &mut sink);
    assert_eq!(sink.played, vec![Rest]);

    engine.reset();
    sequencer.select(Some(Point::new(0, 0)));
    assert_eq!(engine.displayed(), None);

    let events = engine.poll_events(t0 + delay * 20);
    assert!(events.is_empty());
    assert!(!engine.is_running());
    assert_eq!(sink.played, vec![Rest]);
}

#[test]
fn measure_change_clears_selection() {
    let mut sequencer = Sequencer::new();
    sequencer.select(Some(Point::new(3, 3)));
    assert_eq!(sequencer.notes().len(), 8);

    sequencer.set_time_signature_counts(3).unwrap();
    assert_eq!(sequencer.notes_per_measure(), 6);
    assert_eq!(sequencer.selection(), None);
    assert!(sequencer.notes().is_empty());

    sequencer.set_fractal_note_type(16).unwrap();
    assert_eq!(sequencer.notes_per_measure(), 12);
    sequencer.select(Some(Point::new(4095, 4095)));
    assert_eq!(sequencer.notes(), vec![Rest; 12].as_slice());
}

#[test]
fn stopping_lets_sounding_hits_ring_out() {
    let mut library = SampleLibrary::new();
    library.load(KitSource::Synthesized { sample_rate: 8_000 });
    assert!(library.wait());
    let mut player = SamplePlayer::new(AudioOutput::silent(), library);

    let t0 = Instant::now();
    let mut engine = PlaybackEngine::new();
    let events = engine.start(vec![Bass, Snare], Duration::from_millis(250), true, t0);
    dispatch(&events, &mut player);
    assert_eq!(player.output().voice_count(), 1);

    engine.stop();
    assert!(engine.poll_events(t0 + Duration::from_secs(1)).is_empty());
    assert_eq!(player.output().voice_count(), 1);
}
