/// Playback engine - steps through a note sequence on a fixed delay
///
/// The engine never sleeps or spawns; the host polls it with the current time
/// (once per frame in the app) and forwards the resulting events to whatever
/// makes sound. Every scheduled step carries the cancellation token of the
/// run that scheduled it, so a stop or restart invalidates it immediately.
use std::time::{Duration, Instant};

use crate::fractal::NoteDigit;

/// Something that can sound a note digit. Rests still reach the sink; it is
/// free to ignore them.
pub trait NoteSink {
    fn play_note(&mut self, digit: NoteDigit);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The note at `index` sounded and is now part of the displayed prefix.
    NoteTriggered { index: usize, digit: NoteDigit },
    /// The end was reached while looping; the prefix is empty again.
    LoopRestarted,
    /// The end was reached without looping.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// `index` is the next note to sound.
    Playing { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    token: CancelToken,
    due: Instant,
}

pub struct PlaybackEngine {
    state: PlaybackState,
    notes: Vec<NoteDigit>,
    prefix_len: usize,
    delay: Duration,
    looping: bool,
    generation: u64,
    scheduled: Option<Scheduled>,
    active: bool,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            notes: Vec::new(),
            prefix_len: 0,
            delay: Duration::ZERO,
            looping: false,
            generation: 0,
            scheduled: None,
            active: false,
        }
    }

    /// Cancel whatever is playing and start `notes` from an empty prefix.
    /// The first note sounds right away and is returned.
    pub fn start(
        &mut self,
        notes: Vec<NoteDigit>,
        delay: Duration,
        looping: bool,
        now: Instant,
    ) -> Vec<PlaybackEvent> {
        self.stop();
        self.notes = notes;
        self.prefix_len = 0;
        self.delay = delay;
        self.looping = looping;
        self.active = true;

        if self.notes.is_empty() {
            log::debug!("Nothing selected, playback stays idle");
            return Vec::new();
        }

        log::info!(
            "Playback started: {} notes, {:?} apart, looping {}",
            self.notes.len(),
            delay,
            looping
        );
        self.state = PlaybackState::Playing { index: 0 };
        let token = self.token();
        self.scheduled = Some(Scheduled { token, due: now });
        self.step(token, now)
    }

    /// Cancel immediately. Safe to call when already stopped. The prefix
    /// played so far stays visible.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.scheduled = None;
        if self.state != PlaybackState::Idle {
            log::info!("Playback stopped");
            self.state = PlaybackState::Idle;
        }
    }

    /// Stop and forget the sequence, e.g. because the selection changed.
    pub fn reset(&mut self) {
        self.stop();
        self.notes.clear();
        self.prefix_len = 0;
        self.active = false;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_running(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Notes shown so far, or `None` if nothing has been started since the
    /// last reset.
    pub fn displayed(&self) -> Option<&[NoteDigit]> {
        self.active.then(|| &self.notes[..self.prefix_len])
    }

    fn token(&self) -> CancelToken {
        CancelToken(self.generation)
    }

    /// Token and due time of the pending step, for hosts that drive the
    /// engine from their own timers.
    pub fn next_step(&self) -> Option<(CancelToken, Instant)> {
        self.scheduled.map(|s| (s.token, s.due))
    }

    /// Run the pending step if `token` still belongs to it, as if it ran on
    /// time. Tokens from a cancelled run are ignored.
    pub fn tick(&mut self, token: CancelToken) -> Vec<PlaybackEvent> {
        match self.scheduled {
            Some(scheduled) => self.step(token, scheduled.due),
            None => Vec::new(),
        }
    }

    /// Run the pending step at `now`. A late step schedules the next one a
    /// full delay after `now`, so missed steps are never caught up on.
    fn step(&mut self, token: CancelToken, now: Instant) -> Vec<PlaybackEvent> {
        let Some(scheduled) = self.scheduled else {
            return Vec::new();
        };
        if scheduled.token != token || token != self.token() {
            return Vec::new();
        }
        self.scheduled = None;
        let ran_at = scheduled.due.max(now);

        let PlaybackState::Playing { index } = self.state else {
            return Vec::new();
        };

        if index < self.notes.len() {
            let digit = self.notes[index];
            self.prefix_len = index + 1;
            self.state = PlaybackState::Playing { index: index + 1 };
            self.scheduled = Some(Scheduled {
                token,
                due: ran_at + self.delay,
            });
            vec![PlaybackEvent::NoteTriggered { index, digit }]
        } else if self.looping {
            // no gap between loops
            self.prefix_len = 0;
            self.state = PlaybackState::Playing { index: 0 };
            self.scheduled = Some(Scheduled {
                token,
                due: ran_at,
            });
            vec![PlaybackEvent::LoopRestarted]
        } else {
            self.state = PlaybackState::Idle;
            log::info!("Playback finished");
            vec![PlaybackEvent::Finished]
        }
    }

    /// Run the step that is due at `now`. After a stall the timeline resumes
    /// from `now`, one note at a time, `delay` apart.
    pub fn poll_events(&mut self, now: Instant) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(scheduled) = self.scheduled {
            if scheduled.due > now {
                break;
            }
            let fired = self.step(scheduled.token, now);
            let sounded = fired
                .iter()
                .any(|e| matches!(e, PlaybackEvent::NoteTriggered { .. }));
            events.extend(fired);
            if sounded {
                break;
            }
        }
        events
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward every sounded note to a sink.
pub fn dispatch(events: &[PlaybackEvent], sink: &mut dyn NoteSink) {
    for event in events {
        if let PlaybackEvent::NoteTriggered { digit, .. } = event {
            sink.play_note(*digit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NoteDigit::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[derive(Default)]
    struct Recorder(Vec<NoteDigit>);

    impl NoteSink for Recorder {
        fn play_note(&mut self, digit: NoteDigit) {
            self.0.push(digit);
        }
    }

    fn note(index: usize, digit: NoteDigit) -> PlaybackEvent {
        PlaybackEvent::NoteTriggered { index, digit }
    }

    #[test]
    fn test_first_note_plays_immediately() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        let events = engine.start(vec![Snare, Rest], DELAY, false, t0);
        assert_eq!(events, vec![note(0, Snare)]);
        assert_eq!(engine.displayed(), Some(&[Snare][..]));
        assert_eq!(engine.state(), PlaybackState::Playing { index: 1 });
    }

    #[test]
    fn test_steps_follow_the_delay() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        engine.start(vec![Bass, Snare, HiHat], DELAY, false, t0);

        assert!(engine.poll_events(t0 + DELAY / 2).is_empty());
        assert_eq!(engine.poll_events(t0 + DELAY), vec![note(1, Snare)]);
        assert_eq!(engine.poll_events(t0 + DELAY * 2), vec![note(2, HiHat)]);
        assert_eq!(engine.displayed(), Some(&[Bass, Snare, HiHat][..]));

        assert_eq!(engine.poll_events(t0 + DELAY * 3), vec![PlaybackEvent::Finished]);
        assert!(!engine.is_running());
        // the finished measure stays on screen
        assert_eq!(engine.displayed(), Some(&[Bass, Snare, HiHat][..]));
    }

    #[test]
    fn test_loop_restarts_without_gap() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        engine.start(vec![Bass, HiHat], DELAY, true, t0);
        engine.poll_events(t0 + DELAY);

        let events = engine.poll_events(t0 + DELAY * 2);
        assert_eq!(events, vec![PlaybackEvent::LoopRestarted, note(0, Bass)]);
        assert_eq!(engine.displayed(), Some(&[Bass][..]));
        assert_eq!(engine.poll_events(t0 + DELAY * 3), vec![note(1, HiHat)]);
    }

    #[test]
    fn test_stalled_host_resumes_at_delay() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        engine.start(vec![Bass; 16], DELAY, false, t0);

        // one late note, then 16 ms frames
        let frame = Duration::from_millis(16);
        let resume = t0 + DELAY * 20;
        let mut hits = Vec::new();
        for i in 0..40u32 {
            let now = resume + frame * i;
            for event in engine.poll_events(now) {
                if let PlaybackEvent::NoteTriggered { .. } = event {
                    hits.push(now - resume);
                }
            }
        }

        assert_eq!(hits[0], Duration::ZERO);
        assert!(hits.len() <= 7);
        for pair in hits.windows(2) {
            assert!(pair[1] - pair[0] >= DELAY);
        }
    }

    #[test]
    fn test_late_loop_restart_keeps_spacing() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        engine.start(vec![Bass, HiHat], DELAY, true, t0);

        let late = t0 + DELAY * 10;
        assert_eq!(engine.poll_events(late), vec![note(1, HiHat)]);
        assert_eq!(engine.next_step().map(|(_, due)| due), Some(late + DELAY));
        assert!(engine.poll_events(late + DELAY / 2).is_empty());
        assert_eq!(
            engine.poll_events(late + DELAY),
            vec![PlaybackEvent::LoopRestarted, note(0, Bass)]
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = PlaybackEngine::new();
        engine.stop();
        assert!(!engine.is_running());

        let t0 = Instant::now();
        engine.start(vec![Bass, Snare], DELAY, true, t0);
        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
        assert!(engine.poll_events(t0 + DELAY * 5).is_empty());
        assert_eq!(engine.displayed(), Some(&[Bass][..]));
    }

    #[test]
    fn test_stale_token_is_ignored() {
        let mut engine = PlaybackEngine::new();
        let t0 = Instant::now();
        engine.start(vec![Bass, Snare], DELAY, true, t0);
        let (stale, _) = engine.next_step().unwrap();

        engine.start(vec![HiHat, Rest], DELAY, true, t0);
        assert!(engine.tick(stale).is_empty());

        let (fresh, due) = engine.next_step().unwrap();
        assert_ne!(stale, fresh);
        assert_eq!(due, t0 + DELAY);
        assert_eq!(engine.tick(fresh), vec![note(1, Rest)]);
    }

    #[test]
    fn test_empty_sequence_stays_idle() {
        let mut engine = PlaybackEngine::new();
        let events = engine.start(Vec::new(), DELAY, true, Instant::now());
        assert!(events.is_empty());
        assert!(!engine.is_running());
        assert!(engine.next_step().is_none());
    }

    #[test]
    fn test_reset_forgets_sequence() {
        let mut engine = PlaybackEngine::new();
        assert_eq!(engine.displayed(), None);
        engine.start(vec![Bass], DELAY, false, Instant::now());
        engine.reset();
        assert_eq!(engine.displayed(), None);
    }

    #[test]
    fn test_dispatch_forwards_rests() {
        let mut sink = Recorder::default();
        let events = [
            note(0, Rest),
            PlaybackEvent::LoopRestarted,
            note(0, Bass),
            PlaybackEvent::Finished,
        ];
        dispatch(&events, &mut sink);
        assert_eq!(sink.0, vec![Rest, Bass]);
    }
}
