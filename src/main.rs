#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use std::path::PathBuf;
#[cfg(feature = "gui")]
use std::time::Instant;

#[cfg(feature = "gui")]
use clap::Parser;

#[cfg(feature = "gui")]
use fracdrum::{
    fractal::viewport::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH},
    render_frame, sequencer, AudioOutput, DrawCommand, DrawList, FractalError, KitSource,
    MidiOutputDevice, NoteSink, PlaybackEngine, PlaybackEvent, Rgba, SampleLibrary, SamplePlayer,
    Sequencer,
};

/// Fractal drum machine: pick a cell of the measure grid to hear its beat.
#[cfg(feature = "gui")]
#[derive(Parser, Debug)]
#[command(name = "fracdrum")]
#[command(about = "Fractal drum machine")]
struct Args {
    /// Directory of WAV drum samples named with "kick", "snare" or "hat"
    /// (a synthesized kit is used when omitted)
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(long, default_value = "120")]
    bpm: u32,

    /// Counts per measure (time signature numerator)
    #[arg(long, default_value = "4")]
    counts: u32,

    /// Note that gets the beat (time signature denominator: 4, 8 or 16)
    #[arg(long, default_value = "4")]
    note_type: u32,

    /// Subdivision played by the fractal, e.g. 8 for eighth notes
    #[arg(long, default_value = "8")]
    fractal_note: u32,

    /// Play the measure once instead of looping
    #[arg(long)]
    no_loop: bool,

    /// MIDI output port index to mirror drum hits to
    #[arg(long)]
    midi_port: Option<usize>,
}

#[cfg(feature = "gui")]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut sequencer = Sequencer::new();
    sequencer.set_bpm(args.bpm);
    sequencer.set_looping(!args.no_loop);
    sequencer.set_time_signature_counts(args.counts)?;
    sequencer.set_time_signature_note_type(args.note_type)?;
    sequencer.set_fractal_note_type(args.fractal_note)?;

    let output = AudioOutput::default();
    let mut library = SampleLibrary::new();
    library.load(match args.samples {
        Some(dir) => KitSource::Directory(dir),
        None => KitSource::Synthesized {
            sample_rate: output.sample_rate(),
        },
    });

    let mut app = DrumMachineApp::new(sequencer, SamplePlayer::new(output, library));
    if let Some(port) = args.midi_port {
        app.connect_midi(port);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([840.0, 760.0])
            .with_title("Fractal Drum Machine"),
        ..Default::default()
    };

    eframe::run_native(
        "fracdrum",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("GUI exited with error: {}", e))
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct DrumMachineApp {
    sequencer: Sequencer,
    playback_engine: PlaybackEngine,
    samples: SamplePlayer,
    midi_output: MidiOutputDevice,
    draw_list: DrawList,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    selecting: bool,
    settings_error: Option<String>,
}

#[cfg(feature = "gui")]
impl DrumMachineApp {
    fn new(sequencer: Sequencer, samples: SamplePlayer) -> Self {
        Self {
            sequencer,
            playback_engine: PlaybackEngine::new(),
            samples,
            midi_output: MidiOutputDevice::new(),
            draw_list: DrawList::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            selecting: false,
            settings_error: None,
        }
    }

    fn connect_midi(&mut self, port: usize) {
        match self.midi_output.connect(port) {
            Ok(()) => self.selected_port = Some(port),
            Err(e) => log::warn!("MIDI port {} unavailable: {}", port, e),
        }
    }

    fn handle_playback_events(&mut self, events: Vec<PlaybackEvent>) {
        for event in events {
            match event {
                PlaybackEvent::NoteTriggered { digit, .. } => {
                    self.samples.play_note(digit);
                    self.midi_output.play_note(digit);
                }
                PlaybackEvent::LoopRestarted => log::debug!("Measure looped"),
                PlaybackEvent::Finished => log::debug!("Measure finished"),
            }
        }
    }

    fn start_playback(&mut self) {
        let events = self.playback_engine.start(
            self.sequencer.notes().to_vec(),
            self.sequencer.note_delay(),
            self.sequencer.is_looping(),
            Instant::now(),
        );
        self.handle_playback_events(events);
    }

    /// Hits already sounding ring out.
    fn stop_playback(&mut self) {
        self.playback_engine.stop();
    }

    /// Playback is cancelled before the new sequence is computed.
    fn select_at(&mut self, pos: egui::Vec2) {
        self.playback_engine.reset();
        self.sequencer.select_at_screen(pos.x as f64, pos.y as f64);
    }

    fn clear(&mut self) {
        self.playback_engine.reset();
        self.sequencer.clear_selection();
    }

    fn reset(&mut self) {
        self.playback_engine.reset();
        self.sequencer.reset_view();
    }

    fn apply_setting(&mut self, result: Result<(), FractalError>, before: u32) {
        match result {
            Ok(()) => {
                self.settings_error = None;
                if self.sequencer.notes_per_measure() != before {
                    self.playback_engine.reset();
                }
            }
            Err(e) => {
                log::warn!("Rejected measure setting: {}", e);
                self.settings_error = Some(e.to_string());
            }
        }
    }

    fn settings_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let before = self.sequencer.notes_per_measure();
            let (mut counts, mut beat_note) = self.sequencer.time_signature();

            ui.label("Time signature:");
            if ui
                .add(egui::Slider::new(
                    &mut counts,
                    sequencer::COUNTS_RANGE.0..=sequencer::COUNTS_RANGE.1,
                ))
                .changed()
            {
                let result = self.sequencer.set_time_signature_counts(counts);
                self.apply_setting(result, before);
            }
            ui.label("/");
            egui::ComboBox::from_id_source("beat_note")
                .selected_text(beat_note.to_string())
                .show_ui(ui, |ui| {
                    for note_type in sequencer::BEAT_NOTE_TYPES {
                        ui.selectable_value(&mut beat_note, note_type, note_type.to_string());
                    }
                });
            if beat_note != self.sequencer.time_signature().1 {
                let result = self.sequencer.set_time_signature_note_type(beat_note);
                self.apply_setting(result, before);
            }

            ui.add_space(10.0);
            ui.label("Fractal note type:");
            let mut fractal_note = self.sequencer.fractal_note_type();
            if ui
                .add(egui::Slider::new(
                    &mut fractal_note,
                    sequencer::FRACTAL_NOTE_RANGE.0..=sequencer::FRACTAL_NOTE_RANGE.1,
                ))
                .changed()
            {
                let result = self.sequencer.set_fractal_note_type(fractal_note);
                self.apply_setting(result, before);
            }
        });

        ui.horizontal(|ui| {
            ui.label("BPM:");
            let mut bpm = self.sequencer.bpm();
            if ui
                .add(egui::Slider::new(
                    &mut bpm,
                    sequencer::BPM_RANGE.0..=sequencer::BPM_RANGE.1,
                ))
                .changed()
            {
                self.sequencer.set_bpm(bpm);
            }

            let mut looping = self.sequencer.is_looping();
            if ui.checkbox(&mut looping, "Loop").changed() {
                self.sequencer.set_looping(looping);
                self.playback_engine.set_looping(looping);
            }

            ui.add_space(20.0);
            if ui.button("▶ Play").clicked() {
                self.start_playback();
            }
            if ui.button("⏹ Stop").clicked() {
                self.stop_playback();
            }
            if ui.button("Clear").clicked() {
                self.clear();
            }
            if ui.button("Reset").clicked() {
                self.reset();
            }
        });

        if let Some(error) = &self.settings_error {
            ui.colored_label(egui::Color32::YELLOW, format!("⚠ {}", error));
        }
    }

    fn selection_row(&mut self, ui: &mut egui::Ui) {
        let coordinate = self.sequencer.coordinate_label();
        let notes = self.sequencer.notes_label();

        ui.horizontal(|ui| {
            ui.label("Selected:");
            ui.monospace(if coordinate.is_empty() { "-" } else { coordinate.as_str() });
            if ui.small_button("⧉").on_hover_text("Copy coordinate").clicked() {
                ui.output_mut(|o| o.copied_text = coordinate.clone());
            }

            ui.add_space(10.0);
            ui.monospace(notes.as_str());
            if ui.small_button("⧉").on_hover_text("Copy notes").clicked() {
                ui.output_mut(|o| o.copied_text = notes.clone());
            }
        });
    }

    fn midi_row(&mut self, ui: &mut egui::Ui) {
        let mut selected_port_changed = None;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_id_source("midi_port")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
            }
        });

        if let Some(port_idx) = selected_port_changed {
            self.connect_midi(port_idx);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let size = egui::vec2(VIEWPORT_WIDTH as f32, VIEWPORT_HEIGHT as f32);
        let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
        let rect = response.rect;
        let painter = painter.with_clip_rect(rect);

        let (hover, pressed, down, released, scroll) = ui.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.button_pressed(egui::PointerButton::Secondary),
                i.pointer.button_down(egui::PointerButton::Secondary),
                i.pointer.button_released(egui::PointerButton::Secondary),
                i.raw_scroll_delta.y,
            )
        });

        // left drag pans
        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            self.sequencer
                .viewport_mut()
                .pan_by(delta.x as f64, delta.y as f64);
        }

        // right button picks a cell and plays it on release
        if pressed && response.hovered() {
            self.selecting = true;
        }
        if self.selecting && down {
            if let Some(pos) = hover {
                self.select_at(pos - rect.min);
            }
        }
        if self.selecting && released {
            self.selecting = false;
            self.start_playback();
        }

        if response.hovered() && scroll != 0.0 {
            if let Some(pos) = hover {
                let local = pos - rect.min;
                self.sequencer
                    .viewport_mut()
                    .zoom_step(local.x as f64, local.y as f64, scroll > 0.0);
            }
        }

        let displayed = self
            .playback_engine
            .displayed()
            .unwrap_or(self.sequencer.notes());
        self.draw_list.resize(rect.width() as f64, rect.height() as f64);
        render_frame(
            Some(&mut self.draw_list),
            self.sequencer.viewport(),
            self.sequencer.space(),
            displayed,
        );

        painter.rect_filled(rect, 0.0, egui::Color32::WHITE);
        paint_commands(&painter, rect.min, self.draw_list.commands());
    }
}

#[cfg(feature = "gui")]
fn color32(color: Rgba) -> egui::Color32 {
    let [r, g, b, a] = color.to_rgba8();
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Replay recorded draw commands relative to the canvas origin.
#[cfg(feature = "gui")]
fn paint_commands(painter: &egui::Painter, origin: egui::Pos2, commands: &[DrawCommand]) {
    let at = |(x, y): (f64, f64)| origin + egui::vec2(x as f32, y as f32);
    for command in commands {
        match command {
            DrawCommand::Line {
                from,
                to,
                color,
                width,
            } => {
                painter.line_segment(
                    [at(*from), at(*to)],
                    egui::Stroke::new(*width as f32, color32(*color)),
                );
            }
            DrawCommand::FillRect { rect, color } => {
                let r = egui::Rect::from_min_size(
                    at((rect.x, rect.y)),
                    egui::vec2(rect.width as f32, rect.height as f32),
                );
                painter.rect_filled(r, 0.0, color32(*color));
            }
            DrawCommand::StrokeRect { rect, color, width } => {
                let r = egui::Rect::from_min_size(
                    at((rect.x, rect.y)),
                    egui::vec2(rect.width as f32, rect.height as f32),
                );
                painter.rect_stroke(r, 0.0, egui::Stroke::new(*width as f32, color32(*color)));
            }
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for DrumMachineApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.samples.library_mut().poll();
        let events = self.playback_engine.poll_events(Instant::now());
        self.handle_playback_events(events);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Fractal Drum Machine");
            ui.add_space(10.0);

            self.settings_row(ui);
            ui.add_space(5.0);
            self.selection_row(ui);
            self.midi_row(ui);
            ui.add_space(10.0);

            self.canvas(ui);

            ui.separator();
            ui.label("Left drag to pan, scroll to zoom, right click or drag to pick a measure");
            if !self.samples.library().is_ready() {
                ui.colored_label(egui::Color32::YELLOW, "⚠ Drum kit not loaded - playing silently");
            }
        });
    }
}
