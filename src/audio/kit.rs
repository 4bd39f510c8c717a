/// Drum kit - a few sample variations per drum, decoded with symphonia
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioError, Sample};
use crate::fractal::NoteDigit;

/// Variations generated per drum for the built-in kit.
const SYNTH_VARIATIONS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct DrumKit {
    bass: Vec<Sample>,
    snare: Vec<Sample>,
    hihat: Vec<Sample>,
}

impl DrumKit {
    /// Load every WAV file in `dir`, sorted by name. Files are assigned by
    /// name: "kick" or "bass" for the bass drum, "snare", and "hat".
    pub fn from_dir(dir: &Path) -> Result<Self, AudioError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            })
            .collect();
        paths.sort();

        let mut kit = DrumKit::default();
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(digit) = classify(name) else {
                log::debug!("Skipping unrecognised sample {:?}", path);
                continue;
            };
            let sample = decode(&path)?;
            log::info!("Loaded {} sample {:?}", digit.name(), path);
            kit.push(digit, sample);
        }

        for digit in [NoteDigit::Bass, NoteDigit::Snare, NoteDigit::HiHat] {
            if kit.variants(digit).is_empty() {
                return Err(AudioError::IncompleteKit(digit.name()));
            }
        }
        Ok(kit)
    }

    /// Simple synthesized kit, used when no sample directory is given.
    pub fn synthesized(sample_rate: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut kit = DrumKit::default();
        for variation in 0..SYNTH_VARIATIONS {
            // small detune so repeated hits do not sound identical
            let detune = 1.0 + 0.03 * variation as f32;
            kit.push(NoteDigit::Bass, synth_kick(sample_rate, detune));
            kit.push(NoteDigit::Snare, synth_snare(sample_rate, detune, &mut rng));
            kit.push(NoteDigit::HiHat, synth_hihat(sample_rate, &mut rng));
        }
        kit
    }

    fn push(&mut self, digit: NoteDigit, sample: Sample) {
        match digit {
            NoteDigit::Bass => self.bass.push(sample),
            NoteDigit::Snare => self.snare.push(sample),
            NoteDigit::HiHat => self.hihat.push(sample),
            NoteDigit::Rest => {}
        }
    }

    /// All variations for a drum; a rest has none.
    pub fn variants(&self, digit: NoteDigit) -> &[Sample] {
        match digit {
            NoteDigit::Bass => &self.bass,
            NoteDigit::Snare => &self.snare,
            NoteDigit::HiHat => &self.hihat,
            NoteDigit::Rest => &[],
        }
    }

    /// A random variation for the drum.
    pub fn pick<R: Rng>(&self, digit: NoteDigit, rng: &mut R) -> Option<&Sample> {
        let variants = self.variants(digit);
        if variants.is_empty() {
            return None;
        }
        variants.get(rng.random_range(0..variants.len()))
    }
}

/// Which drum a sample file name belongs to.
pub fn classify(file_name: &str) -> Option<NoteDigit> {
    let name = file_name.to_ascii_lowercase();
    if name.contains("kick") || name.contains("bass") {
        Some(NoteDigit::Bass)
    } else if name.contains("snare") {
        Some(NoteDigit::Snare)
    } else if name.contains("hat") {
        Some(NoteDigit::HiHat)
    } else {
        None
    }
}

/// Decode an audio file into a mono sample.
pub fn decode(path: &Path) -> Result<Sample, AudioError> {
    let src = File::open(path)?;
    let mstream = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|os| os.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe().format(&hint, mstream, &fmt_opts, &meta_opts)?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(AudioError::NoTrack)?;
    let num_channels = track.codec_params.channels.map_or(1, |c| c.count().max(1));

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

    let mut interleaved = Vec::<f32>::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = decoder.decode(&packet)?;
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buf.samples());
    }

    // average the channels down to mono
    let frames: Vec<f32> = interleaved
        .chunks(num_channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(Sample::new(frames, sample_rate))
}

fn envelope(sample_rate: u32, seconds: f32) -> impl Iterator<Item = f32> {
    let len = (sample_rate as f32 * seconds) as usize;
    (0..len).map(move |i| i as f32 / sample_rate as f32)
}

fn synth_kick(sample_rate: u32, detune: f32) -> Sample {
    let mut phase = 0.0f32;
    let frames = envelope(sample_rate, 0.3)
        .map(|t| {
            // pitch drops from 150 Hz toward 45 Hz
            let freq = (45.0 + 105.0 * (-t * 30.0).exp()) * detune;
            phase += freq / sample_rate as f32;
            (phase * std::f32::consts::TAU).sin() * (-t * 9.0).exp() * 0.8
        })
        .collect();
    Sample::new(frames, sample_rate)
}

fn synth_snare<R: Rng>(sample_rate: u32, detune: f32, rng: &mut R) -> Sample {
    let frames = envelope(sample_rate, 0.2)
        .map(|t| {
            let noise: f32 = rng.random_range(-1.0..1.0);
            let body = (t * 185.0 * detune * std::f32::consts::TAU).sin();
            noise * (-t * 25.0).exp() * 0.45 + body * (-t * 30.0).exp() * 0.3
        })
        .collect();
    Sample::new(frames, sample_rate)
}

fn synth_hihat<R: Rng>(sample_rate: u32, rng: &mut R) -> Sample {
    let mut last = 0.0f32;
    let frames = envelope(sample_rate, 0.06)
        .map(|t| {
            let noise: f32 = rng.random_range(-1.0..1.0);
            // first difference keeps mostly the high end
            let bright = noise - last;
            last = noise;
            bright * (-t * 70.0).exp() * 0.2
        })
        .collect();
    Sample::new(frames, sample_rate)
}
