use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
};

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use tokio::runtime::Runtime;

use crate::tone::{Waveform, render_tone};

/// Decoded mono audio for one note.
#[derive(Debug, Clone)]
pub struct SoundResource {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SoundResource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

#[derive(Clone, Debug)]
pub enum SampleSource {
    /// `note_<index>.wav` files in a directory.
    Directory(PathBuf),
    /// Tones rendered at the given output rate.
    Tone { waveform: Waveform, sample_rate: u32 },
}

pub struct LoadedSound {
    pub note: usize,
    pub result: Result<SoundResource>,
}

pub fn note_path(dir: &Path, note: usize) -> PathBuf {
    dir.join(format!("note_{note}.wav"))
}

pub fn load_note(source: &SampleSource, note: usize) -> Result<SoundResource> {
    match source {
        SampleSource::Directory(dir) => load_wav(&note_path(dir, note)),
        SampleSource::Tone {
            waveform,
            sample_rate,
        } => Ok(render_tone(note, *waveform, *sample_rate)),
    }
}

pub fn load_wav(path: &Path) -> Result<SoundResource> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    decode_wav(BufReader::new(file)).with_context(|| format!("decode {}", path.display()))
}

/// Decodes a WAV stream and folds its channels down to mono.
pub fn decode_wav<R: Read>(reader: R) -> Result<SoundResource> {
    let mut reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        bail!("wav stream has no channels");
    }
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok(SoundResource::new(mono, spec.sample_rate))
}

/// Loads every note on the runtime's blocking pool. Results arrive on the
/// returned channel in completion order.
pub fn spawn_loading(
    runtime: &Runtime,
    source: SampleSource,
    count: usize,
) -> mpsc::Receiver<LoadedSound> {
    let (tx, rx) = mpsc::channel();
    for note in 0..count {
        let tx = tx.clone();
        let source = source.clone();
        runtime.spawn_blocking(move || {
            let result = load_note(&source, note);
            if let Err(err) = &result {
                warn!("note {note}: {err:#}");
            } else {
                debug!("note {note} loaded");
            }
            let _ = tx.send(LoadedSound { note, result });
        });
    }
    rx
}
