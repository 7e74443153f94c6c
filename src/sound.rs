use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::{
    FromSample, Sample, SampleFormat, SizedSample, Stream,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{info, warn};

use crate::samples::SoundResource;

pub const MAX_STREAMS: usize = 25;

const RELEASE_SECONDS: f32 = 0.03;

/// Handle to one playing instance of a note's sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Fire-and-forget note playback used by the keyboard.
pub trait NotePlayer {
    /// Starts the note's sound. Returns `None` when the note has no loaded sound.
    fn play(&mut self, note: usize) -> Option<StreamId>;
    fn stop(&mut self, stream: StreamId);
}

struct Voice {
    id: StreamId,
    resource: SoundResource,
    position: f64,
    step: f64,
    gain: f32,
    releasing: bool,
}

impl Voice {
    fn next_sample(&mut self, release_step: f32) -> Option<f32> {
        let samples = self.resource.samples();
        let index = self.position as usize;
        let current = *samples.get(index)?;
        let next = samples.get(index + 1).copied().unwrap_or(0.0);
        let frac = (self.position - index as f64) as f32;
        let value = current + (next - current) * frac;
        self.position += self.step;
        if self.releasing {
            self.gain -= release_step;
            if self.gain <= 0.0 {
                return None;
            }
        }
        Some(value * self.gain)
    }
}

/// Per-note sound resources and the streams currently playing them.
pub struct SoundPool {
    resources: Vec<Option<SoundResource>>,
    voices: Vec<Voice>,
    max_streams: usize,
    next_id: u64,
    output_rate: f32,
    pub master: f32,
}

impl SoundPool {
    pub fn new(notes: usize, max_streams: usize) -> Self {
        Self {
            resources: vec![None; notes],
            voices: Vec::new(),
            max_streams: max_streams.max(1),
            next_id: 0,
            output_rate: 44_100.0,
            master: 0.8,
        }
    }

    pub fn set_output_rate(&mut self, rate: f32) {
        self.output_rate = rate.max(1.0);
    }

    pub fn set_master_level(&mut self, value: f32) {
        self.master = value.clamp(0.0, 1.0);
    }

    pub fn insert(&mut self, note: usize, resource: SoundResource) {
        if let Some(slot) = self.resources.get_mut(note) {
            *slot = Some(resource);
        }
    }

    #[cfg(test)]
    pub fn is_loaded(&self, note: usize) -> bool {
        self.resources.get(note).is_some_and(Option::is_some)
    }

    pub fn loaded_count(&self) -> usize {
        self.resources.iter().flatten().count()
    }

    pub fn active_streams(&self) -> usize {
        self.voices.iter().filter(|voice| !voice.releasing).count()
    }

    pub fn play(&mut self, note: usize) -> Option<StreamId> {
        let resource = self.resources.get(note)?.clone()?;
        if self.voices.len() >= self.max_streams {
            self.voices.remove(0);
        }
        self.next_id += 1;
        let id = StreamId(self.next_id);
        let step = resource.sample_rate() as f64 / self.output_rate as f64;
        self.voices.push(Voice {
            id,
            resource,
            position: 0.0,
            step,
            gain: 1.0,
            releasing: false,
        });
        Some(id)
    }

    /// Fades the stream out over a few milliseconds.
    pub fn stop(&mut self, stream: StreamId) {
        if let Some(voice) = self.voices.iter_mut().find(|voice| voice.id == stream) {
            voice.releasing = true;
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let release_step = 1.0 / (RELEASE_SECONDS * self.output_rate).max(1.0);
        let mut mixed = 0.0;
        self.voices.retain_mut(|voice| match voice.next_sample(release_step) {
            Some(value) => {
                mixed += value;
                true
            }
            None => false,
        });
        mixed * self.master
    }
}

pub type SharedPool = Arc<Mutex<SoundPool>>;

/// `NotePlayer` over a pool shared with the audio thread.
#[derive(Clone)]
pub struct PoolPlayer {
    pool: SharedPool,
}

impl PoolPlayer {
    pub fn new(pool: SharedPool) -> Self {
        Self { pool }
    }
}

impl NotePlayer for PoolPlayer {
    fn play(&mut self, note: usize) -> Option<StreamId> {
        let Ok(mut pool) = self.pool.lock() else {
            return None;
        };
        pool.play(note)
    }

    fn stop(&mut self, stream: StreamId) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.stop(stream);
        }
    }
}

pub struct AudioEngine {
    _stream: Stream,
    sample_rate: f32,
}

impl AudioEngine {
    pub fn start(pool: SharedPool) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default audio output"))?;
        let supported = device.default_output_config()?;
        let config = supported.config();
        let sample_rate = config.sample_rate.0 as f32;
        {
            let mut guard = pool
                .lock()
                .map_err(|_| anyhow!("sound pool lock poisoned"))?;
            guard.set_output_rate(sample_rate);
        }
        info!(
            "audio output: {} ch @ {} Hz ({:?})",
            config.channels,
            config.sample_rate.0,
            supported.sample_format()
        );
        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, pool)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, pool)?,
            _ => build_stream::<f32>(&device, &config, pool)?,
        };
        stream.play()?;
        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// Output stream in the device's native sample type. The pool is mixed in
/// f32 and converted per frame.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    pool: SharedPool,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let stream = device.build_output_stream(
        config,
        move |output: &mut [T], _| write_frames(output, channels, &pool),
        move |err| warn!("audio stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Writes the same mixed sample to every channel of a frame. Silence when
/// the pool is unavailable.
fn write_frames<T>(output: &mut [T], channels: usize, pool: &SharedPool)
where
    T: Sample + FromSample<f32>,
{
    let Ok(mut pool) = pool.lock() else {
        output.fill(T::EQUILIBRIUM);
        return;
    };
    for frame in output.chunks_mut(channels.max(1)) {
        let value = T::from_sample(pool.next_sample().clamp(-0.98, 0.98));
        frame.fill(value);
    }
}
