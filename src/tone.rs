use clap::ValueEnum;

use crate::samples::SoundResource;

/// Key 0 is C2.
pub const BASE_MIDI_NOTE: i32 = 36;

const REFERENCE_FREQ: f32 = 55.0;
const TONE_SECONDS: f32 = 2.5;
const ATTACK_SECONDS: f32 = 0.005;
const DECAY_RATE: f32 = 2.2;
const TONE_LEVEL: f32 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Waveform {
    Saw,
    Pulse,
    Triangle,
    Sine,
}

impl Waveform {
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Saw => 2.0 * (phase - 0.5),
            Waveform::Pulse => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
        }
    }
}

pub fn midi_to_voltage(midi_note: i32) -> f32 {
    (midi_note as f32 - 33.0) / 12.0
}

pub fn voltage_to_frequency(voltage: f32) -> f32 {
    REFERENCE_FREQ * 2.0f32.powf(voltage)
}

pub fn note_frequency(note: usize) -> f32 {
    voltage_to_frequency(midi_to_voltage(BASE_MIDI_NOTE + note as i32))
}

/// Renders a plucked tone for `note`: short linear attack, exponential decay.
pub fn render_tone(note: usize, waveform: Waveform, sample_rate: u32) -> SoundResource {
    let rate = sample_rate.max(1) as f32;
    let frequency = note_frequency(note);
    let length = (TONE_SECONDS * rate) as usize;
    let mut phase = 0.0f32;
    let samples = (0..length)
        .map(|index| {
            let t = index as f32 / rate;
            let attack = (t / ATTACK_SECONDS).min(1.0);
            let envelope = attack * (-DECAY_RATE * t).exp();
            let value = waveform.sample(phase) * envelope * TONE_LEVEL;
            phase = (phase + frequency / rate).fract();
            value
        })
        .collect();
    SoundResource::new(samples, sample_rate)
}
