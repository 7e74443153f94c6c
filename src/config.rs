use std::path::PathBuf;

use clap::Parser;
use macroquad::window::Conf;

use crate::{samples::SampleSource, tone::Waveform};

/// Two-octave touch piano
#[derive(Parser, Debug, Clone)]
#[command(name = "touch-piano")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding note_0.wav .. note_24.wav. Tones are rendered when omitted.
    #[arg(long)]
    pub samples: Option<PathBuf>,

    /// Shape of the rendered tones
    #[arg(long, value_enum, default_value = "sine")]
    pub waveform: Waveform,

    /// Master output level
    #[arg(long, default_value_t = 0.8, value_parser = parse_level)]
    pub volume: f32,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    pub width: i32,

    /// Initial window height
    #[arg(long, default_value_t = 400)]
    pub height: i32,
}

impl Args {
    pub fn sample_source(&self, output_rate: u32) -> SampleSource {
        match &self.samples {
            Some(dir) => SampleSource::Directory(dir.clone()),
            None => SampleSource::Tone {
                waveform: self.waveform,
                sample_rate: output_rate,
            },
        }
    }

    pub fn window_conf(&self) -> Conf {
        Conf {
            window_title: "Touch Piano".into(),
            fullscreen: false,
            sample_count: 1,
            window_width: self.width.max(1),
            window_height: self.height.max(1),
            high_dpi: false,
            window_resizable: true,
            ..Default::default()
        }
    }
}

fn parse_level(value: &str) -> Result<f32, String> {
    let level: f32 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(format!("level must be between 0 and 1, got {level}"))
    }
}
