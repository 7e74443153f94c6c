mod config;
mod contacts;
mod input;
mod keys;
mod layout;
mod render;
mod samples;
mod sound;
mod tone;
mod tracker;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use macroquad::{input::simulate_mouse_with_touch, prelude::*};
use tokio::runtime::Runtime;

use config::Args;
use input::TouchInput;
use keys::{KEY_COUNT, KeySet};
use render::{BACKGROUND, QuadRenderer};
use samples::spawn_loading;
use sound::{AudioEngine, MAX_STREAMS, PoolPlayer, SoundPool};
use tracker::TouchTracker;

fn window_conf() -> Conf {
    Args::parse().window_conf()
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run(Args::parse()).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // The mouse is tracked as its own contact.
    simulate_mouse_with_touch(false);

    let runtime = Runtime::new().context("tokio runtime")?;
    let pool = Arc::new(Mutex::new(SoundPool::new(KEY_COUNT, MAX_STREAMS)));
    let audio = AudioEngine::start(pool.clone()).context("audio output stream")?;
    if let Ok(mut guard) = pool.lock() {
        guard.set_master_level(args.volume);
    }

    let source = args.sample_source(audio.sample_rate() as u32);
    info!("loading {KEY_COUNT} notes from {source:?}");
    let loading = spawn_loading(&runtime, source, KEY_COUNT);
    let mut pending = KEY_COUNT;

    let mut tracker = TouchTracker::new(KeySet::default(), PoolPlayer::new(pool.clone()));
    let mut surface = (0.0, 0.0);
    let mut touch_input = TouchInput::new();

    loop {
        let size = (screen_width(), screen_height());
        if size != surface {
            tracker.on_size_changed(size.0, size.1);
            surface = size;
        }

        while let Ok(loaded) = loading.try_recv() {
            pending = pending.saturating_sub(1);
            if let (Ok(resource), Ok(mut guard)) = (loaded.result, pool.lock()) {
                debug!(
                    "note {} loaded ({:.2}s)",
                    loaded.note,
                    resource.duration_seconds()
                );
                guard.insert(loaded.note, resource);
            }
            if pending == 0 {
                let loaded = pool.lock().map(|guard| guard.loaded_count()).unwrap_or(0);
                info!("{loaded} of {KEY_COUNT} notes ready");
            }
        }

        for batch in touch_input.poll() {
            let response = tracker.handle(&batch);
            for _ in 0..response.activations {
                debug!("key activated");
            }
            if response.changed {
                let streams = pool.lock().map(|guard| guard.active_streams()).unwrap_or(0);
                debug!(
                    "pressed notes: {:?}, {streams} streams sounding",
                    tracker.pressed_notes()
                );
            }
        }

        clear_background(BACKGROUND);
        tracker.draw(&mut QuadRenderer);

        next_frame().await;
    }
}
