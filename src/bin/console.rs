//! Console Jukebox
//!
//! Runs one local session without a signaling stack: digits typed on stdin
//! drive the menu and the session's audio is written to stdout as raw PCM
//! at the transport cadence, e.g.
//!
//! ```text
//! jukebox-console config.toml | aplay -f S16_LE -r 16000 -c 1
//! ```

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dtmf_jukebox::{
    codec::FfmpegLauncher,
    config::AppConfig,
    menu::ThemeCatalog,
    session::{SessionResources, ShutdownRegistry, Switchboard},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries audio
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref()).context("loading config")?;
    let format = config.audio.format();

    tracing::info!(
        "Using {}Hz sample rate, {}-channel audio, with {}ms frame time.",
        format.sample_rate,
        format.channels,
        format.frame_seconds() * 1000.0
    );

    let catalog = match ThemeCatalog::load(&config.catalog.sound_dir, &config.catalog.themes) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("{}. Exiting...", e);
            std::process::exit(1);
        }
    };

    let switchboard = Arc::new(Switchboard::new(SessionResources {
        catalog: Arc::new(catalog),
        launcher: Arc::new(FfmpegLauncher::new(
            config.audio.ffmpeg_path.clone(),
            config.audio.gain,
        )),
        format,
        pipeline: config.pipeline.clone(),
        sound_dir: config.catalog.sound_dir.clone(),
        registry: Arc::new(ShutdownRegistry::new()),
    }));

    let session = switchboard.answer().context("starting session")?;
    let port = session.on_established();

    // Keypad input; a plain thread so a pending read never holds up exit
    {
        let session = session.clone();
        std::thread::Builder::new()
            .name("keypad".into())
            .spawn(move || {
                for line in std::io::stdin().lines().map_while(|l| l.ok()) {
                    for digit in line.chars().filter(|c| !c.is_whitespace()) {
                        session.on_digit(digit);
                    }
                }
            })
            .context("spawning keypad reader")?;
    }

    // Interrupt
    let interrupt = {
        let switchboard = switchboard.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let stopped = tokio::task::spawn_blocking(move || switchboard.shutdown_all()).await;
                tracing::info!("Stopped {} session(s)", stopped.unwrap_or(0));
            }
        })
    };

    // Transport cadence
    let mut ticker = tokio::time::interval(Duration::from_micros(format.frame_time_us as u64));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stdout = std::io::stdout().lock();

    tracing::info!("Waiting for digits on stdin...");
    while !switchboard.root_signal().is_triggered() {
        ticker.tick().await;
        let frame = port.next_frame();
        if let Err(e) = stdout.write_all(&frame) {
            tracing::info!("Audio sink closed: {}", e);
            break;
        }
    }

    let status = session.status();
    tracing::info!(
        frames = status.frames_served,
        silent = status.silent_frames,
        "Console session finished"
    );

    if switchboard.root_signal().is_triggered() {
        // Ctrl+C: the interrupt task owns the shutdown
        interrupt.await.context("waiting for interrupt shutdown")?;
    } else {
        interrupt.abort();
        let switchboard = switchboard.clone();
        let stopped = tokio::task::spawn_blocking(move || switchboard.shutdown_all())
            .await
            .context("shutting down")?;
        tracing::info!("Stopped {} session(s)", stopped);
    }

    Ok(())
}
