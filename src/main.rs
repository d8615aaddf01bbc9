mod audio;
mod capability;
mod config;
mod event_log;
mod messages;
mod remote;
mod sequencer;

use audio::{AudioFormat, Recorder, RecorderHandle, RodioPlayer, SystemAudioSession};
use config::Config;
use event_log::EventLog;
use sequencer::Sequencer;

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting soundcheck audio test harness");

    let config = Config::load()?;
    config.validate()?;

    // The recorder actor owns a cpal::Stream, which is !Send; everything that
    // talks to it runs inside a LocalSet
    let local = tokio::task::LocalSet::new();

    local.run_until(async move { run_app(config).await }).await
}

async fn run_app(config: Config) -> Result<()> {
    let format = AudioFormat {
        sample_rate: config.sample_rate,
        channels: config.channels,
    };

    let (audio_tx, audio_rx) = mpsc::channel(100);
    let (recorder_tx, recorder_rx) = mpsc::channel(10);
    let recorder = Recorder::new(format, recorder_rx, audio_rx, audio_tx);
    let recorder_handle = RecorderHandle::new(recorder_tx);
    tokio::task::spawn_local(recorder.run());

    // Each player owns its own output thread and stream
    let player = RodioPlayer::spawn("primary").await?;
    let recording_player = RodioPlayer::spawn("recording").await?;

    let session = SystemAudioSession::new();
    let log = EventLog::new();

    let mut sequencer = Sequencer::new(
        Arc::new(player),
        Arc::new(recording_player),
        Arc::new(recorder_handle),
        Arc::new(session.clone()),
        config.test_audio_url,
        log.clone(),
    );

    sequencer.setup().await;
    let mut printed = print_new_entries(&log, 0);

    println!("Commands: load, play, pause, rec, stop, playrec, state, log, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Main event loop
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Stdin closed, shutting down");
                    break;
                };

                match line.trim() {
                    "" => {}
                    "load" => sequencer.load_audio().await,
                    "play" => sequencer.start_playing().await,
                    "pause" => sequencer.pause_audio().await,
                    "rec" => sequencer.start_recording().await,
                    "stop" => sequencer.stop_recording().await,
                    "playrec" => sequencer.play_recording().await,
                    "state" => {
                        println!("{:#?}", sequencer.state());
                        println!("Audio mode: {:?}", session.current_mode());
                    }
                    "log" => {
                        for entry in log.entries() {
                            println!("{}", entry.formatted());
                        }
                    }
                    "quit" | "exit" => break,
                    other => println!("Unknown command: {}", other),
                }

                printed = print_new_entries(&log, printed);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    tracing::info!("Soundcheck shutdown complete");
    Ok(())
}

/// Print entries appended since the last call, returning the new high-water mark
fn print_new_entries(log: &EventLog, printed: usize) -> usize {
    let entries = log.entries();
    for entry in &entries[printed..] {
        println!("{}", entry.formatted());
    }
    entries.len()
}
