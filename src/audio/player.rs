use crate::capability::{PlaybackCapability, PlayerStatus};
use crate::remote;
use anyhow::Result;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};

enum PlayerCommand {
    Replace {
        path: PathBuf,
        // Keeps a fetched remote source on disk while it is bound
        guard: Option<NamedTempFile>,
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        reply: oneshot::Sender<Result<()>>,
    },
    Pause,
    SetVolume(f32),
    Query {
        reply: oneshot::Sender<PlayerSnapshot>,
    },
}

#[derive(Debug, Clone, Copy)]
struct PlayerSnapshot {
    status: PlayerStatus,
    volume: f32,
}

/// Playback engine using a dedicated blocking thread for the audio output
///
/// The rodio output stream is tied to the thread that opened it, so all
/// playback work runs on one thread per player. Commands arrive over an
/// unbounded channel and queries reply over oneshot channels, keeping every
/// handle method non-blocking. Multiple players can be live at once; each
/// owns its own output stream.
pub struct RodioPlayer {
    name: &'static str,
    stream: OutputStream,
    sink: Option<Sink>,
    duration_ms: Option<u64>,
    volume: f32,
    // Held for the lifetime of the bound source
    source_guard: Option<NamedTempFile>,
    loaded: bool,
}

impl RodioPlayer {
    /// Spawn a player thread and return a handle to it
    ///
    /// `name` labels the player in diagnostics ("primary", "recording").
    pub async fn spawn(name: &'static str) -> Result<PlayerHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (init_tx, init_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("player-{}", name))
            .spawn(move || Self::thread_main(name, rx, init_tx))
            .map_err(|e| anyhow::anyhow!("Failed to spawn player thread: {}", e))?;

        init_rx
            .await
            .map_err(|e| anyhow::anyhow!("Player thread exited during startup: {}", e))??;

        Ok(PlayerHandle { tx })
    }

    fn thread_main(
        name: &'static str,
        mut rx: mpsc::UnboundedReceiver<PlayerCommand>,
        init_tx: oneshot::Sender<Result<()>>,
    ) {
        let stream = match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => {
                let _ = init_tx.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = init_tx.send(Err(anyhow::anyhow!(
                    "Failed to open audio output stream: {}",
                    e
                )));
                return;
            }
        };

        let mut player = Self {
            name,
            stream,
            sink: None,
            duration_ms: None,
            volume: 1.0,
            source_guard: None,
            loaded: false,
        };

        while let Some(cmd) = rx.blocking_recv() {
            player.handle_command(cmd);
        }

        tracing::debug!("Player '{}' shutting down", player.name);
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::Replace { path, guard, reply } => {
                let _ = reply.send(self.replace(path, guard));
            }
            PlayerCommand::Play { reply } => {
                let _ = reply.send(self.play());
            }
            PlayerCommand::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
            }
            PlayerCommand::SetVolume(volume) => {
                self.volume = volume;
                if let Some(sink) = &self.sink {
                    sink.set_volume(volume);
                }
            }
            PlayerCommand::Query { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn replace(&mut self, path: PathBuf, guard: Option<NamedTempFile>) -> Result<()> {
        let file = File::open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open {:?}: {}", path, e))?;

        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| anyhow::anyhow!("Failed to decode {:?}: {}", path, e))?;

        let duration_ms = decoder
            .total_duration()
            .map(|duration| duration.as_millis() as u64);

        // Only swap state once the new source decoded; a failed replace
        // leaves the previous source bound.
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        if let Some(old_guard) = self.source_guard.take() {
            tracing::debug!(
                "Player '{}' releasing fetched source {:?}",
                self.name,
                old_guard.path()
            );
        }

        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.volume);
        sink.append(decoder);
        sink.pause();

        self.sink = Some(sink);
        self.duration_ms = duration_ms;
        self.source_guard = guard;
        self.loaded = true;

        tracing::info!("Player '{}' bound source {:?}", self.name, path);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        match &self.sink {
            Some(sink) => {
                sink.play();
                Ok(())
            }
            None => Err(anyhow::anyhow!("No source loaded")),
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        let (playing, position_ms) = match &self.sink {
            Some(sink) => (
                !sink.is_paused() && !sink.empty(),
                sink.get_pos().as_millis() as u64,
            ),
            None => (false, 0),
        };

        PlayerSnapshot {
            status: PlayerStatus {
                is_loaded: self.loaded,
                playing,
                position_ms,
                duration_ms: self.duration_ms,
            },
            volume: self.volume,
        }
    }
}

/// Handle for communicating with a player thread
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    async fn query(&self) -> Option<PlayerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PlayerCommand::Query { reply }).ok()?;
        rx.await.ok()
    }
}

#[async_trait]
impl PlaybackCapability for PlayerHandle {
    async fn replace(&self, uri: &str) -> Result<()> {
        let (path, guard) = remote::resolve(uri).await?;

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Replace { path, guard, reply })
            .map_err(|e| anyhow::anyhow!("Failed to send replace command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive replace response: {}", e))?
    }

    async fn play(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Play { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send play command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive play response: {}", e))?
    }

    fn pause(&self) {
        let _ = self.tx.send(PlayerCommand::Pause);
    }

    fn set_volume(&self, volume: f32) {
        let _ = self.tx.send(PlayerCommand::SetVolume(volume));
    }

    async fn volume(&self) -> f32 {
        self.query().await.map(|s| s.volume).unwrap_or(0.0)
    }

    async fn duration_ms(&self) -> Option<u64> {
        self.query().await.and_then(|s| s.status.duration_ms)
    }

    async fn status(&self) -> PlayerStatus {
        self.query().await.map(|s| s.status).unwrap_or_default()
    }
}
