use super::{AudioCapture, AudioFormat, AudioSink, WavSink};
use crate::capability::RecordingCapability;
use crate::messages::RecorderCommand;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

/// Coordinates audio capture and encoding
///
/// This actor owns the capture stream and the streaming encoder and exposes
/// the prepare/record/stop lifecycle:
/// - Prepare allocates a fresh WAV target and arms the encoder
/// - Record starts the capture stream into the armed encoder
/// - Stop drains remaining chunks, finalizes the file and keeps it alive as
///   the last recording; its path is the opaque URI handed to playback
///
/// The actor owns a cpal::Stream and is therefore !Send; spawn it with
/// tokio::task::spawn_local inside a LocalSet.
pub struct Recorder {
    format: AudioFormat,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    audio_rx: mpsc::Receiver<Vec<f32>>,
    audio_tx: mpsc::Sender<Vec<f32>>,
    sink: Option<Box<dyn AudioSink + Send>>,
    armed_target: Option<NamedTempFile>,
    last_recording: Option<NamedTempFile>,
    stream: Option<cpal::Stream>,
    recording: bool,
}

impl Recorder {
    pub fn new(
        format: AudioFormat,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
        audio_rx: mpsc::Receiver<Vec<f32>>,
        audio_tx: mpsc::Sender<Vec<f32>>,
    ) -> Self {
        Self {
            format,
            cmd_rx,
            audio_rx,
            audio_tx,
            sink: None,
            armed_target: None,
            last_recording: None,
            stream: None,
            recording: false,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Handle commands from the sequencer
                Some(cmd) = self.cmd_rx.recv() => {
                    self.handle_command(cmd).await;
                }

                // Receive and encode audio chunks (only when recording)
                Some(chunk) = self.audio_rx.recv(), if self.recording => {
                    if let Some(sink) = self.sink.as_mut() {
                        if let Err(e) = sink.write_chunk(chunk) {
                            tracing::error!("Failed to write audio chunk: {}", e);
                            self.recording = false;
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: RecorderCommand) {
        match cmd {
            RecorderCommand::Prepare(reply) => {
                let _ = reply.send(self.prepare());
            }

            RecorderCommand::Record(reply) => {
                let _ = reply.send(self.start_capture());
            }

            RecorderCommand::Stop(reply) => {
                let _ = reply.send(self.stop_capture().await);
            }

            RecorderCommand::IsRecording(reply) => {
                let _ = reply.send(self.recording);
            }

            RecorderCommand::Uri(reply) => {
                let uri = self.last_recording.as_ref().map(|f| f.path().to_path_buf());
                let _ = reply.send(uri);
            }
        }
    }

    fn prepare(&mut self) -> Result<()> {
        if self.recording {
            return Err(anyhow::anyhow!("Recorder is busy with an active recording"));
        }

        let target = tempfile::Builder::new()
            .prefix("soundcheck-")
            .suffix(".wav")
            .tempfile()?;

        let sink = WavSink::new(target.path().to_path_buf(), self.format)?;
        self.sink = Some(Box::new(sink));
        self.armed_target = Some(target);

        tracing::info!("Recorder armed");
        Ok(())
    }

    fn start_capture(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Err(anyhow::anyhow!("Recorder is not prepared"));
        }

        let stream = AudioCapture::start(self.format, self.audio_tx.clone())?;
        self.stream = Some(stream);
        self.recording = true;

        tracing::info!("Recording started");
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<PathBuf> {
        if !self.recording && self.stream.is_none() {
            return Err(anyhow::anyhow!("Recorder is not recording"));
        }

        self.recording = false;

        // Drop the stream to stop audio capture
        self.stream = None;

        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| anyhow::anyhow!("Recorder has no armed encoder"))?;

        // Drain any remaining audio chunks from the channel into the encoder
        while let Ok(chunk) = self.audio_rx.try_recv() {
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::error!("Failed to write audio chunk during drain: {}", e);
                break;
            }
        }

        // Replace the audio channel with a fresh one for the next recording.
        // Dropping the old receiver makes the bridge task's tx.send() fail,
        // which signals it to exit cleanly.
        let (new_audio_tx, new_audio_rx) = mpsc::channel(100);
        self.audio_tx = new_audio_tx;
        self.audio_rx = new_audio_rx;

        // Give the bridge task a moment to receive the Err from its send and exit
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let samples = sink.finalize().await?;

        let finished = self
            .armed_target
            .take()
            .ok_or_else(|| anyhow::anyhow!("Recording target was not created"))?;
        let path = finished.path().to_path_buf();

        // Keep the temp file alive until the next recording replaces it,
        // so the URI stays playable.
        self.last_recording = Some(finished);

        let recorded_ms = self.format.duration_ms(samples);
        tracing::info!(
            "Recording stopped: {} samples (~{}ms) at {:?}",
            samples,
            recorded_ms,
            path
        );

        Ok(path)
    }
}

/// Handle for communicating with the Recorder
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> RecorderCommand,
    ) -> Result<T> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send recorder command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive recorder response: {}", e))
    }
}

#[async_trait]
impl RecordingCapability for RecorderHandle {
    async fn prepare(&self) -> Result<()> {
        self.request(RecorderCommand::Prepare).await?
    }

    async fn record(&self) -> Result<()> {
        self.request(RecorderCommand::Record).await?
    }

    async fn stop(&self) -> Result<()> {
        self.request(RecorderCommand::Stop).await?.map(|_path| ())
    }

    async fn is_recording(&self) -> bool {
        self.request(RecorderCommand::IsRecording)
            .await
            .unwrap_or(false)
    }

    async fn uri(&self) -> Option<String> {
        self.request(RecorderCommand::Uri)
            .await
            .ok()
            .flatten()
            .map(|path| path.to_string_lossy().into_owned())
    }
}
