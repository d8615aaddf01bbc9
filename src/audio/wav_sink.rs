use super::format::AudioFormat;
use super::sink::AudioSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    Append(Vec<f32>),
    Close { reply: oneshot::Sender<Result<u64>> },
}

/// WAV encoder running on a dedicated blocking thread
///
/// Disk writes never touch the capture path; chunks are forwarded over a
/// channel and written in arrival order. Closing flushes the header and
/// reports how many samples were encoded.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    pub fn new(path: PathBuf, format: AudioFormat) -> Result<Self> {
        let writer = WavWriter::create(
            &path,
            WavSpec {
                channels: format.channels,
                sample_rate: format.sample_rate,
                bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
                sample_format: SampleFormat::Int,
            },
        )
        .with_context(|| format!("Failed to create WAV writer at {:?}", path))?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || encode_loop(writer, rx));

        Ok(Self { tx })
    }
}

fn encode_loop(mut writer: WavWriter<BufWriter<File>>, mut rx: mpsc::UnboundedReceiver<WavCommand>) {
    let mut samples_written: u64 = 0;
    let mut peak: f32 = 0.0;

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            WavCommand::Append(samples) => {
                for sample in samples {
                    peak = peak.max(sample.abs());
                    if let Err(e) = writer.write_sample(quantize(sample)) {
                        tracing::error!("Failed to write sample: {}", e);
                        return;
                    }
                    samples_written += 1;
                }
            }
            WavCommand::Close { reply } => {
                tracing::debug!(
                    "Closing WAV: {} samples, peak amplitude {:.3}",
                    samples_written,
                    peak
                );
                let result = writer
                    .finalize()
                    .map(|_| samples_written)
                    .map_err(|e| anyhow::anyhow!("Failed to finalize WAV: {}", e));
                let _ = reply.send(result);
                return;
            }
        }
    }
}

/// Map a normalized f32 sample onto the signed 16-bit range
fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[async_trait]
impl AudioSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(WavCommand::Append(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(&mut self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Close { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send close command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive close response: {}", e))?
    }
}
