use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

/// Seconds of audio the ring buffer can hold before the callback overwrites
const RING_CAPACITY_SECS: f32 = 30.0;

/// Upper bound per forwarded chunk; smaller batches are sent as they arrive
const MAX_CHUNK_SECS: f32 = 0.25;

pub struct AudioCapture;

impl AudioCapture {
    /// Open the default input device and start streaming samples
    ///
    /// The returned stream must stay alive for capture to continue; dropping
    /// it stops the device callback. Interleaved f32 samples arrive on
    /// `chunk_tx` in batches. The bridge task exits once the receiving side
    /// of `chunk_tx` is dropped.
    pub fn start(format: AudioFormat, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<cpal::Stream> {
        let device = cpal::default_host()
            .default_input_device()
            .context("No input audio device available")?;

        if let Ok(name) = device.name() {
            tracing::debug!("Capturing from input device: {}", name);
        }

        let ring = HeapRb::<f32>::new(format.samples_for_duration(RING_CAPACITY_SECS));
        let (mut producer, consumer) = ring.split();

        let wakeup = Arc::new(Notify::new());
        let callback_wakeup = wakeup.clone();

        let stream = device
            .build_input_stream(
                &StreamConfig {
                    channels: format.channels,
                    sample_rate: SampleRate(format.sample_rate),
                    buffer_size: BufferSize::Default,
                },
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    callback_wakeup.notify_one();
                },
                |err| tracing::error!("Audio capture stream error: {}", err),
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;

        let max_chunk = format.samples_for_duration(MAX_CHUNK_SECS);
        tokio::task::spawn_local(bridge(consumer, chunk_tx, max_chunk, wakeup));

        tracing::info!(
            "Audio capture started: {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );
        Ok(stream)
    }
}

/// Move samples from the device ring buffer onto the async channel
///
/// Forwards whatever is buffered on each wakeup, capped at `max_chunk` per
/// send, so the stop-time drain only misses samples pushed after the last
/// wakeup.
async fn bridge(
    mut consumer: impl Consumer<Item = f32>,
    tx: mpsc::Sender<Vec<f32>>,
    max_chunk: usize,
    wakeup: Arc<Notify>,
) {
    loop {
        wakeup.notified().await;

        while consumer.occupied_len() > 0 {
            let batch = consumer.occupied_len().min(max_chunk);
            let mut chunk = vec![0.0f32; batch];
            let n = consumer.pop_slice(&mut chunk);
            chunk.truncate(n);

            if tx.send(chunk).await.is_err() {
                return;
            }
        }
    }
}
