use anyhow::Result;
use async_trait::async_trait;

/// Trait for streaming audio encoders
///
/// The recorder arms an encoder when it prepares and streams capture chunks
/// into it while recording runs. Finalizing closes the artifact and reports
/// how many samples were encoded, so callers can derive the recorded duration.
#[async_trait]
pub trait AudioSink: Send {
    /// Write audio samples (streaming, called repeatedly during recording).
    /// The Vec is moved to avoid copying.
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Finalize and close the artifact, returning the total samples written
    async fn finalize(&mut self) -> Result<u64>;
}
