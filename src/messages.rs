use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Commands for the recorder actor
pub enum RecorderCommand {
    Prepare(oneshot::Sender<Result<()>>),
    Record(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<PathBuf>>),
    IsRecording(oneshot::Sender<bool>),
    Uri(oneshot::Sender<Option<PathBuf>>),
}
