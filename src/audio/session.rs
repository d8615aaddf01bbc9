use crate::capability::{AudioMode, AudioSessionCapability, PermissionStatus};
use anyhow::Result;
use async_trait::async_trait;
use cpal::traits::HostTrait;
use std::sync::{Arc, Mutex};

/// Process-wide audio session for desktop hosts
///
/// Desktop platforms have no permission prompt and no routing switch to
/// flip, so the permission query probes for a usable input device and the
/// mode is retained as the session's current routing profile.
#[derive(Clone, Default)]
pub struct SystemAudioSession {
    mode: Arc<Mutex<AudioMode>>,
}

impl SystemAudioSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_mode(&self) -> AudioMode {
        match self.mode.lock() {
            Ok(mode) => *mode,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl AudioSessionCapability for SystemAudioSession {
    async fn request_recording_permission(&self) -> Result<PermissionStatus> {
        // Device enumeration can block on some hosts
        let granted = tokio::task::spawn_blocking(|| {
            cpal::default_host().default_input_device().is_some()
        })
        .await
        .map_err(|e| anyhow::anyhow!("Permission probe task failed: {}", e))?;

        Ok(PermissionStatus { granted })
    }

    async fn set_mode(&self, mode: AudioMode) -> Result<()> {
        match self.mode.lock() {
            Ok(mut current) => *current = mode,
            Err(poisoned) => *poisoned.into_inner() = mode,
        }

        tracing::info!(
            "Audio mode set: allows_recording={}, interruption={:?}",
            mode.allows_recording,
            mode.interruption_mode
        );
        Ok(())
    }
}
