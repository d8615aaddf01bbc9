use anyhow::Result;
use async_trait::async_trait;

/// Snapshot of a player's observable state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerStatus {
    pub is_loaded: bool,
    pub playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

/// Result of a recording permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub granted: bool,
}

/// How our audio interacts with other audio on the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionMode {
    DuckOthers,
    DoNotMix,
}

/// Process-wide audio routing configuration
///
/// This is a global setting: it affects routing and mixing for all audio
/// activity in the process, not just one player or recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMode {
    pub allows_recording: bool,
    pub plays_in_silent_mode: bool,
    pub should_play_in_background: bool,
    pub interruption_mode: InterruptionMode,
    pub should_route_through_earpiece: bool,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self::playback()
    }
}

impl AudioMode {
    /// Profile used while a recording session is active
    pub fn recording() -> Self {
        Self {
            allows_recording: true,
            plays_in_silent_mode: true,
            should_play_in_background: false,
            interruption_mode: InterruptionMode::DoNotMix,
            should_route_through_earpiece: false,
        }
    }

    /// Non-recording profile restored after a recording stops
    pub fn playback() -> Self {
        Self {
            allows_recording: false,
            plays_in_silent_mode: true,
            should_play_in_background: true,
            interruption_mode: InterruptionMode::DuckOthers,
            should_route_through_earpiece: false,
        }
    }
}

/// Trait for audio playback engines
///
/// The sequencer drives two independent instances of this capability: a
/// primary player for the test audio and a dedicated player for recording
/// playback. Both may be bound concurrently.
#[async_trait]
pub trait PlaybackCapability: Send + Sync {
    /// Bind a new source, replacing whatever was loaded before.
    /// `uri` is a local path or an http(s) URL.
    async fn replace(&self, uri: &str) -> Result<()>;

    /// Begin or resume playback of the bound source
    async fn play(&self) -> Result<()>;

    /// Pause playback (fire-and-forget)
    fn pause(&self);

    fn set_volume(&self, volume: f32);

    async fn volume(&self) -> f32;

    /// Duration of the bound source, when the engine knows it
    async fn duration_ms(&self) -> Option<u64>;

    async fn status(&self) -> PlayerStatus;
}

/// Trait for audio recording engines
#[async_trait]
pub trait RecordingCapability: Send + Sync {
    /// Arm the recorder: allocate the output target and encoder
    async fn prepare(&self) -> Result<()>;

    /// Begin capturing into the prepared target
    async fn record(&self) -> Result<()>;

    /// Stop capturing and finalize the recording artifact
    async fn stop(&self) -> Result<()>;

    async fn is_recording(&self) -> bool;

    /// Opaque handle to the last finished recording, possibly absent
    async fn uri(&self) -> Option<String>;
}

/// Trait for the process-wide audio session: permissions and routing mode
#[async_trait]
pub trait AudioSessionCapability: Send + Sync {
    async fn request_recording_permission(&self) -> Result<PermissionStatus>;

    async fn set_mode(&self, mode: AudioMode) -> Result<()>;
}
