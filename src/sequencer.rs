use crate::capability::{
    AudioMode, AudioSessionCapability, PlaybackCapability, RecordingCapability,
};
use crate::event_log::EventLog;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State exposed to the UI collaborator for enabling controls and spinners
#[derive(Debug, Clone, Default)]
pub struct SequencerState {
    /// A playable source is bound to the primary player
    pub audio_loaded: bool,
    /// The recording subsystem is armed
    pub recorder_prepared: bool,
    /// Handle to the last finished recording; overwritten, never accumulated
    pub last_recording_uri: Option<String>,
    /// Busy flags, one per spinner
    pub loading_playback: bool,
    pub starting_recording: bool,
    pub starting_recording_playback: bool,
}

enum ProbeKind {
    Loaded,
    AfterPlay,
}

/// Drives user-triggered audio operations as single-pass async flows
///
/// Each flow logs an attempt, yields to the scheduler once before the heavy
/// call so a just-set busy flag is observable, awaits the capability call,
/// then logs the outcome. Capability failures never escape a flow; they all
/// become log entries, and busy flags are reset on every exit path.
///
/// Two independent playback capabilities are driven: the primary player for
/// the test audio and a dedicated player for recording playback. Only one is
/// expected to be audible at a time; playing a recording pauses the primary
/// first.
pub struct Sequencer {
    log: EventLog,
    player: Arc<dyn PlaybackCapability>,
    recording_player: Arc<dyn PlaybackCapability>,
    recorder: Arc<dyn RecordingCapability>,
    session: Arc<dyn AudioSessionCapability>,
    test_audio_url: String,
    state: SequencerState,
}

impl Sequencer {
    /// Delay before the post-load status snapshot of the recording player
    const LOADED_PROBE_DELAY: Duration = Duration::from_millis(100);
    /// Delay before the post-play status snapshot of the recording player
    const AFTER_PLAY_PROBE_DELAY: Duration = Duration::from_millis(200);

    pub fn new(
        player: Arc<dyn PlaybackCapability>,
        recording_player: Arc<dyn PlaybackCapability>,
        recorder: Arc<dyn RecordingCapability>,
        session: Arc<dyn AudioSessionCapability>,
        test_audio_url: impl Into<String>,
        log: EventLog,
    ) -> Self {
        Self {
            log,
            player,
            recording_player,
            recorder,
            session,
            test_audio_url: test_audio_url.into(),
            state: SequencerState::default(),
        }
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Runs once at mount: request recording permission and log the outcome.
    ///
    /// Denial installs no gate; a later recording attempt fails at the
    /// capability and is logged as a recording error.
    pub async fn setup(&mut self) {
        self.log.record("Requesting recording permission...");

        match self.session.request_recording_permission().await {
            Ok(status) if status.granted => self.log.record("Recording permission granted"),
            Ok(_) => self.log.record("Recording permission denied"),
            Err(e) => self.log.record(format!("Permission request error: {}", e)),
        }
    }

    /// Bind the configured test audio URL to the primary player
    pub async fn load_audio(&mut self) {
        self.log.record("Loading test audio...");
        let started = Instant::now();

        match self.player.replace(&self.test_audio_url).await {
            Ok(()) => {
                self.log.record_since("Audio loaded", started);
                self.state.audio_loaded = true;
            }
            Err(e) => self.log.record(format!("Audio load error: {}", e)),
        }
    }

    /// Start playback of the loaded test audio
    pub async fn start_playing(&mut self) {
        if !self.state.audio_loaded {
            self.log.record("Load audio first");
            return;
        }

        self.state.loading_playback = true;
        // Let the collaborator render the spinner before the potentially slow call
        tokio::task::yield_now().await;

        self.log.record("Attempting to start audio playback...");
        let started = Instant::now();

        match self.player.play().await {
            Ok(()) => self.log.record(format!(
                "Audio playback started after {}ms",
                started.elapsed().as_millis()
            )),
            Err(e) => self.log.record(format!("Audio play error: {}", e)),
        }

        self.state.loading_playback = false;
    }

    /// Pause the primary player if it is currently playing
    pub async fn pause_audio(&mut self) {
        if !self.player.status().await.playing {
            self.log.record("Audio not playing");
            return;
        }

        self.player.pause();
        self.log.record("Audio paused");
    }

    /// Configure the session for recording, arm the recorder and begin capturing
    pub async fn start_recording(&mut self) {
        if self.state.starting_recording {
            tracing::debug!("start_recording already in flight, ignoring");
            return;
        }

        self.state.starting_recording = true;
        self.log.record("Preparing to record...");
        tokio::task::yield_now().await;

        let started = Instant::now();

        match self.start_recording_steps().await {
            Ok(()) => {
                self.log.record(format!(
                    "Recording started after {}ms",
                    started.elapsed().as_millis()
                ));
                self.state.recorder_prepared = true;
            }
            Err(e) => self.log.record(format!("Recording error: {:#}", e)),
        }

        self.state.starting_recording = false;
    }

    async fn start_recording_steps(&self) -> Result<()> {
        self.session
            .set_mode(AudioMode::recording())
            .await
            .context("Failed to set recording audio mode")?;

        self.recorder
            .prepare()
            .await
            .context("Failed to prepare recorder")?;

        self.log.record("Calling record()");
        self.recorder
            .record()
            .await
            .context("Failed to start recorder")?;

        Ok(())
    }

    /// Stop the active recording and restore the non-recording audio mode
    pub async fn stop_recording(&mut self) {
        if !self.recorder.is_recording().await {
            self.log.record("Not recording");
            return;
        }

        self.log.record("Stopping recording...");
        let started = Instant::now();

        match self.recorder.stop().await {
            Ok(()) => {
                self.log.record_since("Recording stopped", started);

                if let Some(uri) = self.recorder.uri().await.filter(|uri| !uri.is_empty()) {
                    self.state.last_recording_uri = Some(uri);
                    // Reset for the next recording
                    self.state.recorder_prepared = false;
                }
            }
            Err(e) => self.log.record(format!("Stop error: {}", e)),
        }

        // The mode is restored whether or not the stop succeeded, and its
        // outcome is logged independently of the stop outcome.
        self.log.record("Restoring playback audio mode...");
        match self.session.set_mode(AudioMode::playback()).await {
            Ok(()) => self.log.record("Audio mode restored"),
            Err(e) => self.log.record(format!("Audio mode error: {}", e)),
        }
    }

    /// Play the last finished recording on the dedicated player
    pub async fn play_recording(&mut self) {
        let Some(uri) = self.state.last_recording_uri.clone() else {
            self.log.record("No recording available");
            return;
        };

        if self.state.starting_recording_playback {
            tracing::debug!("play_recording already in flight, ignoring");
            return;
        }

        self.state.starting_recording_playback = true;
        tokio::task::yield_now().await;

        // Only one player should be audible at a time
        if self.player.status().await.playing {
            self.player.pause();
            self.log.record("Paused background audio");
        }

        self.log.record("Loading recorded audio...");
        self.log.record(format!("Recording URI: {}", uri));

        if let Err(e) = self.play_recording_steps(&uri).await {
            self.log.record(format!("Playback error: {}", e));
        }

        // Cleared once the main play call resolved; the delayed status
        // probes keep running on their own.
        self.state.starting_recording_playback = false;
    }

    async fn play_recording_steps(&self, uri: &str) -> Result<()> {
        let started = Instant::now();
        self.recording_player.replace(uri).await?;
        self.log.record(format!(
            "Recording loaded in {}ms",
            started.elapsed().as_millis()
        ));

        match self.recording_player.duration_ms().await {
            Some(duration) => self
                .log
                .record(format!("Recording duration (player): {}ms", duration)),
            None => self.log.record("Recording duration (player): unknown"),
        }

        self.spawn_status_probe(Self::LOADED_PROBE_DELAY, ProbeKind::Loaded);

        self.recording_player.set_volume(1.0);
        self.log.record(format!(
            "Volume set to: {}",
            self.recording_player.volume().await
        ));

        self.log.record("Attempting to play recording...");
        let play_started = Instant::now();
        self.recording_player.play().await?;
        self.log.record(format!(
            "Play command sent after {}ms",
            play_started.elapsed().as_millis()
        ));

        self.spawn_status_probe(Self::AFTER_PLAY_PROBE_DELAY, ProbeKind::AfterPlay);

        Ok(())
    }

    /// Schedule a best-effort diagnostic snapshot of the recording player.
    /// Probes only append log entries; they never touch sequencer state.
    fn spawn_status_probe(&self, delay: Duration, kind: ProbeKind) {
        let log = self.log.clone();
        let player = self.recording_player.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let status = player.status().await;

            match kind {
                ProbeKind::Loaded => {
                    log.record(format!("Recording status loaded: {}", status.is_loaded));
                    match status.duration_ms {
                        Some(duration) => {
                            log.record(format!("Recording status duration: {}ms", duration))
                        }
                        None => log.record("Recording status duration: unknown"),
                    }
                    log.record(format!("Recording status playing: {}", status.playing));
                }
                ProbeKind::AfterPlay => {
                    log.record(format!("After play - playing: {}", status.playing));
                    log.record(format!("After play - position: {}ms", status.position_ms));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{PermissionStatus, PlayerStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Mocks record operation calls so precondition tests can assert that a
    // short-circuited flow issued zero operations. Status queries are not
    // operations and are not recorded.

    #[derive(Default)]
    struct MockPlayer {
        ops: Mutex<Vec<String>>,
        fail_replace: bool,
        fail_play: bool,
        playing: Mutex<bool>,
        loaded: Mutex<bool>,
        volume: Mutex<f32>,
        duration_ms: Option<u64>,
    }

    impl MockPlayer {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn set_playing(&self, playing: bool) {
            *self.playing.lock().unwrap() = playing;
        }
    }

    #[async_trait]
    impl PlaybackCapability for MockPlayer {
        async fn replace(&self, uri: &str) -> Result<()> {
            self.ops.lock().unwrap().push(format!("replace:{}", uri));
            if self.fail_replace {
                return Err(anyhow::anyhow!("decoder exploded"));
            }
            *self.loaded.lock().unwrap() = true;
            Ok(())
        }

        async fn play(&self) -> Result<()> {
            self.ops.lock().unwrap().push("play".to_string());
            if self.fail_play {
                return Err(anyhow::anyhow!("output device gone"));
            }
            *self.playing.lock().unwrap() = true;
            Ok(())
        }

        fn pause(&self) {
            self.ops.lock().unwrap().push("pause".to_string());
            *self.playing.lock().unwrap() = false;
        }

        fn set_volume(&self, volume: f32) {
            *self.volume.lock().unwrap() = volume;
        }

        async fn volume(&self) -> f32 {
            *self.volume.lock().unwrap()
        }

        async fn duration_ms(&self) -> Option<u64> {
            self.duration_ms
        }

        async fn status(&self) -> PlayerStatus {
            PlayerStatus {
                is_loaded: *self.loaded.lock().unwrap(),
                playing: *self.playing.lock().unwrap(),
                position_ms: 0,
                duration_ms: self.duration_ms,
            }
        }
    }

    #[derive(Default)]
    struct MockRecorder {
        ops: Mutex<Vec<String>>,
        fail_prepare: bool,
        fail_record: bool,
        fail_stop: bool,
        recording: Mutex<bool>,
        uri: Mutex<Option<String>>,
        uri_after_stop: Option<String>,
    }

    impl MockRecorder {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordingCapability for MockRecorder {
        async fn prepare(&self) -> Result<()> {
            self.ops.lock().unwrap().push("prepare".to_string());
            if self.fail_prepare {
                return Err(anyhow::anyhow!("no input device"));
            }
            Ok(())
        }

        async fn record(&self) -> Result<()> {
            self.ops.lock().unwrap().push("record".to_string());
            if self.fail_record {
                return Err(anyhow::anyhow!("stream refused to start"));
            }
            *self.recording.lock().unwrap() = true;
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.ops.lock().unwrap().push("stop".to_string());
            *self.recording.lock().unwrap() = false;
            if self.fail_stop {
                return Err(anyhow::anyhow!("encoder died"));
            }
            *self.uri.lock().unwrap() = self.uri_after_stop.clone();
            Ok(())
        }

        async fn is_recording(&self) -> bool {
            *self.recording.lock().unwrap()
        }

        async fn uri(&self) -> Option<String> {
            self.uri.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct MockSession {
        ops: Mutex<Vec<String>>,
        granted: bool,
        fail_set_mode: bool,
    }

    impl MockSession {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioSessionCapability for MockSession {
        async fn request_recording_permission(&self) -> Result<PermissionStatus> {
            self.ops.lock().unwrap().push("permission".to_string());
            Ok(PermissionStatus {
                granted: self.granted,
            })
        }

        async fn set_mode(&self, mode: AudioMode) -> Result<()> {
            let profile = if mode.allows_recording {
                "recording"
            } else {
                "playback"
            };
            self.ops
                .lock()
                .unwrap()
                .push(format!("set_mode:{}", profile));
            if self.fail_set_mode {
                return Err(anyhow::anyhow!("session is stuck"));
            }
            Ok(())
        }
    }

    const TEST_URL: &str = "https://example.com/test.mp3";
    const MOCK_URI: &str = "/tmp/soundcheck-mock.wav";

    struct Fixture {
        player: Arc<MockPlayer>,
        recording_player: Arc<MockPlayer>,
        recorder: Arc<MockRecorder>,
        session: Arc<MockSession>,
        seq: Sequencer,
    }

    fn fixture_with(
        player: MockPlayer,
        recording_player: MockPlayer,
        recorder: MockRecorder,
        session: MockSession,
    ) -> Fixture {
        let player = Arc::new(player);
        let recording_player = Arc::new(recording_player);
        let recorder = Arc::new(recorder);
        let session = Arc::new(session);

        let seq = Sequencer::new(
            player.clone(),
            recording_player.clone(),
            recorder.clone(),
            session.clone(),
            TEST_URL,
            EventLog::new(),
        );

        Fixture {
            player,
            recording_player,
            recorder,
            session,
            seq,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                uri_after_stop: Some(MOCK_URI.to_string()),
                ..MockRecorder::default()
            },
            MockSession {
                granted: true,
                ..MockSession::default()
            },
        )
    }

    fn messages(seq: &Sequencer) -> Vec<String> {
        seq.log()
            .entries()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    fn position(seq: &Sequencer, needle: &str) -> usize {
        messages(seq)
            .iter()
            .position(|m| m.contains(needle))
            .unwrap_or_else(|| panic!("no log entry containing {:?}", needle))
    }

    #[tokio::test]
    async fn test_setup_logs_permission_granted() {
        let mut f = fixture();
        f.seq.setup().await;

        assert!(messages(&f.seq).contains(&"Recording permission granted".to_string()));
        assert_eq!(f.session.ops(), vec!["permission"]);
    }

    #[tokio::test]
    async fn test_setup_logs_permission_denied_without_gating() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder::default(),
            MockSession::default(),
        );
        f.seq.setup().await;
        assert!(messages(&f.seq).contains(&"Recording permission denied".to_string()));

        // No gate: a later recording attempt still reaches the capabilities
        f.seq.start_recording().await;
        assert_eq!(f.recorder.ops(), vec!["prepare", "record"]);
    }

    #[tokio::test]
    async fn test_load_audio_success() {
        let mut f = fixture();
        f.seq.load_audio().await;

        assert!(f.seq.state().audio_loaded);
        assert_eq!(f.player.ops(), vec![format!("replace:{}", TEST_URL)]);

        let entries = f.seq.log().entries();
        let loaded = entries
            .iter()
            .find(|e| e.message == "Audio loaded")
            .unwrap();
        assert!(loaded.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_load_audio_failure_leaves_state_unloaded() {
        let mut f = fixture_with(
            MockPlayer {
                fail_replace: true,
                ..MockPlayer::default()
            },
            MockPlayer::default(),
            MockRecorder::default(),
            MockSession::default(),
        );
        f.seq.load_audio().await;

        assert!(!f.seq.state().audio_loaded);
        let entries = f.seq.log().entries();
        let error = entries
            .iter()
            .find(|e| e.message.contains("Audio load error"))
            .unwrap();
        assert!(error.message.contains("decoder exploded"));
        assert_eq!(error.duration_ms, None);
    }

    #[tokio::test]
    async fn test_start_playing_requires_load() {
        let mut f = fixture();
        f.seq.start_playing().await;

        assert_eq!(messages(&f.seq), vec!["Load audio first"]);
        assert!(f.player.ops().is_empty());
        assert!(!f.seq.state().loading_playback);
    }

    #[tokio::test]
    async fn test_load_then_play_end_to_end() {
        let mut f = fixture();
        f.seq.load_audio().await;
        f.seq.start_playing().await;

        let msgs = messages(&f.seq);
        assert!(msgs.iter().any(|m| m.starts_with("Audio playback started after")));
        assert!(!msgs.contains(&"Load audio first".to_string()));
        assert_eq!(
            f.player.ops(),
            vec![format!("replace:{}", TEST_URL), "play".to_string()]
        );
        assert!(!f.seq.state().loading_playback);
    }

    #[tokio::test]
    async fn test_start_playing_failure_clears_busy_flag() {
        let mut f = fixture_with(
            MockPlayer {
                fail_play: true,
                ..MockPlayer::default()
            },
            MockPlayer::default(),
            MockRecorder::default(),
            MockSession::default(),
        );
        f.seq.load_audio().await;
        f.seq.start_playing().await;

        assert!(messages(&f.seq)
            .iter()
            .any(|m| m.contains("Audio play error") && m.contains("output device gone")));
        assert!(!f.seq.state().loading_playback);
    }

    #[tokio::test]
    async fn test_pause_requires_playing() {
        let mut f = fixture();
        f.seq.pause_audio().await;

        assert_eq!(messages(&f.seq), vec!["Audio not playing"]);
        assert!(f.player.ops().is_empty());
    }

    #[tokio::test]
    async fn test_pause_when_playing() {
        let f = fixture();
        f.player.set_playing(true);

        let mut seq = f.seq;
        seq.pause_audio().await;

        assert_eq!(f.player.ops(), vec!["pause"]);
        assert!(messages(&seq).contains(&"Audio paused".to_string()));
    }

    #[tokio::test]
    async fn test_start_recording_success() {
        let mut f = fixture();
        f.seq.start_recording().await;

        assert!(f.seq.state().recorder_prepared);
        assert!(!f.seq.state().starting_recording);
        assert_eq!(f.session.ops(), vec!["set_mode:recording"]);
        assert_eq!(f.recorder.ops(), vec!["prepare", "record"]);

        let msgs = messages(&f.seq);
        assert!(msgs.contains(&"Calling record()".to_string()));
        assert!(msgs.iter().any(|m| m.starts_with("Recording started after")));
    }

    #[tokio::test]
    async fn test_start_recording_mode_failure_aborts_sequence() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder::default(),
            MockSession {
                fail_set_mode: true,
                ..MockSession::default()
            },
        );
        f.seq.start_recording().await;

        // Nothing after the failed step runs
        assert!(f.recorder.ops().is_empty());
        assert!(!f.seq.state().recorder_prepared);
        assert!(!f.seq.state().starting_recording);

        let msgs = messages(&f.seq);
        let error = msgs.iter().find(|m| m.contains("Recording error")).unwrap();
        assert!(error.contains("recording audio mode"));
    }

    #[tokio::test]
    async fn test_start_recording_record_failure_clears_flag() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                fail_record: true,
                ..MockRecorder::default()
            },
            MockSession::default(),
        );
        f.seq.start_recording().await;

        assert!(!f.seq.state().recorder_prepared);
        assert!(!f.seq.state().starting_recording);
        assert!(messages(&f.seq).iter().any(|m| m.contains("Recording error")));
    }

    #[tokio::test]
    async fn test_stop_recording_requires_active_recording() {
        let mut f = fixture();
        f.seq.stop_recording().await;

        assert_eq!(messages(&f.seq), vec!["Not recording"]);
        assert!(f.recorder.ops().is_empty());
    }

    #[tokio::test]
    async fn test_stop_recording_success_captures_uri_and_restores_mode() {
        let mut f = fixture();
        f.seq.start_recording().await;
        assert!(f.seq.state().recorder_prepared);

        f.seq.stop_recording().await;

        assert_eq!(
            f.seq.state().last_recording_uri,
            Some(MOCK_URI.to_string())
        );
        assert!(!f.seq.state().recorder_prepared);

        // The mode restore outcome is logged after the stop outcome
        assert!(position(&f.seq, "Recording stopped") < position(&f.seq, "Audio mode restored"));
        assert_eq!(
            f.session.ops(),
            vec!["set_mode:recording", "set_mode:playback"]
        );

        let entries = f.seq.log().entries();
        let stopped = entries
            .iter()
            .find(|e| e.message == "Recording stopped")
            .unwrap();
        assert!(stopped.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_stop_recording_mode_restore_failure_keeps_uri() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                recording: Mutex::new(true),
                uri_after_stop: Some(MOCK_URI.to_string()),
                ..MockRecorder::default()
            },
            MockSession {
                fail_set_mode: true,
                ..MockSession::default()
            },
        );
        f.seq.stop_recording().await;

        assert_eq!(
            f.seq.state().last_recording_uri,
            Some(MOCK_URI.to_string())
        );
        assert!(messages(&f.seq).iter().any(|m| m.contains("Audio mode error")));
    }

    #[tokio::test]
    async fn test_stop_recording_stop_failure_still_restores_mode() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                recording: Mutex::new(true),
                fail_stop: true,
                ..MockRecorder::default()
            },
            MockSession::default(),
        );
        f.seq.stop_recording().await;

        assert!(f.seq.state().last_recording_uri.is_none());
        let msgs = messages(&f.seq);
        assert!(msgs.iter().any(|m| m.contains("Stop error")));
        assert!(msgs.contains(&"Audio mode restored".to_string()));
        assert_eq!(f.session.ops(), vec!["set_mode:playback"]);
    }

    #[tokio::test]
    async fn test_stop_recording_empty_uri_is_ignored() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                uri_after_stop: None,
                ..MockRecorder::default()
            },
            MockSession::default(),
        );
        f.seq.start_recording().await;
        f.seq.stop_recording().await;

        assert!(f.seq.state().last_recording_uri.is_none());
        // Without a URI the armed state is not reset
        assert!(f.seq.state().recorder_prepared);
    }

    #[tokio::test]
    async fn test_play_recording_requires_recording() {
        let mut f = fixture();
        f.seq.play_recording().await;

        assert_eq!(messages(&f.seq), vec!["No recording available"]);
        assert!(f.recording_player.ops().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_recording_full_flow_with_probes() {
        let mut f = fixture();
        f.seq.start_recording().await;
        f.seq.stop_recording().await;

        // Primary audio is playing; playing the recording must pause it first
        f.player.set_playing(true);

        f.seq.play_recording().await;

        assert_eq!(f.player.ops(), vec!["pause"]);
        assert_eq!(
            f.recording_player.ops(),
            vec![format!("replace:{}", MOCK_URI), "play".to_string()]
        );
        assert_eq!(f.recording_player.volume().await, 1.0);
        assert!(!f.seq.state().starting_recording_playback);

        let msgs = messages(&f.seq);
        assert!(msgs.contains(&"Paused background audio".to_string()));
        assert!(msgs.contains(&format!("Recording URI: {}", MOCK_URI)));
        assert!(msgs.iter().any(|m| m.starts_with("Play command sent after")));

        // The delayed status probes land after the flow already returned
        tokio::time::sleep(Duration::from_millis(300)).await;

        let msgs = messages(&f.seq);
        assert!(msgs.contains(&"Recording status loaded: true".to_string()));
        assert!(msgs.iter().any(|m| m.starts_with("Recording status playing:")));
        assert!(msgs.iter().any(|m| m.starts_with("After play - playing:")));
        assert!(msgs.iter().any(|m| m.starts_with("After play - position:")));

        // Probes never touch sequencer state
        assert!(!f.seq.state().starting_recording_playback);
        assert_eq!(
            f.seq.state().last_recording_uri,
            Some(MOCK_URI.to_string())
        );
    }

    #[tokio::test]
    async fn test_play_recording_replace_failure_clears_flag() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer {
                fail_replace: true,
                ..MockPlayer::default()
            },
            MockRecorder {
                uri_after_stop: Some(MOCK_URI.to_string()),
                ..MockRecorder::default()
            },
            MockSession::default(),
        );
        f.seq.start_recording().await;
        f.seq.stop_recording().await;
        f.seq.play_recording().await;

        // The flow aborts after the failed bind; play is never issued
        assert_eq!(
            f.recording_player.ops(),
            vec![format!("replace:{}", MOCK_URI)]
        );
        assert!(messages(&f.seq).iter().any(|m| m.contains("Playback error")));
        assert!(!f.seq.state().starting_recording_playback);
    }

    #[tokio::test]
    async fn test_start_recording_reentry_is_ignored() {
        let mut f = fixture();
        f.seq.state.starting_recording = true;

        f.seq.start_recording().await;

        assert!(f.recorder.ops().is_empty());
        assert!(f.session.ops().is_empty());
        assert!(f.seq.log().is_empty());
        // The in-flight marker is owned by the first invocation
        assert!(f.seq.state().starting_recording);
    }

    #[tokio::test]
    async fn test_play_recording_reentry_is_ignored() {
        let mut f = fixture();
        f.seq.state.last_recording_uri = Some(MOCK_URI.to_string());
        f.seq.state.starting_recording_playback = true;

        f.seq.play_recording().await;

        assert!(f.recording_player.ops().is_empty());
        assert!(f.seq.log().is_empty());
        assert!(f.seq.state().starting_recording_playback);
    }

    #[tokio::test]
    async fn test_prepare_failure_is_named_in_error() {
        let mut f = fixture_with(
            MockPlayer::default(),
            MockPlayer::default(),
            MockRecorder {
                fail_prepare: true,
                ..MockRecorder::default()
            },
            MockSession::default(),
        );
        f.seq.start_recording().await;

        let msgs = messages(&f.seq);
        let error = msgs.iter().find(|m| m.contains("Recording error")).unwrap();
        assert!(error.contains("prepare recorder") || error.contains("no input device"));
        // The record step never ran
        assert_eq!(f.recorder.ops(), vec!["prepare"]);
    }
}
