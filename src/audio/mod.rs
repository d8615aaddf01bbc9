pub mod capture;
pub mod format;
pub mod player;
pub mod recorder;
pub mod session;
pub mod sink;
pub mod wav_sink;

pub use capture::AudioCapture;
pub use format::AudioFormat;
pub use player::{PlayerHandle, RodioPlayer};
pub use recorder::{Recorder, RecorderHandle};
pub use session::SystemAudioSession;
pub use sink::AudioSink;
pub use wav_sink::WavSink;
