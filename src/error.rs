use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TheoryError {
    #[error("unknown pitch class: {0:?}")]
    UnknownPitchClass(String),

    #[error("invalid note: {0:?}")]
    InvalidNote(String),

    #[error("unknown scale: {0:?}")]
    UnknownScale(String),
}

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("failed to initialize MIDI input: {0}")]
    Init(#[from] midir::InitError),

    #[error("no MIDI input ports available")]
    NoPorts,

    #[error("no MIDI input port matching {0:?}")]
    PortNotFound(String),

    #[error("failed to connect to MIDI input {port}: {message}")]
    Connect { port: String, message: String },

    #[error("failed to start MIDI input thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("MIDI input device disconnected")]
    Disconnected,

    #[error("MIDI drain worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output is running")]
    Unavailable,

    #[error("no output device found")]
    NoDevice,

    #[error("failed to get default output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to play audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Theory(#[from] TheoryError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
