pub mod capture;
pub mod domain;
pub mod ports;
pub mod session;

pub use capture::{CaptureDirective, CaptureState, RecognitionEvent, MAX_RECOGNIZER_RESTARTS};
pub use domain::{Difficulty, FeedbackReport, InterviewConfig, Phase, Speaker, Turn};
pub use ports::{
    ExchangeChannel, ExchangeService, PortError, PortResult, SpeechToTextService,
    TextToSpeechService,
};
pub use session::{InterviewSession, SessionError};
