//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use bytes::Bytes;
use interview_core::capture::CaptureState;
use interview_core::ports::{ExchangeService, SpeechToTextService, TextToSpeechService};
use interview_core::session::InterviewSession;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub exchange: Arc<dyn ExchangeService>,
    pub stt_adapter: Arc<dyn SpeechToTextService>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active WebSocket connection: the interview state
/// machine, the capture machine, and the handles for the two single-instance
/// background workers (capture and speech playback).
pub struct SessionState {
    pub interview: InterviewSession,
    pub capture: CaptureState,
    /// Sticky flag: suppresses future speech only, never in-flight audio.
    pub muted: bool,
    /// Cancels the in-flight utterance; replaced before each new speak.
    pub speak_token: CancellationToken,
    /// Tears down the active capture worker; replaced per recording.
    pub capture_token: CancellationToken,
    /// Feeds microphone frames to the active capture worker.
    pub audio_tx: Option<mpsc::Sender<Bytes>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            interview: InterviewSession::new(),
            capture: CaptureState::new(),
            muted: false,
            speak_token: CancellationToken::new(),
            capture_token: CancellationToken::new(),
            audio_tx: None,
        }
    }
}
