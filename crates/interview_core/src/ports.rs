//! crates/interview_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core state machines to be independent of specific external implementations
//! like hosted LLM endpoints or speech services.

use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Remote service error: {0}")]
    Remote(String),
    #[error("Timed out after {0} seconds waiting for the remote service")]
    Timeout(u64),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A single ordered conversational channel to a remote generation service.
///
/// Requests on one channel must be issued strictly sequentially; the server-side
/// conversation state is ordered and concurrent sends would race turn-taking.
/// Taking `&mut self` makes an overlapping request unrepresentable. There is no
/// built-in retry: a failed call is retried only by explicit caller action.
#[async_trait]
pub trait ExchangeChannel: Send {
    /// Primes the channel with a system directive and returns the first
    /// interviewer utterance.
    async fn initiate(&mut self, directive: &str) -> PortResult<String>;

    /// Sends the next message on the channel and returns the reply utterance.
    async fn send(&mut self, text: &str) -> PortResult<String>;
}

/// Opens fresh, mutually unrelated exchange channels.
#[async_trait]
pub trait ExchangeService: Send + Sync {
    async fn open_channel(&self) -> PortResult<Box<dyn ExchangeChannel>>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a slice of audio data into text.
    async fn transcribe_audio(&self, audio_data: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}
