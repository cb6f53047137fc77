//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the mock-interview application.

use interview_core::domain::FeedbackReport;
use interview_core::InterviewConfig;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: While a recording is active, microphone audio is sent as raw PCM16
// Binary frames, not as part of this enum.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts the interview with the candidate's setup parameters.
    Start { config: InterviewConfig },

    /// Begins a new answer recording. The server acquires the audio pipeline
    /// and starts streaming transcription.
    StartRecording,

    /// Ends the current recording. The server flushes transcription and
    /// returns the final, editable transcript.
    StopRecording,

    /// Submits the candidate's (possibly hand-corrected) answer text.
    SubmitAnswer { text: String },

    /// Ends the live conversation and requests the scoring report.
    EndInterview,

    /// Retries scoring after a failed or unparseable feedback response.
    RetryFeedback,

    /// Discards the session and returns to setup.
    Restart,

    /// Sets the sticky mute flag for interviewer speech. Never interrupts
    /// audio already in flight.
    SetMuted { muted: bool },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: The interviewer's voice is sent as raw Binary frames, not as part of
// this enum. These messages provide context for that audio.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The session entered the Interviewing phase.
    InterviewStarted,

    /// A new interviewer utterance was appended to the transcript.
    InterviewerTurn { text: String },

    /// A recording is now active.
    RecordingStarted,

    /// The live transcript (committed plus interim) changed.
    TranscriptUpdate { text: String },

    /// The recording ended; `transcript` is the editable capture result.
    RecordingStopped { transcript: String },

    /// Interviewer speech audio is about to stream; show a speaking indicator.
    SpeakingStarted,

    /// Interviewer speech for the current utterance is complete.
    SpeakingEnded,

    /// The scoring report is ready.
    FeedbackReady { report: FeedbackReport },

    /// The session was reset to the Setup phase.
    SessionReset,

    /// Entering the session failed; the client retries from the setup form.
    SetupFailed { message: String },

    /// A mid-session exchange failed; the transcript is unchanged and the
    /// same answer may be resubmitted.
    TurnFailed { message: String },

    /// Microphone capture failed; no transcript mutation occurred.
    CaptureFailed { message: String },

    /// Scoring failed or was unparseable; the report is absent and the
    /// client should offer retry or restart.
    FeedbackFailed { message: String },

    /// Reports a protocol-level error to the client.
    Error { message: String },
}
