//! crates/interview_core/src/capture.rs
//!
//! The transcription-capture state machine: a running transcript accumulated
//! from a stream of recognition events while a recording is active.
//!
//! The machine never touches audio hardware. A driver (real or fake) feeds it
//! `RecognitionEvent`s and acts on the returned `CaptureDirective`, which is
//! what lets the restart-on-unexpected-stop behaviour be exercised in tests
//! without a microphone.

use chrono::{DateTime, Utc};

/// How many transparent recognizer restarts a single recording tolerates
/// before capture gives up. Bounded so a flapping recognizer cannot loop
/// forever.
pub const MAX_RECOGNIZER_RESTARTS: u32 = 3;

/// A discrete event from the speech recognizer driving the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A provisional hypothesis; displayed but not yet committed.
    Interim(String),
    /// A finalized segment; committed to the accumulator.
    Final(String),
    /// The recognizer terminated on its own while capture was still active.
    Stopped,
    /// A transient recognizer error. Logged by the driver, never fatal.
    Error(String),
}

/// What the driver must do after handing an event to the capture machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDirective {
    /// Keep feeding events.
    Continue,
    /// Restart the recognizer; the "still listening" contract holds.
    Restart,
    /// The restart budget is exhausted; tear the recognizer down and surface
    /// a capture failure.
    Abort,
}

/// Per-recording capture state. Exists logically between "start recording"
/// and "submit answer"; a session holds exactly one.
pub struct CaptureState {
    active: bool,
    committed: String,
    interim: String,
    restarts: u32,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    /// The finalized raw audio of the last completed recording.
    audio: Vec<u8>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureState {
    pub fn new() -> Self {
        Self {
            active: false,
            committed: String::new(),
            interim: String::new(),
            restarts: 0,
            started_at: None,
            stopped_at: None,
            audio: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begins a recording, resetting the transcript buffers, the elapsed
    /// counter, and the restart budget.
    ///
    /// Recording is single-instance: calling this while already active is a
    /// no-op and returns `false` so the caller can warn instead of acquiring
    /// a second microphone handle.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.committed.clear();
        self.interim.clear();
        self.restarts = 0;
        self.started_at = Some(Utc::now());
        self.stopped_at = None;
        self.audio.clear();
        true
    }

    /// Feeds one recognizer event through the machine.
    pub fn on_event(&mut self, event: RecognitionEvent) -> CaptureDirective {
        if !self.active {
            // Late events from a recognizer that was already torn down.
            return CaptureDirective::Continue;
        }
        match event {
            RecognitionEvent::Interim(text) => {
                self.interim = text;
                CaptureDirective::Continue
            }
            RecognitionEvent::Final(text) => {
                let segment = text.trim();
                if !segment.is_empty() {
                    if !self.committed.is_empty() {
                        self.committed.push(' ');
                    }
                    self.committed.push_str(segment);
                }
                self.interim.clear();
                CaptureDirective::Continue
            }
            RecognitionEvent::Stopped => {
                self.restarts += 1;
                if self.restarts > MAX_RECOGNIZER_RESTARTS {
                    self.active = false;
                    self.stopped_at = Some(Utc::now());
                    CaptureDirective::Abort
                } else {
                    CaptureDirective::Restart
                }
            }
            RecognitionEvent::Error(_) => CaptureDirective::Continue,
        }
    }

    /// The transcript as currently displayed: committed segments plus any
    /// uncommitted interim hypothesis.
    pub fn live_transcript(&self) -> String {
        if self.interim.is_empty() {
            self.committed.clone()
        } else if self.committed.is_empty() {
            self.interim.clone()
        } else {
            format!("{} {}", self.committed, self.interim)
        }
    }

    /// Stops the recording and returns the captured transcript.
    ///
    /// The returned text stays editable by the user before submission; manual
    /// correction is a first-class step, not an error path.
    pub fn finish(&mut self) -> String {
        self.active = false;
        self.stopped_at = Some(Utc::now());
        self.live_transcript()
    }

    /// Whole seconds since the recording started. Frozen once stopped.
    pub fn elapsed_seconds(&self) -> i64 {
        match self.started_at {
            Some(started) => {
                let until = self.stopped_at.unwrap_or_else(Utc::now);
                (until - started).num_seconds().max(0)
            }
            None => 0,
        }
    }

    /// Stores the finalized audio of the completed recording.
    pub fn set_audio(&mut self, audio: Vec<u8>) {
        self.audio = audio;
    }

    /// Takes the finalized audio, leaving the buffer empty. Called on
    /// submission; the blob is discarded with it.
    pub fn take_audio(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.audio)
    }
}
