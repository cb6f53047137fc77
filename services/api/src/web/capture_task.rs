//! services/api/src/web/capture_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for one
//! answer recording: it consumes raw microphone frames, transcribes them in
//! fixed-size segments, and feeds the resulting recognition events through the
//! capture state machine.
//!
//! The worker is the only consumer of the audio channel; cancelling its token
//! (or dropping the sender) tears it down, so no dangling listener can outlive
//! a recording or the connection itself.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionState},
    ws_sender::WsSender,
};
use bytes::Bytes;
use interview_core::capture::{CaptureDirective, RecognitionEvent};
use interview_core::ports::PortResult;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// PCM16 mono at 48 kHz; one transcription segment per ~4 seconds of speech.
const SEGMENT_BYTES: usize = 48_000 * 2 * 4;

/// The main asynchronous task for a single recording.
///
/// Runs until the recording is stopped (token cancelled), the client drops the
/// audio channel, or the capture machine aborts. On the way out it flushes the
/// residual buffer, finalizes the audio blob, and reports the full transcript.
pub async fn capture_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: WsSender,
    mut audio_rx: mpsc::Receiver<Bytes>,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    info!("Capture process started.");

    let mut pending: Vec<u8> = Vec::new();
    let mut full_audio: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Capture process cancelled; flushing residual audio.");
                break;
            }
            frame = audio_rx.recv() => {
                match frame {
                    Some(bytes) => {
                        pending.extend_from_slice(&bytes);
                        full_audio.extend_from_slice(&bytes);
                        if pending.len() >= SEGMENT_BYTES {
                            let segment = std::mem::take(&mut pending);
                            if !transcribe_segment(&app_state, &session_state_lock, &ws_sender, segment).await {
                                finalize(&session_state_lock, &ws_sender, full_audio).await;
                                return Ok(());
                            }
                        }
                    }
                    None => {
                        info!("Audio channel closed; ending capture.");
                        break;
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        transcribe_segment(&app_state, &session_state_lock, &ws_sender, pending).await;
    }

    finalize(&session_state_lock, &ws_sender, full_audio).await;
    Ok(())
}

/// Transcribes one audio segment and routes the outcome through the capture
/// state machine. Returns `false` once the machine directs an abort.
async fn transcribe_segment(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
    segment: Vec<u8>,
) -> bool {
    let event = match app_state.stt_adapter.transcribe_audio(&segment).await {
        Ok(text) => RecognitionEvent::Final(text),
        Err(e) => {
            // Transcription failures count as an unexpected recognizer stop;
            // the machine decides whether to restart or give up.
            warn!("Segment transcription failed: {}", e);
            RecognitionEvent::Stopped
        }
    };

    let (directive, live) = {
        let mut session = session_state_lock.lock().await;
        let directive = session.capture.on_event(event);
        (directive, session.capture.live_transcript())
    };

    match directive {
        CaptureDirective::Continue => {
            ws_sender
                .send_json(&ServerMessage::TranscriptUpdate { text: live })
                .await;
            true
        }
        CaptureDirective::Restart => {
            info!("Recognizer restarted; still listening.");
            true
        }
        CaptureDirective::Abort => {
            warn!("Recognizer restart budget exhausted; aborting capture.");
            ws_sender
                .send_json(&ServerMessage::CaptureFailed {
                    message: "Speech recognition kept failing. Please try recording again."
                        .to_string(),
                })
                .await;
            false
        }
    }
}

/// Marks the recording finished, stores the finalized audio blob, and reports
/// the editable transcript to the client.
async fn finalize(
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
    full_audio: Vec<u8>,
) {
    let transcript = {
        let mut session = session_state_lock.lock().await;
        session.capture.set_audio(full_audio);
        session.capture.finish()
    };
    ws_sender
        .send_json(&ServerMessage::RecordingStopped { transcript })
        .await;
    info!("Capture process finished.");
}
