//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the per-connection session state machine and delegates the two
//! background workers (answer capture and speech playback).
//!
//! Exchange operations are awaited inline in the message loop, so at most one
//! request is ever outstanding on the session's channel; the client mirrors
//! this by disabling its submit control while a request is pending.

use crate::web::{
    capture_task::capture_process,
    protocol::{ClientMessage, ServerMessage},
    speak_task::speak_process,
    state::{AppState, SessionState},
    ws_sender::WsSender,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use interview_core::capture::CaptureState;
use interview_core::domain::Phase;
use interview_core::session::SessionError;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounded queue between the socket loop and the capture worker. At 48 kHz
/// PCM16 this comfortably absorbs several seconds of microphone frames.
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (sender, mut receiver) = socket.split();
    let ws_sender = WsSender::new(sender);
    let session_state_lock = Arc::new(Mutex::new(SessionState::new()));

    // --- Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(
                    text.to_string(),
                    &app_state,
                    &session_state_lock,
                    &ws_sender,
                )
                .await;
            }
            Some(Ok(Message::Binary(data))) => {
                forward_audio(data, &session_state_lock).await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- Cleanup ---
    // Navigating away mid-recording or mid-session must release the audio
    // pipeline and cancel pending speech.
    {
        let mut session = session_state_lock.lock().await;
        session.capture_token.cancel();
        session.speak_token.cancel();
        session.audio_tx = None;
    }
    info!("WebSocket connection closed.");
}

/// Routes one microphone frame to the active capture worker, if any.
///
/// The sender is cloned out of the lock before the (potentially blocking)
/// channel send, so the capture worker can keep locking the session state.
async fn forward_audio(data: Bytes, session_state_lock: &Arc<Mutex<SessionState>>) {
    let audio_tx = {
        let session = session_state_lock.lock().await;
        if session.capture.is_active() {
            session.audio_tx.clone()
        } else {
            None
        }
    };
    if let Some(tx) = audio_tx {
        if tx.send(data).await.is_err() {
            warn!("Capture worker is gone; dropping audio frame.");
        }
    }
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    match client_msg {
        ClientMessage::Start { config } => {
            info!("Start message received. Entering the interview.");
            let result = {
                let mut session = session_state_lock.lock().await;
                session
                    .interview
                    .begin(config, app_state.exchange.as_ref())
                    .await
                    .map(|turn| turn.text.clone())
            };
            match result {
                Ok(opening) => {
                    ws_sender.send_json(&ServerMessage::InterviewStarted).await;
                    ws_sender
                        .send_json(&ServerMessage::InterviewerTurn {
                            text: opening.clone(),
                        })
                        .await;
                    speak(app_state, session_state_lock, ws_sender, opening).await;
                }
                Err(e) => {
                    error!("Failed to start the interview session: {}", e);
                    ws_sender
                        .send_json(&ServerMessage::SetupFailed {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        }

        ClientMessage::StartRecording => {
            let spawned = {
                let mut session = session_state_lock.lock().await;
                if session.interview.phase() != Phase::Interviewing {
                    ws_sender
                        .send_json(&ServerMessage::Error {
                            message: "Recording is only available during the interview."
                                .to_string(),
                        })
                        .await;
                    return;
                }
                // The candidate is about to talk; silence the interviewer.
                session.speak_token.cancel();

                if !session.capture.start() {
                    warn!("StartRecording while a recording is already active; ignoring.");
                    return;
                }
                let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
                session.audio_tx = Some(audio_tx);
                session.capture_token = CancellationToken::new();
                (audio_rx, session.capture_token.clone())
            };

            ws_sender.send_json(&ServerMessage::RecordingStarted).await;
            let (audio_rx, token) = spawned;
            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    capture_process(app_state, session_state_lock, ws_sender, audio_rx, token)
                        .await
                {
                    error!("Capture process failed: {:?}", e);
                }
            });
        }

        ClientMessage::StopRecording => {
            info!("StopRecording message received.");
            let mut session = session_state_lock.lock().await;
            if !session.capture.is_active() {
                warn!("StopRecording without an active recording; ignoring.");
                return;
            }
            // The worker flushes, finalizes the audio blob, and reports the
            // transcript via RecordingStopped.
            session.audio_tx = None;
            session.capture_token.cancel();
        }

        ClientMessage::SubmitAnswer { text } => {
            let result = {
                let mut session = session_state_lock.lock().await;
                session
                    .interview
                    .submit_answer(&text)
                    .await
                    .map(|turn| turn.text.clone())
            };
            match result {
                Ok(reply) => {
                    // The per-turn recording is spent once its answer is in.
                    session_state_lock.lock().await.capture.take_audio();
                    ws_sender
                        .send_json(&ServerMessage::InterviewerTurn {
                            text: reply.clone(),
                        })
                        .await;
                    speak(app_state, session_state_lock, ws_sender, reply).await;
                }
                Err(SessionError::EmptyAnswer) => {
                    warn!("Rejected an empty answer submission.");
                    ws_sender
                        .send_json(&ServerMessage::TurnFailed {
                            message: "Please provide an answer before submitting.".to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    error!("Failed to send answer: {}", e);
                    ws_sender
                        .send_json(&ServerMessage::TurnFailed {
                            message: "Failed to send your answer. Please try again.".to_string(),
                        })
                        .await;
                }
            }
        }

        ClientMessage::EndInterview => {
            info!("EndInterview message received.");
            {
                let mut session = session_state_lock.lock().await;
                session.speak_token.cancel();
                session.capture_token.cancel();
                session.audio_tx = None;
                if let Err(e) = session.interview.end_session() {
                    warn!("EndInterview rejected: {}", e);
                    ws_sender
                        .send_json(&ServerMessage::Error {
                            message: "The interview is not currently running.".to_string(),
                        })
                        .await;
                    return;
                }
            }
            generate_feedback(session_state_lock, ws_sender).await;
        }

        ClientMessage::RetryFeedback => {
            info!("RetryFeedback message received.");
            generate_feedback(session_state_lock, ws_sender).await;
        }

        ClientMessage::Restart => {
            info!("Restart message received. Returning to setup.");
            {
                let mut session = session_state_lock.lock().await;
                session.speak_token.cancel();
                session.capture_token.cancel();
                session.audio_tx = None;
                session.interview.restart();
                session.capture = CaptureState::new();
            }
            ws_sender.send_json(&ServerMessage::SessionReset).await;
        }

        ClientMessage::SetMuted { muted } => {
            // Sticky: affects future utterances only; in-flight audio plays out.
            let mut session = session_state_lock.lock().await;
            session.muted = muted;
            info!("Playback mute set to {}.", muted);
        }
    }
}

/// Requests the scoring report and relays the outcome. Shared by the initial
/// end-of-interview attempt and user-driven retries.
async fn generate_feedback(
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let result = {
        let mut session = session_state_lock.lock().await;
        session
            .interview
            .generate_feedback()
            .await
            .map(|report| report.clone())
    };
    match result {
        Ok(report) => {
            ws_sender
                .send_json(&ServerMessage::FeedbackReady { report })
                .await;
        }
        Err(SessionError::WrongPhase(phase)) => {
            warn!("Feedback requested in the {:?} phase; ignoring.", phase);
            ws_sender
                .send_json(&ServerMessage::Error {
                    message: "Feedback is not available right now.".to_string(),
                })
                .await;
        }
        Err(e) => {
            error!("Failed to generate feedback: {}", e);
            ws_sender
                .send_json(&ServerMessage::FeedbackFailed {
                    message: "Could not generate your feedback report. You can retry."
                        .to_string(),
                })
                .await;
        }
    }
}

/// Cancels any in-flight utterance and speaks `text` on a fresh token.
async fn speak(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
    text: String,
) {
    let token = {
        let mut session = session_state_lock.lock().await;
        session.speak_token.cancel();
        session.speak_token = CancellationToken::new();
        session.speak_token.clone()
    };
    let app_state = app_state.clone();
    let session_state_lock = session_state_lock.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(async move {
        if let Err(e) = speak_process(app_state, session_state_lock, ws_sender, text, token).await
        {
            error!("Speak process failed: {:?}", e);
        }
    });
}
