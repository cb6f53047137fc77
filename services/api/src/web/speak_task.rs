//! services/api/src/web/speak_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! speaking a single interviewer utterance aloud.
//!
//! Playback is a single global resource per connection: the handler cancels
//! the previous utterance's token before spawning a new worker, so at most one
//! utterance is ever in flight.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionState},
    ws_sender::WsSender,
};
use async_trait::async_trait;
use interview_core::ports::{PortResult, TextToSpeechService};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where an utterance's audio and speaking indicators go. The WebSocket
/// sender implements this in production; tests substitute a recording sink.
#[async_trait]
pub trait UtteranceSink: Send + Sync {
    async fn speaking_started(&self);
    async fn audio(&self, data: Vec<u8>);
    async fn speaking_ended(&self);
}

#[async_trait]
impl UtteranceSink for WsSender {
    async fn speaking_started(&self) {
        self.send_json(&ServerMessage::SpeakingStarted).await;
    }

    async fn audio(&self, data: Vec<u8>) {
        self.send_binary(data).await;
    }

    async fn speaking_ended(&self) {
        self.send_json(&ServerMessage::SpeakingEnded).await;
    }
}

/// Entry point used by the connection handler: samples the sticky mute flag
/// and runs the utterance against the real TTS adapter and socket.
pub async fn speak_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: WsSender,
    text: String,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    // The mute flag is consulted once, before the utterance starts; flipping
    // it afterwards never interrupts audio already in flight.
    let muted = { session_state_lock.lock().await.muted };
    run_utterance(
        app_state.tts_adapter.as_ref(),
        &ws_sender,
        muted,
        &text,
        cancellation_token,
    )
    .await
}

/// Synthesizes `text` and streams it to the sink as one audio frame,
/// bracketed by speaking indicators.
///
/// A muted utterance is suppressed entirely: no synthesis, no indicators.
/// Only the cancellation token interrupts an utterance underway.
pub async fn run_utterance(
    tts: &dyn TextToSpeechService,
    sink: &dyn UtteranceSink,
    muted: bool,
    text: &str,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    if muted {
        info!("Playback muted; skipping utterance.");
        return Ok(());
    }

    sink.speaking_started().await;

    let audio = tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Utterance cancelled before synthesis completed.");
            sink.speaking_ended().await;
            return Ok(());
        }
        result = tts.generate_audio(text) => {
            match result {
                Ok(audio) => audio,
                Err(e) => {
                    // Playback is best-effort; the utterance text is already
                    // in the transcript, so a TTS failure is only logged.
                    warn!("Speech synthesis failed: {}", e);
                    sink.speaking_ended().await;
                    return Ok(());
                }
            }
        }
    };

    if cancellation_token.is_cancelled() {
        info!("Utterance cancelled; dropping synthesized audio.");
        sink.speaking_ended().await;
        return Ok(());
    }

    sink.audio(audio).await;
    sink.speaking_ended().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UtteranceSink for RecordingSink {
        async fn speaking_started(&self) {
            self.events.lock().unwrap().push("started".to_string());
        }

        async fn audio(&self, data: Vec<u8>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("audio:{}", data.len()));
        }

        async fn speaking_ended(&self) {
            self.events.lock().unwrap().push("ended".to_string());
        }
    }

    struct FakeTts {
        calls: AtomicUsize,
        /// Flipped while synthesis is underway, imitating a user muting
        /// mid-utterance.
        flips_mute: Option<Arc<AtomicBool>>,
    }

    impl FakeTts {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                flips_mute: None,
            }
        }
    }

    #[async_trait]
    impl TextToSpeechService for FakeTts {
        async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(flag) = &self.flips_mute {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn unmuted_utterance_streams_audio_between_indicators() {
        let sink = RecordingSink::default();
        let tts = FakeTts::new();
        run_utterance(&tts, &sink, false, "Next question", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.events(), vec!["started", "audio:13", "ended"]);
        assert_eq!(tts.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn muting_before_speak_suppresses_the_utterance_entirely() {
        let sink = RecordingSink::default();
        let tts = FakeTts::new();
        run_utterance(&tts, &sink, true, "Next question", CancellationToken::new())
            .await
            .unwrap();
        // No synthesis and no indicators: the client never hears or sees it.
        assert!(sink.events().is_empty());
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn muting_mid_utterance_does_not_stop_in_flight_audio() {
        // The session's mute flag flips while synthesis is underway; the
        // utterance was admitted unmuted and still plays out in full.
        let flipped = Arc::new(AtomicBool::new(false));
        let sink = RecordingSink::default();
        let tts = FakeTts {
            calls: AtomicUsize::new(0),
            flips_mute: Some(flipped.clone()),
        };
        run_utterance(
            &tts,
            &sink,
            flipped.load(Ordering::SeqCst),
            "Q",
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(flipped.load(Ordering::SeqCst));
        assert_eq!(sink.events(), vec!["started", "audio:1", "ended"]);
    }

    #[tokio::test]
    async fn cancellation_drops_the_audio_but_still_closes_the_indicator() {
        let sink = RecordingSink::default();
        let tts = FakeTts::new();
        let token = CancellationToken::new();
        token.cancel();
        run_utterance(&tts, &sink, false, "Q", token).await.unwrap();
        // Whichever select branch wins, no audio frame reaches the sink.
        assert_eq!(sink.events(), vec!["started", "ended"]);
    }
}
