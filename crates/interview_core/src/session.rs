//! crates/interview_core/src/session.rs
//!
//! The state machine governing a single live mock-interview attempt:
//! Setup -> Interviewing -> Feedback, with an explicit restart back to Setup.
//!
//! The session owns the exchange channel handle outright and passes nothing
//! through ambient state, so the whole machine can be driven in tests with a
//! scripted channel and no network.

use crate::domain::{FeedbackReport, InterviewConfig, Phase, Speaker, Turn};
use crate::ports::{ExchangeChannel, ExchangeService, PortError};

/// The interviewing policy and context, rendered into the system directive
/// that primes a new exchange channel.
const DIRECTIVE_TEMPLATE: &str = "You are Alex, a professional AI interviewer for the role of {role} at {company}.

Context:
- Difficulty: {difficulty}
- Focus Area: {focus_area}
- Job Description: {job_description}
- Candidate Resume: {resume}

Instructions:
1. Ask ONE question at a time.
2. Wait for the candidate's answer.
3. After the answer, briefly acknowledge it, then ask the NEXT question.
4. Keep questions concise.
5. Do not provide feedback during the interview; just conduct it.

Start by introducing yourself as Alex and asking the first question.";

/// The stateless scoring request sent once the interview ends. The full
/// transcript is substituted in chronological order.
const SCORING_TEMPLATE: &str = "The interview is now finished.
Based on the conversation history below, provide a structured JSON assessment.

Conversation History:
{history}

Required JSON Structure:
{
  \"scores\": { \"clarity\": number (0-10), \"technical_accuracy\": number (0-10), \"communication\": number (0-10) },
  \"feedback\": { \"strengths\": string[], \"improvements\": string[] },
  \"summary\": \"2-3 sentence summary of candidate performance\"
}

Do not output markdown code blocks, just the JSON string.";

/// Longer free-text inputs are excerpted into the directive rather than
/// inlined whole, to keep the system prompt bounded.
const EXCERPT_CHARS: usize = 1000;

/// Errors surfaced by session operations. None of these tear the machine
/// down; every variant maps to a short user-visible message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("answer text must not be empty")]
    EmptyAnswer,
    #[error("operation is not valid in the {0:?} phase")]
    WrongPhase(Phase),
    #[error("the scoring response could not be parsed")]
    MalformedFeedback,
    #[error(transparent)]
    Exchange(#[from] PortError),
}

/// A single live interview attempt.
pub struct InterviewSession {
    phase: Phase,
    config: Option<InterviewConfig>,
    transcript: Vec<Turn>,
    feedback: Option<FeedbackReport>,
    channel: Option<Box<dyn ExchangeChannel>>,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Setup,
            config: None,
            transcript: Vec::new(),
            feedback: None,
            channel: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The full, chronological turn history.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn feedback(&self) -> Option<&FeedbackReport> {
        self.feedback.as_ref()
    }

    /// Validates the configuration, opens a fresh exchange channel primed with
    /// the interviewing directive, and appends the interviewer's opening turn.
    ///
    /// A failed initiation is fatal to entering the session: the machine stays
    /// in `Setup` with no channel and an untouched transcript, and the caller
    /// retries from the setup form.
    pub async fn begin(
        &mut self,
        config: InterviewConfig,
        exchange: &dyn ExchangeService,
    ) -> Result<&Turn, SessionError> {
        if self.phase != Phase::Setup {
            return Err(SessionError::WrongPhase(self.phase));
        }
        validate_config(&config)?;

        let directive = build_directive(&config);
        let mut channel = exchange.open_channel().await?;
        let opening = require_reply(channel.initiate(&directive).await?)?;

        self.config = Some(config);
        self.channel = Some(channel);
        self.phase = Phase::Interviewing;
        self.transcript.push(Turn::now(Speaker::Interviewer, opening));
        Ok(self.transcript.last().unwrap())
    }

    /// Submits the candidate's (possibly hand-corrected) answer and returns
    /// the interviewer's next utterance.
    ///
    /// Blank answers are rejected without touching the transcript. A failed
    /// exchange also leaves the transcript exactly as it was, so the candidate
    /// can resubmit the same answer; after N successful exchanges the
    /// transcript always holds 2N + 1 turns. An empty interviewer reply
    /// counts as an exchange failure: only non-empty turns enter the
    /// transcript.
    pub async fn submit_answer(&mut self, text: &str) -> Result<&Turn, SessionError> {
        if self.phase != Phase::Interviewing {
            return Err(SessionError::WrongPhase(self.phase));
        }
        let answer = text.trim();
        if answer.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let candidate_turn = Turn::now(Speaker::Candidate, answer);
        let channel = self
            .channel
            .as_mut()
            .ok_or(PortError::Unexpected("no open exchange channel".into()))?;
        let reply = require_reply(channel.send(answer).await?)?;

        self.transcript.push(candidate_turn);
        self.transcript.push(Turn::now(Speaker::Interviewer, reply));
        Ok(self.transcript.last().unwrap())
    }

    /// Ends the live conversation. Only reachable from `Interviewing`, and
    /// always lands in `Feedback` regardless of whether scoring later
    /// succeeds; no further turns are accepted afterwards.
    pub fn end_session(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Interviewing {
            return Err(SessionError::WrongPhase(self.phase));
        }
        self.phase = Phase::Feedback;
        Ok(())
    }

    /// Requests the end-of-session scoring report over the existing channel.
    ///
    /// Callable in `Feedback`: the first call (and any user-driven retry
    /// after a failure) scores the transcript, while later calls hand back
    /// the existing report without re-scoring. A response that cannot be
    /// parsed leaves the report absent and returns `MalformedFeedback`.
    pub async fn generate_feedback(&mut self) -> Result<&FeedbackReport, SessionError> {
        if self.phase != Phase::Feedback {
            return Err(SessionError::WrongPhase(self.phase));
        }
        // The report is immutable once produced.
        if self.feedback.is_some() {
            return Ok(self.feedback.as_ref().unwrap());
        }

        let history = render_history(&self.transcript);
        let prompt = SCORING_TEMPLATE.replace("{history}", &history);

        let channel = self
            .channel
            .as_mut()
            .ok_or(PortError::Unexpected("no open exchange channel".into()))?;
        let raw = channel.send(&prompt).await?;

        match FeedbackReport::from_model_output(&raw) {
            Some(report) => {
                self.feedback = Some(report);
                Ok(self.feedback.as_ref().unwrap())
            }
            None => Err(SessionError::MalformedFeedback),
        }
    }

    /// Discards the attempt: clears the transcript and any report, drops the
    /// exchange channel, and returns to `Setup`. The next `begin` opens a
    /// fresh, unrelated channel.
    pub fn restart(&mut self) {
        self.phase = Phase::Setup;
        self.config = None;
        self.transcript.clear();
        self.feedback = None;
        self.channel = None;
    }
}

/// Rejects blank interviewer utterances so an empty-text turn can never
/// reach the transcript.
fn require_reply(reply: String) -> Result<String, PortError> {
    if reply.trim().is_empty() {
        Err(PortError::Remote(
            "the interviewer reply was empty".to_string(),
        ))
    } else {
        Ok(reply)
    }
}

fn validate_config(config: &InterviewConfig) -> Result<(), SessionError> {
    if config.role.trim().is_empty() {
        return Err(SessionError::MissingField("role"));
    }
    if config.company.trim().is_empty() {
        return Err(SessionError::MissingField("company"));
    }
    if config.job_description.trim().is_empty() {
        return Err(SessionError::MissingField("job description"));
    }
    if config.resume_text.trim().is_empty() {
        return Err(SessionError::MissingField("resume"));
    }
    Ok(())
}

fn build_directive(config: &InterviewConfig) -> String {
    let focus_area = config
        .focus_area
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("General");

    DIRECTIVE_TEMPLATE
        .replace("{role}", config.role.trim())
        .replace("{company}", config.company.trim())
        .replace("{difficulty}", &config.difficulty.to_string())
        .replace("{focus_area}", focus_area)
        .replace("{job_description}", &excerpt(&config.job_description))
        .replace("{resume}", &excerpt(&config.resume_text))
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", head)
    }
}

fn render_history(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .map(|turn| {
            let label = match turn.speaker {
                Speaker::Interviewer => "INTERVIEWER",
                Speaker::Candidate => "CANDIDATE",
            };
            format!("{}: {}", label, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Difficulty;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// A channel that replays a scripted list of replies and records every
    /// outbound message, so tests can assert on exactly what was sent.
    struct ScriptedChannel {
        replies: VecDeque<PortResult<String>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ExchangeChannel for ScriptedChannel {
        async fn initiate(&mut self, directive: &str) -> PortResult<String> {
            self.sent.lock().unwrap().push(directive.to_string());
            self.replies
                .pop_front()
                .unwrap_or(Err(PortError::Unexpected("script exhausted".into())))
        }

        async fn send(&mut self, text: &str) -> PortResult<String> {
            self.sent.lock().unwrap().push(text.to_string());
            self.replies
                .pop_front()
                .unwrap_or(Err(PortError::Unexpected("script exhausted".into())))
        }
    }

    struct ScriptedService {
        scripts: Mutex<VecDeque<VecDeque<PortResult<String>>>>,
        opened: AtomicUsize,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedService {
        fn new(scripts: Vec<Vec<PortResult<String>>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into_iter().map(VecDeque::from).collect()),
                opened: AtomicUsize::new(0),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn single(replies: Vec<PortResult<String>>) -> Self {
            Self::new(vec![replies])
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExchangeService for ScriptedService {
        async fn open_channel(&self) -> PortResult<Box<dyn ExchangeChannel>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let replies = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(PortError::Unexpected("no more scripted channels".into()))?;
            Ok(Box::new(ScriptedChannel {
                replies,
                sent: self.sent.clone(),
            }))
        }
    }

    fn config() -> InterviewConfig {
        InterviewConfig {
            role: "Backend Engineer".into(),
            company: "Acme".into(),
            job_description: "Build and operate distributed services.".into(),
            resume_text: "Five years of Rust and Postgres.".into(),
            difficulty: Difficulty::Hard,
            focus_area: Some("System Design".into()),
        }
    }

    fn ok(text: &str) -> PortResult<String> {
        Ok(text.to_string())
    }

    #[test]
    fn begin_embeds_config_verbatim_in_directive() {
        let service = ScriptedService::single(vec![ok("Hi, I'm Alex. First question?")]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();

        let sent = service.sent();
        let directive = &sent[0];
        assert!(directive.contains("Backend Engineer"));
        assert!(directive.contains("Acme"));
        assert!(directive.contains("Hard"));
        assert!(directive.contains("System Design"));
        assert_eq!(session.phase(), Phase::Interviewing);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].speaker, Speaker::Interviewer);
    }

    #[test]
    fn begin_rejects_blank_required_fields() {
        let service = ScriptedService::single(vec![ok("unreached")]);
        let mut session = InterviewSession::new();
        let mut bad = config();
        bad.resume_text = "   ".into();

        let err = block_on(session.begin(bad, &service)).unwrap_err();
        assert!(matches!(err, SessionError::MissingField("resume")));
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn failed_initiation_stays_in_setup() {
        let service =
            ScriptedService::single(vec![Err(PortError::Remote("upstream down".into()))]);
        let mut session = InterviewSession::new();
        let err = block_on(session.begin(config(), &service)).unwrap_err();
        assert!(matches!(err, SessionError::Exchange(_)));
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn transcript_is_two_n_plus_one_after_n_exchanges() {
        let service = ScriptedService::single(vec![
            ok("Q1"),
            ok("Q2"),
            ok("Q3"),
            ok("Q4"),
        ]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();

        for n in 1..=3 {
            block_on(session.submit_answer(&format!("answer {n}"))).unwrap();
            assert_eq!(session.transcript().len(), 2 * n + 1);
        }
    }

    #[test]
    fn blank_answers_never_mutate_the_transcript() {
        let service = ScriptedService::single(vec![ok("Q1")]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();

        for blank in ["", "   ", "\n\t"] {
            let err = block_on(session.submit_answer(blank)).unwrap_err();
            assert!(matches!(err, SessionError::EmptyAnswer));
            assert_eq!(session.transcript().len(), 1);
        }
    }

    #[test]
    fn failed_exchange_leaves_transcript_untouched_and_is_retryable() {
        let service = ScriptedService::single(vec![
            ok("Q1"),
            Err(PortError::Timeout(60)),
            ok("Q2"),
        ]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();

        let err = block_on(session.submit_answer("my answer")).unwrap_err();
        assert!(matches!(err, SessionError::Exchange(PortError::Timeout(_))));
        assert_eq!(session.transcript().len(), 1);

        // The same answer goes through on retry.
        block_on(session.submit_answer("my answer")).unwrap();
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.transcript()[1].speaker, Speaker::Candidate);
        assert_eq!(session.transcript()[1].text, "my answer");
    }

    #[test]
    fn empty_interviewer_reply_is_a_failure_not_an_empty_turn() {
        let service = ScriptedService::single(vec![ok("Q1"), ok(""), ok("  \n "), ok("Q2")]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();

        // Blank replies fail the exchange and leave the transcript untouched,
        // so the same answer can be resubmitted.
        for _ in 0..2 {
            let err = block_on(session.submit_answer("my answer")).unwrap_err();
            assert!(matches!(err, SessionError::Exchange(PortError::Remote(_))));
            assert_eq!(session.transcript().len(), 1);
        }

        block_on(session.submit_answer("my answer")).unwrap();
        assert_eq!(session.transcript().len(), 3);
        assert!(session
            .transcript()
            .iter()
            .all(|turn| !turn.text.trim().is_empty()));
    }

    #[test]
    fn blank_opening_utterance_keeps_the_session_in_setup() {
        let service = ScriptedService::single(vec![ok("   ")]);
        let mut session = InterviewSession::new();
        let err = block_on(session.begin(config(), &service)).unwrap_err();
        assert!(matches!(err, SessionError::Exchange(PortError::Remote(_))));
        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn end_session_only_reachable_from_interviewing() {
        let mut session = InterviewSession::new();
        assert!(matches!(
            session.end_session(),
            Err(SessionError::WrongPhase(Phase::Setup))
        ));

        let service = ScriptedService::single(vec![ok("Q1")]);
        block_on(session.begin(config(), &service)).unwrap();
        session.end_session().unwrap();
        assert_eq!(session.phase(), Phase::Feedback);

        // Already in Feedback; a second end is rejected but the phase holds.
        assert!(session.end_session().is_err());
        assert_eq!(session.phase(), Phase::Feedback);
    }

    #[test]
    fn scoring_receives_full_transcript_in_order() {
        let feedback_json = r#"{"scores": {"clarity": 8},
                                "feedback": {"strengths": ["s"], "improvements": ["i"]},
                                "summary": "fine"}"#;
        let service = ScriptedService::single(vec![
            ok("Tell me about yourself"),
            ok("Great, next question"),
            ok(feedback_json),
        ]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();
        block_on(session.submit_answer("I am a backend engineer")).unwrap();
        session.end_session().unwrap();
        block_on(session.generate_feedback()).unwrap();

        let sent = service.sent();
        let scoring_prompt = sent.last().unwrap();
        let interviewer_pos = scoring_prompt
            .find("INTERVIEWER: Tell me about yourself")
            .unwrap();
        let candidate_pos = scoring_prompt
            .find("CANDIDATE: I am a backend engineer")
            .unwrap();
        assert!(interviewer_pos < candidate_pos);
        assert_eq!(session.feedback().unwrap().scores["clarity"], 8);
    }

    #[test]
    fn malformed_scoring_response_leaves_report_absent() {
        let service = ScriptedService::single(vec![ok("Q1"), ok("not json at all")]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();
        session.end_session().unwrap();

        let err = block_on(session.generate_feedback()).unwrap_err();
        assert!(matches!(err, SessionError::MalformedFeedback));
        assert!(session.feedback().is_none());
        assert_eq!(session.phase(), Phase::Feedback);
    }

    #[test]
    fn repeated_feedback_requests_reuse_the_existing_report() {
        let feedback_json = r#"{"scores": {"clarity": 8},
                                "feedback": {"strengths": ["s"], "improvements": ["i"]},
                                "summary": "fine"}"#;
        let service = ScriptedService::single(vec![ok("Q1"), ok(feedback_json)]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();
        session.end_session().unwrap();
        block_on(session.generate_feedback()).unwrap();
        let requests_after_first = service.sent().len();

        // A second request hands back the same report without re-scoring.
        let again = block_on(session.generate_feedback()).unwrap();
        assert_eq!(again.scores["clarity"], 8);
        assert_eq!(service.sent().len(), requests_after_first);
    }

    #[test]
    fn restart_clears_state_and_next_begin_opens_a_fresh_channel() {
        let service = ScriptedService::new(vec![
            vec![ok("Q1"), ok("Q2")],
            vec![ok("Fresh Q1")],
        ]);
        let mut session = InterviewSession::new();
        block_on(session.begin(config(), &service)).unwrap();
        block_on(session.submit_answer("answer")).unwrap();
        session.end_session().unwrap();
        session.restart();

        assert_eq!(session.phase(), Phase::Setup);
        assert!(session.transcript().is_empty());
        assert!(session.feedback().is_none());

        block_on(session.begin(config(), &service)).unwrap();
        assert_eq!(service.opened.load(Ordering::SeqCst), 2);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].text, "Fresh Q1");
    }
}
