//! services/api/src/adapters/chat.rs
//!
//! This module contains the adapter for the conversational interviewer LLM.
//! It implements the `ExchangeService` and `ExchangeChannel` ports from the
//! `core` crate on top of OpenAI-compatible chat completions.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use interview_core::ports::{ExchangeChannel, ExchangeService, PortError, PortResult};
use std::time::Duration;

/// The fixed kickoff message that elicits the interviewer's opening question
/// after the channel has been primed with its directive.
const KICKOFF: &str = "Start the interview.";

//=========================================================================================
// The Channel Factory
//=========================================================================================

/// An adapter that opens fresh chat-completion conversations as exchange
/// channels. Each channel carries its own ordered message history; channels
/// from separate `open_channel` calls share nothing.
#[derive(Clone)]
pub struct OpenAiExchangeService {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiExchangeService {
    /// Creates a new `OpenAiExchangeService`. `timeout` bounds every single
    /// remote call; the upstream API imposes none of its own.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl ExchangeService for OpenAiExchangeService {
    async fn open_channel(&self) -> PortResult<Box<dyn ExchangeChannel>> {
        Ok(Box::new(OpenAiChatChannel {
            client: self.client.clone(),
            model: self.model.clone(),
            timeout: self.timeout,
            messages: Vec::new(),
        }))
    }
}

//=========================================================================================
// The Channel Itself
//=========================================================================================

/// One ordered conversation with the interviewer model. The `&mut self`
/// methods of the port keep requests strictly sequential.
pub struct OpenAiChatChannel {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
    messages: Vec<ChatCompletionRequestMessage>,
}

impl OpenAiChatChannel {
    /// Runs one completion over the accumulated history, records the
    /// assistant reply, and returns its text.
    async fn complete(&mut self) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.messages.clone())
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let chat = self.client.chat();
        let call = chat.create(request);
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| PortError::Timeout(self.timeout.as_secs()))?
            .map_err(|e: OpenAIError| PortError::Remote(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Remote("chat completion contained no text content".to_string())
            })?;

        self.messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        Ok(content)
    }

    fn push_user(&mut self, text: &str) -> PortResult<()> {
        self.messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text.to_string())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        Ok(())
    }
}

#[async_trait]
impl ExchangeChannel for OpenAiChatChannel {
    /// Primes the conversation with the system directive and returns the
    /// interviewer's opening utterance.
    async fn initiate(&mut self, directive: &str) -> PortResult<String> {
        self.messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(directive.to_string())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        self.push_user(KICKOFF)?;
        self.complete().await
    }

    async fn send(&mut self, text: &str) -> PortResult<String> {
        self.push_user(text)?;
        self.complete().await
    }
}
