pub mod chat;
pub mod stt;
pub mod tts;

pub use chat::OpenAiExchangeService;
pub use stt::OpenAiSttAdapter;
pub use tts::OpenAiTtsAdapter;
