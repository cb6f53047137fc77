pub mod capture_task;
pub mod protocol;
pub mod speak_task;
pub mod state;
pub mod ws_handler;
pub mod ws_sender;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use ws_handler::ws_handler;
