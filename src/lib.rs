pub mod config;
pub mod script;
pub mod session;
pub mod speech;
pub mod storage;

// Re-export the pieces a driver needs
pub use config::{Config, SessionConfig, TranscriptPolicy};
pub use script::ScriptRepository;
pub use session::SessionStore;
pub use speech::SpeechCache;
