// Public API for integration tests and the binary

pub mod config;
pub mod dialogflow;
pub mod protocol;
pub mod relay;
pub mod router;
pub mod session;
pub mod state;
pub mod ws;
