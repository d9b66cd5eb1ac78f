//! Call-id-correlated message channel between the orchestrator and one worker.
//!
//! Each worker gets two `std::sync::mpsc` channels: envelopes in, replies out. Order is preserved
//! per channel; nothing is promised across channels.

pub(crate) mod client;
pub(crate) mod message;
pub(crate) mod server;
