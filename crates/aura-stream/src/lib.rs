//! aura-stream: wire protocol for the AuraMind chat backend
//!
//! This crate turns the chunked `data:` response of the chat endpoint into
//! typed events, and defines the message and citation types shared with the
//! history API.

pub mod error;
pub mod event;
pub mod frame;
pub mod types;

pub use error::{Error, Result};
pub use event::{StreamEvent, interpret};
pub use frame::{FrameDecoder, FrameStream, frames};
pub use types::*;
