//! Agent reply stream: NDJSON framing and event interpretation
//!
//! ```text
//! chunked body ──► decoder::records ──► EventInterpreter::apply ──► status / reply
//! ```

pub mod decoder;
pub mod event;
pub mod interpreter;

pub use decoder::{records, FrameDecoder};
pub use event::StreamEvent;
pub use interpreter::{EventInterpreter, Status, COMPLETION_MARKER};
