//! Question/answer training data from scholarly documents.
//!
//! Documents arrive either as per-page plain text (split into overlapping
//! windows) or as GROBID TEI markup (split into body passages). Every unit
//! is normalized, sent to a chat-completion endpoint with a fixed
//! instruction, and the free-text reply is parsed into records.

pub mod config;
pub mod error;
pub mod generation;
pub mod grobid;
pub mod normalize;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod reply;
pub mod segment;
pub mod tei;
pub mod unit;

pub use config::Settings;
pub use error::{Error, RequestError, Result};
pub use generation::{ChatTransport, GenerationReply, Generator, HttpTransport, ReplyFailure};
pub use normalize::Normalizer;
pub use pipeline::{Pipeline, RunSummary};
pub use reply::{parse_reply, QaRecord};
pub use segment::segment;
pub use tei::{extract_passages, Passage};
pub use unit::{Provenance, TextUnit};
