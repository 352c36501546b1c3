//! Streaming synthesis pipeline.
//!
//! Text units flow through an unbounded queue into a single dispatcher task,
//! which runs one streaming HTTP exchange at a time and pushes decoded audio
//! to the sink supplied at start.

pub mod decoder;
pub(crate) mod dispatcher;
pub mod event;
pub mod sink;
pub mod synthesizer;

pub use decoder::ChunkDecoder;
pub use event::{AudioFrame, EndReason, ErrorKind, SinkEvent, TextUnit};
pub use sink::{AudioSink, ChannelSink, CollectorSink};
pub use synthesizer::StreamSynthesizer;
