//! Event types for the synthesis pipeline.
//!
//! Defines the data structures that flow between the caller, the dispatcher
//! and the output sink.

/// One text submission, consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Text fragment to synthesize. May be empty for end-of-input markers.
    pub text: String,
    /// Caller-assigned identifier correlating the fragments and audio events
    /// of one logical utterance.
    pub request_id: String,
    /// Marks the end of input for this request.
    pub is_end: bool,
}

impl TextUnit {
    /// Creates a new text unit.
    pub fn new(text: impl Into<String>, request_id: impl Into<String>, is_end: bool) -> Self {
        Self {
            text: text.into(),
            request_id: request_id.into(),
            is_end,
        }
    }

    /// Returns true if this unit carries nothing to do.
    pub fn is_noop(&self) -> bool {
        self.text.is_empty() && !self.is_end
    }
}

/// A decoded chunk of raw PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw PCM bytes with any container header already stripped.
    pub bytes: Vec<u8>,
    /// Request this frame belongs to.
    pub request_id: String,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(bytes: Vec<u8>, request_id: impl Into<String>) -> Self {
        Self {
            bytes,
            request_id: request_id.into(),
        }
    }
}

/// Why an audio stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The caller marked the request complete with `is_end`.
    RequestEnd,
    /// The in-flight exchange was cancelled.
    Interrupted,
}

/// Classification of pipeline errors surfaced to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-success HTTP status from the synthesis service.
    Vendor,
    /// Transport-level failure mid-exchange.
    Network,
    /// Unexpected failure inside the dispatch loop.
    Runtime,
}

/// Ordered events delivered to the output sink.
///
/// For a single request id, events appear as AudioStart → AudioData* →
/// AudioEnd, with Error substitutable for AudioEnd at any point and
/// terminating the sequence for that request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// First non-empty audio payload is about to arrive. Emitted at most
    /// once per request id.
    AudioStart { request_id: String },
    /// A decoded audio payload.
    AudioData(AudioFrame),
    /// The request's audio stream is complete.
    AudioEnd {
        request_id: String,
        reason: EndReason,
    },
    /// The exchange or the loop failed; closes the request's sequence.
    Error {
        request_id: String,
        kind: ErrorKind,
        message: String,
    },
}

impl SinkEvent {
    /// Returns the request id this event is attributed to.
    pub fn request_id(&self) -> &str {
        match self {
            SinkEvent::AudioStart { request_id } => request_id,
            SinkEvent::AudioData(frame) => &frame.request_id,
            SinkEvent::AudioEnd { request_id, .. } => request_id,
            SinkEvent::Error { request_id, .. } => request_id,
        }
    }

    /// Returns true if this is an audio data event.
    pub fn is_audio_data(&self) -> bool {
        matches!(self, SinkEvent::AudioData(_))
    }

    /// Returns true if this event terminates the request's sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SinkEvent::AudioEnd { .. } | SinkEvent::Error { .. })
    }

    /// Extracts the audio frame if this is an AudioData variant.
    pub fn into_frame(self) -> Option<AudioFrame> {
        match self {
            SinkEvent::AudioData(frame) => Some(frame),
            _ => None,
        }
    }
}
