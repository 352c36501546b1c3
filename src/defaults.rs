//! Default configuration constants for voxstream.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default output sample rate in Hz.
///
/// 16kHz LINEAR16 is the format conversational agents consume directly;
/// the synthesis service resamples server-side.
pub const SAMPLE_RATE: u32 = 16000;

/// Default voice identifier sent to the synthesis service.
pub const VOICE_ID: &str = "Ashley";

/// Default model identifier sent to the synthesis service.
pub const MODEL_ID: &str = "inworld-tts-1";

/// Default base URL of the synthesis service.
pub const BASE_URL: &str = "https://api.inworld.ai";

/// Path of the streaming synthesis endpoint, relative to the base URL.
pub const STREAM_ENDPOINT: &str = "/tts/v1/voice:stream";

/// Audio encoding requested from the service.
pub const AUDIO_ENCODING: &str = "LINEAR16";

/// Signature bytes of a RIFF/WAV container.
pub const RIFF_MAGIC: &[u8; 4] = b"RIFF";

/// Size of the canonical WAV header in bytes.
///
/// Payloads longer than this that start with [`RIFF_MAGIC`] carry a
/// fixed-size header ahead of the raw PCM samples. The header is skipped
/// wholesale, not parsed field by field.
pub const WAV_HEADER_LEN: usize = 44;

/// How long the dispatcher blocks on an empty queue before re-checking
/// the stop signal.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Total per-request timeout, covering the full streamed response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP connect timeout for the synthesis service.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long idle pooled connections are kept alive.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum idle connections kept in the pool per host.
pub const MAX_CONNECTIONS: usize = 10;

/// Initial capacity of the per-exchange decode buffer in bytes.
///
/// One NDJSON line holds a base64 payload of roughly 100ms of 16kHz PCM,
/// so 8 KiB avoids reallocation for typical lines.
pub const READ_BUFFER_BYTES: usize = 8192;
