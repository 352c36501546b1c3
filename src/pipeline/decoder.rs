//! Incremental decoder for the newline-delimited synthesis response.
//!
//! Accumulates raw response bytes, splits on newline boundaries, parses each
//! complete line as one JSON audio result and emits the decoded PCM payloads.
//! Bytes after the last newline are carried in the buffer until the next
//! chunk arrives or the stream ends.

use crate::defaults;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

/// Shape of one response line: `{"result":{"audioContent":"<base64>"}}`.
#[derive(Debug, Deserialize)]
struct StreamLine {
    result: Option<LineResult>,
}

#[derive(Debug, Deserialize)]
struct LineResult {
    #[serde(rename = "audioContent")]
    audio_content: Option<String>,
}

/// Stateful line-buffered decoder for one streaming exchange.
pub struct ChunkDecoder {
    /// Bytes after the last complete newline, carried across chunks.
    buffer: Vec<u8>,
}

impl ChunkDecoder {
    /// Creates a decoder with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(defaults::READ_BUFFER_BYTES)
    }

    /// Creates a decoder with a custom initial buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of buffered trailing bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Consumes a chunk of response bytes and returns the audio payloads
    /// decoded from every complete line it closes.
    ///
    /// Malformed lines are skipped without error. Payloads that decode to
    /// zero bytes are dropped. Output order matches line order regardless of
    /// how the byte stream was split into chunks.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            // drain kept the newline; decode_line trims it with the rest
            if let Some(payload) = decode_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes the trailing partial buffer at end-of-stream.
    ///
    /// A response whose final line lacks a trailing newline is decoded here;
    /// an unparseable remainder is dropped, not reported.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let remainder = std::mem::take(&mut self.buffer);
        decode_line(&remainder)
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes one response line into a PCM payload.
///
/// Returns None for blank lines, unparseable records, absent or invalid
/// audio content, and payloads that end up empty.
fn decode_line(line: &[u8]) -> Option<Vec<u8>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let record: StreamLine = match serde_json::from_slice(line) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!("skipping malformed response line: {e}");
            return None;
        }
    };

    let audio_content = record.result?.audio_content?;
    if audio_content.is_empty() {
        return None;
    }

    let audio = match BASE64.decode(audio_content.as_bytes()) {
        Ok(audio) => audio,
        Err(e) => {
            tracing::debug!("skipping undecodable audio content: {e}");
            return None;
        }
    };

    let audio = strip_wav_header(audio);
    if audio.is_empty() { None } else { Some(audio) }
}

/// Removes the fixed-size WAV header when the payload carries one.
///
/// The skip is keyed only on the 4-byte RIFF signature; the declared
/// container size is not verified, matching the service's framing. Applied
/// at most once per payload.
fn strip_wav_header(mut audio: Vec<u8>) -> Vec<u8> {
    if audio.len() > defaults::WAV_HEADER_LEN && audio.starts_with(defaults::RIFF_MAGIC) {
        audio.drain(..defaults::WAV_HEADER_LEN);
    }
    audio
}
