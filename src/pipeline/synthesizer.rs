//! Streaming synthesis exchange.
//!
//! One outbound HTTP POST per text unit. The response body is a stream of
//! newline-delimited JSON lines that is fed through the [`ChunkDecoder`] as
//! bytes arrive, so audio reaches the sink before the exchange completes.

use crate::config::TtsConfig;
use crate::defaults;
use crate::error::Result;
use crate::pipeline::decoder::ChunkDecoder;
use crate::pipeline::event::{AudioFrame, ErrorKind, SinkEvent};
use crate::pipeline::sink::AudioSink;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::sync::Arc;

/// JSON body of a streaming synthesis request.
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(rename = "voiceId")]
    voice_id: &'a str,
    #[serde(rename = "modelId")]
    model_id: &'a str,
    disable_text_normalization: bool,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    sample_rate_hertz: u32,
}

/// Per-exchange transient state. Created when a synthesize call begins and
/// dropped when it returns.
struct StreamSession {
    request_id: String,
    audio_started: bool,
    total_bytes: usize,
    decoder: ChunkDecoder,
}

impl StreamSession {
    fn new(request_id: &str, read_buffer: usize) -> Self {
        Self {
            request_id: request_id.to_string(),
            audio_started: false,
            total_bytes: 0,
            decoder: ChunkDecoder::with_capacity(read_buffer),
        }
    }

    /// Emits one decoded payload, latching AudioStart before the first one.
    async fn emit_audio(&mut self, payload: Vec<u8>, sink: &dyn AudioSink) -> Result<()> {
        if !self.audio_started {
            sink.emit(SinkEvent::AudioStart {
                request_id: self.request_id.clone(),
            })
            .await?;
            self.audio_started = true;
        }
        self.total_bytes += payload.len();
        sink.emit(SinkEvent::AudioData(AudioFrame::new(
            payload,
            &self.request_id,
        )))
        .await
    }
}

/// Owns the streaming exchange for one text unit at a time.
///
/// Shares the pooled HTTP client across sequential exchanges; the client
/// itself is created and torn down by the lifecycle controller.
pub struct StreamSynthesizer {
    http: reqwest::Client,
    config: Arc<TtsConfig>,
}

impl StreamSynthesizer {
    /// Creates a synthesizer over an existing pooled client.
    pub fn new(http: reqwest::Client, config: Arc<TtsConfig>) -> Self {
        Self { http, config }
    }

    /// Runs one streaming exchange, emitting audio events to the sink.
    ///
    /// Vendor and network failures are reported as sink `Error` events and
    /// terminate only this exchange; the returned `Err` is reserved for
    /// sink delivery failures. Never emits `AudioEnd` — request completion
    /// is the dispatcher's call, driven by the unit's `is_end` flag.
    pub async fn synthesize(&self, text: &str, request_id: &str, sink: &dyn AudioSink) -> Result<()> {
        let url = format!(
            "{}{}",
            self.config.synthesis.base_url,
            defaults::STREAM_ENDPOINT
        );
        let body = SynthesisRequest {
            text,
            voice_id: &self.config.synthesis.voice_id,
            model_id: &self.config.synthesis.model_id,
            disable_text_normalization: self.config.synthesis.disable_text_normalization,
            audio_config: AudioConfig {
                audio_encoding: defaults::AUDIO_ENCODING,
                sample_rate_hertz: self.config.synthesis.sample_rate,
            },
        };

        let response = match self
            .http
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Basic {}", self.config.synthesis.api_key),
            )
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("synthesis request failed: {e}");
                return self.emit_error(sink, request_id, ErrorKind::Network, e.to_string())
                    .await;
            }
        };

        let status = response.status();
        if !status.is_success() {
            // Best effort: a failure reading the error body is tolerated
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("synthesis API error: {status}");
            return self
                .emit_error(
                    sink,
                    request_id,
                    ErrorKind::Vendor,
                    format!("API error: {} - {}", status.as_u16(), error_text),
                )
                .await;
        }

        let mut session =
            StreamSession::new(request_id, self.config.transport.read_buffer_bytes);
        let mut stream = response.bytes_stream();

        while let Some(next) = stream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!("synthesis stream failed: {e}");
                    return self
                        .emit_error(sink, request_id, ErrorKind::Network, e.to_string())
                        .await;
                }
            };
            for payload in session.decoder.push(&chunk) {
                session.emit_audio(payload, sink).await?;
            }
        }

        // The response may end without a trailing newline
        if let Some(payload) = session.decoder.finish() {
            session.emit_audio(payload, sink).await?;
        }

        tracing::debug!(
            request_id,
            total_bytes = session.total_bytes,
            "synthesis exchange done"
        );
        Ok(())
    }

    async fn emit_error(
        &self,
        sink: &dyn AudioSink,
        request_id: &str,
        kind: ErrorKind,
        message: String,
    ) -> Result<()> {
        sink.emit(SinkEvent::Error {
            request_id: request_id.to_string(),
            kind,
            message,
        })
        .await
    }
}
