//! Pipeline lifecycle controller.
//!
//! `TtsClient` owns the queue sender and the dispatcher task. Submissions
//! can come from any task; the dispatcher consumes them one at a time.

use crate::config::TtsConfig;
use crate::error::{Result, VoxError};
use crate::pipeline::dispatcher::{Dispatcher, QueuedUnit, Shared};
use crate::pipeline::event::TextUnit;
use crate::pipeline::sink::AudioSink;
use crate::pipeline::synthesizer::StreamSynthesizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Running {
    tx: mpsc::UnboundedSender<QueuedUnit>,
    shared: Arc<Shared>,
    task: tokio::task::JoinHandle<()>,
}

/// Streaming synthesis client.
///
/// Build with a config, `start()` with a sink, feed text with `send_text`,
/// and `stop()` when done. All audio and error reporting flows through the
/// sink passed to `start()`.
pub struct TtsClient {
    config: Arc<TtsConfig>,
    inner: Option<Running>,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: None,
        }
    }

    /// Builds the pooled HTTP client and spawns the dispatcher task.
    ///
    /// Fails with `AlreadyStarted` if the pipeline is already up.
    pub fn start(&mut self, sink: Arc<dyn AudioSink>) -> Result<()> {
        if self.inner.is_some() {
            return Err(VoxError::AlreadyStarted);
        }

        let transport = &self.config.transport;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(transport.request_timeout_secs))
            .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
            .pool_max_idle_per_host(transport.max_connections)
            .pool_idle_timeout(Duration::from_secs(transport.pool_idle_secs))
            .build()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());
        let synthesizer = StreamSynthesizer::new(http, self.config.clone());
        let dispatcher = Dispatcher::new(rx, sink, synthesizer, shared.clone(), self.poll_interval());
        let task = tokio::spawn(dispatcher.run());

        tracing::info!("pipeline started");
        self.inner = Some(Running { tx, shared, task });
        Ok(())
    }

    /// Stops the pipeline and joins the dispatcher task.
    ///
    /// The join is bounded by a grace period of twice the poll interval;
    /// a dispatcher that overruns it is aborted. Safe to call when the
    /// pipeline was never started.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.inner.take() else {
            return;
        };

        running.shared.set_running(false);
        running.shared.shutdown.notify_one();

        let grace = self.poll_interval() * 2;
        match tokio::time::timeout(grace, &mut running.task).await {
            Ok(Ok(())) => tracing::info!("pipeline stopped"),
            Ok(Err(e)) => tracing::warn!("dispatcher task failed: {e}"),
            Err(_) => {
                tracing::warn!("dispatcher did not stop within {grace:?}, aborting");
                running.task.abort();
            }
        }
        // Dropping `running` drops the queue sender and releases the pool
    }

    /// Enqueues a text unit for synthesis.
    ///
    /// Units are stamped with the current flush generation; a later `flush()`
    /// discards them if the dispatcher has not picked them up yet.
    pub fn send_text(
        &self,
        text: impl Into<String>,
        request_id: impl Into<String>,
        is_end: bool,
    ) -> Result<()> {
        let running = self.inner.as_ref().ok_or(VoxError::NotStarted)?;
        let queued = QueuedUnit {
            unit: TextUnit::new(text, request_id, is_end),
            generation: running.shared.current_generation(),
        };
        running
            .tx
            .send(queued)
            .map_err(|_| VoxError::NotStarted)
    }

    /// Discards every unit queued so far. The in-flight exchange, if any,
    /// is not touched; use `cancel_current` for that.
    pub fn flush(&self) -> Result<()> {
        let running = self.inner.as_ref().ok_or(VoxError::NotStarted)?;
        running.shared.bump_generation();
        tracing::debug!("queue flushed");
        Ok(())
    }

    /// Aborts the in-flight exchange if `request_id` names it.
    ///
    /// The dispatcher emits `AudioEnd { reason: Interrupted }` for the
    /// cancelled request and moves on to the next queued unit. An id that
    /// does not match the current exchange is a no-op.
    pub fn cancel_current(&self, request_id: &str) -> Result<()> {
        let running = self.inner.as_ref().ok_or(VoxError::NotStarted)?;
        if running.shared.current_request().as_deref() == Some(request_id) {
            running.shared.set_cancel_target(request_id.to_string());
            running.shared.cancel.notify_one();
            tracing::debug!(request_id, "cancellation requested");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|running| running.shared.is_running())
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.transport.queue_poll_ms)
    }
}
