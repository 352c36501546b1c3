//! Single-consumer dispatch loop.
//!
//! Serializes text submissions: one streaming exchange at a time, in
//! submission order, so audio for a request is emitted in the exact order
//! its source text arrived. The loop polls the queue with a bounded timeout
//! so a stop signal is observed promptly even when idle.

use crate::error::Result;
use crate::pipeline::event::{EndReason, ErrorKind, SinkEvent, TextUnit};
use crate::pipeline::sink::AudioSink;
use crate::pipeline::synthesizer::StreamSynthesizer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// State shared between the dispatcher task and the lifecycle controller.
pub(crate) struct Shared {
    running: AtomicBool,
    /// Flush epoch. Units stamped with an older value are discarded when
    /// the dispatcher picks them up.
    generation: AtomicU64,
    /// Request id of the exchange currently in flight, for cancellation
    /// matching and error attribution.
    current_request: Mutex<Option<String>>,
    /// Request id a pending cancellation targets.
    cancel_target: Mutex<Option<String>>,
    pub(crate) cancel: Notify,
    pub(crate) shutdown: Notify,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            current_request: Mutex::new(None),
            cancel_target: Mutex::new(None),
            cancel: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bumps the flush epoch, invalidating everything queued so far.
    pub(crate) fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn current_request(&self) -> Option<String> {
        self.current_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_current_request(&self, request_id: Option<String>) {
        *self
            .current_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = request_id;
    }

    pub(crate) fn set_cancel_target(&self, request_id: String) {
        *self
            .cancel_target
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(request_id);
    }

    fn take_cancel_target(&self) -> Option<String> {
        self.cancel_target
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}

/// A text unit stamped with the flush epoch it was enqueued under.
pub(crate) struct QueuedUnit {
    pub(crate) unit: TextUnit,
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The dispatch loop. Owns the queue receiver; nothing else removes units.
pub(crate) struct Dispatcher {
    rx: mpsc::UnboundedReceiver<QueuedUnit>,
    sink: Arc<dyn AudioSink>,
    synthesizer: StreamSynthesizer,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<QueuedUnit>,
        sink: Arc<dyn AudioSink>,
        synthesizer: StreamSynthesizer,
        shared: Arc<Shared>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rx,
            sink,
            synthesizer,
            shared,
            poll_interval,
        }
    }

    /// Runs until stopped or until every sender is gone.
    pub(crate) async fn run(mut self) {
        tracing::info!("dispatcher started");

        while self.shared.is_running() {
            let queued = tokio::select! {
                _ = self.shared.shutdown.notified() => {
                    if self.shared.is_running() {
                        continue;
                    }
                    break;
                }
                recv = tokio::time::timeout(self.poll_interval, self.rx.recv()) => match recv {
                    Err(_) => continue,   // idle poll, re-check the stop signal
                    Ok(None) => break,    // controller dropped, nothing more will arrive
                    Ok(Some(queued)) => queued,
                },
            };

            // Stale stamp means flush() ran after this unit was enqueued
            if queued.generation < self.shared.current_generation() {
                tracing::debug!(request_id = %queued.unit.request_id, "dropping flushed unit");
                continue;
            }

            let unit = queued.unit;
            if unit.is_noop() {
                continue;
            }

            self.shared.set_current_request(Some(unit.request_id.clone()));
            let flow = match self.process_unit(&unit).await {
                Ok(flow) => flow,
                Err(e) => {
                    // One bad exchange must not take the loop down
                    tracing::error!(request_id = %unit.request_id, "dispatch error: {e}");
                    self.report_runtime_error(&unit.request_id, e.to_string()).await;
                    Flow::Continue
                }
            };
            self.shared.set_current_request(None);

            if flow == Flow::Stop {
                break;
            }
        }

        self.shared.set_current_request(None);
        self.shared.set_running(false);
        tracing::info!("dispatcher stopped");
    }

    /// Handles one unit: run the exchange if it carries text, then emit the
    /// end-of-stream marker if it closes the request.
    async fn process_unit(&self, unit: &TextUnit) -> Result<Flow> {
        if !unit.text.is_empty() {
            // Discard any cancellation aimed at an earlier request
            self.shared.take_cancel_target();

            let synth =
                self.synthesizer
                    .synthesize(&unit.text, &unit.request_id, self.sink.as_ref());
            tokio::pin!(synth);

            loop {
                tokio::select! {
                    res = &mut synth => {
                        res?;
                        break;
                    }
                    _ = self.shared.shutdown.notified() => {
                        if !self.shared.is_running() {
                            // Dropping the pinned future aborts the exchange
                            return Ok(Flow::Stop);
                        }
                    }
                    _ = self.shared.cancel.notified() => {
                        let target = self.shared.take_cancel_target();
                        if target.as_deref() == Some(unit.request_id.as_str()) {
                            tracing::info!(request_id = %unit.request_id, "exchange cancelled");
                            self.sink
                                .emit(SinkEvent::AudioEnd {
                                    request_id: unit.request_id.clone(),
                                    reason: EndReason::Interrupted,
                                })
                                .await?;
                            return Ok(Flow::Continue);
                        }
                        // Stale wakeup for a request no longer in flight
                    }
                }
            }
        }

        if unit.is_end {
            self.sink
                .emit(SinkEvent::AudioEnd {
                    request_id: unit.request_id.clone(),
                    reason: EndReason::RequestEnd,
                })
                .await?;
        }

        Ok(Flow::Continue)
    }

    async fn report_runtime_error(&self, request_id: &str, message: String) {
        let report = self
            .sink
            .emit(SinkEvent::Error {
                request_id: request_id.to_string(),
                kind: ErrorKind::Runtime,
                message,
            })
            .await;
        if let Err(e) = report {
            tracing::error!("failed to report dispatch error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtsConfig;
    use crate::pipeline::sink::CollectorSink;

    fn test_dispatcher(
        sink: Arc<CollectorSink>,
    ) -> (mpsc::UnboundedSender<QueuedUnit>, Arc<Shared>, Dispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());
        let synthesizer =
            StreamSynthesizer::new(reqwest::Client::new(), Arc::new(TtsConfig::default()));
        let dispatcher = Dispatcher::new(
            rx,
            sink,
            synthesizer,
            shared.clone(),
            Duration::from_millis(10),
        );
        (tx, shared, dispatcher)
    }

    fn stop(shared: &Shared) {
        shared.set_running(false);
        shared.shutdown.notify_one();
    }

    #[tokio::test]
    async fn test_end_only_unit_emits_audio_end() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, shared, dispatcher) = test_dispatcher(sink.clone());
        let task = tokio::spawn(dispatcher.run());

        tx.send(QueuedUnit {
            unit: TextUnit::new("", "r1", true),
            generation: 0,
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop(&shared);
        task.await.unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            SinkEvent::AudioEnd {
                request_id: "r1".to_string(),
                reason: EndReason::RequestEnd,
            }
        );
    }

    #[tokio::test]
    async fn test_noop_unit_is_dropped() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, shared, dispatcher) = test_dispatcher(sink.clone());
        let task = tokio::spawn(dispatcher.run());

        tx.send(QueuedUnit {
            unit: TextUnit::new("", "r1", false),
            generation: 0,
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop(&shared);
        task.await.unwrap();

        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, shared, dispatcher) = test_dispatcher(sink.clone());

        // Enqueue before starting the loop, then flush
        tx.send(QueuedUnit {
            unit: TextUnit::new("", "old", true),
            generation: 0,
        })
        .unwrap();
        shared.bump_generation();
        tx.send(QueuedUnit {
            unit: TextUnit::new("", "new", true),
            generation: shared.current_generation(),
        })
        .unwrap();

        let task = tokio::spawn(dispatcher.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop(&shared);
        task.await.unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id(), "new");
    }

    #[tokio::test]
    async fn test_loop_exits_when_senders_drop() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, _shared, dispatcher) = test_dispatcher(sink);
        let task = tokio::spawn(dispatcher.run());

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("dispatcher should exit when all senders drop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_interrupts_idle_wait_promptly() {
        let sink = Arc::new(CollectorSink::new());
        let (_tx, shared, dispatcher) = test_dispatcher(sink);
        let task = tokio::spawn(dispatcher.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop(&shared);

        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("dispatcher should observe stop within the poll interval")
            .unwrap();
        assert!(!shared.is_running());
    }
}
