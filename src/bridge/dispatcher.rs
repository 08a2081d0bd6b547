use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use super::flush::{FlushListener, FlushSignal, ListenerId};
use super::operation::Operation;
use super::queue::OperationQueue;
use super::BridgeError;
use crate::canvas::PackerKind;
use crate::config::BridgeConfig;
use crate::transport::{NativeTransport, Properties};

/// What a failing fire-and-forget dispatch does to the rest of the drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailurePolicy {
    /// Log the failure and keep draining.
    #[default]
    Log,
    /// Stop at the failure and return it; unsent operations stay queued.
    Raise,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub dispatched: usize,
    pub failed: usize,
    pub listeners_run: usize,
    pub listener_failures: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.dispatched += other.dispatched;
        self.failed += other.failed;
        self.listeners_run += other.listeners_run;
        self.listener_failures += other.listener_failures;
    }
}

/// Buffers mutations issued during a script turn and drains them to the native side.
///
/// Mutations (`create`, `set`, `listen`, `destroy`) are queued; `get` and `call` drain
/// the queue before crossing the boundary so a read always observes every write queued
/// ahead of it.
pub struct NativeBridge {
    transport: Box<dyn NativeTransport>,
    queue: OperationQueue,
    signal: FlushSignal,
    policy: DispatchFailurePolicy,
    canvas_packer: PackerKind,
    id_prefix: String,
    next_id: u64,
    firing: bool,
    // drains run by listeners while the signal is being raised
    listener_drains: FlushReport,
}

impl NativeBridge {
    pub fn new(transport: impl NativeTransport + 'static) -> Self {
        Self::with_config(transport, &BridgeConfig::default())
    }

    pub fn with_config(transport: impl NativeTransport + 'static, config: &BridgeConfig) -> Self {
        Self {
            transport: Box::new(transport),
            queue: OperationQueue::new(),
            signal: FlushSignal::new(),
            policy: config.dispatch_failure,
            canvas_packer: config.canvas_packer,
            id_prefix: config.id_prefix.clone(),
            next_id: 0,
            firing: false,
            listener_drains: FlushReport::default(),
        }
    }

    /// Packing strategy new canvases use unless told otherwise.
    pub fn packer_kind(&self) -> PackerKind {
        self.canvas_packer
    }

    /// Returns a fresh object id such as `$1`.
    pub fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}{}", self.id_prefix, self.next_id)
    }

    pub fn enqueue_create(
        &mut self,
        id: impl Into<String>,
        object_type: impl Into<String>,
        properties: Properties,
    ) {
        self.queue.enqueue_create(id, object_type, properties);
    }

    pub fn enqueue_set(&mut self, id: &str, properties: Properties) {
        self.queue.enqueue_set(id, properties);
    }

    pub fn enqueue_listen(&mut self, id: impl Into<String>, event: impl Into<String>, enabled: bool) {
        self.queue.enqueue_listen(id, event, enabled);
    }

    pub fn enqueue_destroy(&mut self, id: impl Into<String>) {
        self.queue.enqueue_destroy(id);
    }

    pub fn pending(&self) -> &[Operation] {
        self.queue.operations()
    }

    /// Drains every queued operation to the transport in submission order.
    ///
    /// Operations queued while the drain is running are sent by the same call.
    pub fn flush(&mut self) -> Result<FlushReport, BridgeError> {
        let mut report = FlushReport::default();
        loop {
            let batch = self.queue.take();
            if batch.is_empty() {
                break;
            }

            let mut operations = batch.into_iter();
            while let Some(operation) = operations.next() {
                match operation.dispatch(self.transport.as_mut()) {
                    Ok(()) => report.dispatched += 1,
                    Err(err) => {
                        report.failed += 1;
                        error!(
                            target: "bridge",
                            id = %operation.id(),
                            operation = operation.name(),
                            error = %err,
                            "native dispatch failed"
                        );
                        if self.policy == DispatchFailurePolicy::Raise {
                            let unsent: Vec<Operation> = operations.collect();
                            if !unsent.is_empty() {
                                warn!(
                                    target: "bridge",
                                    operations = unsent.len(),
                                    "requeued operations after failed dispatch"
                                );
                            }
                            self.queue.requeue_front(unsent);
                            self.record_listener_drain(report);
                            return Err(BridgeError::Dispatch {
                                operation: operation.name(),
                                id: operation.id().to_string(),
                                source: err,
                            });
                        }
                    }
                }
            }
        }

        if report.dispatched > 0 || report.failed > 0 {
            debug!(
                target: "bridge",
                dispatched = report.dispatched,
                failed = report.failed,
                "flushed operations"
            );
        }
        self.record_listener_drain(report);
        Ok(report)
    }

    fn record_listener_drain(&mut self, report: FlushReport) {
        if self.firing {
            self.listener_drains.absorb(report);
        }
    }

    pub fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, BridgeError> {
        self.flush()?;
        Ok(self.transport.get(id, property)?)
    }

    pub fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, BridgeError> {
        self.flush()?;
        Ok(self.transport.call(id, method, parameters)?)
    }

    pub fn on_flush(&mut self, listener: FlushListener) -> ListenerId {
        self.signal.register(listener)
    }

    pub fn off_flush(&mut self, id: ListenerId) -> bool {
        self.signal.unregister(id)
    }

    pub fn flush_listeners(&self) -> usize {
        self.signal.len()
    }

    /// Raises the flush signal: runs every listener, then drains the queue.
    ///
    /// Anything a listener enqueues is therefore sent before this returns, and drains a
    /// listener runs itself are counted in the returned report. Under
    /// [`DispatchFailurePolicy::Raise`] a dispatch failure inside a listener ends the
    /// trigger with that error. Called while the signal is already being raised, it only
    /// drains.
    pub fn trigger_flush(&mut self) -> Result<FlushReport, BridgeError> {
        if self.firing {
            return self.flush();
        }

        self.firing = true;
        let listeners = self.fire_listeners();
        self.firing = false;
        let drained = std::mem::take(&mut self.listener_drains);
        let listeners = listeners?;

        let mut report = self.flush()?;
        report.absorb(listeners);
        report.absorb(drained);
        Ok(report)
    }

    fn fire_listeners(&mut self) -> Result<FlushReport, BridgeError> {
        let mut report = FlushReport::default();
        let mut cursor = None;
        while let Some((id, listener)) = self.signal.next_after(cursor) {
            cursor = Some(id);
            let Ok(mut callback) = listener.try_borrow_mut() else {
                continue;
            };
            report.listeners_run += 1;
            match (&mut *callback)(self) {
                Ok(()) => {}
                Err(err @ BridgeError::Dispatch { .. })
                    if self.policy == DispatchFailurePolicy::Raise =>
                {
                    return Err(err);
                }
                Err(err) => {
                    report.listener_failures += 1;
                    error!(target: "bridge", listener = ?id, error = %err, "flush listener failed");
                }
            }
        }
        Ok(report)
    }
}
