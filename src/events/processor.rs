//! The batch event processor: a bounded queue drained by one background
//! worker on size and time triggers.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::dispatcher::{EventDispatcher, HttpEventDispatcher, DEFAULT_EVENTS_ENDPOINT};
use super::event::{Batch, LogEvent, UserEvent, Visitor};
use super::queue::{EventQueue, InMemoryQueue};
use crate::execution::ExecutionContext;
use crate::{Error, Result};

/// Default maximum number of queued events.
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Default size trigger: a flush is signaled once this many events queue up.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default time trigger.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Callback invoked with each [`LogEvent`] after a successful dispatch.
pub type DispatchListener = Box<dyn Fn(&LogEvent) + Send>;

enum WorkerSignal {
    Flush,
    Stop,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: BTreeMap<u64, DispatchListener>,
}

/// An asynchronous, bounded, time-and-size-triggered event pipeline.
///
/// Producers enqueue events from any thread without blocking; a single
/// background worker drains the queue into homogeneous batches and hands them
/// to the dispatcher. Events of a failed dispatch stay queued for the next
/// trigger; with a permanently failing dispatcher the queue eventually fills
/// and rejects new events.
///
/// Create with [`BatchEventProcessor::new`], customize with the `with_*`
/// builders, then call [`BatchEventProcessor::start`].
pub struct BatchEventProcessor {
    queue: Arc<dyn EventQueue>,
    dispatcher: Arc<dyn EventDispatcher>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    queue_size: usize,
    batch_size: usize,
    flush_interval: Duration,
    endpoint_url: String,
    sdk_key: Option<String>,
    custom_queue: bool,
    started: AtomicBool,
    stopped: Arc<AtomicBool>,
    signal_tx: SyncSender<WorkerSignal>,
    signal_rx: Mutex<Option<Receiver<WorkerSignal>>>,
}

impl Default for BatchEventProcessor {
    fn default() -> BatchEventProcessor {
        BatchEventProcessor::new()
    }
}

impl BatchEventProcessor {
    /// A processor with default configuration.
    pub fn new() -> BatchEventProcessor {
        // Buffer size of 1 is enough: a pending Flush already guarantees a
        // wake-up, and Stop is delivered with a blocking send.
        let (signal_tx, signal_rx) = std::sync::mpsc::sync_channel(1);
        BatchEventProcessor {
            queue: Arc::new(InMemoryQueue::new(DEFAULT_QUEUE_SIZE)),
            dispatcher: Arc::new(HttpEventDispatcher::new()),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            queue_size: DEFAULT_QUEUE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            endpoint_url: DEFAULT_EVENTS_ENDPOINT.to_owned(),
            sdk_key: None,
            custom_queue: false,
            started: AtomicBool::new(false),
            stopped: Arc::new(AtomicBool::new(false)),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
        }
    }

    /// Update the maximum number of queued events.
    pub fn with_queue_size(mut self, queue_size: usize) -> BatchEventProcessor {
        self.queue_size = queue_size;
        if !self.custom_queue {
            self.queue = Arc::new(InMemoryQueue::new(queue_size));
        }
        self
    }

    /// Update the size trigger threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> BatchEventProcessor {
        self.batch_size = batch_size;
        self
    }

    /// Update the time trigger period.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> BatchEventProcessor {
        self.flush_interval = flush_interval;
        self
    }

    /// Replace the backing queue.
    pub fn with_queue(mut self, queue: impl EventQueue + 'static) -> BatchEventProcessor {
        self.queue = Arc::new(queue);
        self.custom_queue = true;
        self
    }

    /// Replace the dispatcher.
    pub fn with_event_dispatcher(
        mut self,
        dispatcher: impl EventDispatcher + 'static,
    ) -> BatchEventProcessor {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Update the events endpoint.
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> BatchEventProcessor {
        self.endpoint_url = endpoint_url.into();
        self
    }

    /// Set the tenant SDK key stamped onto dispatch notifications.
    pub fn with_sdk_key(mut self, sdk_key: impl Into<String>) -> BatchEventProcessor {
        self.sdk_key = Some(sdk_key.into());
        self
    }

    /// Launch the background worker. Idempotent: repeated calls do not
    /// launch extra workers. The worker's lifetime is bounded by `ctx`;
    /// terminating the context performs one final drain-and-flush before
    /// [`ExecutionContext::terminate_and_wait`] returns.
    pub fn start(&self, ctx: &ExecutionContext) {
        if self.started.swap(true, Ordering::SeqCst) {
            log::debug!(target: "flagship", "event processor already started");
            return;
        }

        let receiver = self
            .signal_rx
            .lock()
            .unwrap()
            .take()
            .expect("signal receiver is present until the first start");

        let guard = ctx.register({
            let signal_tx = self.signal_tx.clone();
            move || {
                // Blocking send: a buffered Flush may be in the way, and the
                // stop signal must not be lost. The worker drains the channel
                // promptly, so this cannot stall for long.
                let _ = signal_tx.send(WorkerSignal::Stop);
            }
        });

        let worker = Worker {
            queue: self.queue.clone(),
            dispatcher: self.dispatcher.clone(),
            listeners: self.listeners.clone(),
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
            endpoint_url: self.endpoint_url.clone(),
            sdk_key: self.sdk_key.clone(),
            stopped: self.stopped.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("flagship-event-processor".to_owned())
            .spawn(move || {
                worker.run(receiver);
                guard.done();
            });
        if let Err(err) = spawned {
            self.started.store(false, Ordering::SeqCst);
            log::error!(target: "flagship", "unable to start event processor worker: {err}");
        }
    }

    /// Enqueue an event. Non-blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::ProcessorNotRunning`] before [`BatchEventProcessor::start`]
    ///   or after shutdown; the event is dropped.
    /// - [`Error::QueueFull`] when the queue is at capacity; the event is
    ///   dropped.
    pub fn process_event(&self, event: UserEvent) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            log::warn!(target: "flagship", "event dropped: processor is not running");
            return Err(Error::ProcessorNotRunning);
        }

        if self.queue.size() >= self.queue_size || !self.queue.add(event) {
            log::warn!(
                target: "flagship",
                "event dropped: queue is at capacity ({})",
                self.queue_size
            );
            return Err(Error::QueueFull {
                capacity: self.queue_size,
            });
        }

        if self.queue.size() >= self.batch_size {
            match self.signal_tx.try_send(WorkerSignal::Flush) {
                Ok(()) | Err(TrySendError::Full(_)) => {
                    // Full means a wake-up is already pending.
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!(target: "flagship", "event processor worker is gone");
                }
            }
        }

        Ok(())
    }

    /// Current queue length.
    pub fn events_count(&self) -> usize {
        self.queue.size()
    }

    /// Register a listener invoked with every dispatched [`LogEvent`].
    /// Listeners run on the worker thread, sequentially, after a successful
    /// dispatch; a slow listener stalls the pipeline.
    pub fn on_event_dispatch(&self, listener: impl Fn(&LogEvent) + Send + 'static) -> u64 {
        let mut registry = self.listeners.lock().unwrap();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.insert(id, Box::new(listener));
        id
    }

    /// Unregister a listener by the id returned from
    /// [`BatchEventProcessor::on_event_dispatch`].
    pub fn remove_on_event_dispatch(&self, id: u64) -> bool {
        let mut registry = self.listeners.lock().unwrap();
        registry.listeners.remove(&id).is_some()
    }
}

/// Everything the background worker needs, detached from the handle.
struct Worker {
    queue: Arc<dyn EventQueue>,
    dispatcher: Arc<dyn EventDispatcher>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    batch_size: usize,
    flush_interval: Duration,
    endpoint_url: String,
    sdk_key: Option<String>,
    stopped: Arc<AtomicBool>,
}

impl Worker {
    /// The cooperative loop: waits on (tick | queue signal | stop) and
    /// drains accordingly. Runs one final flush on shutdown.
    fn run(&self, receiver: Receiver<WorkerSignal>) {
        loop {
            match receiver.recv_timeout(self.flush_interval) {
                Ok(WorkerSignal::Flush) => {
                    if self.queue.size() >= self.batch_size {
                        self.flush_events();
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.flush_events(),
                Ok(WorkerSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::debug!(target: "flagship", "event processor stopped, draining queue");
        self.flush_events();
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Drain the queue into maximal runs of batch-compatible events, one
    /// LogEvent per run, dispatched synchronously. Events of a failed
    /// dispatch are left in place and flushing stops until the next trigger.
    fn flush_events(&self) {
        while self.queue.size() > 0 {
            let events = self.queue.get(self.batch_size);
            if events.is_empty() {
                break;
            }

            let mut batch: Option<Batch> = None;
            let mut batched = 0;
            for event in &events {
                match &mut batch {
                    None => {
                        batch = Some(Batch::from_user_event(event));
                        batched = 1;
                    }
                    Some(batch) => {
                        if !event.batch_compatible(batch) {
                            break;
                        }
                        batch.visitors.push(Visitor::from_user_event(event));
                        batched += 1;
                    }
                }
                if batched >= self.batch_size {
                    break;
                }
            }
            let Some(batch) = batch else {
                break;
            };

            let log_event = LogEvent::new(self.endpoint_url.clone(), batch);
            match self.dispatcher.dispatch_event(&log_event) {
                Ok(()) => {
                    self.queue.remove(batched);
                    self.notify_listeners(&log_event);
                }
                Err(err) => {
                    log::warn!(
                        target: "flagship",
                        "failed to dispatch batch, retaining {batched} events for retry: {err}"
                    );
                    return;
                }
            }
        }
    }

    fn notify_listeners(&self, log_event: &LogEvent) {
        let registry = self.listeners.lock().unwrap();
        for listener in registry.listeners.values() {
            listener(log_event);
        }
        if let Some(sdk_key) = &self.sdk_key {
            log::debug!(
                target: "flagship",
                "published log event notification for sdk key {sdk_key:?}"
            );
        }
    }
}
