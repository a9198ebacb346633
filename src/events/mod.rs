//! The event pipeline: building, queueing, batching, and dispatching
//! impression and conversion events.
mod builder;
mod dispatcher;
mod event;
mod processor;
mod queue;

pub use builder::{build_conversion_event, build_impression_event};
pub use dispatcher::{EventDispatcher, HttpEventDispatcher, DEFAULT_EVENTS_ENDPOINT};
pub use event::{
    Batch, ConversionEvent, DecisionMetadata, EventContext, ImpressionEvent, LogEvent, Snapshot,
    SnapshotDecision, SnapshotEvent, UserEvent, Visitor, VisitorAttribute, CLIENT_NAME,
    CLIENT_VERSION, IMPRESSION_EVENT_KEY,
};
pub use processor::{
    BatchEventProcessor, DispatchListener, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_QUEUE_SIZE,
};
pub use queue::{EventQueue, InMemoryQueue};
