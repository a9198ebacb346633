//! Delivery of batched events to the events endpoint.
use std::sync::Arc;

use reqwest::blocking::Client;

use super::event::LogEvent;
use crate::{Error, Result};

/// Default events endpoint.
pub const DEFAULT_EVENTS_ENDPOINT: &str = "https://events.flagship.io/v1/events";

/// The sink consuming finished batches.
///
/// Delivery is best-effort: an `Err` makes the processor retain the batch's
/// events in the queue for the next trigger, `Ok(())` removes them. The
/// dispatcher owns its own timeouts; the processor does not impose one.
pub trait EventDispatcher: Send + Sync {
    fn dispatch_event(&self, event: &LogEvent) -> Result<()>;
}

impl<T: EventDispatcher + ?Sized> EventDispatcher for Arc<T> {
    fn dispatch_event(&self, event: &LogEvent) -> Result<()> {
        (**self).dispatch_event(event)
    }
}

/// The default dispatcher: POST the batch as JSON to the endpoint.
pub struct HttpEventDispatcher {
    client: Client,
}

impl Default for HttpEventDispatcher {
    fn default() -> HttpEventDispatcher {
        HttpEventDispatcher::new()
    }
}

impl HttpEventDispatcher {
    pub fn new() -> HttpEventDispatcher {
        HttpEventDispatcher {
            client: Client::new(),
        }
    }
}

impl EventDispatcher for HttpEventDispatcher {
    fn dispatch_event(&self, event: &LogEvent) -> Result<()> {
        let url = url::Url::parse(&event.endpoint_url).map_err(Error::InvalidEndpoint)?;
        let response = self.client.post(url).json(&event.event).send()?;

        let status = response.status();
        if status.is_success() {
            log::debug!(
                target: "flagship",
                "dispatched batch of {} visitors",
                event.event.visitors.len()
            );
            Ok(())
        } else {
            Err(Error::Dispatch {
                status: status.as_u16(),
            })
        }
    }
}
