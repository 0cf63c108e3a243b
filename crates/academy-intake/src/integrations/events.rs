use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::records::{Course, Enrollment, Payment, Person};

/// Domain changes announced to connected dashboards.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    EnrollmentCreated {
        enrollment: Enrollment,
        person: Person,
        course: Course,
    },
    EnrollmentUpdated {
        enrollment: Enrollment,
    },
    PaymentCreated {
        payment: Payment,
    },
    PaymentUpdated {
        payment: Payment,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EnrollmentCreated { .. } => "enrollment.created",
            DomainEvent::EnrollmentUpdated { .. } => "enrollment.updated",
            DomainEvent::PaymentCreated { .. } => "payment.created",
            DomainEvent::PaymentUpdated { .. } => "payment.updated",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            DomainEvent::EnrollmentCreated {
                enrollment,
                person,
                course,
            } => json!({
                "enrollment": enrollment,
                "person": person,
                "course": course,
            }),
            DomainEvent::EnrollmentUpdated { enrollment } => json!({ "enrollment": enrollment }),
            DomainEvent::PaymentCreated { payment } | DomainEvent::PaymentUpdated { payment } => {
                json!({ "payment": payment })
            }
        }
    }
}

/// Fire-and-forget publication. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Fans events out to every live subscriber over a bounded broadcast channel.
/// Slow subscribers lose the oldest events.
pub struct BroadcastHub {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastHub {
    fn publish(&self, event: DomainEvent) {
        let name = event.name();
        // Sending fails only when nobody listens.
        if let Ok(receivers) = self.sender.send(event) {
            tracing::debug!(event = name, receivers, "event broadcast");
        }
    }
}

/// `GET /api/v1/events` as a Server-Sent Events stream.
pub fn event_router(hub: Arc<BroadcastHub>) -> Router {
    Router::new()
        .route("/api/v1/events", get(stream_handler))
        .with_state(hub)
}

async fn stream_handler(
    State(hub): State<Arc<BroadcastHub>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(hub.subscribe()))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn event_stream(
    receiver: broadcast::Receiver<DomainEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let frame = Event::default()
                        .event(event.name())
                        .data(event.payload().to_string());
                    return Some((Ok(frame), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, dropping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
