use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use super::{config::AlertContext, discord::DiscordAlertSink};

const QUEUE_CAPACITY: usize = 128;
const REDACTED: &str = "[REDACTED]";

/// Field names whose values never leave the process.
const SENSITIVE_MARKERS: &[&str] = &[
    "authority",
    "authorization",
    "card",
    "jwt",
    "merchant",
    "password",
    "secret",
    "token",
    "webhook",
];

#[derive(Debug, Clone)]
pub(crate) struct Alert {
    pub(crate) level: Level,
    pub(crate) at: DateTime<Utc>,
    pub(crate) context: AlertContext,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: String,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
}

/// Hands alerts to a background task so the logging call site never waits on HTTP.
#[derive(Clone)]
pub(crate) struct AlertQueue {
    tx: mpsc::Sender<Alert>,
}

impl AlertQueue {
    pub(crate) fn spawn(sink: DiscordAlertSink) -> Self {
        let (tx, mut rx) = mpsc::channel::<Alert>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(err) = sink.deliver(&alert).await {
                    // Emitted at warn so it cannot loop back through an error-level sink.
                    tracing::warn!(error = %err, "observability: discord alert not delivered");
                }
            }
        });

        Self { tx }
    }

    fn push(&self, alert: Alert) {
        if let Err(err) = self.tx.try_send(alert) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            tracing::warn!(reason, "observability: alert queue rejected alert");
        }
    }
}

pub(crate) struct AlertLayer {
    queue: AlertQueue,
    context: AlertContext,
}

impl AlertLayer {
    pub(crate) fn new(queue: AlertQueue, context: AlertContext) -> Self {
        Self { queue, context }
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        // Delivery failures are reported by this module itself.
        if metadata.target() == module_path!() {
            return;
        }

        let mut fields = RedactingVisitor::default();
        event.record(&mut fields);
        let message = fields.values.remove("message").unwrap_or_default();

        let span_path = ctx
            .event_span(event)
            .map(|span| {
                span.scope()
                    .from_root()
                    .map(|span| span.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        self.queue.push(Alert {
            level: *metadata.level(),
            at: Utc::now(),
            context: self.context.clone(),
            target: metadata.target().to_string(),
            location: metadata
                .file()
                .zip(metadata.line())
                .map(|(file, line)| format!("{file}:{line}")),
            message,
            fields: fields.values,
            span_path,
        });
    }
}

#[derive(Default)]
struct RedactingVisitor {
    values: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        let value = if is_sensitive(name) {
            REDACTED.to_string()
        } else {
            value
        };
        self.values.insert(name.to_string(), value);
    }
}

impl Visit for RedactingVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

pub(crate) fn is_sensitive(field_name: &str) -> bool {
    let name = field_name.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker))
}
