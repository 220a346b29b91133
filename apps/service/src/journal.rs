//! Persists the service's own log events as [`LogEntry`] rows.
//!
//! [`JournalLayer`] is installed into the tracing subscriber at startup and
//! only forwards events into a channel; [`spawn_writer`] drains that channel
//! into the event store once the store exists.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, debug, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::database::{EventStore, LogEntry, LogLevel};

/// Targets whose events are journaled
const JOURNALED_TARGETS: &[&str] = &["linkwatch_service", "linkwatch_server"];

pub type JournalReceiver = mpsc::UnboundedReceiver<LogEntry>;

/// Forwards INFO and above from the linkwatch crates to a channel.
/// Events from this module are skipped so a failing store can't feed itself.
pub struct JournalLayer {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl JournalLayer {
    pub fn new() -> (Self, JournalReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn accepts(level: &Level, target: &str) -> bool {
        *level <= Level::INFO
            && !target.starts_with(module_path!())
            && JOURNALED_TARGETS.iter().any(|prefix| target.starts_with(prefix))
    }
}

impl<S: Subscriber> Layer<S> for JournalLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !Self::accepts(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry::new(chrono::Utc::now().timestamp(), LogLevel::from(metadata.level()), visitor.finish());
        // the writer is gone during shutdown; dropping entries then is fine
        let _ = self.tx.send(entry);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} ({})", self.message, self.fields.join(", "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Drain journaled entries into `store` until cancelled, then flush whatever
/// is still buffered.
pub fn spawn_writer(
    mut rx: JournalReceiver,
    store: Arc<dyn EventStore>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                entry = rx.recv() => match entry {
                    Some(entry) => persist(store.as_ref(), &entry).await,
                    None => break,
                },
            }
        }

        while let Ok(entry) = rx.try_recv() {
            persist(store.as_ref(), &entry).await;
        }
        debug!("Journal writer stopped");
    })
}

async fn persist(store: &dyn EventStore, entry: &LogEntry) {
    if let Err(e) = store.save_log(entry).await {
        warn!("Failed to journal log entry: {}", e);
    }
}
