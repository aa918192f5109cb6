//! Cross-worker log relaying
//!
//! Worker threads do not write log output themselves. Each worker installs a
//! [`RelayLayer`] as its thread-local subscriber (see [`bootstrap_worker`]); the layer
//! packs every event into a [`LogEnvelope`] and pushes it down a crossbeam channel.
//! A single listener thread owned by [`RelayHandle`] drains the channel and re-emits
//! each record through the configured [`RelaySink`].
//!
//! ```text
//! worker-0 ──┐
//! worker-1 ──┼──▶ channel ──▶ listener ──▶ sink (process tracing pipeline | writer)
//! worker-N ──┘
//! ```

use chrono::{DateTime, Local};
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Writer shared between the caller and the relay listener
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Where relayed records end up
#[derive(Clone, Default)]
pub enum RelaySink {
    /// Re-emit through the process-wide tracing dispatcher
    #[default]
    Tracing,
    /// Write formatted lines to an explicit writer
    Writer(SharedWriter),
}

impl fmt::Debug for RelaySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracing => f.write_str("Tracing"),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// A log event captured on a worker, plus where it came from
#[derive(Debug, Clone)]
pub struct LogEnvelope {
    pub level: Level,
    pub timestamp: DateTime<Local>,
    /// `{pid}:{thread name}` of the emitting worker
    pub origin: String,
    pub target: String,
    pub message: String,
}

impl LogEnvelope {
    /// `LEVEL: timestamp - origin - message`
    pub fn format(&self) -> String {
        format!(
            "{}: {} - {} - {}",
            self.level,
            self.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            self.origin,
            self.message
        )
    }
}

enum RelayMessage {
    Record(LogEnvelope),
    Stop,
}

/// Lifecycle of a relay listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Started,
    Stopped,
}

/// Producer side of the relay channel, cloned into every worker
#[derive(Clone)]
pub struct RelaySender {
    tx: Sender<RelayMessage>,
}

impl RelaySender {
    /// Queue a record. Records sent after the relay stopped are dropped.
    pub fn send(&self, envelope: LogEnvelope) {
        let _ = self.tx.send(RelayMessage::Record(envelope));
    }
}

/// Owner of the listener thread. Stops the listener when dropped.
pub struct RelayHandle {
    tx: Sender<RelayMessage>,
    listener: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn state(&self) -> RelayState {
        if self.listener.is_some() {
            RelayState::Started
        } else {
            RelayState::Stopped
        }
    }

    /// Flush queued records and join the listener. Later calls do nothing.
    pub fn stop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        // Anything queued before the sentinel is still emitted
        let _ = self.tx.send(RelayMessage::Stop);
        if listener.join().is_err() {
            tracing::warn!("Log relay listener exited abnormally");
        }
        tracing::trace!("Log relay stopped");
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry point for starting a relay
pub struct LogRelay;

impl LogRelay {
    pub fn start(sink: RelaySink) -> io::Result<(RelayHandle, RelaySender)> {
        let (tx, rx) = unbounded();

        let listener = thread::Builder::new()
            .name("basictools-log-relay".to_string())
            .spawn(move || listen(rx, sink))?;

        tracing::trace!("Log relay started");
        Ok((
            RelayHandle {
                tx: tx.clone(),
                listener: Some(listener),
            },
            RelaySender { tx },
        ))
    }
}

fn listen(rx: Receiver<RelayMessage>, sink: RelaySink) {
    for message in rx.iter() {
        match message {
            RelayMessage::Record(envelope) => emit(&sink, &envelope),
            RelayMessage::Stop => break,
        }
    }
}

fn emit(sink: &RelaySink, envelope: &LogEnvelope) {
    match sink {
        RelaySink::Writer(writer) => {
            if let Ok(mut writer) = writer.lock() {
                let _ = writeln!(writer, "{}", envelope.format());
                let _ = writer.flush();
            }
        }
        RelaySink::Tracing => {
            let origin = envelope.origin.as_str();
            let message = envelope.message.as_str();
            match envelope.level {
                Level::ERROR => tracing::error!(target: "basictools::relay", origin, "{}", message),
                Level::WARN => tracing::warn!(target: "basictools::relay", origin, "{}", message),
                Level::INFO => tracing::info!(target: "basictools::relay", origin, "{}", message),
                Level::DEBUG => tracing::debug!(target: "basictools::relay", origin, "{}", message),
                Level::TRACE => tracing::trace!(target: "basictools::relay", origin, "{}", message),
            }
        }
    }
}

/// Worker-side layer turning tracing events into relay records
pub struct RelayLayer {
    sender: RelaySender,
    origin: String,
}

impl RelayLayer {
    pub fn new(sender: RelaySender, origin: impl Into<String>) -> Self {
        Self {
            sender,
            origin: origin.into(),
        }
    }
}

impl<S: Subscriber> Layer<S> for RelayLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.sender.send(LogEnvelope {
            level: *metadata.level(),
            timestamp: Local::now(),
            origin: self.origin.clone(),
            target: metadata.target().to_string(),
            message: visitor.finish(),
        });
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
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
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

/// Keeps a worker attached to the relay; dropping it restores the previous subscriber
pub struct WorkerLogGuard {
    _guard: DefaultGuard,
}

/// Attach the calling thread's log output to a relay channel
pub fn bootstrap_worker(sender: RelaySender, level: LevelFilter) -> WorkerLogGuard {
    let current = thread::current();
    let origin = format!(
        "{}:{}",
        std::process::id(),
        current.name().unwrap_or("worker")
    );

    let subscriber = tracing_subscriber::registry()
        .with(level)
        .with(RelayLayer::new(sender, origin));

    WorkerLogGuard {
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_buffer() -> (Arc<Mutex<Vec<u8>>>, RelaySink) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink: SharedWriter = buffer.clone();
        (buffer, RelaySink::Writer(sink))
    }

    fn contents(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_envelope_format() {
        let envelope = LogEnvelope {
            level: Level::WARN,
            timestamp: Local::now(),
            origin: "42:worker".to_string(),
            target: "test".to_string(),
            message: "disk almost full".to_string(),
        };
        let line = envelope.format();
        assert!(line.starts_with("WARN: "));
        assert!(line.ends_with(" - 42:worker - disk almost full"));
    }

    #[test]
    fn test_worker_events_reach_writer_sink() {
        let (buffer, sink) = shared_buffer();
        let (mut handle, sender) = LogRelay::start(sink).unwrap();
        assert_eq!(handle.state(), RelayState::Started);

        thread::Builder::new()
            .name("relay-test-worker".to_string())
            .spawn(move || {
                let _guard = bootstrap_worker(sender, LevelFilter::INFO);
                tracing::info!(item = 3, "processing item");
                tracing::debug!("filtered out");
            })
            .unwrap()
            .join()
            .unwrap();

        handle.stop();
        assert_eq!(handle.state(), RelayState::Stopped);

        let output = contents(&buffer);
        assert!(output.contains("INFO: "));
        assert!(output.contains(":relay-test-worker - processing item item=3"));
        assert!(!output.contains("filtered out"));
    }

    #[test]
    fn test_records_after_stop_are_discarded() {
        let (buffer, sink) = shared_buffer();
        let (mut handle, sender) = LogRelay::start(sink).unwrap();
        handle.stop();
        handle.stop();

        sender.send(LogEnvelope {
            level: Level::INFO,
            timestamp: Local::now(),
            origin: "late".to_string(),
            target: "test".to_string(),
            message: "too late".to_string(),
        });
        assert!(contents(&buffer).is_empty());
    }

    #[test]
    fn test_drop_releases_listener_and_sink() {
        let (buffer, sink) = shared_buffer();
        let (handle, sender) = LogRelay::start(sink).unwrap();
        drop(sender);
        drop(handle);
        assert_eq!(Arc::strong_count(&buffer), 1);
    }
}
