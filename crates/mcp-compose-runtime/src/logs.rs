//! Container log streams

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::DropGuard;

/// Options for `logs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: bool,
    /// Number of trailing lines (engine default when `None`)
    pub tail: Option<usize>,
    /// Prefix each line with the engine's RFC3339 timestamp
    pub timestamps: bool,
    /// Only lines after this RFC3339 instant or relative duration (`10m`)
    pub since: Option<String>,
}

impl LogOptions {
    pub fn follow(tail: usize) -> Self {
        Self {
            follow: true,
            tail: Some(tail),
            ..Default::default()
        }
    }

    pub fn tail(tail: usize) -> Self {
        Self {
            tail: Some(tail),
            ..Default::default()
        }
    }

    /// Engine CLI arguments after `logs`, excluding the container name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.follow {
            args.push("--follow".to_string());
        }
        if let Some(tail) = self.tail {
            args.push("--tail".to_string());
            args.push(tail.to_string());
        }
        if self.timestamps {
            args.push("--timestamps".to_string());
        }
        if let Some(since) = &self.since {
            args.push("--since".to_string());
            args.push(since.clone());
        }
        args
    }
}

/// Which output a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
}

/// Item yielded by a [`LogStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Line { source: LogSource, text: String },
    /// The engine stream finished; always the last item
    Ended { reason: String },
}

/// Stream of log events. Dropping it cancels the underlying follow and
/// kills the engine child.
pub struct LogStream {
    inner: Pin<Box<dyn Stream<Item = LogEvent> + Send>>,
    _guard: Option<DropGuard>,
}

impl LogStream {
    pub fn new(inner: impl Stream<Item = LogEvent> + Send + 'static, guard: Option<DropGuard>) -> Self {
        Self {
            inner: Box::pin(inner),
            _guard: guard,
        }
    }

    /// Finite stream of stdout lines followed by `Ended`.
    pub fn from_lines<I, S>(lines: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<LogEvent> = lines
            .into_iter()
            .map(|l| LogEvent::Line {
                source: LogSource::Stdout,
                text: l.into(),
            })
            .collect();
        events.push(LogEvent::Ended {
            reason: reason.into(),
        });
        Self::new(futures::stream::iter(events), None)
    }
}

impl Stream for LogStream {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
