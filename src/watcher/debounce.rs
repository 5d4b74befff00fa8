//! Debounce stage between raw notify callbacks and the supervisor.
//!
//! A burst opens a window at its first change; every change observed
//! before the window closes is folded into one [`ChangeEvent`], emitted
//! when the window closes. Events leave in the order their windows close.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ChangeEvent;

/// Run until cancelled, the raw source closes, or the consumer goes away
pub(crate) async fn run_debouncer(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    window: Duration,
    events: mpsc::Sender<ChangeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            path = raw.recv() => match path {
                Some(path) => path,
                None => break,
            },
        };

        let mut paths = BTreeSet::from([first]);
        let window_end = tokio::time::sleep_until(Instant::now() + window);
        tokio::pin!(window_end);
        let mut source_closed = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = &mut window_end => break,
                path = raw.recv() => match path {
                    Some(path) => {
                        paths.insert(path);
                    }
                    None => {
                        source_closed = true;
                        break;
                    }
                },
            }
        }

        let event = ChangeEvent::new(paths);
        tracing::debug!("change window closed: {}", event.summary());
        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = events.send(event) => sent.is_ok(),
        };
        if !delivered || source_closed {
            break;
        }
    }
    tracing::debug!("debouncer stopped");
}
