//! Bridge from OS signals to supervisor requests.
//!
//! Ctrl-C and SIGTERM request shutdown; repeats are absorbed so a second
//! interrupt never kills the supervisor mid-teardown. SIGHUP restarts the
//! backend.

use tokio::task::JoinHandle;

use crate::supervisor::SupervisorHandle;

/// Spawn the bridge task; abort it once the supervisor has stopped
pub fn spawn_signal_bridge(handle: SupervisorHandle) -> JoinHandle<()> {
    tokio::spawn(bridge(handle))
}

#[cfg(unix)]
async fn bridge(handle: SupervisorHandle) {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn register(kind: SignalKind, label: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!("cannot listen for {}: {}", label, e);
                None
            }
        }
    }

    async fn recv(stream: &mut Option<Signal>) {
        match stream {
            Some(stream) => {
                if stream.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending().await,
        }
    }

    let mut interrupt = register(SignalKind::interrupt(), "SIGINT");
    let mut terminate = register(SignalKind::terminate(), "SIGTERM");
    let mut hangup = register(SignalKind::hangup(), "SIGHUP");

    loop {
        tokio::select! {
            _ = recv(&mut interrupt) => {
                tracing::info!("[launcher] interrupt received");
                handle.request_shutdown();
            }
            _ = recv(&mut terminate) => {
                tracing::info!("[launcher] termination requested");
                handle.request_shutdown();
            }
            _ = recv(&mut hangup) => {
                tracing::info!("[launcher] SIGHUP: restarting backend");
                if !handle.request_restart() {
                    return;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn bridge(handle: SupervisorHandle) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("[launcher] interrupt received");
        handle.request_shutdown();
    }
}
