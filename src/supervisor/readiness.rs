//! Frontend readiness before the backend is started.
//!
//! The fixed delay is the historical heuristic; the TCP probe waits until
//! the frontend actually accepts connections on its port.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::config::{ReadinessMode, SupervisorSettings};

/// How long to hold the backend back after the frontend starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Sleep for a fixed duration
    FixedDelay(Duration),
    /// Poll `addrs` every `interval` until any of them accepts a
    /// connection, at most `timeout`
    TcpProbe {
        addrs: Vec<SocketAddr>,
        timeout: Duration,
        interval: Duration,
    },
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        ReadinessPolicy::FixedDelay(Duration::from_secs(1))
    }
}

/// Outcome of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Probe gave up; startup proceeds anyway
    TimedOut,
    /// Shutdown was requested while waiting
    Cancelled,
}

impl ReadinessPolicy {
    /// Policy for a frontend listening on `port` of localhost. Dev servers
    /// may bind `localhost` to either loopback family, so both are probed.
    pub fn from_settings(settings: &SupervisorSettings, port: u16) -> Self {
        match settings.readiness {
            ReadinessMode::Delay => ReadinessPolicy::FixedDelay(settings.startup_delay()),
            ReadinessMode::Tcp => ReadinessPolicy::TcpProbe {
                addrs: vec![
                    SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
                    SocketAddr::from((Ipv6Addr::LOCALHOST, port)),
                ],
                timeout: settings.readiness_timeout(),
                interval: settings.probe_interval(),
            },
        }
    }

    pub async fn wait(&self, cancel: &CancellationToken) -> Readiness {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Readiness::Cancelled,
            readiness = self.wait_uncancelled() => readiness,
        }
    }

    async fn wait_uncancelled(&self) -> Readiness {
        match self {
            ReadinessPolicy::FixedDelay(delay) => {
                tokio::time::sleep(*delay).await;
                Readiness::Ready
            }
            ReadinessPolicy::TcpProbe {
                addrs,
                timeout,
                interval,
            } => probe(addrs, *timeout, *interval).await,
        }
    }
}

async fn probe(addrs: &[SocketAddr], timeout: Duration, interval: Duration) -> Readiness {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        for addr in addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Ok(Ok(_stream)) = tokio::time::timeout(remaining, TcpStream::connect(*addr)).await
            {
                tracing::debug!("{} accepted a connection after {} attempt(s)", addr, attempts);
                return Readiness::Ready;
            }
        }
        if Instant::now() + interval >= deadline {
            tracing::warn!(
                "{} not accepting connections after {:?}; starting backend anyway",
                describe(addrs),
                timeout
            );
            return Readiness::TimedOut;
        }
        tokio::time::sleep(interval).await;
    }
}

fn describe(addrs: &[SocketAddr]) -> String {
    addrs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" / ")
}
