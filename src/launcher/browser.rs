//! Browser tab for the frontend, opened once startup completes

use tokio::task::JoinHandle;

/// Open `url` in the default browser on a blocking thread.
///
/// Failures are logged and otherwise ignored; callers need not await the
/// returned handle.
pub fn open_browser(url: String) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        tracing::info!("[launcher] opening {}", url);
        if let Err(e) = webbrowser::open(&url) {
            tracing::warn!("[launcher] could not open a browser at {}: {}", url, e);
        }
    })
}
