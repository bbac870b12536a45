//! Streaming status API: watch the pipeline as a `Stream` of snapshots.
//!
//! [`crate::progress::PipelineObserver`] pushes every event; this module is
//! the pull-style alternative for surfaces that would rather poll a stream
//! (a WebSocket handler, an SSE endpoint, a TUI loop).
//!
//! Snapshots come from a `watch` channel, so a slow consumer sees the latest
//! state rather than every intermediate one.

use crate::controller::PipelineController;
use crate::state::StatusSnapshot;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of status snapshots.
pub type StatusStream = Pin<Box<dyn Stream<Item = StatusSnapshot> + Send>>;

/// All snapshots from now on, starting with the current one.
///
/// The stream never ends on its own; drop it when done.
pub fn status_stream(controller: &PipelineController) -> StatusStream {
    Box::pin(WatchStream::new(controller.subscribe()))
}

/// Run the pipeline and stream its snapshots until the run settles.
///
/// The run is driven by polling the stream, so nothing happens until the
/// caller starts consuming it. The last item is the snapshot taken after the
/// run returned (`Succeeded`, `Failed`, or unchanged if the run never
/// started).
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdf2slides::{run_stream, PipelineConfig, PipelineController, NoopObserver};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let controller = PipelineController::from_config(&config, Arc::new(NoopObserver))?;
/// let mut updates = run_stream(&controller);
/// while let Some(snap) = updates.next().await {
///     println!("[{:>3}%] {}", snap.progress, snap.status);
/// }
/// # Ok(())
/// # }
/// ```
pub fn run_stream(controller: &PipelineController) -> StatusStream {
    let runner = controller.clone();
    let last = controller.clone();

    let updates = WatchStream::from_changes(controller.subscribe())
        .take_until(Box::pin(async move { runner.generate().await }))
        .chain(stream::once(async move { last.snapshot() }))
        .scan(None::<StatusSnapshot>, |prev, snap| {
            let repeat = prev.as_ref() == Some(&snap);
            *prev = Some(snap.clone());
            future::ready(Some((!repeat).then_some(snap)))
        })
        .filter_map(future::ready);

    Box::pin(updates)
}
