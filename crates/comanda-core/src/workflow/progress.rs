//! Progress channel — a tagged-union update an engine emits as it runs,
//! consumed by whatever drives it (the HTTP layer's SSE writer, the CLI's
//! spinner). Kept free of any HTTP-specific shape so the engine never has
//! to know about SSE framing.

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Spinner(String),
    Step(String),
    Complete(String),
    Error(String),
    Output(String),
}

pub type ProgressSender = mpsc::Sender<ProgressUpdate>;
pub type ProgressReceiver = mpsc::Receiver<ProgressUpdate>;

/// A single-producer/single-consumer bounded channel sized for a handful of
/// in-flight updates; the consumer is expected to drain promptly.
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    mpsc::channel(capacity)
}
