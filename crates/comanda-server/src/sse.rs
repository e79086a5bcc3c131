//! Translates a workflow engine's progress channel into Server-Sent
//! Events, injecting a 15-second heartbeat comment so intermediaries don't
//! close an idle connection while a step is in flight.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use comanda_core::workflow::{Engine, ProgressReceiver, ProgressUpdate};
use tokio_stream::Stream;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

fn to_event(update: ProgressUpdate) -> Event {
    match update {
        ProgressUpdate::Spinner(text) => Event::default().event("spinner").data(text),
        ProgressUpdate::Step(name) => Event::default().event("progress").data(name),
        ProgressUpdate::Complete(name) => Event::default().event("complete").data(name),
        ProgressUpdate::Error(message) => {
            let body = serde_json::json!({ "success": false, "error": message });
            Event::default().event("error").data(body.to_string())
        }
        ProgressUpdate::Output(content) => {
            let body = serde_json::json!({ "content": content });
            Event::default().event("output").data(body.to_string())
        }
    }
}

/// Spawn the engine's run to completion, forwarding every progress update
/// plus periodic heartbeats as SSE events. Always ends with exactly one of
/// `complete`/`error` as the terminal event.
pub fn run_streaming(mut engine: Engine, mut progress_rx: ProgressReceiver) -> Sse<SseStream> {
    let (out_tx, out_rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(64);

    tokio::spawn(async move {
        let run = tokio::spawn(async move { engine.run().await });

        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.tick().await; // skip the immediate first tick

        let mut run = std::pin::pin!(run);
        loop {
            tokio::select! {
                update = progress_rx.recv() => {
                    match update {
                        Some(update) => {
                            let _ = out_tx.send(Ok(to_event(update))).await;
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    let _ = out_tx.send(Ok(Event::default().comment("heartbeat"))).await;
                }
                result = &mut run => {
                    // The engine (and its progress sender) is dropped once its run
                    // future resolves, but updates it already queued may still be
                    // sitting unread in the channel. Drain them before the terminal
                    // event so a fast run can't lose its `progress`/`output` events.
                    while let Ok(update) = progress_rx.try_recv() {
                        let _ = out_tx.send(Ok(to_event(update))).await;
                    }

                    match result {
                        Ok(Ok(())) => {
                            let _ = out_tx.send(Ok(Event::default().event("complete").data("done"))).await;
                        }
                        Ok(Err(e)) => {
                            let body = serde_json::json!({ "success": false, "error": e.to_string() });
                            let _ = out_tx.send(Ok(Event::default().event("error").data(body.to_string()))).await;
                        }
                        Err(e) => {
                            let body = serde_json::json!({ "success": false, "error": e.to_string() });
                            let _ = out_tx.send(Ok(Event::default().event("error").data(body.to_string()))).await;
                        }
                    }
                    break;
                }
            }
        }
    });

    let stream: SseStream = Box::pin(tokio_stream::wrappers::ReceiverStream::new(out_rx));
    Sse::new(stream)
}
