//! Newline-delimited JSON push endpoint for dashboard clients
//!
//! Every accepted connection subscribes to the [`EventHub`]. When any tracked
//! channel has history, the first line is `{"history":{name:[{timestamp,value}]}}`
//! for chart seeding. Then comes the accumulated snapshot and one JSON object
//! per update, each terminated by `\n`. The server never reads from clients.
//! A failed write ends the connection and releases its subscription.

use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::history::{HistoryPoint, SampleHistory};
use crate::hub::{EventHub, Subscription};
use crate::{Result, TelemetryError};

/// Bind the push endpoint.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        TelemetryError::transport_failed_with_source(format!("couldn't listen on {addr}"), Box::new(e))
    })
}

/// First line sent to a client when there is history to seed charts with.
#[derive(Serialize)]
struct HistorySeed {
    history: BTreeMap<String, Vec<HistoryPoint>>,
}

/// Accept connections until `cancel` fires, then wait for every connection
/// task to finish.
pub async fn serve(
    listener: TcpListener,
    hub: EventHub,
    history: SampleHistory,
    cancel: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr().map_err(|e| TelemetryError::io_error("listener address", e))?;
    info!(addr = %local, "Push server listening");

    let mut incoming = TcpListenerStream::new(listener);
    let mut connections = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = incoming.next() => accepted,
        };

        match accepted {
            Some(Ok(stream)) => {
                let peer = stream.peer_addr().ok();
                let subscription = hub.subscribe();
                let seed = history.seed();
                debug!(peer = ?peer, id = %subscription.id(), seeded = seed.len(), "Client connected");
                connections.spawn(push_updates(stream, seed, subscription, cancel.clone()));
            }
            Some(Err(e)) => warn!("Accept failed: {}", e),
            None => break,
        }

        // Reap finished connections so the set does not grow unbounded.
        while connections.try_join_next().is_some() {}
    }

    while connections.join_next().await.is_some() {}
    info!("Push server stopped");
    Ok(())
}

/// Send the history seed, then forward updates to one client until it goes
/// away, the hub closes the mailbox, or `cancel` fires.
async fn push_updates(
    mut stream: TcpStream,
    seed: BTreeMap<String, Vec<HistoryPoint>>,
    mut subscription: Subscription,
    cancel: CancellationToken,
) {
    let id = subscription.id();
    let mut line = Vec::with_capacity(256);

    if !seed.is_empty() {
        match encode_line(&HistorySeed { history: seed }, &mut line) {
            Ok(()) => {
                if let Err(e) = stream.write_all(&line).await {
                    debug!(id = %id, "Client write failed: {}", e);
                    return;
                }
            }
            Err(e) => warn!(id = %id, "Failed to encode history: {}", e),
        }
    }

    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => break,
            update = subscription.recv() => update,
        };
        let Some(update) = update else { break };

        if let Err(e) = encode_line(&update, &mut line) {
            warn!(id = %id, "Failed to encode update: {}", e);
            continue;
        }
        if let Err(e) = stream.write_all(&line).await {
            debug!(id = %id, "Client write failed: {}", e);
            break;
        }
    }

    let _ = stream.shutdown().await;
    debug!(id = %id, "Client disconnected");
}

fn encode_line<T: Serialize>(message: &T, line: &mut Vec<u8>) -> serde_json::Result<()> {
    line.clear();
    serde_json::to_writer(&mut *line, message)?;
    line.push(b'\n');
    Ok(())
}
