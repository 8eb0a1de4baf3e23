pub mod config;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod mirror;
pub mod node;
pub mod patch;
pub mod protocol;
pub mod session;
pub mod widgets;

use crate::protocol::{reader_loop, writer_loop};
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;
use tracing::{error, warn};

pub use crate::config::RuntimeConfig;
pub use crate::connection::{Connection, FnView, View, view_fn};
pub use crate::context::ViewContext;
pub use crate::dispatch::{Applied, Dispatcher, EventKind, EventValue, InboundEvent};
pub use crate::error::{Result, SyncError};
pub use crate::mirror::{RemoteMirror, SequenceCursor};
pub use crate::node::{AttrName, AttrValue, Node, NodeId, NodeKind, Tree};
pub use crate::patch::{NodeSnapshot, Patch, PatchEmitter, PatchKind};
pub use crate::protocol::{ClientEnvelope, ServerEnvelope};
pub use crate::session::{ContextPhase, Session, WaitTarget};
pub use crate::widgets::{Select, SelectOption, SelectValue, SelectionChange};

pub fn run<V: View>(config: &RuntimeConfig, view: V) -> Result<()> {
    serve(config, view, io::stdin().lock(), io::stdout())
}

/// The view starts on the first `ready`; EOF closes the connection.
pub fn serve<V, R, W>(config: &RuntimeConfig, view: V, reader: R, writer: W) -> Result<()>
where
    V: View,
    R: Read,
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(config.outbound_queue_cap);
    let writer_handle = thread::spawn(move || writer_loop(rx, writer));

    let mut pending_view = Some(view);
    let mut connection: Option<Connection> = None;

    let read_result = reader_loop(reader, |envelope| {
        if envelope.sid() != config.sid {
            warn!(expected = %config.sid, got = %envelope.sid(), "sid mismatch; dropping envelope");
            return;
        }

        match envelope {
            ClientEnvelope::Ready { .. } => {
                let Some(view) = pending_view.take() else {
                    warn!(sid = %config.sid, "duplicate ready envelope ignored");
                    return;
                };

                match Connection::open(config.sid.clone(), view, tx.clone()) {
                    Ok(opened) => connection = Some(opened),
                    Err(err) => error!(error = %err, "failed to start view"),
                }
            }
            ClientEnvelope::Event {
                node_id,
                kind,
                value,
                ..
            } => {
                let Some(connection) = &connection else {
                    warn!(%node_id, "event before ready; dropping");
                    return;
                };

                // Rejected events are logged by the dispatcher.
                let _ = connection.dispatch(InboundEvent {
                    node_id,
                    kind,
                    value,
                });
            }
        }
    });

    if let Err(err) = &read_result {
        error!(error = %err, "reader loop terminated with error");
    }

    let view_result = match connection {
        Some(connection) => {
            connection.close();
            connection.join()
        }
        None => Ok(()),
    };

    // The writer exits once every sender, including the session's, is gone.
    drop(tx);
    match writer_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %err, "writer thread returned error"),
        Err(err) => error!("writer thread join failed: {err:?}"),
    }

    read_result?;
    match view_result {
        Err(SyncError::ConnectionClosed) => Ok(()),
        other => other,
    }
}
