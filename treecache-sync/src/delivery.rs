//! Delivery loop - serialises bundle delivery into a listener.
//!
//! Transports that receive bundles on several tasks push them into one
//! bounded channel; a single task drains it, so bundles are reconciled one at
//! a time and in the order they were queued.

use crate::error::{SyncError, SyncResult};
use crate::listener::EventListener;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use treecache_types::WireBundle;

/// Commands accepted by the delivery loop.
#[derive(Debug)]
pub enum DeliveryCommand {
    /// Reconcile a bundle and report the outcome.
    Deliver {
        bundle: WireBundle,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    /// Stop the loop.
    Shutdown,
}

/// Handle for pushing bundles into a running delivery loop.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: mpsc::Sender<DeliveryCommand>,
}

impl DeliveryHandle {
    /// Queues `bundle` and waits until it has been reconciled.
    pub async fn deliver(&self, bundle: WireBundle) -> SyncResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(DeliveryCommand::Deliver { bundle, reply })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        outcome.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Asks the loop to stop after the bundles already queued.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.tx
            .send(DeliveryCommand::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Returns true once the loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawns the delivery loop for `listener` on the current tokio runtime.
pub fn spawn_delivery<L>(listener: Arc<L>, capacity: usize) -> (DeliveryHandle, JoinHandle<()>)
where
    L: EventListener + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run_delivery(listener, rx));
    (DeliveryHandle { tx }, task)
}

async fn run_delivery<L>(listener: Arc<L>, mut rx: mpsc::Receiver<DeliveryCommand>)
where
    L: EventListener + 'static,
{
    info!("delivery loop started");
    let mut delivered: u64 = 0;

    while let Some(command) = rx.recv().await {
        match command {
            DeliveryCommand::Deliver { bundle, reply } => {
                let events = bundle.events.len();
                let outcome = listener.on_event(bundle);
                match &outcome {
                    Ok(()) => {
                        delivered += 1;
                        debug!(events, "bundle delivered");
                    }
                    Err(e) => error!(error = %e, events, "bundle rejected"),
                }
                if reply.send(outcome).is_err() {
                    debug!("delivery caller went away before the reply");
                }
            }
            DeliveryCommand::Shutdown => break,
        }
    }

    info!(delivered, "delivery loop stopped");
}
