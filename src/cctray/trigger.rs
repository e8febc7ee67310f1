use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::loader::StageStatusLoader;
use super::reconcile::ReconciliationEngine;
use super::types::Topology;

/// Handle used by the configuration layer to announce topology changes.
#[derive(Clone)]
pub struct TopologyNotifier {
    tx: mpsc::UnboundedSender<Topology>,
}

impl TopologyNotifier {
    /// Queues a reconciliation against `topology`. Never blocks.
    pub fn notify(&self, topology: Topology) {
        if self.tx.send(topology).is_err() {
            warn!("Reconciler has stopped, dropping topology change");
        }
    }
}

/// Starts the background reconciler.
///
/// Notifications are handled one at a time. When several arrive while a
/// reconciliation is running, only the most recent topology is reconciled
/// next. A failed reconciliation is logged and the previous cache content is
/// kept until the next notification. The task exits once every notifier has
/// been dropped.
pub fn spawn_reconciler<L>(engine: Arc<ReconciliationEngine<L>>) -> (TopologyNotifier, JoinHandle<()>)
where
    L: StageStatusLoader + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Topology>();

    let handle = tokio::spawn(async move {
        while let Some(mut topology) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                debug!("Skipping superseded topology change");
                topology = newer;
            }

            let engine = Arc::clone(&engine);
            match tokio::task::spawn_blocking(move || engine.reconcile(&topology)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Reconciliation failed, keeping previous cache: {e}"),
                Err(e) => error!("Reconciliation task aborted: {e}"),
            }
        }

        debug!("All topology notifiers dropped, stopping reconciler");
    });

    (TopologyNotifier { tx }, handle)
}
