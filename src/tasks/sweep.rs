//! Sweep Task
//!
//! Background task that periodically releases expired TTL floors and removes
//! the bookkeeping of values that have been reclaimed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::WeakStore;

/// Anything holding weak store entries that can be swept.
pub trait Sweep: Send + Sync {
    /// Releases expired floors and finalizes dead entries.
    ///
    /// Returns the number of finalized entries.
    fn sweep(&self) -> usize;
}

impl<T: Send + Sync + 'static> Sweep for Mutex<WeakStore<T>> {
    fn sweep(&self) -> usize {
        self.lock().sweep()
    }
}

/// Spawns a background task that periodically sweeps every target.
///
/// The task runs in an infinite loop, sleeping for `interval` between runs.
/// The returned handle can be used to abort the task during shutdown.
///
/// # Example
/// ```ignore
/// let node = EntanglementSync::builder(creation).lifespan("5m").build()?;
/// let sweep_handle = spawn_sweep_task(vec![Arc::new(node.clone())], Duration::from_secs(1));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(targets: Vec<Arc<dyn Sweep>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting sweep task over {} targets with interval of {:?}",
            targets.len(),
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let finalized: usize = targets.iter().map(|target| target.sweep()).sum();

            if finalized > 0 {
                info!("Sweep: finalized {} reclaimed entries", finalized);
            } else {
                debug!("Sweep: no reclaimed entries found");
            }
        }
    })
}
