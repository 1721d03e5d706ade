use std::time::Duration;

use tokio::sync::watch;

use crate::db::{self, DbPool};

/// Backend reachability as last observed by the probe task.
#[derive(Clone)]
pub struct Connectivity {
    rx: watch::Receiver<bool>,
}

impl Connectivity {
    pub fn channel(initial: bool) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { rx })
    }

    /// A fixed value, for handlers exercised without a probe.
    pub fn fixed(connected: bool) -> Self {
        let (_tx, this) = Self::channel(connected);
        this
    }

    pub fn is_connected(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves with the new value the next time it changes.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Polls the database and publishes reachability changes.
pub fn spawn_probe(pool: DbPool, every: Duration) -> Connectivity {
    let (tx, connectivity) = Connectivity::channel(true);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let connected = db::ping(&pool).await;
            let changed = tx.send_if_modified(|current| {
                if *current == connected {
                    false
                } else {
                    *current = connected;
                    true
                }
            });
            if changed {
                if connected {
                    tracing::info!("database reachable again");
                } else {
                    tracing::warn!("database unreachable");
                }
            }
            if tx.is_closed() {
                break;
            }
        }
    });
    connectivity
}
