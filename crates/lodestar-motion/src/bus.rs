use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because records hop from the control thread to
/// whichever task drains them.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Never blocks. Having no subscribers is not an error.
    pub fn publish(&self, msg: T) {
        let _ = self.tx.send(Arc::new(msg));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// One controller sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub controller: &'static str,
    pub tick: u64,
    pub target: f64,
    pub actual: f64,
    pub error: f64,
    pub output: f64,
}
