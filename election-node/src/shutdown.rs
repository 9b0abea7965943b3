use tokio::sync::broadcast;

/// Listens for the node-wide shutdown signal.
///
/// Every long-running activity (§5) holds one of these, cloned from a shared
/// `broadcast::Sender` owned by [`crate::node::Node`]. `recv` resolves
/// immediately on every call once shutdown has been observed once, so a
/// `tokio::select!` loop can keep using the same `Shutdown` across iterations.
#[derive(Debug)]
pub struct Shutdown {
    shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub async fn recv(&mut self) {
        if self.shutdown {
            return;
        }
        let _ = self.notify.recv().await;
        self.shutdown = true;
    }
}
