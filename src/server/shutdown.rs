use std::fmt::Debug;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};

// Notifier tells the accept loop and the sweeper that the server is stopping, and lets the
// controller wait until they have let go of their resources.
#[derive(Debug)]
pub(crate) struct Notifier {
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
    done_tx: RwLock<Option<mpsc::Sender<()>>>,
    done_rx: Mutex<mpsc::Receiver<()>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (done_tx, done_rx) = mpsc::channel(1);
        Notifier {
            shutdown_tx: RwLock::new(Some(shutdown_tx)),
            done_tx: RwLock::new(Some(done_tx)),
            done_rx: Mutex::new(done_rx),
        }
    }

    // Dropping the senders wakes every subscribed Listener.
    pub async fn notify(&self) {
        drop(self.shutdown_tx.write().await.take());
        drop(self.done_tx.write().await.take());
    }

    // Resolves once every Listener handed out by subscribe has been dropped.
    pub async fn linger(&self) {
        let _ = self.done_rx.lock().await.recv().await;
    }

    pub async fn subscribe(&self) -> Listener {
        let shutdown_tx = self.shutdown_tx.read().await;
        let done_tx = self.done_tx.read().await;
        Listener {
            shutdown: shutdown_tx.is_none(),
            shutdown_rx: shutdown_tx.as_ref().map(|tx| tx.subscribe()),
            _done_tx: done_tx.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Listener {
    shutdown: bool,
    shutdown_rx: Option<broadcast::Receiver<()>>,
    _done_tx: Option<mpsc::Sender<()>>,
}

impl Listener {
    /// Waits for the shutdown notice. Returns immediately if it was already received.
    pub async fn listen(&mut self) {
        if self.shutdown {
            return;
        }
        if let Some(rx) = self.shutdown_rx.as_mut() {
            // Only ever closed, never sent on, so there is no lag to handle.
            let _ = rx.recv().await;
        }
        self.shutdown = true;
    }
}
