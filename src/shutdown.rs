//! Cooperative shutdown signal shared by the monitoring loops.

use tokio::sync::watch;

/// Creates a connected trigger/signal pair.
pub fn channel() -> (Trigger, Signal) {
    let (tx, rx) = watch::channel(false);
    (Trigger(tx), Signal(rx))
}

/// Fires the shutdown signal for every [`Signal`] clone.
#[derive(Debug)]
pub struct Trigger(watch::Sender<bool>);

impl Trigger {
    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Signal(watch::Receiver<bool>);

impl Signal {
    /// Resolves once shutdown was requested or the trigger was dropped.
    pub async fn recv(&mut self) {
        let _ = self.0.wait_for(|stop| *stop).await;
    }

    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        *self.0.borrow()
    }
}
