//! Coalescing "data changed" signal
//!
//! Backed by a capacity-1 channel: a notification sent while one is already
//! pending is dropped, so any number of appends between two UI frames
//! collapse into one wake-up and the sender never blocks.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::Duration;

/// Sending half, held by the reader worker and the controller
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: Sender<()>,
}

/// Receiving half, polled by the presentation side
#[derive(Debug, Clone)]
pub struct ChangeListener {
    rx: Receiver<()>,
}

/// Create a connected notifier/listener pair
pub fn change_channel() -> (ChangeNotifier, ChangeListener) {
    let (tx, rx) = bounded(1);
    (ChangeNotifier { tx }, ChangeListener { rx })
}

impl ChangeNotifier {
    /// Signal that the store changed. Never blocks.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

impl ChangeListener {
    /// Consume the pending notification, if any
    pub fn take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Wait up to `timeout` for a notification
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}
