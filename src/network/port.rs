//! Directional, unbounded FIFO ports linking a machine to its environment.
//!
//! A port has exactly one writer side and one reader side and lives as long
//! as the link between them. Writes never block (the queue is unbounded);
//! reads await the next value in write order. Fan-in and fan-out are never
//! expressed on a single port; routing goes through an explicit component
//! such as the star network's switch.

use tokio::sync::mpsc;

use crate::vm::errors::ExecError;

/// Creates a connected port: one writer half and one reader half.
pub fn port() -> (PortSender, PortReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PortSender { tx }, PortReceiver { rx })
}

/// Writer half of a port.
#[derive(Debug)]
pub struct PortSender {
    tx: mpsc::UnboundedSender<i64>,
}

impl PortSender {
    /// Queues `value` without blocking.
    ///
    /// Fails with [`ExecError::Cancelled`] only when the reader half is
    /// gone, which means the link was torn down from outside.
    pub fn send(&self, value: i64) -> Result<(), ExecError> {
        self.tx.send(value).map_err(|_| ExecError::Cancelled)
    }
}

/// Reader half of a port.
#[derive(Debug)]
pub struct PortReceiver {
    rx: mpsc::UnboundedReceiver<i64>,
}

impl PortReceiver {
    /// Awaits the next value in FIFO order.
    ///
    /// Resolves to [`ExecError::Cancelled`] when the writer half is dropped
    /// while the queue is empty — the external-cancellation contract for a
    /// blocked read.
    pub async fn recv(&mut self) -> Result<i64, ExecError> {
        self.rx.recv().await.ok_or(ExecError::Cancelled)
    }

    /// Non-blocking read: the next queued value, or `None` when the queue
    /// is currently empty. Star-network nodes substitute `-1` on `None`.
    pub fn try_recv(&mut self) -> Option<i64> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_write_order() {
        let (tx, mut rx) = port();
        for v in [3, 1, 2] {
            tx.send(v).unwrap();
        }
        assert_eq!(rx.recv().await.unwrap(), 3);
        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn closed_port_cancels_blocked_read() {
        let (tx, mut rx) = port();
        tx.send(9).unwrap();
        drop(tx);
        assert_eq!(rx.recv().await.unwrap(), 9);
        assert!(matches!(rx.recv().await, Err(ExecError::Cancelled)));
    }

    #[tokio::test]
    async fn try_recv_does_not_block() {
        let (tx, mut rx) = port();
        assert_eq!(rx.try_recv(), None);
        tx.send(4).unwrap();
        assert_eq!(rx.try_recv(), Some(4));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn send_to_dropped_reader_fails() {
        let (tx, rx) = port();
        drop(rx);
        assert!(matches!(tx.send(1), Err(ExecError::Cancelled)));
    }
}
