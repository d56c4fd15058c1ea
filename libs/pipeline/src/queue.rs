use tokio::sync::mpsc;

use ingest_api::RawMessage;

/// Receiving side of the Message Queue, owned by the accumulator.
pub type QueueReceiver = mpsc::Receiver<RawMessage>;

/// Bounded FIFO handlers → accumulator.
///
/// Producers never wait for space: admission is decided up front with
/// [`QueueSender::is_full`] and the message goes in via `try_send`.
pub fn message_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender { tx }, rx)
}

#[derive(Debug)]
pub enum PushError {
    /// Очередь заполнилась между проверкой и отправкой.
    Full(RawMessage),
    /// Accumulator остановлен.
    Closed(RawMessage),
}

#[derive(Clone, Debug)]
pub struct QueueSender {
    tx: mpsc::Sender<RawMessage>,
}

impl QueueSender {
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Текущая глубина очереди (занятые слоты).
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.depth() >= self.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn try_push(&self, msg: RawMessage) -> Result<(), PushError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(msg) => PushError::Full(msg),
            mpsc::error::TrySendError::Closed(msg) => PushError::Closed(msg),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_tracks_pushes_and_receives() {
        let (tx, mut rx) = message_queue(2);
        assert_eq!(tx.capacity(), 2);
        assert_eq!(tx.depth(), 0);

        tx.try_push(RawMessage::from(&b"a"[..])).unwrap();
        tx.try_push(RawMessage::from(&b"b"[..])).unwrap();
        assert!(tx.is_full());
        assert!(matches!(tx.try_push(RawMessage::from(&b"c"[..])), Err(PushError::Full(_))));

        assert_eq!(rx.try_recv().unwrap().as_bytes(), b"a");
        assert_eq!(tx.depth(), 1);
        assert!(!tx.is_full());
    }

    #[test]
    fn closed_receiver_rejects() {
        let (tx, rx) = message_queue(1);
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.try_push(RawMessage::from(&b"a"[..])), Err(PushError::Closed(_))));
    }
}
