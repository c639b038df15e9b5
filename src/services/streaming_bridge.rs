//! Streaming bridge between an agent engine and a response consumer.
//!
//! One bridge carries the messages of exactly one request from one producer
//! to one consumer:
//!
//! ```text
//!   AgentEngine ──send()──▶ [ bounded mpsc, capacity N ] ──receive_next()──▶ transport
//!        ▲                                                         │
//!        └──────────────── CancellationToken ◀─────────────────────┘
//! ```
//!
//! - Order is preserved; [`StreamMessage::End`] is always the last frame.
//! - A full buffer suspends the producer, so a slow consumer throttles it.
//! - Cancelling (or dropping the receiver) releases both ends promptly.

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::StreamError;
use crate::domain::models::{ChatMessage, StreamMessage};
use crate::domain::ports::MessageSink;

/// Create a bridge with its own cancellation token.
pub fn channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    channel_with_token(capacity, CancellationToken::new())
}

/// Create a bridge cancelled by `token` (typically a child of a request-wide token).
pub fn channel_with_token(
    capacity: usize,
    token: CancellationToken,
) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        MessageSender {
            tx,
            token: token.clone(),
            closed: false,
        },
        MessageReceiver {
            rx,
            token,
            finished: false,
        },
    )
}

/// Producer half.
#[derive(Debug)]
pub struct MessageSender {
    tx: mpsc::Sender<StreamMessage>,
    token: CancellationToken,
    closed: bool,
}

impl MessageSender {
    /// Send one message, waiting for buffer space if the consumer is behind.
    pub async fn send(&mut self, message: ChatMessage) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::StreamAlreadyClosed);
        }
        self.push(StreamMessage::Data(message)).await
    }

    /// Enqueue the end-of-stream marker.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::StreamAlreadyClosed);
        }
        self.closed = true;
        self.push(StreamMessage::End).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the request was cancelled or the consumer went away.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    async fn push(&self, frame: StreamMessage) -> Result<(), StreamError> {
        if self.token.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(StreamError::Cancelled),
            sent = self.tx.send(frame) => sent.map_err(|_| StreamError::Cancelled),
        }
    }
}

#[async_trait]
impl MessageSink for MessageSender {
    async fn send(&mut self, message: ChatMessage) -> Result<(), StreamError> {
        Self::send(self, message).await
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        Self::close(self).await
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }

    fn is_closed(&self) -> bool {
        Self::is_closed(self)
    }
}

/// Consumer half.
///
/// Dropping the receiver cancels the bridge so the producer stops.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<StreamMessage>,
    token: CancellationToken,
    finished: bool,
}

impl MessageReceiver {
    /// Wait for the next message.
    ///
    /// - `Ok(Some(message))`: the next message in send order.
    /// - `Ok(None)`: the stream ended; every later call returns `Ok(None)` too.
    /// - `Err(Cancelled)`: the request was cancelled.
    /// - `Err(ProducerAborted)`: the producer was dropped without closing.
    pub async fn receive_next(&mut self) -> Result<Option<ChatMessage>, StreamError> {
        if self.finished {
            return Ok(None);
        }

        let frame = tokio::select! {
            biased;
            () = self.token.cancelled() => return Err(StreamError::Cancelled),
            frame = self.rx.recv() => frame,
        };

        match frame {
            Some(StreamMessage::Data(message)) => Ok(Some(message)),
            Some(StreamMessage::End) => {
                self.finished = true;
                self.rx.close();
                Ok(None)
            }
            None => Err(StreamError::ProducerAborted),
        }
    }

    /// Cancel the request from the consumer side.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Adapt the receiver into a `Stream` that ends after the end marker or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChatMessage, StreamError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut receiver = state?;
            match receiver.receive_next().await {
                Ok(Some(message)) => Some((Ok(message), Some(receiver))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl Drop for MessageReceiver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    fn text(message: &ChatMessage) -> &str {
        message.text.as_deref().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_messages_then_end() {
        let (mut tx, mut rx) = channel(8);
        tx.send(ChatMessage::ai("partial answer")).await.unwrap();
        tx.send(ChatMessage::ai("final answer")).await.unwrap();
        tx.close().await.unwrap();

        assert_eq!(text(&rx.receive_next().await.unwrap().unwrap()), "partial answer");
        assert_eq!(text(&rx.receive_next().await.unwrap().unwrap()), "final answer");
        assert!(rx.receive_next().await.unwrap().is_none());
        assert!(rx.is_finished());
        // Stays ended rather than blocking or erroring
        assert!(rx.receive_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_rejected() {
        let (mut tx, _rx) = channel(4);
        tx.close().await.unwrap();
        assert_eq!(
            tx.send(ChatMessage::ai("late")).await,
            Err(StreamError::StreamAlreadyClosed)
        );
        assert_eq!(tx.close().await, Err(StreamError::StreamAlreadyClosed));
    }

    #[tokio::test]
    async fn test_full_buffer_suspends_producer() {
        let (mut tx, mut rx) = channel(1);
        tx.send(ChatMessage::ai("one")).await.unwrap();

        {
            let mut blocked = task::spawn(tx.send(ChatMessage::ai("two")));
            assert_pending!(blocked.poll());

            assert_eq!(text(&rx.receive_next().await.unwrap().unwrap()), "one");
            assert!(blocked.is_woken(), "freeing a slot should wake the producer");
            assert_ready_ok!(blocked.poll());
        }
        assert_eq!(text(&rx.receive_next().await.unwrap().unwrap()), "two");
    }

    #[tokio::test]
    async fn test_cancel_releases_waiting_consumer() {
        let (_tx, mut rx) = channel(4);
        let token = rx.cancellation_token();

        let waiter = tokio::spawn(async move { rx.receive_next().await });
        tokio::task::yield_now().await;
        token.cancel();

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(StreamError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_consumer_unblocks_producer() {
        let (mut tx, rx) = channel(1);
        tx.send(ChatMessage::ai("fills the buffer")).await.unwrap();

        let producer = tokio::spawn(async move {
            let result = tx.send(ChatMessage::ai("blocked")).await;
            (result, tx.is_cancelled())
        });
        tokio::task::yield_now().await;
        drop(rx);

        let (result, cancelled) = producer.await.unwrap();
        assert_eq!(result, Err(StreamError::Cancelled));
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_producer_dropped_without_close() {
        let (tx, mut rx) = channel(4);
        drop(tx);
        assert_eq!(rx.receive_next().await, Err(StreamError::ProducerAborted));
    }

    #[tokio::test]
    async fn test_into_stream_preserves_order() {
        let (mut tx, rx) = channel(2);
        let producer = tokio::spawn(async move {
            for i in 0..10 {
                tx.send(ChatMessage::ai(format!("m{i}"))).await.unwrap();
            }
            tx.close().await.unwrap();
        });

        let received: Vec<String> = rx
            .into_stream()
            .map(|m| m.unwrap().text.unwrap_or_default())
            .collect()
            .await;
        producer.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(received, expected);
    }
}
