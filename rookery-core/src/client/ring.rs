//! Bounded inbound message buffer.

use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

use super::error::Error;
use crate::Message;

/// Default number of slots in the inbound buffer.
pub(crate) const DEFAULT_CAPACITY: usize = 32;

/// Fixed-capacity ring of received messages. When the writer catches up with
/// the reader the oldest entry is dropped, so a slow consumer loses old
/// messages rather than stalling the receive loop.
pub(crate) struct MessageRing {
    inner: Mutex<Ring>,
    notify: Notify,
}

struct Ring {
    slots: Vec<Option<Message>>,
    read: usize,
    write: usize,
    len: usize,
    closed: bool,
}

impl MessageRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                read: 0,
                write: 0,
                len: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, message: Message) {
        {
            let mut ring = self.lock();
            if ring.closed {
                return;
            }
            if ring.len == ring.slots.len() {
                if let Some(evicted) = ring.pop() {
                    log::warn!(
                        "inbound buffer full, dropping oldest message on {:?}",
                        evicted.topic
                    );
                }
            }
            let write = ring.write;
            ring.slots[write] = Some(message);
            ring.write = (write + 1) % ring.slots.len();
            ring.len += 1;
        }
        self.notify.notify_waiters();
    }

    /// Take the oldest buffered message. The blocking variant waits for one
    /// to arrive; the non-blocking variant returns `None` when the buffer is
    /// empty. After `close` this returns [`Error::Terminated`].
    pub async fn read(&self, block: bool) -> Result<Option<Message>, Error> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        loop {
            notified.as_mut().enable();
            {
                let mut ring = self.lock();
                if let Some(message) = ring.pop() {
                    return Ok(Some(message));
                }
                if ring.closed {
                    return Err(Error::Terminated);
                }
                if !block {
                    return Ok(None);
                }
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }

    /// Drop all buffered messages and mark the stream terminated, waking
    /// any blocked readers.
    pub fn close(&self) {
        {
            let mut ring = self.lock();
            if ring.closed {
                return;
            }
            ring.closed = true;
            while let Some(message) = ring.pop() {
                log::debug!("discarding buffered message on {:?}", message.topic);
            }
        }
        self.notify.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ring {
    fn pop(&mut self) -> Option<Message> {
        if self.len == 0 {
            return None;
        }
        let message = self.slots[self.read].take();
        self.read = (self.read + 1) % self.slots.len();
        self.len -= 1;
        message
    }
}

#[cfg(test)]
mod test {
    use mqtt3_codec::common::QualityOfService;

    use super::*;

    fn message(n: usize) -> Message {
        Message {
            dup: false,
            qos: QualityOfService::Level0,
            retain: false,
            topic: format!("t/{n}"),
            body: n.to_string().into_bytes(),
        }
    }

    #[tokio::test]
    async fn fifo_order() {
        let ring = MessageRing::new(4);
        ring.push(message(1));
        ring.push(message(2));

        assert_eq!(ring.read(false).await.unwrap().unwrap().topic, "t/1");
        assert_eq!(ring.read(false).await.unwrap().unwrap().topic, "t/2");
        assert!(ring.read(false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let ring = MessageRing::new(DEFAULT_CAPACITY);
        for n in 0..DEFAULT_CAPACITY + 1 {
            ring.push(message(n));
        }

        // message 0 was evicted; the rest drain in order
        for n in 1..DEFAULT_CAPACITY + 1 {
            let got = ring.read(false).await.unwrap().unwrap();
            assert_eq!(got.topic, format!("t/{n}"));
        }
        assert!(ring.read(false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blocking_read_wakes_on_push() {
        let ring = std::sync::Arc::new(MessageRing::new(4));

        let reader = ring.clone();
        let task = tokio::spawn(async move { reader.read(true).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        ring.push(message(7));
        let got = task.await.unwrap().unwrap().unwrap();
        assert_eq!(got.topic, "t/7");
    }

    #[tokio::test]
    async fn close_terminates_readers() {
        let ring = std::sync::Arc::new(MessageRing::new(4));
        ring.push(message(1));

        let reader = ring.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            reader.read(true).await
        });

        ring.close();
        // buffered messages were discarded at close
        assert!(matches!(task.await.unwrap(), Err(Error::Terminated)));
        assert!(matches!(ring.read(false).await, Err(Error::Terminated)));
    }
}
