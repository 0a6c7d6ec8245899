//! The response body: a byte stream that is either fully buffered (served
//! from the cache) or still arriving from the network.
//!
//! Closing a streaming body before it reaches EOF is the mechanism by which
//! a caller aborts an in-progress cache write (see [`crate::cache`]); the
//! writer task races its next frame read against the same closed signal
//! this type exposes, using a `watch` channel rather than a bare flag so the
//! two can never interleave into a lost wakeup (a `close()` that lands
//! between a poll and a blocking read is still observed).

use bytes::{Bytes, BytesMut};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};

/// A response body.
///
/// `Reusable` bodies (cache hits) return their bytes instantly and ignore
/// `close()`. `Streaming` bodies (network responses) are read chunk by
/// chunk and can be closed early, which tears down the producer side and
/// signals any concurrent cache writer to discard its temp file.
pub struct ResponseBody {
    inner: Inner,
}

enum Inner {
    Reusable(Bytes),
    Streaming(Streaming),
}

struct Streaming {
    receiver: AsyncMutex<mpsc::Receiver<Result<Bytes>>>,
    closed_tx: watch::Sender<bool>,
}

/// The producer half of a streaming body, held by the engine while it
/// drives the network read loop.
pub(crate) struct BodySender {
    sender: mpsc::Sender<Result<Bytes>>,
    closed_rx: watch::Receiver<bool>,
}

impl BodySender {
    /// Pushes a chunk to the reader. Returns `false` once the reader has
    /// closed the body, signalling the caller to stop reading from the
    /// network and abandon any in-progress cache write.
    pub(crate) async fn send(&self, chunk: Bytes) -> bool {
        if self.is_closed() {
            return false;
        }
        self.sender.send(Ok(chunk)).await.is_ok()
    }

    pub(crate) async fn fail(&self, err: Error) {
        let _ = self.sender.send(Err(err)).await;
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Resolves once the body has been closed. Race-free against a close
    /// that happens concurrently with an in-flight read: `watch` tracks
    /// "changed since last observed", not a one-shot notification, so a
    /// `close()` that lands just before this is polled is still seen.
    pub(crate) async fn closed(&mut self) {
        if *self.closed_rx.borrow() {
            return;
        }
        let _ = self.closed_rx.changed().await;
    }
}

impl ResponseBody {
    /// An empty body, used for responses with no payload (e.g. HEAD, 304).
    pub fn empty() -> ResponseBody {
        ResponseBody {
            inner: Inner::Reusable(Bytes::new()),
        }
    }

    /// A body whose bytes are already fully available, e.g. served from
    /// the cache's payload file.
    pub fn from_bytes(bytes: Bytes) -> ResponseBody {
        ResponseBody {
            inner: Inner::Reusable(bytes),
        }
    }

    /// Builds a streaming body together with the sender the engine's
    /// network read loop feeds.
    pub(crate) fn streaming() -> (ResponseBody, BodySender) {
        let (tx, rx) = mpsc::channel(16);
        let (closed_tx, closed_rx) = watch::channel(false);
        let body = ResponseBody {
            inner: Inner::Streaming(Streaming {
                receiver: AsyncMutex::new(rx),
                closed_tx,
            }),
        };
        let sender = BodySender {
            sender: tx,
            closed_rx,
        };
        (body, sender)
    }

    /// True if this body carries no payload at all.
    pub fn is_empty(&self) -> bool {
        matches!(&self.inner, Inner::Reusable(b) if b.is_empty())
    }

    /// Reads the next chunk, or `None` at EOF.
    pub async fn chunk(&self) -> Result<Option<Bytes>> {
        match &self.inner {
            Inner::Reusable(bytes) => {
                if bytes.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(bytes.clone()))
                }
            }
            Inner::Streaming(s) => {
                let mut rx = s.receiver.lock().await;
                match rx.recv().await {
                    Some(Ok(chunk)) => Ok(Some(chunk)),
                    Some(Err(e)) => Err(e),
                    None => Ok(None),
                }
            }
        }
    }

    /// Reads the body to completion and returns the concatenated bytes.
    pub async fn read_to_end(&self) -> Result<Bytes> {
        if let Inner::Reusable(bytes) = &self.inner {
            return Ok(bytes.clone());
        }
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Closes the body early. For a streaming body this is irreversible:
    /// the producer observes `closed` on its next send and stops, and a
    /// concurrent cache writer discards its temp file rather than
    /// committing truncated data. A no-op on an already-buffered body.
    pub fn close(&self) {
        if let Inner::Streaming(s) = &self.inner {
            let _ = s.closed_tx.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reusable_body_reads_then_eofs() {
        let body = ResponseBody::from_bytes(Bytes::from_static(b"hello"));
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"hello")));
        assert_eq!(body.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_body_has_no_chunks() {
        let body = ResponseBody::empty();
        assert!(body.is_empty());
        assert_eq!(body.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn streaming_body_reads_to_end() {
        let (body, sender) = ResponseBody::streaming();
        tokio::spawn(async move {
            sender.send(Bytes::from_static(b"hel")).await;
            sender.send(Bytes::from_static(b"lo")).await;
        });
        assert_eq!(body.read_to_end().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn closing_a_streaming_body_stops_the_producer() {
        let (body, sender) = ResponseBody::streaming();
        body.close();
        assert!(!sender.send(Bytes::from_static(b"too late")).await);
    }

    #[tokio::test]
    async fn closed_resolves_immediately_if_already_closed() {
        let (body, mut sender) = ResponseBody::streaming();
        body.close();
        sender.closed().await;
    }

    #[tokio::test]
    async fn closed_resolves_once_a_concurrent_close_lands() {
        let (body, mut sender) = ResponseBody::streaming();
        let waiter = tokio::spawn(async move {
            sender.closed().await;
        });
        tokio::task::yield_now().await;
        body.close();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn streaming_body_propagates_producer_errors() {
        let (body, sender) = ResponseBody::streaming();
        sender.fail(Error::execution("connection reset")).await;
        let err = body.chunk().await.unwrap_err();
        assert!(err.is_execution());
    }
}
