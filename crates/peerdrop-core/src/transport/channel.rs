//! Data channel capability and the shared handle that closes it once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use peerdrop_common::TransportError;

/// Ordered, reliable, message-oriented channel to the peer.
#[async_trait]
pub trait DataChannel: Send + Sync {
    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    async fn close(&self);
}

/// Cloneable handle to an open [`DataChannel`].
///
/// Both the transfer engine and session teardown may hold a clone; the
/// underlying channel is closed exactly once whichever side gets there first.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<dyn DataChannel>,
    closed: Arc<AtomicBool>,
}

impl ChannelHandle {
    pub fn new(inner: Arc<dyn DataChannel>) -> Self {
        Self {
            inner,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ChannelClosed);
        }
        self.inner.send(data).await
    }

    /// Close the channel. Returns `false` if it was already closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.close().await;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl DataChannel for Counting {
        async fn send(&self, _data: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn close_runs_once_across_clones() {
        let inner = Arc::new(Counting::default());
        let a = ChannelHandle::new(inner.clone());
        let b = a.clone();

        assert!(a.close().await);
        assert!(!b.close().await);
        assert!(!a.close().await);
        assert_eq!(inner.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let handle = ChannelHandle::new(Arc::new(Counting::default()));
        handle.close().await;
        assert!(matches!(
            handle.send(vec![1]).await,
            Err(TransportError::ChannelClosed)
        ));
    }
}
