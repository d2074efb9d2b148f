use std::sync::Arc;

use tokio::sync::watch;

use super::StoreError;

/// Handle to a store that may still be connecting.
///
/// Every service call awaits [`Model::resolve`]; nothing is memoized on the
/// service side, so a pending handle becomes usable as soon as its sender
/// supplies the store.
pub struct Model<S> {
    inner: Inner<S>,
}

enum Inner<S> {
    Ready(Arc<S>),
    Pending(watch::Receiver<Option<Arc<S>>>),
}

impl<S> Clone for Model<S> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            Inner::Ready(s) => Inner::Ready(Arc::clone(s)),
            Inner::Pending(rx) => Inner::Pending(rx.clone()),
        };
        Self { inner }
    }
}

impl<S> std::fmt::Debug for Model<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.inner {
            Inner::Ready(_) => "ready",
            Inner::Pending(rx) if rx.borrow().is_some() => "resolved",
            Inner::Pending(_) => "pending",
        };
        f.debug_struct("Model").field("state", &state).finish()
    }
}

/// Completes a pending [`Model`].
pub struct ModelSender<S> {
    tx: watch::Sender<Option<Arc<S>>>,
}

impl<S> ModelSender<S> {
    /// Supplies the connected store to every clone of the pending model.
    pub fn send(self, store: S) {
        self.tx.send_replace(Some(Arc::new(store)));
    }

    pub fn send_shared(self, store: Arc<S>) {
        self.tx.send_replace(Some(store));
    }
}

impl<S: Send + Sync> Model<S> {
    #[must_use]
    pub fn ready(store: S) -> Self {
        Self { inner: Inner::Ready(Arc::new(store)) }
    }

    #[must_use]
    pub fn shared(store: Arc<S>) -> Self {
        Self { inner: Inner::Ready(store) }
    }

    /// A model whose store arrives later through the returned sender.
    #[must_use]
    pub fn pending() -> (Self, ModelSender<S>) {
        let (tx, rx) = watch::channel(None);
        (Self { inner: Inner::Pending(rx) }, ModelSender { tx })
    }

    /// Waits for the store.
    ///
    /// # Errors
    /// `Unavailable` when the sender was dropped without supplying a store.
    pub async fn resolve(&self) -> Result<Arc<S>, StoreError> {
        match &self.inner {
            Inner::Ready(s) => Ok(Arc::clone(s)),
            Inner::Pending(rx) => {
                let mut rx = rx.clone();
                let resolved = rx
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| StoreError::Unavailable("store handle was never provided".into()))?
                    .clone();
                resolved.ok_or_else(|| StoreError::Unavailable("store handle is empty".into()))
            }
        }
    }
}
