//! Caller side of a queued request
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use confirm_common::{Error, Settlement};
use tokio::sync::oneshot;

/// Future returned to the caller of `add_confirmation`
///
/// It resolves once the request is completed, declined or dropped by a wallet reset. There is no
/// timeout: a request nobody completes keeps the future pending.
pub struct PendingConfirmation<O> {
    id: String,
    receiver: oneshot::Receiver<Settlement<O>>,
}

impl<O> fmt::Debug for PendingConfirmation<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingConfirmation")
            .field("id", &self.id)
            .finish()
    }
}

impl<O> PendingConfirmation<O> {
    pub(crate) fn new(id: String, receiver: oneshot::Receiver<Settlement<O>>) -> Self {
        Self { id, receiver }
    }

    /// Id of the queued request
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<O> Future for PendingConfirmation<O> {
    type Output = Settlement<O>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.receiver).poll(cx)) {
            Ok(settlement) => Poll::Ready(settlement),
            Err(err) => Poll::Ready(Err(Error::RecvError(err.to_string()))),
        }
    }
}
