use crate::batch::{Fingerprint, ResultHandle};
use crate::reply::FromReply;
use crate::Result;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A [`ResultHandle`] that converts the reply into `T` on completion.
#[must_use = "a typed handle does nothing unless awaited"]
pub struct TypedHandle<T> {
    inner: ResultHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromReply> TypedHandle<T> {
    pub(crate) fn new(inner: ResultHandle) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.inner.fingerprint()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// The untyped handle underneath.
    pub fn into_inner(self) -> ResultHandle {
        self.inner
    }
}

impl<T: FromReply> Future for TypedHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.and_then(T::from_reply)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for TypedHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedHandle")
            .field("inner", &self.inner)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
