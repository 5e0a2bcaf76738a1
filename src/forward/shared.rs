//! Lock-guarded client for callers on several threads.

use parking_lot::Mutex;

use super::{
    client::ForwardClient,
    entry::Record,
    error::ForwardError,
    transport::{SocketTransport, Transport},
};

/// [`ForwardClient`] behind a mutex, so concurrent `log` calls are
/// serialized instead of interleaving on the shared buffer.
pub struct SharedForwardClient<T: Transport = SocketTransport> {
    inner: Mutex<ForwardClient<T>>,
}

impl<T: Transport> SharedForwardClient<T> {
    pub fn new(client: ForwardClient<T>) -> Self {
        Self {
            inner: Mutex::new(client),
        }
    }

    /// Encode and deliver one entry while holding the lock.
    pub fn log<'a>(&self, tag: &str, record: impl Into<Record<'a>>) -> Result<(), ForwardError> {
        self.inner.lock().log(tag, record)
    }

    pub fn close(&self) -> Result<(), ForwardError> {
        self.inner.lock().close()
    }

    /// Run `f` with exclusive access to the wrapped client.
    pub fn with_client<R>(&self, f: impl FnOnce(&mut ForwardClient<T>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> ForwardClient<T> {
        self.inner.into_inner()
    }
}

impl<T: Transport> From<ForwardClient<T>> for SharedForwardClient<T> {
    fn from(client: ForwardClient<T>) -> Self {
        Self::new(client)
    }
}
