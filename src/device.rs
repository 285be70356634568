//! Pending GPU device acquisition.
//!
//! Getting a device is a two-stage asynchronous handshake (adapter, then
//! device). Browsers resolve it on a later turn of the event loop, so the
//! renderer does not block on it. It holds a [`DeviceRequest`] and polls it
//! once per frame until it completes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::error::{DeviceRequestError, ErrorLatch};

type DeviceFuture<B> = Pin<Box<dyn Future<Output = Result<B, DeviceRequestError>>>>;

/// A backend that is still being created.
///
/// Carries the [`ErrorLatch`] that the device's error callbacks were (or will
/// be) wired to, so the renderer observes errors raised during setup too.
pub struct DeviceRequest<B> {
    latch: ErrorLatch,
    future: DeviceFuture<B>,
}

impl<B: 'static> DeviceRequest<B> {
    pub fn new(
        latch: ErrorLatch,
        future: impl Future<Output = Result<B, DeviceRequestError>> + 'static,
    ) -> Self {
        Self {
            latch,
            future: Box::pin(future),
        }
    }

    /// A request that completes on the first poll.
    pub fn ready(backend: B) -> Self {
        Self::new(ErrorLatch::new(), std::future::ready(Ok(backend)))
    }
}

impl<B> DeviceRequest<B> {
    pub fn latch(&self) -> &ErrorLatch {
        &self.latch
    }

    /// Advances the handshake without blocking.
    ///
    /// No waker is registered; callers poll again on their next frame.
    pub fn poll(&mut self) -> Poll<Result<B, DeviceRequestError>> {
        let mut cx = Context::from_waker(Waker::noop());
        self.future.as_mut().poll(&mut cx)
    }
}
