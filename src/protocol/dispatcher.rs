use crate::error::{constants, ProtocolError, Result};
use std::sync::{Arc, RwLock};

type HandlerFn<C, P> = dyn Fn(&C, &P) + Send + Sync + 'static;

/// Ordered fan-out of inbound packets to registered handlers.
///
/// Every handler sees every packet, in registration order. Handlers are
/// expected to match on the message type and ignore what they do not
/// understand. `C` is the context handed to each call (the client), so
/// handlers never need to hold a strong reference to it.
pub struct Dispatcher<C, P> {
    handlers: RwLock<Vec<Arc<HandlerFn<C, P>>>>,
}

impl<C, P> Default for Dispatcher<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, P> Dispatcher<C, P> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&C, &P) + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.into()))?;

        handlers.push(Arc::new(handler));
        Ok(())
    }

    /// Calls every handler with `packet` and returns how many ran.
    ///
    /// The handler list is snapshotted first, so a handler may register
    /// further handlers without deadlocking; those see the next packet.
    pub fn dispatch(&self, ctx: &C, packet: &P) -> Result<usize> {
        let snapshot: Vec<Arc<HandlerFn<C, P>>> = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.into()))?
            .clone();

        for handler in &snapshot {
            handler(ctx, packet);
        }
        Ok(snapshot.len())
    }

    pub fn len(&self) -> usize {
        self.handlers.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
