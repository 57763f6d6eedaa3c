use log::debug;

use crate::error::GerberError;

/// A deferred unit of drawing work. It only sees the context it is run
/// against, so it cannot enqueue further work while the queue flushes.
pub type QueuedOperation<C> = Box<dyn FnOnce(&mut C) -> Result<(), GerberError>>;

/// FIFO of deferred drawing operations, run in one pass at a flush point.
pub struct DrawQueue<C> {
    pending: Vec<QueuedOperation<C>>,
}

impl<C> Default for DrawQueue<C> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<C> std::fmt::Debug for DrawQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<C> DrawQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue<F>(&mut self, op: F)
    where
        F: FnOnce(&mut C) -> Result<(), GerberError> + 'static,
    {
        self.pending.push(Box::new(op));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every pending operation in insertion order and empty the queue.
    ///
    /// The first failing operation aborts the flush; whatever was still
    /// pending is dropped.
    pub fn flush_all(&mut self, ctx: &mut C) -> Result<(), GerberError> {
        let pending = std::mem::take(&mut self.pending);
        debug!("flushing {} deferred operation(s)", pending.len());
        for op in pending {
            op(ctx)?;
        }
        Ok(())
    }
}
