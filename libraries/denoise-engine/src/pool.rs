//! Bounded pool of sample buffers shared by band workers
//!
//! Every channel leases a [`Handle`] with a minimum and a preferred number of
//! buffers. Buffers beyond the minimum go to a shared pool that any handle
//! may borrow from, so peak memory stays bounded no matter how many bands are
//! in flight. A handle that cannot get a buffer waits until another handle
//! returns one, or until some worker calls [`Handle::panic`].

use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Samples plus per-sample markers
#[derive(Debug)]
pub struct Buffer {
    id: u64,
    samples: Vec<f64>,
    markers: Vec<u8>,
}

impl Buffer {
    /// Allocate without aborting on memory exhaustion
    fn allocate(id: u64, sample_count: usize) -> Option<Self> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(sample_count).ok()?;
        let mut markers = Vec::new();
        markers.try_reserve_exact(sample_count).ok()?;
        samples.resize(sample_count, 0.0);
        markers.resize(sample_count, 0);
        Some(Self {
            id,
            samples,
            markers,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn markers(&self) -> &[u8] {
        &self.markers
    }

    /// Samples and markers borrowed together
    pub fn split_mut(&mut self) -> (&mut [f64], &mut [u8]) {
        (&mut self.samples, &mut self.markers)
    }

    fn clear(&mut self) {
        self.samples.fill(0.0);
        self.markers.fill(0);
    }
}

#[derive(Debug)]
struct Slot {
    id: u64,
    /// `None` while the buffer is out with a worker
    buffer: Option<Buffer>,
}

#[derive(Debug)]
struct Lease {
    preferred: usize,
    slots: Vec<Slot>,
}

#[derive(Debug, Default)]
struct PoolState {
    sample_count: Option<usize>,
    shared: Vec<Buffer>,
    /// Minimum buffers of leases still waiting in `init`
    pending: usize,
    /// Preferred buffers of all open leases
    reserved: usize,
    panicked: bool,
    leases: HashMap<u64, Lease>,
    next_buffer: u64,
    next_handle: u64,
    allocated: usize,
    capacity: Option<usize>,
}

impl PoolState {
    fn allocate(&mut self, sample_count: usize) -> Option<Buffer> {
        if self.capacity.is_some_and(|max| self.allocated >= max) {
            return None;
        }
        let buffer = Buffer::allocate(self.next_buffer, sample_count)?;
        self.next_buffer += 1;
        self.allocated += 1;
        Some(buffer)
    }

    fn release(&mut self, buffer: Buffer) {
        drop(buffer);
        self.allocated -= 1;
    }

    /// Allocate a lease, taking idle shared buffers before allocating new
    /// ones; `None` means the caller has to wait
    ///
    /// New buffers are only allocated while the pool stays within the
    /// preferred counts of all open leases plus this one.
    fn try_allocate(&mut self, sample_count: usize, minimum: usize, preferred: usize) -> Option<Vec<Slot>> {
        let budget = self.reserved + preferred;
        let mut slots = Vec::with_capacity(minimum);
        let mut borrowed = 0;
        while slots.len() < minimum {
            let buffer = if let Some(buffer) = self.shared.pop() {
                borrowed += 1;
                buffer
            } else if self.allocated < budget {
                match self.allocate(sample_count) {
                    Some(buffer) => buffer,
                    None => break,
                }
            } else {
                break;
            };
            slots.push(Slot {
                id: buffer.id,
                buffer: Some(buffer),
            });
        }

        if slots.len() < minimum {
            trace!(
                available = slots.len(),
                minimum,
                allocated = self.allocated,
                "Waiting for shared buffers"
            );
            // Shared buffers were taken first; the rest were new
            for (index, slot) in slots.into_iter().enumerate() {
                if let Some(buffer) = slot.buffer {
                    if index < borrowed {
                        self.shared.push(buffer);
                    } else {
                        self.release(buffer);
                    }
                }
            }
            return None;
        }

        let mut extra = 0;
        while self.allocated < budget && self.shared.len() + minimum < preferred {
            match self.allocate(sample_count) {
                Some(buffer) => {
                    self.shared.push(buffer);
                    extra += 1;
                }
                None => break,
            }
        }
        if extra > 0 {
            trace!(extra, shared = self.shared.len(), "Allocated shared buffers");
        } else if self.shared.len() + minimum < preferred {
            debug!(
                allocated = self.allocated,
                preferred, "Could not allocate the preferred number of buffers"
            );
        }
        self.reserved += preferred;
        Some(slots)
    }

    /// Free idle shared buffers the open leases have no claim on, keeping
    /// enough for the leases waiting in `init`
    fn trim(&mut self) {
        while self.allocated > self.reserved && self.shared.len() > self.pending {
            match self.shared.pop() {
                Some(buffer) => self.release(buffer),
                None => break,
            }
        }
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    state: Mutex<PoolState>,
    changed: Condvar,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, PoolState>) -> Result<MutexGuard<'a, PoolState>> {
        let guard = self
            .changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner);
        if guard.panicked {
            return Err(EngineError::PoolPanicked);
        }
        Ok(guard)
    }
}

/// Pool of equally sized buffers
#[derive(Debug, Clone, Default)]
pub struct BufferSet {
    inner: Arc<PoolInner>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool that never holds more than `max_buffers` buffers at once
    pub fn with_capacity(max_buffers: usize) -> Self {
        let pool = Self::default();
        pool.inner.lock().capacity = Some(max_buffers);
        pool
    }

    /// Lease at least `minimum` buffers of `sample_count` samples
    ///
    /// The pool never holds more buffers than the sum of the open leases'
    /// `preferred` counts, plus what waiting leases need. Blocks until
    /// enough buffers are available. Fails instead of waiting when no buffer
    /// is allocated at all, since nobody could return one.
    pub fn init(&self, sample_count: usize, minimum: usize, preferred: usize) -> Result<Handle> {
        if sample_count < 1 {
            return Err(EngineError::Pool(
                "sample count should be at least one".to_string(),
            ));
        }
        if minimum < 1 {
            return Err(EngineError::Pool(
                "minimum buffers must be at least one".to_string(),
            ));
        }
        if preferred < minimum {
            return Err(EngineError::Pool(format!(
                "preferred number of buffers ({}) is below the minimum ({})",
                preferred, minimum
            )));
        }

        let mut state = self.inner.lock();
        state.pending += minimum;
        let result = self.lease(state, sample_count, minimum, preferred);
        let mut state = self.inner.lock();
        state.pending -= minimum;
        state.trim();
        self.inner.changed.notify_all();

        let (id, lease) = result?;
        state.leases.insert(id, lease);
        Ok(Handle {
            id,
            pool: Arc::clone(&self.inner),
        })
    }

    fn lease(
        &self,
        mut state: MutexGuard<'_, PoolState>,
        sample_count: usize,
        minimum: usize,
        preferred: usize,
    ) -> Result<(u64, Lease)> {
        if let Some(size) = state.sample_count.filter(|size| *size != sample_count) {
            return Err(EngineError::Pool(format!(
                "already initialized with buffer size {}",
                size
            )));
        }
        if state.panicked {
            return Err(EngineError::PoolPanicked);
        }

        let slots = loop {
            if let Some(slots) = state.try_allocate(sample_count, minimum, preferred) {
                break slots;
            }
            if state.allocated == 0 {
                return Err(EngineError::Pool(
                    "cannot allocate enough buffers to work with".to_string(),
                ));
            }
            state = self.inner.wait(state)?;
        };

        state.sample_count = Some(sample_count);
        let id = state.next_handle;
        state.next_handle += 1;
        Ok((id, Lease { preferred, slots }))
    }

    /// Buffers currently allocated by this pool
    pub fn allocated(&self) -> usize {
        self.inner.lock().allocated
    }

    /// Idle buffers in the shared pool
    pub fn shared(&self) -> usize {
        self.inner.lock().shared.len()
    }

    pub fn is_panicked(&self) -> bool {
        self.inner.lock().panicked
    }
}

/// One channel's lease on a [`BufferSet`]
///
/// Not `Clone`: workers share it by reference inside a thread scope.
/// Dropping the handle closes it.
#[derive(Debug)]
pub struct Handle {
    id: u64,
    pool: Arc<PoolInner>,
}

impl Handle {
    /// Take a free buffer, waiting if none is available; the buffer is zeroed
    pub fn get(&self) -> Result<Buffer> {
        let mut state = self.pool.lock();
        loop {
            if state.panicked {
                return Err(EngineError::PoolPanicked);
            }
            let Some(lease) = state.leases.get_mut(&self.id) else {
                return Err(EngineError::Pool("handle is already closed".to_string()));
            };
            if let Some(buffer) = lease.slots.iter_mut().find_map(|slot| slot.buffer.take()) {
                drop(state);
                return Ok(zeroed(buffer));
            }
            if let Some(buffer) = state.shared.pop() {
                drop(state);
                return Ok(zeroed(buffer));
            }
            state = self.pool.wait(state)?;
        }
    }

    /// Return a buffer to its private slot, or to the shared pool
    pub fn put(&self, buffer: Buffer) {
        let mut state = self.pool.lock();
        let slot = state.leases.get_mut(&self.id).and_then(|lease| {
            lease
                .slots
                .iter_mut()
                .find(|slot| slot.id == buffer.id && slot.buffer.is_none())
        });
        match slot {
            Some(slot) => slot.buffer = Some(buffer),
            None => {
                state.shared.push(buffer);
                state.trim();
            }
        }
        self.pool.changed.notify_all();
    }

    /// Give all held buffers back; idempotent
    ///
    /// Buffers go to the shared pool, which then drops whatever neither the
    /// open leases nor the waiting ones can claim.
    pub fn close(&self) {
        let mut state = self.pool.lock();
        if let Some(lease) = state.leases.remove(&self.id) {
            state.reserved -= lease.preferred;
            for buffer in lease.slots.into_iter().filter_map(|slot| slot.buffer) {
                state.shared.push(buffer);
            }
            state.trim();
        }
        self.pool.changed.notify_all();
    }

    /// Cancel every waiter of the pool
    pub fn panic(&self) {
        let mut state = self.pool.lock();
        state.panicked = true;
        self.pool.changed.notify_all();
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

fn zeroed(mut buffer: Buffer) -> Buffer {
    buffer.clear();
    buffer
}
