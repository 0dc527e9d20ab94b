//! Tensor store: generational arena of tensor slots
//!
//! Tensors are never exposed by address. The store hands out opaque
//! [`TensorHandle`]s (slot index + generation) and recycles released slots
//! through a free list. A slot's generation is bumped on release, so stale
//! handles are rejected instead of silently aliasing a newer tensor. A slot
//! whose generation cannot be bumped any further is retired and never reused.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SparsimError};
use crate::tensor::{checked_dims, Tensor};

/// Opaque reference to a tensor owned by a [`TensorStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorHandle {
    index: u32,
    generation: u32,
}

impl TensorHandle {
    /// Slot index inside the store
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    tensor: Option<Tensor>,
}

/// Lifetime counters for the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Tensors created
    pub created: u64,
    /// Tensors released
    pub released: u64,
    /// Tensors currently alive
    pub live: u64,
    /// Bytes held by live tensors
    pub live_bytes: u64,
    /// Slots taken out of circulation after exhausting their generations
    pub retired_slots: u64,
}

/// Owner of every tensor buffer
pub struct TensorStore {
    slots: Vec<Slot>,
    free_slots: VecDeque<u32>,
    rng: StdRng,
    stats: StoreStats,
}

impl TensorStore {
    /// Create an empty store whose `randomize` draws from `seed`
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: StoreStats::default(),
        }
    }

    /// Re-seed the generator used by [`randomize`](Self::randomize)
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Allocate a zero-filled `rows x cols` tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimension` if either dimension is `<= 0` or the buffer
    /// size is not representable. Nothing is allocated in that case.
    pub fn create(&mut self, rows: i64, cols: i64) -> Result<TensorHandle> {
        let (r, c) = checked_dims(rows, cols)?;
        let tensor = Tensor::zeroed(r, c);
        let bytes = tensor.byte_size() as u64;

        let handle = if let Some(index) = self.free_slots.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.tensor = Some(tensor);
            TensorHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| SparsimError::Load {
                reason: "tensor slot space exhausted".to_string(),
            })?;
            self.slots.push(Slot {
                generation: 0,
                tensor: Some(tensor),
            });
            TensorHandle {
                index,
                generation: 0,
            }
        };

        self.stats.created += 1;
        self.stats.live += 1;
        self.stats.live_bytes += bytes;
        debug!(%handle, rows = r, cols = c, "tensor created");
        Ok(handle)
    }

    /// Release a tensor; the handle is invalid afterwards
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or already-released handles.
    pub fn release(&mut self, handle: TensorHandle) -> Result<()> {
        let slot = self.live_slot_mut(handle)?;
        let tensor = slot.tensor.take();
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free_slots.push_back(handle.index);
            },
            None => {
                self.stats.retired_slots += 1;
                debug!(%handle, "tensor slot retired");
            },
        }

        let bytes = tensor.map_or(0, |t| t.byte_size() as u64);
        self.stats.released += 1;
        self.stats.live -= 1;
        self.stats.live_bytes -= bytes;
        debug!(%handle, "tensor released");
        Ok(())
    }

    /// Fill a tensor with uniform values in `[-1, 1)` from the store's RNG
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn randomize(&mut self, handle: TensorHandle) -> Result<()> {
        let index = self.check(handle)?;
        if let Some(tensor) = self.slots[index].tensor.as_mut() {
            tensor.randomize(&mut self.rng);
        }
        Ok(())
    }

    /// Borrow a live tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn get(&self, handle: TensorHandle) -> Result<&Tensor> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.tensor.as_ref())
            .ok_or(SparsimError::InvalidHandle { handle })
    }

    /// Mutably borrow a live tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn get_mut(&mut self, handle: TensorHandle) -> Result<&mut Tensor> {
        self.live_slot_mut(handle)?
            .tensor
            .as_mut()
            .ok_or(SparsimError::InvalidHandle { handle })
    }

    /// Whether `handle` refers to a live tensor
    #[must_use]
    pub fn contains(&self, handle: TensorHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of live tensors
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.live as usize
    }

    /// Whether no tensor is alive
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.live == 0
    }

    /// Lifetime counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    fn check(&self, handle: TensorHandle) -> Result<usize> {
        self.get(handle).map(|_| handle.index as usize)
    }

    fn live_slot_mut(&mut self, handle: TensorHandle) -> Result<&mut Slot> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.tensor.is_some() => Ok(slot),
            _ => Err(SparsimError::InvalidHandle { handle }),
        }
    }
}

impl Default for TensorStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SEED)
    }
}

impl fmt::Debug for TensorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorStore")
            .field("slots", &self.slots.len())
            .field("free_slots", &self.free_slots.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
