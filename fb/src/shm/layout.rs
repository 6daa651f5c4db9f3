//! Memory layout of the shared coordination state
//!
//! ```text
//! offset  size  field          discipline
//! 0       4     magic          written once by the supervisor before Running
//! 4       4     layout_version written once by the supervisor before Running
//! 8       4     phase          lock-free; single aligned atomic word
//! 12      4     write_cursor   only touched while holding the writer gate
//! 16      72*16 slots          written under gate+free token, read under used token
//! ```

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::graph::Edge;
use crate::solution::{Candidate, MAX_SOLUTION_EDGES};

/// Number of slots in the shared ring
pub const BUFFER_SIZE: usize = 16;

/// `"FBAS"` little-endian
pub const LAYOUT_MAGIC: u32 = u32::from_le_bytes(*b"FBAS");

pub const LAYOUT_VERSION: u32 = 1;

/// Run state shared by every process attached to the ring.
///
/// Transitions only move forward: `Initializing -> Running -> Terminating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Phase {
    Initializing = 0,
    Running = 1,
    Terminating = 2,
}

impl Phase {
    /// Decode a raw phase word; anything unknown is treated as `Terminating`
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Phase::Initializing,
            1 => Phase::Running,
            _ => Phase::Terminating,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initializing => write!(f, "initializing"),
            Phase::Running => write!(f, "running"),
            Phase::Terminating => write!(f, "terminating"),
        }
    }
}

/// One candidate solution as stored in the ring
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Slot {
    edges: [Edge; MAX_SOLUTION_EDGES],
    stored: u32,
    edge_count: u32,
}

impl Slot {
    fn store(&mut self, candidate: &Candidate) {
        let stored = candidate.edges();
        self.edges[..stored.len()].copy_from_slice(stored);
        self.stored = stored.len() as u32;
        self.edge_count = u32::try_from(candidate.edge_count()).unwrap_or(u32::MAX);
    }

    fn load(&self) -> Result<Candidate, (u32, u32)> {
        let stored = self.stored as usize;
        if stored > MAX_SOLUTION_EDGES {
            return Err((self.stored, self.edge_count));
        }
        Candidate::from_parts(&self.edges[..stored], self.edge_count as usize).ok_or((self.stored, self.edge_count))
    }
}

/// The shared coordination state, mapped into every process.
///
/// A freshly truncated shared memory object is zero-filled, which decodes as
/// `Phase::Initializing`, cursor 0 and empty slots.
#[repr(C)]
pub struct SharedState {
    magic: AtomicU32,
    layout_version: AtomicU32,
    phase: AtomicU32,
    write_cursor: AtomicU32,
    slots: [UnsafeCell<Slot>; BUFFER_SIZE],
}

// SAFETY: every field except `slots` is atomic. Slot access is serialized by
// the ring semaphores: a slot is written only by the writer-gate holder after
// taking a free token and read only by the single reader after taking a used
// token, so no slot is ever accessed concurrently.
unsafe impl Sync for SharedState {}

impl SharedState {
    /// Size of the shared memory object in bytes
    pub const SIZE: usize = std::mem::size_of::<SharedState>();

    /// Stamp the layout header; called once by the creating process
    pub(crate) fn init_header(&self) {
        self.layout_version.store(LAYOUT_VERSION, Ordering::Relaxed);
        self.magic.store(LAYOUT_MAGIC, Ordering::Release);
    }

    /// `(magic, layout_version)` as currently stored
    pub fn header(&self) -> (u32, u32) {
        (
            self.magic.load(Ordering::Acquire),
            self.layout_version.load(Ordering::Relaxed),
        )
    }

    pub fn header_matches(&self) -> bool {
        self.header() == (LAYOUT_MAGIC, LAYOUT_VERSION)
    }

    pub fn phase(&self) -> Phase {
        Phase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Move the phase forward to `to`; never moves it back.
    ///
    /// Returns the phase that was in effect before the call.
    pub fn advance_phase(&self, to: Phase) -> Phase {
        Phase::from_raw(self.phase.fetch_max(to as u32, Ordering::AcqRel))
    }

    /// The raw phase word, for the signal handler's single-store path
    pub(crate) fn phase_word(&self) -> &AtomicU32 {
        &self.phase
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor.load(Ordering::Acquire) as usize
    }

    /// Write `candidate` at the write cursor and advance it; returns the slot index.
    ///
    /// # Safety
    ///
    /// The caller must hold the writer gate and one free-slot token.
    pub(crate) unsafe fn write_slot(&self, candidate: &Candidate) -> usize {
        let index = self.write_cursor.load(Ordering::Acquire) as usize % BUFFER_SIZE;
        // SAFETY: guaranteed exclusive by the caller's tokens.
        unsafe { (*self.slots[index].get()).store(candidate) };
        self.write_cursor
            .store(((index + 1) % BUFFER_SIZE) as u32, Ordering::Release);
        index
    }

    /// Read the slot at `index`.
    ///
    /// Returns the raw `(stored, edge_count)` pair when the slot does not hold
    /// a consistent candidate.
    ///
    /// # Safety
    ///
    /// The caller must be the single reader and hold a used-slot token for `index`.
    pub(crate) unsafe fn read_slot(&self, index: usize) -> Result<Candidate, (u32, u32)> {
        // SAFETY: guaranteed exclusive by the caller's token.
        unsafe { (*self.slots[index % BUFFER_SIZE].get()).load() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> Box<SharedState> {
        // SAFETY: all-zero bytes are a valid SharedState (atomics and plain integers).
        unsafe { Box::new(std::mem::zeroed()) }
    }

    #[test]
    fn test_layout_size() {
        let slot = std::mem::size_of::<Slot>();
        assert_eq!(slot, MAX_SOLUTION_EDGES * 8 + 8);
        assert_eq!(SharedState::SIZE, 16 + BUFFER_SIZE * slot);
        assert_eq!(std::mem::align_of::<SharedState>(), 4);
    }

    #[test]
    fn test_zeroed_state_is_initializing() {
        let state = zeroed();
        assert_eq!(state.phase(), Phase::Initializing);
        assert_eq!(state.write_cursor(), 0);
        assert!(!state.header_matches());
        state.init_header();
        assert!(state.header_matches());
    }

    #[test]
    fn test_phase_is_monotonic() {
        let state = zeroed();
        assert_eq!(state.advance_phase(Phase::Running), Phase::Initializing);
        assert_eq!(state.advance_phase(Phase::Terminating), Phase::Running);
        assert_eq!(state.advance_phase(Phase::Running), Phase::Terminating);
        assert_eq!(state.phase(), Phase::Terminating);
        assert_eq!(state.advance_phase(Phase::Initializing), Phase::Terminating);
    }

    #[test]
    fn test_unknown_phase_word_reads_as_terminating() {
        assert_eq!(Phase::from_raw(7), Phase::Terminating);
    }

    #[test]
    fn test_write_wraps_cursor() {
        let state = zeroed();
        let candidate = Candidate::collect([Edge::new(1, 0)]);
        for expected in 0..BUFFER_SIZE {
            // SAFETY: single-threaded test, no other accessor.
            assert_eq!(unsafe { state.write_slot(&candidate) }, expected);
        }
        assert_eq!(state.write_cursor(), 0);
        // SAFETY: as above.
        assert_eq!(unsafe { state.write_slot(&candidate) }, 0);
        assert_eq!(state.write_cursor(), 1);
    }

    #[test]
    fn test_slot_keeps_truncation() {
        let state = zeroed();
        let many: Vec<Edge> = (0..12).map(|i| Edge::new(i + 1, i)).collect();
        let candidate = Candidate::collect(many);
        // SAFETY: single-threaded test, no other accessor.
        let index = unsafe { state.write_slot(&candidate) };
        let read = unsafe { state.read_slot(index) }.unwrap();
        assert_eq!(read.edge_count(), 12);
        assert!(read.is_truncated());
        assert_eq!(read, candidate);
    }

    #[test]
    fn test_inconsistent_slot_is_rejected() {
        let state = zeroed();
        // SAFETY: single-threaded test, no other accessor.
        unsafe {
            let slot = &mut *state.slots[3].get();
            slot.stored = 2;
            slot.edge_count = 1;
        }
        assert_eq!(unsafe { state.read_slot(3) }, Err((2, 1)));
    }
}
