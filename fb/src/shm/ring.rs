//! Bounded-buffer protocol over the shared region
//!
//! Many generators write, one supervisor reads. Three semaphores coordinate
//! the ring:
//!
//! - `free`: empty slots, starts at [`BUFFER_SIZE`]
//! - `used`: slots holding an unread candidate, starts at 0
//! - `gate`: binary writer mutex, starts at 1
//!
//! Writers take `gate` then `free`, write, then post `used` and `gate`.
//! The reader takes `used`, reads, then posts `free`. Every wait that returns
//! without a token (signal or poll timeout) re-checks the shared phase and
//! either retries or unwinds, releasing whatever it already holds.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::error::{SemError, ShmError};
use super::layout::{BUFFER_SIZE, Phase, SharedState};
use super::region::SharedRegion;
use super::semaphore::NamedSemaphore;
use super::ResourceNames;
use crate::solution::Candidate;

/// Outcome of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The candidate was written to this slot index
    Written { slot: usize },
    /// The run is no longer `Running`; nothing was written
    ShuttingDown,
}

/// Outcome of a read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Take {
    Solution(Candidate),
    /// The run is no longer `Running`; nothing was read
    ShuttingDown,
}

enum Acquire {
    Acquired,
    ShuttingDown,
}

/// The shared ring: region plus semaphores.
///
/// Field order is teardown order: the region is unmapped and removed before
/// the semaphores are closed and removed.
#[derive(Debug)]
pub struct Ring {
    region: SharedRegion,
    gate: NamedSemaphore,
    used: NamedSemaphore,
    free: NamedSemaphore,
    poll_interval: Option<Duration>,
}

impl Ring {
    /// Create every shared resource; used by the supervisor.
    ///
    /// Semaphores are created before the region, so a generator that finds
    /// the region also finds the semaphores. A failure part-way releases
    /// whatever was already created.
    pub fn create(names: &ResourceNames, poll_interval: Option<Duration>) -> Result<Self, ShmError> {
        debug!(?names, ?poll_interval, "Ring::create: called");
        let free = NamedSemaphore::create(&names.free_slots, BUFFER_SIZE as u32)?;
        let used = NamedSemaphore::create(&names.used_slots, 0)?;
        let gate = NamedSemaphore::create(&names.writer_gate, 1)?;
        let region = SharedRegion::create(&names.region)?;
        debug!("Ring::create: all resources created");
        Ok(Self {
            region,
            gate,
            used,
            free,
            poll_interval,
        })
    }

    /// Attach to resources created by a running supervisor; used by generators
    pub fn attach(names: &ResourceNames, poll_interval: Option<Duration>) -> Result<Self, ShmError> {
        debug!(?names, ?poll_interval, "Ring::attach: called");
        let region = SharedRegion::attach(&names.region)?;
        let free = NamedSemaphore::open(&names.free_slots)?;
        let used = NamedSemaphore::open(&names.used_slots)?;
        let gate = NamedSemaphore::open(&names.writer_gate)?;
        Ok(Self {
            region,
            gate,
            used,
            free,
            poll_interval,
        })
    }

    /// Like [`Ring::attach`], but retries every `retry` for up to `timeout`
    /// while the region exists and has not been sized yet
    pub fn attach_ready(
        names: &ResourceNames,
        poll_interval: Option<Duration>,
        retry: Duration,
        timeout: Duration,
    ) -> Result<Self, ShmError> {
        let deadline = Instant::now() + timeout;
        loop {
            match Self::attach(names, poll_interval) {
                Err(ShmError::NotReady { .. }) if Instant::now() < deadline => {
                    trace!(region = %names.region, "Ring::attach_ready: region not sized yet");
                    std::thread::sleep(retry);
                }
                result => return result,
            }
        }
    }

    pub fn state(&self) -> &SharedState {
        self.region.state()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    pub fn is_owner(&self) -> bool {
        self.region.is_owner()
    }

    /// `(free, used, gate)` token counts, for diagnostics and tests
    pub fn token_counts(&self) -> Result<(i32, i32, i32), SemError> {
        Ok((self.free.value()?, self.used.value()?, self.gate.value()?))
    }

    /// Block until the supervisor leaves `Initializing`.
    ///
    /// Returns `true` once `Running` and the layout header checks out, `false`
    /// if the run is already terminating.
    pub fn await_running(&self, poll: Duration) -> Result<bool, ShmError> {
        loop {
            match self.phase() {
                Phase::Initializing => std::thread::sleep(poll),
                Phase::Running => break,
                Phase::Terminating => return Ok(false),
            }
        }

        if !self.state().header_matches() {
            let (magic, version) = self.state().header();
            return Err(ShmError::LayoutMismatch {
                name: self.region.name().to_string(),
                magic,
                version,
            });
        }
        Ok(true)
    }

    /// Wait for a token on `sem`, re-checking the phase after every wake-up
    /// that did not deliver one
    fn acquire(&self, sem: &NamedSemaphore) -> Result<Acquire, SemError> {
        loop {
            match sem.wait_for(self.poll_interval) {
                Ok(()) => return Ok(Acquire::Acquired),
                Err(e) if e.is_wakeup() => {
                    trace!(sem = sem.name(), error = %e, "Ring::acquire: woke without token");
                    if self.phase() != Phase::Running {
                        return Ok(Acquire::ShuttingDown);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the writer gate on an unwinding path, keeping the first error
    fn release_gate_after(&self, cause: SemError) -> SemError {
        if let Err(e) = self.gate.post() {
            warn!(error = %e, "Could not release writer gate while unwinding");
        }
        cause
    }

    /// Publish a candidate: the writer side of the protocol
    pub fn publish(&self, candidate: &Candidate) -> Result<Publish, ShmError> {
        debug!(edge_count = candidate.edge_count(), "Ring::publish: waiting for writer gate");
        if let Acquire::ShuttingDown = self.acquire(&self.gate)? {
            debug!("Ring::publish: shutdown while waiting for writer gate");
            return Ok(Publish::ShuttingDown);
        }

        if self.phase() != Phase::Running {
            debug!("Ring::publish: shutdown observed after taking writer gate");
            self.gate.post()?;
            return Ok(Publish::ShuttingDown);
        }

        debug!("Ring::publish: waiting for free slot");
        match self.acquire(&self.free) {
            Ok(Acquire::Acquired) => {}
            Ok(Acquire::ShuttingDown) => {
                debug!("Ring::publish: shutdown while waiting for free slot");
                self.gate.post()?;
                return Ok(Publish::ShuttingDown);
            }
            Err(e) => return Err(self.release_gate_after(e).into()),
        }

        if self.phase() != Phase::Running {
            // The token may be the supervisor's shutdown wake-up; hand it back.
            debug!("Ring::publish: shutdown observed after taking free slot");
            if let Err(e) = self.free.post() {
                return Err(self.release_gate_after(e).into());
            }
            self.gate.post()?;
            return Ok(Publish::ShuttingDown);
        }

        // SAFETY: we hold the writer gate and one free-slot token.
        let slot = unsafe { self.state().write_slot(candidate) };

        if let Err(e) = self.used.post() {
            return Err(self.release_gate_after(e).into());
        }
        self.gate.post()?;
        debug!(slot, edge_count = candidate.edge_count(), "Ring::publish: written");
        Ok(Publish::Written { slot })
    }

    /// Wake a writer parked on a full ring so it can observe `Terminating`.
    ///
    /// Only meaningful once the phase has left `Running`.
    pub fn wake_writers(&self) -> Result<(), SemError> {
        debug!("Ring::wake_writers: called");
        self.free.post()
    }

    /// The single reader; only one should exist per ring
    pub fn reader(&self) -> RingReader<'_> {
        RingReader { ring: self, cursor: 0 }
    }
}

/// Reader side of the protocol, tracking the read cursor
#[derive(Debug)]
pub struct RingReader<'a> {
    ring: &'a Ring,
    cursor: usize,
}

impl RingReader<'_> {
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the next published candidate, blocking until one arrives or the run ends
    pub fn take(&mut self) -> Result<Take, ShmError> {
        if let Acquire::ShuttingDown = self.ring.acquire(&self.ring.used)? {
            debug!("RingReader::take: shutdown while waiting for used slot");
            return Ok(Take::ShuttingDown);
        }

        let slot = self.cursor;
        // SAFETY: we are the single reader and hold a used-slot token for `slot`.
        let read = unsafe { self.ring.state().read_slot(slot) };
        self.cursor = (self.cursor + 1) % BUFFER_SIZE;
        self.ring.free.post()?;

        match read {
            Ok(candidate) => {
                trace!(slot, edge_count = candidate.edge_count(), "RingReader::take: read");
                Ok(Take::Solution(candidate))
            }
            Err((stored, edge_count)) => Err(ShmError::CorruptSlot {
                slot,
                stored,
                edge_count,
            }),
        }
    }
}
