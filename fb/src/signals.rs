//! Termination signal handling
//!
//! SIGINT and SIGTERM move the shared phase to `Terminating`. The handler
//! does nothing else: no locking, no allocation, no resource release. The
//! main control flow notices the new phase at its next check (blocking
//! waits return `EINTR` because the handler is installed without
//! `SA_RESTART`) and runs the normal shutdown path.
//!
//! Until a process has bound its shared state with [`bind_phase`], a
//! termination signal only raises a process-local pending flag. The
//! supervisor consumes it with [`take_pending_termination`] once its ring
//! exists; generators ignore it.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use tracing::debug;

use crate::shm::{Phase, SharedState};

/// Phase word of the attached shared state, or null before attachment
static PHASE_WORD: AtomicPtr<AtomicU32> = AtomicPtr::new(ptr::null_mut());

/// Set when a termination signal arrives while nothing is bound
static PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_termination(_signal: libc::c_int) {
    let word = PHASE_WORD.load(Ordering::Acquire);
    if word.is_null() {
        PENDING.store(true, Ordering::SeqCst);
    } else {
        // SAFETY: the pointer is published by `bind_phase` and cleared before
        // the mapping it points into is released.
        unsafe { (*word).store(Phase::Terminating as u32, Ordering::SeqCst) };
    }
}

/// Install the SIGINT/SIGTERM handler for this process
pub fn install_termination_handler() -> nix::Result<()> {
    debug!("install_termination_handler: called");
    let action = SigAction::new(SigHandler::Handler(on_termination), SaFlags::empty(), SigSet::empty());
    // SAFETY: the handler only performs an atomic load and an atomic store,
    // both async-signal-safe.
    unsafe {
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

/// Keeps the signal handler pointed at a shared state; unbinds on drop
#[derive(Debug)]
pub struct PhaseBinding<'a> {
    _state: PhantomData<&'a SharedState>,
}

/// Point the signal handler at `state` for as long as the binding lives
pub fn bind_phase(state: &SharedState) -> PhaseBinding<'_> {
    // SAFETY: the returned binding borrows `state`, so it is dropped first.
    unsafe { bind_phase_unchecked(state) }
}

/// [`bind_phase`] without tying the binding to the borrow of `state`.
///
/// # Safety
///
/// The binding must be dropped before the mapping behind `state` is unmapped.
pub(crate) unsafe fn bind_phase_unchecked<'a>(state: &SharedState) -> PhaseBinding<'a> {
    debug!("bind_phase: called");
    let word = state.phase_word() as *const AtomicU32 as *mut AtomicU32;
    PHASE_WORD.store(word, Ordering::Release);
    PhaseBinding { _state: PhantomData }
}

/// Whether a termination signal arrived while nothing was bound; clears the flag
pub fn take_pending_termination() -> bool {
    PENDING.swap(false, Ordering::AcqRel)
}

impl Drop for PhaseBinding<'_> {
    fn drop(&mut self) {
        PHASE_WORD.store(ptr::null_mut(), Ordering::Release);
        debug!("PhaseBinding::drop: unbound");
    }
}

/// Whether a shared state is currently bound
pub fn is_bound() -> bool {
    !PHASE_WORD.load(Ordering::Acquire).is_null()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::{ResourceNames, Ring};
    use nix::sys::signal::raise;
    use serial_test::serial;

    fn ring() -> Ring {
        let prefix = format!("/fbas_test_sig_{}", uuid::Uuid::now_v7().simple());
        Ring::create(&ResourceNames::from_prefix(&prefix).unwrap(), None).unwrap()
    }

    #[test]
    #[serial]
    fn test_signal_before_binding_is_only_recorded() {
        install_termination_handler().unwrap();
        let ring = ring();
        ring.state().advance_phase(Phase::Running);
        assert!(!is_bound());

        raise(Signal::SIGTERM).unwrap();
        assert_eq!(ring.phase(), Phase::Running);
        assert!(take_pending_termination());
        assert!(!take_pending_termination());
    }

    #[test]
    #[serial]
    fn test_signal_sets_terminating() {
        install_termination_handler().unwrap();
        let ring = ring();
        ring.state().advance_phase(Phase::Running);
        {
            let _binding = bind_phase(ring.state());
            assert!(is_bound());
            raise(Signal::SIGINT).unwrap();
            assert_eq!(ring.phase(), Phase::Terminating);
        }
        assert!(!is_bound());
        assert!(!take_pending_termination());
    }
}
