//! Named POSIX counting semaphores

use std::ffi::CString;
use std::ptr::NonNull;
use std::time::Duration;

use nix::errno::Errno;
use tracing::{debug, warn};

use super::error::SemError;

/// A handle to a named POSIX semaphore.
///
/// The creating handle owns the name and unlinks it when dropped; handles
/// obtained with [`NamedSemaphore::open`] only close their own reference.
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: NonNull<libc::sem_t>,
    name: String,
    owner: bool,
}

// SAFETY: POSIX semaphores are designed for concurrent use from any thread or
// process; the handle itself is never mutated after construction.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> Result<CString, SemError> {
    CString::new(name).map_err(|_| SemError::Os {
        op: "sem_open",
        name: name.to_string(),
        source: Errno::EINVAL,
    })
}

impl NamedSemaphore {
    /// Create a new semaphore; fails if one with this name already exists
    pub fn create(name: &str, initial: u32) -> Result<Self, SemError> {
        debug!(name, initial, "NamedSemaphore::create: called");
        let c_name = c_name(name)?;
        // SAFETY: `c_name` is a valid NUL-terminated string; the variadic
        // arguments are the mode and initial value required by O_CREAT.
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(match Errno::last() {
                Errno::EEXIST => SemError::AlreadyExists { name: name.to_string() },
                source => SemError::Os {
                    op: "sem_open",
                    name: name.to_string(),
                    source,
                },
            });
        }

        Ok(Self {
            sem: NonNull::new(sem).ok_or_else(|| SemError::Os {
                op: "sem_open",
                name: name.to_string(),
                source: Errno::EINVAL,
            })?,
            name: name.to_string(),
            owner: true,
        })
    }

    /// Open an existing semaphore created by another process
    pub fn open(name: &str) -> Result<Self, SemError> {
        debug!(name, "NamedSemaphore::open: called");
        let c_name = c_name(name)?;
        // SAFETY: `c_name` is a valid NUL-terminated string; without O_CREAT
        // no variadic arguments are read.
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(match Errno::last() {
                Errno::ENOENT => SemError::Missing { name: name.to_string() },
                source => SemError::Os {
                    op: "sem_open",
                    name: name.to_string(),
                    source,
                },
            });
        }

        Ok(Self {
            sem: NonNull::new(sem).ok_or_else(|| SemError::Os {
                op: "sem_open",
                name: name.to_string(),
                source: Errno::EINVAL,
            })?,
            name: name.to_string(),
            owner: false,
        })
    }

    /// Remove a semaphore name left behind by a previous run.
    ///
    /// Returns `Ok(false)` when no such semaphore exists.
    pub fn unlink(name: &str) -> Result<bool, SemError> {
        let c_name = c_name(name)?;
        // SAFETY: `c_name` is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
            return Ok(true);
        }
        match Errno::last() {
            Errno::ENOENT => Ok(false),
            source => Err(SemError::Os {
                op: "sem_unlink",
                name: name.to_string(),
                source,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn os_error(&self, op: &'static str, source: Errno) -> SemError {
        match source {
            Errno::EINTR => SemError::Interrupted { name: self.name.clone() },
            Errno::ETIMEDOUT => SemError::TimedOut { name: self.name.clone() },
            source => SemError::Os {
                op,
                name: self.name.clone(),
                source,
            },
        }
    }

    /// Block until a token is available.
    ///
    /// Returns [`SemError::Interrupted`] when a signal handler ran during the wait.
    pub fn wait(&self) -> Result<(), SemError> {
        // SAFETY: `self.sem` came from a successful sem_open and is open until drop.
        if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
            return Ok(());
        }
        Err(self.os_error("sem_wait", Errno::last()))
    }

    /// Block for at most `timeout` waiting for a token.
    ///
    /// Returns [`SemError::TimedOut`] when no token arrived in time.
    #[cfg(not(target_vendor = "apple"))]
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), SemError> {
        let deadline = std::time::SystemTime::now() + timeout;
        let since_epoch = deadline
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let abs = libc::timespec {
            tv_sec: since_epoch.as_secs() as libc::time_t,
            tv_nsec: since_epoch.subsec_nanos() as _,
        };
        // SAFETY: `self.sem` is open; `abs` outlives the call.
        if unsafe { libc::sem_timedwait(self.sem.as_ptr(), &abs) } == 0 {
            return Ok(());
        }
        Err(self.os_error("sem_timedwait", Errno::last()))
    }

    /// Block for at most `timeout` waiting for a token.
    ///
    /// Apple platforms have no `sem_timedwait`, so this polls with `sem_trywait`.
    #[cfg(target_vendor = "apple")]
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), SemError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.try_wait()? {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                return Err(SemError::TimedOut { name: self.name.clone() });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait with an optional bound: `None` blocks indefinitely
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<(), SemError> {
        match timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => self.wait(),
        }
    }

    /// Take a token if one is immediately available
    pub fn try_wait(&self) -> Result<bool, SemError> {
        // SAFETY: `self.sem` is open until drop.
        if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
            return Ok(true);
        }
        match Errno::last() {
            Errno::EAGAIN => Ok(false),
            source => Err(self.os_error("sem_trywait", source)),
        }
    }

    /// Release one token
    pub fn post(&self) -> Result<(), SemError> {
        // SAFETY: `self.sem` is open until drop.
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == 0 {
            return Ok(());
        }
        Err(SemError::Os {
            op: "sem_post",
            name: self.name.clone(),
            source: Errno::last(),
        })
    }

    /// Current token count, for diagnostics and tests
    pub fn value(&self) -> Result<i32, SemError> {
        let mut value: libc::c_int = 0;
        // SAFETY: `self.sem` is open until drop; `value` is a valid out pointer.
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } == 0 {
            return Ok(value);
        }
        Err(SemError::Os {
            op: "sem_getvalue",
            name: self.name.clone(),
            source: Errno::last(),
        })
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: the handle is closed exactly once, here.
        if unsafe { libc::sem_close(self.sem.as_ptr()) } != 0 {
            warn!(name = %self.name, error = %Errno::last(), "Could not close semaphore");
        }
        if self.owner {
            match Self::unlink(&self.name) {
                Ok(_) => debug!(name = %self.name, "Removed semaphore"),
                Err(e) => warn!(error = %e, "Could not remove semaphore"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("/fbas_test_{}_{}", tag, uuid::Uuid::now_v7().simple())
    }

    #[test]
    fn test_create_open_post_wait() {
        let name = unique("sem");
        let owner = NamedSemaphore::create(&name, 1).unwrap();
        let other = NamedSemaphore::open(&name).unwrap();

        assert_eq!(owner.value().unwrap(), 1);
        other.wait().unwrap();
        assert_eq!(owner.value().unwrap(), 0);
        assert!(!other.try_wait().unwrap());
        owner.post().unwrap();
        assert!(other.try_wait().unwrap());
    }

    #[test]
    fn test_create_twice_fails() {
        let name = unique("dup");
        let _owner = NamedSemaphore::create(&name, 0).unwrap();
        assert!(matches!(
            NamedSemaphore::create(&name, 0),
            Err(SemError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_open_missing_fails() {
        let name = unique("missing");
        assert!(matches!(NamedSemaphore::open(&name), Err(SemError::Missing { .. })));
    }

    #[test]
    fn test_owner_drop_unlinks() {
        let name = unique("drop");
        drop(NamedSemaphore::create(&name, 0).unwrap());
        assert!(matches!(NamedSemaphore::open(&name), Err(SemError::Missing { .. })));
        assert!(!NamedSemaphore::unlink(&name).unwrap());
    }

    #[test]
    fn test_opener_drop_keeps_name() {
        let name = unique("keep");
        let _owner = NamedSemaphore::create(&name, 0).unwrap();
        drop(NamedSemaphore::open(&name).unwrap());
        assert!(NamedSemaphore::open(&name).is_ok());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let name = unique("timeout");
        let sem = NamedSemaphore::create(&name, 0).unwrap();
        let err = sem.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, SemError::TimedOut { .. }));
        assert!(err.is_wakeup());
    }

    #[test]
    fn test_wait_for_takes_available_token() {
        let name = unique("wait_for");
        let sem = NamedSemaphore::create(&name, 2).unwrap();
        sem.wait_for(Some(Duration::from_millis(10))).unwrap();
        sem.wait_for(None).unwrap();
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[derive(Clone, Copy)]
    struct ThreadHandle(libc::pthread_t);

    // SAFETY: a pthread_t is an opaque id; it is only passed to pthread_kill.
    unsafe impl Send for ThreadHandle {}
    unsafe impl Sync for ThreadHandle {}

    #[test]
    #[serial_test::serial]
    fn test_signal_interrupts_unbounded_wait() {
        crate::signals::install_termination_handler().unwrap();
        let name = unique("eintr");
        let sem = NamedSemaphore::create(&name, 0).unwrap();
        let waiter = ThreadHandle(unsafe { libc::pthread_self() });
        let done = std::sync::atomic::AtomicBool::new(false);

        let result = std::thread::scope(|s| {
            s.spawn(|| {
                let waiter = waiter;
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(50));
                    unsafe { libc::pthread_kill(waiter.0, libc::SIGINT) };
                }
            });
            let result = sem.wait_for(None);
            done.store(true, std::sync::atomic::Ordering::Release);
            result
        });

        let err = result.unwrap_err();
        assert!(matches!(err, SemError::Interrupted { .. }));
        assert!(err.is_wakeup());
        assert_eq!(sem.value().unwrap(), 0);
        crate::signals::take_pending_termination();
    }
}
