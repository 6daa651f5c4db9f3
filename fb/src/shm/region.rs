//! POSIX shared memory region holding the [`SharedState`]

use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use tracing::{debug, warn};

use super::error::ShmError;
use super::layout::SharedState;

/// Removes the shared memory name on drop
#[derive(Debug)]
struct ShmLink {
    name: String,
}

impl Drop for ShmLink {
    fn drop(&mut self) {
        match shm_unlink(self.name.as_str()) {
            Ok(()) => debug!(name = %self.name, "Removed shared memory"),
            Err(e) => warn!(name = %self.name, error = %e, "Could not remove shared memory"),
        }
    }
}

/// Unmaps the region on drop
#[derive(Debug)]
struct Mapping {
    ptr: NonNull<SharedState>,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by a successful mmap of `SharedState::SIZE`
        // bytes and is unmapped exactly once, here.
        if let Err(e) = unsafe { munmap(self.ptr.cast(), SharedState::SIZE) } {
            warn!(error = %e, "Could not unmap shared memory");
        }
    }
}

/// A mapped shared memory region.
///
/// Teardown follows field order: unmap, close the descriptor, then (for the
/// creating process only) remove the name.
#[derive(Debug)]
pub struct SharedRegion {
    mapping: Mapping,
    _file: File,
    link: Option<ShmLink>,
    name: String,
}

// SAFETY: the mapping is only accessed through `&SharedState`, which is Sync.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create and map a new region; fails if the name already exists
    pub fn create(name: &str) -> Result<Self, ShmError> {
        debug!(name, size = SharedState::SIZE, "SharedRegion::create: called");
        let fd = shm_open(
            name,
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| match e {
            Errno::EEXIST => ShmError::AlreadyExists { name: name.to_string() },
            source => ShmError::Os {
                op: "shm_open",
                name: name.to_string(),
                source,
            },
        })?;
        // From here on the name is ours; a failure below removes it again.
        let link = ShmLink { name: name.to_string() };
        let file = File::from(fd);

        file.set_len(SharedState::SIZE as u64).map_err(|source| ShmError::Io {
            op: "ftruncate",
            name: name.to_string(),
            source,
        })?;

        let mapping = map(&file, name)?;
        let region = Self {
            mapping,
            _file: file,
            link: Some(link),
            name: name.to_string(),
        };
        region.state().init_header();
        debug!(name, "SharedRegion::create: mapped");
        Ok(region)
    }

    /// Map an existing region created by another process
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        debug!(name, "SharedRegion::attach: called");
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| match e {
            Errno::ENOENT => ShmError::Missing { name: name.to_string() },
            source => ShmError::Os {
                op: "shm_open",
                name: name.to_string(),
                source,
            },
        })?;
        let file = File::from(fd);

        let actual = file
            .metadata()
            .map_err(|source| ShmError::Io {
                op: "fstat",
                name: name.to_string(),
                source,
            })?
            .len();
        // The creator truncates right after shm_open; an empty object is one
        // caught in between.
        if actual == 0 {
            return Err(ShmError::NotReady { name: name.to_string() });
        }
        if actual != SharedState::SIZE as u64 {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                actual,
                expected: SharedState::SIZE as u64,
            });
        }

        let mapping = map(&file, name)?;
        Ok(Self {
            mapping,
            _file: file,
            link: None,
            name: name.to_string(),
        })
    }

    /// Remove a region name left behind by a previous run.
    ///
    /// Returns `Ok(false)` when no such region exists.
    pub fn unlink(name: &str) -> Result<bool, ShmError> {
        match shm_unlink(name) {
            Ok(()) => Ok(true),
            Err(Errno::ENOENT) => Ok(false),
            Err(source) => Err(ShmError::Os {
                op: "shm_unlink",
                name: name.to_string(),
                source,
            }),
        }
    }

    pub fn state(&self) -> &SharedState {
        // SAFETY: the mapping is valid, suitably aligned (page aligned) and
        // sized for a SharedState for as long as `self` lives.
        unsafe { self.mapping.ptr.as_ref() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether dropping this region removes the name
    pub fn is_owner(&self) -> bool {
        self.link.is_some()
    }
}

fn map(file: &File, name: &str) -> Result<Mapping, ShmError> {
    let length = NonZeroUsize::new(SharedState::SIZE).ok_or_else(|| ShmError::SizeMismatch {
        name: name.to_string(),
        actual: 0,
        expected: SharedState::SIZE as u64,
    })?;
    // SAFETY: mapping a shared file descriptor we own with a fixed length;
    // the result is only dereferenced as a SharedState, whose fields are all
    // valid for any bit pattern the peers write.
    let ptr = unsafe {
        mmap(
            None,
            length,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            file,
            0,
        )
    }
    .map_err(|source| ShmError::Os {
        op: "mmap",
        name: name.to_string(),
        source,
    })?;
    Ok(Mapping { ptr: ptr.cast() })
}
