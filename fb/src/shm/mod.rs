//! Shared resources: the POSIX shared memory region, the three named
//! semaphores, and the bounded-buffer protocol built on top of them.
//!
//! The supervisor creates and owns every resource; generators attach to
//! what already exists and only ever release their own handles.

mod error;
mod layout;
mod region;
mod ring;
mod semaphore;

pub use error::{SemError, ShmError};
pub use layout::{BUFFER_SIZE, LAYOUT_MAGIC, LAYOUT_VERSION, Phase, SharedState};
pub use region::SharedRegion;
pub use ring::{Publish, Ring, RingReader, Take};
pub use semaphore::NamedSemaphore;

use tracing::info;

/// Default name prefix for all shared resources
pub const DEFAULT_PREFIX: &str = "/fb_arc_set_shm";

/// Room left for the longest semaphore suffix within NAME_MAX,
/// after the `sem.` prefix glibc adds.
const MAX_PREFIX_LEN: usize = 200;

/// Well-known names of the region and its semaphores, all derived from one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub region: String,
    pub free_slots: String,
    pub used_slots: String,
    pub writer_gate: String,
}

impl ResourceNames {
    /// Derive the resource names from `prefix`, which must look like `/name`
    pub fn from_prefix(prefix: &str) -> Result<Self, ShmError> {
        let invalid = |reason| ShmError::InvalidName {
            name: prefix.to_string(),
            reason,
        };

        let rest = prefix.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Err(invalid("must name something after '/'"));
        }
        if rest.contains('/') {
            return Err(invalid("must not contain '/' after the first character"));
        }
        if rest.contains('\0') {
            return Err(invalid("must not contain NUL bytes"));
        }
        if prefix.len() > MAX_PREFIX_LEN {
            return Err(invalid("too long"));
        }

        Ok(Self {
            region: prefix.to_string(),
            free_slots: format!("{}_SEM_FREE", prefix),
            used_slots: format!("{}_SEM_USED", prefix),
            writer_gate: format!("{}_SEM_BLOCKED", prefix),
        })
    }

    /// Remove any resources left behind under these names by a crashed run.
    ///
    /// Returns how many names were actually removed.
    pub fn reclaim(&self) -> Result<usize, ShmError> {
        let mut removed = 0;
        for name in [&self.free_slots, &self.used_slots, &self.writer_gate] {
            if NamedSemaphore::unlink(name)? {
                info!(name = %name, "Reclaimed stale semaphore");
                removed += 1;
            }
        }
        if SharedRegion::unlink(&self.region)? {
            info!(name = %self.region, "Reclaimed stale shared memory");
            removed += 1;
        }
        Ok(removed)
    }
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            region: DEFAULT_PREFIX.to_string(),
            free_slots: format!("{}_SEM_FREE", DEFAULT_PREFIX),
            used_slots: format!("{}_SEM_USED", DEFAULT_PREFIX),
            writer_gate: format!("{}_SEM_BLOCKED", DEFAULT_PREFIX),
        }
    }
}
