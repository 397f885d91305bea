use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Version token - identifies one state of a resource's GPU-relevant content
///
/// Every token handed out is unique for the process lifetime, so a GPU mirror
/// only has to compare the token it was built from against the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken(u64);

impl VersionToken {
    #[must_use]
    pub fn new() -> Self {
        Self(NEXT_VERSION.fetch_add(1, Ordering::Relaxed))
    }

    /// Marks as modified: replaces this token with a fresh one
    pub fn renew(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for VersionToken {
    fn default() -> Self {
        Self::new()
    }
}
