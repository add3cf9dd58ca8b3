use async_trait::async_trait;

use crate::contract::couple_id::CoupleId;

/// A held per-couple lock. Dropping it releases too, but only best-effort.
#[async_trait]
pub trait LockLease: Send {
    async fn release(self: Box<Self>);
}

/// Proof that the caller's couple exists and that no unmatch can run for it
/// until the guard is released. Shared-entity writers hold one while they
/// create records tagged with [`CoupleWriteGuard::couple_id`].
pub struct CoupleWriteGuard {
    couple_id: CoupleId,
    lease: Box<dyn LockLease>,
}

impl CoupleWriteGuard {
    pub fn new(couple_id: CoupleId, lease: Box<dyn LockLease>) -> Self {
        Self { couple_id, lease }
    }

    pub fn couple_id(&self) -> &CoupleId {
        &self.couple_id
    }

    pub async fn release(self) {
        self.lease.release().await;
    }
}

impl std::fmt::Debug for CoupleWriteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoupleWriteGuard")
            .field("couple_id", &self.couple_id)
            .finish_non_exhaustive()
    }
}
