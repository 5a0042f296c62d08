use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, Span};

use crate::domain::command::OwnerId;
use crate::domain::error::{AtCliError, AtCliResult};

/// Single-owner gate over writes to the serial line.
///
/// Flows take a lease with [`acquire`](Self::acquire), which waits. Single
/// commands go through [`authorize`](Self::authorize), which never waits: it
/// either grants the write or rejects it on the spot.
pub struct OwnershipArbiter {
    holder: Mutex<Option<OwnerId>>,
    released: Notify,
    span: Span,
}

/// Proof that a write is allowed. The lease cannot change hands while this is alive.
pub struct WriteGrant<'a> {
    _holder: MutexGuard<'a, Option<OwnerId>>,
}

impl OwnershipArbiter {
    pub fn new(span: Span) -> Self {
        Self {
            holder: Mutex::new(None),
            released: Notify::new(),
            span,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<OwnerId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the line is free (or already ours) and take the lease.
    pub async fn acquire(&self, owner: &OwnerId, timeout: Duration) -> AtCliResult<()> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register for the wakeup before looking at the holder so a release
            // between the check and the wait is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut holder = self.lock();
                match holder.as_ref() {
                    None => {
                        *holder = Some(owner.clone());
                        debug!(parent: &self.span, %owner, "lease acquired");
                        return Ok(());
                    }
                    Some(current) if current == owner => {
                        debug!(parent: &self.span, %owner, "lease re-entered");
                        return Ok(());
                    }
                    Some(current) => {
                        debug!(parent: &self.span, %owner, holder = %current, "waiting for lease");
                    }
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(AtCliError::LockTimeout {
                    owner: owner.clone(),
                    waited: timeout,
                });
            }
        }
    }

    /// Clear the lease if `owner` holds it; otherwise do nothing.
    /// Returns whether a lease was actually released.
    pub fn release(&self, owner: &OwnerId) -> bool {
        let released = {
            let mut holder = self.lock();
            if holder.as_ref() == Some(owner) {
                *holder = None;
                true
            } else {
                false
            }
        };

        if released {
            debug!(parent: &self.span, %owner, "lease released");
            self.released.notify_waiters();
        }
        released
    }

    /// Grant a write immediately, or fail with `OwnershipConflict` if someone
    /// else holds the lease. `None` is an unowned single-shot command.
    pub fn authorize(&self, owner: Option<&OwnerId>) -> AtCliResult<WriteGrant<'_>> {
        let holder = self.lock();
        match holder.as_ref() {
            Some(current) if Some(current) != owner => Err(AtCliError::OwnershipConflict {
                holder: current.clone(),
            }),
            _ => Ok(WriteGrant { _holder: holder }),
        }
    }

    /// Current lease holder
    pub fn holder(&self) -> Option<OwnerId> {
        self.lock().clone()
    }
}

impl Default for OwnershipArbiter {
    fn default() -> Self {
        Self::new(Span::none())
    }
}
