//! Single-writer lease over the persisted timer state.
//!
//! A long-running session claims the `lease` record before it starts
//! ticking and renews it on every tick. A second session pointed at the same
//! profile is refused while the lease is live, instead of both sessions
//! silently overwriting each other's `cycleState`.
//!
//! The claim is a read-then-write over [`Store`], not an atomic
//! compare-and-swap; two sessions starting in the same instant can both win.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{load_record, save_record, Store, LEASE_KEY};
use crate::clock::Clock;
use crate::error::{LeaseError, PersistenceError, Result};

/// The persisted `lease` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseHolder {
    pub owner: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// A held lease. Dropping it without [`Lease::release`] lets it lapse at
/// its expiry.
pub struct Lease {
    owner: String,
    ttl: Duration,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Lease {
    /// Claim the lease for a fresh owner id.
    ///
    /// # Errors
    /// [`LeaseError::Held`] if another owner holds an unexpired lease, or a
    /// persistence error if the record cannot be read or written.
    pub fn acquire(store: Arc<dyn Store>, clock: Arc<dyn Clock>, ttl: Duration) -> Result<Self> {
        let lease = Self {
            owner: Uuid::new_v4().to_string(),
            ttl,
            store,
            clock,
        };
        if let Some(current) = lease.current()? {
            if current.owner != lease.owner && current.expires_at > lease.clock.now() {
                return Err(LeaseError::Held {
                    owner: current.owner,
                    expires_at: current.expires_at,
                }
                .into());
            }
        }
        lease.write()?;
        info!(owner = %lease.owner, "lease acquired");
        Ok(lease)
    }

    /// The live holder, if any, without claiming anything.
    ///
    /// One-shot commands use this to stay out of a running session's way.
    pub fn holder(store: &dyn Store, clock: &dyn Clock) -> Result<Option<LeaseHolder>> {
        let current = load_record::<Option<LeaseHolder>>(store, LEASE_KEY)?.flatten();
        Ok(current.filter(|h| h.expires_at > clock.now()))
    }

    /// # Errors
    /// [`LeaseError::Held`] while a live session owns the state.
    pub fn ensure_free(store: &dyn Store, clock: &dyn Clock) -> Result<()> {
        match Self::holder(store, clock)? {
            Some(holder) => Err(LeaseError::Held {
                owner: holder.owner,
                expires_at: holder.expires_at,
            }
            .into()),
            None => Ok(()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Push the expiry forward.
    ///
    /// # Errors
    /// [`LeaseError::Lost`] if another owner has taken the lease over.
    pub fn renew(&self) -> Result<()> {
        if let Some(current) = self.current()? {
            if current.owner != self.owner {
                return Err(LeaseError::Lost(current.owner).into());
            }
        }
        self.write()?;
        debug!(owner = %self.owner, "lease renewed");
        Ok(())
    }

    /// Give the lease up if still ours.
    pub fn release(self) -> Result<()> {
        if let Some(current) = self.current()? {
            if current.owner == self.owner {
                save_record(self.store.as_ref(), LEASE_KEY, &serde_json::Value::Null)?;
                info!(owner = %self.owner, "lease released");
            }
        }
        Ok(())
    }

    fn current(&self) -> Result<Option<LeaseHolder>> {
        Ok(load_record::<Option<LeaseHolder>>(self.store.as_ref(), LEASE_KEY)?.flatten())
    }

    fn write(&self) -> Result<()> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| PersistenceError::write(LEASE_KEY, "lease expiry out of range"))?;
        let record = LeaseHolder {
            owner: self.owner.clone(),
            expires_at,
        };
        save_record(self.store.as_ref(), LEASE_KEY, &record)?;
        Ok(())
    }
}
