//! Single-operator mutual exclusion.
//!
//! Operation methods mutate shared physical hardware and must be serialised
//! to exactly one logical owner at a time. The lock tracks which caller
//! currently holds that right. Telemetry bypasses it entirely. A human
//! operator may forcibly reclaim control after a crashed or abandoned client
//! via the force path; the dispossessed holder is not notified out-of-band
//! and discovers the loss on its next operation call.
//!
//! The lock is owned by its dispatcher instance; there is no ambient global,
//! so multiple independent servers can coexist in one process for testing.

use thiserror::Error;

use super::relay::DiagnosticRelay;

const LOCK_SOURCE: &str = "operator-lock";

/// Single-slot operator lock. `None` means unclaimed.
#[derive(Debug, Default)]
pub struct OperatorLock {
    holder: Option<String>,
}

/// Lock contention failures, reported to callers as conflicts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// A different caller holds the lock and the claim was not forced.
    #[error(
        "operator is claimed by [{holder}]; it must release control or the claim \
         must be forced before requests from [{caller}] can be processed"
    )]
    ClaimHeld { holder: String, caller: String },

    /// Release was requested by a caller that does not hold the lock.
    #[error("release can only be requested by the current operator [{holder}]")]
    ReleaseHeld { holder: String },
}

impl OperatorLock {
    /// Creates an unclaimed lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder, if any.
    #[must_use]
    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    /// True when `caller` is the current operator. Pure query.
    #[must_use]
    pub fn is_operator(&self, caller: &str) -> bool {
        self.holder.as_deref() == Some(caller)
    }

    /// Claims operator status for `caller`.
    ///
    /// Unclaimed locks are claimed immediately; re-claiming by the current
    /// holder is a no-op. When another caller holds the lock, `force` steals
    /// it and emits a warning record for the new holder to see; otherwise the
    /// claim fails and the state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::ClaimHeld`] on unforced contention.
    pub fn claim(
        &mut self,
        caller: &str,
        force: bool,
        relay: &DiagnosticRelay,
    ) -> Result<(), LockError> {
        match self.holder.as_deref() {
            None => {
                relay.info(LOCK_SOURCE, format!("claiming operator with ID [{caller}]"));
            }
            Some(holder) if holder == caller => return Ok(()),
            Some(holder) => {
                if !force {
                    return Err(LockError::ClaimHeld {
                        holder: holder.to_string(),
                        caller: caller.to_string(),
                    });
                }
                relay.warn(
                    LOCK_SOURCE,
                    format!(
                        "forcibly claiming operator from existing client [{holder}]; \
                         that client may misbehave unless it reclaims control"
                    ),
                );
            }
        }
        self.holder = Some(caller.to_string());
        Ok(())
    }

    /// Releases operator status held by `caller`.
    ///
    /// Releasing an unclaimed lock is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::ReleaseHeld`] when a different caller holds the
    /// lock; the state is unchanged.
    pub fn release(&mut self, caller: &str, relay: &DiagnosticRelay) -> Result<(), LockError> {
        match self.holder.as_deref() {
            Some(holder) if holder != caller => Err(LockError::ReleaseHeld {
                holder: holder.to_string(),
            }),
            Some(_) => {
                relay.info(LOCK_SOURCE, format!("releasing operator [{caller}]"));
                self.holder = None;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use gantry_protocol::Severity;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn relay() -> DiagnosticRelay {
        DiagnosticRelay::new()
    }

    #[rstest]
    fn claim_of_unclaimed_lock_succeeds(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");
        assert!(lock.is_operator("alice@1"));
        assert_eq!(lock.holder(), Some("alice@1"));
    }

    #[rstest]
    fn reclaim_by_holder_is_a_noop(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");
        relay.drain();

        lock.claim("alice@1", false, &relay).expect("reclaim");
        assert!(lock.is_operator("alice@1"));
        // No-op claims add no diagnostics.
        assert!(relay.drain().is_empty());
    }

    #[rstest]
    fn unforced_claim_against_other_holder_fails_without_state_change(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");

        let error = lock
            .claim("bob@2", false, &relay)
            .expect_err("should conflict");
        assert!(matches!(error, LockError::ClaimHeld { .. }));
        assert_eq!(lock.holder(), Some("alice@1"));
    }

    #[rstest]
    fn forced_claim_steals_the_lock_and_warns(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");
        relay.drain();

        lock.claim("bob@2", true, &relay).expect("forced claim");
        assert_eq!(lock.holder(), Some("bob@2"));

        let records = relay.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Warning);
        assert!(records[0].message.contains("alice@1"));
    }

    #[rstest]
    fn release_by_holder_unclaims(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");
        lock.release("alice@1", &relay).expect("release");
        assert_eq!(lock.holder(), None);
    }

    #[rstest]
    fn release_of_unclaimed_lock_is_idempotent(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.release("alice@1", &relay).expect("first release");
        lock.release("alice@1", &relay).expect("second release");
        assert_eq!(lock.holder(), None);
    }

    #[rstest]
    fn release_by_non_holder_fails_without_state_change(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        lock.claim("alice@1", false, &relay).expect("claim");

        let error = lock
            .release("bob@2", &relay)
            .expect_err("should conflict");
        assert!(matches!(error, LockError::ReleaseHeld { .. }));
        assert_eq!(lock.holder(), Some("alice@1"));
    }

    #[rstest]
    fn holder_is_never_more_than_one_caller(relay: DiagnosticRelay) {
        let mut lock = OperatorLock::new();
        let callers = ["a@1", "b@2", "c@3"];
        let sequence = ["a@1", "b@2", "c@3", "a@1", "b@2"];
        for (step, caller) in sequence.iter().enumerate() {
            let force = step % 2 == 1;
            let _ = lock.claim(caller, force, &relay);
            let holders = callers
                .iter()
                .filter(|candidate| lock.is_operator(candidate))
                .count();
            assert_eq!(holders, 1, "exactly one holder after step {step}");
        }
    }
}
