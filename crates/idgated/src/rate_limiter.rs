use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum rejected submissions before lockout.
const MAX_REJECTIONS: u32 = 5;
/// Sliding window over which rejections are counted.
const WINDOW: Duration = Duration::from_secs(300);
/// Lockout duration after exceeding MAX_REJECTIONS.
const LOCKOUT: Duration = Duration::from_secs(900);

struct AccountRecord {
    rejections: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// Per-account rate limiter for verification submissions.
///
/// After MAX_REJECTIONS rejected verifications within WINDOW seconds the
/// account is locked out for LOCKOUT seconds.  Transport failures toward
/// the collaborator are not counted — only an explicit rejection from the
/// verification service increments the counter.
pub struct RateLimiter {
    records: HashMap<String, AccountRecord>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Return `Ok(())` if the account may submit another verification.
    /// Return `Err(message)` if the account is currently rate-limited.
    pub fn check(&mut self, account_id: &str) -> Result<(), String> {
        let now = Instant::now();
        let record = self
            .records
            .entry(account_id.to_string())
            .or_insert(AccountRecord {
                rejections: 0,
                window_start: now,
                locked_until: None,
            });

        if let Some(locked_until) = record.locked_until {
            if now < locked_until {
                let remaining = locked_until.duration_since(now).as_secs();
                return Err(format!(
                    "too many rejected submissions; try again in {remaining}s"
                ));
            }
            // Lockout expired — reset
            *record = AccountRecord {
                rejections: 0,
                window_start: now,
                locked_until: None,
            };
        } else if now.duration_since(record.window_start) >= WINDOW {
            // Sliding window expired — reset rejection counter
            record.rejections = 0;
            record.window_start = now;
        }

        Ok(())
    }

    /// Record a rejected submission. May trigger a lockout.
    pub fn record_rejection(&mut self, account_id: &str) {
        let now = Instant::now();
        let record = self
            .records
            .entry(account_id.to_string())
            .or_insert(AccountRecord {
                rejections: 0,
                window_start: now,
                locked_until: None,
            });

        if now.duration_since(record.window_start) >= WINDOW {
            record.rejections = 0;
            record.window_start = now;
        }

        record.rejections += 1;
        if record.rejections >= MAX_REJECTIONS {
            record.locked_until = Some(now + LOCKOUT);
            tracing::warn!(
                account_id,
                rejections = record.rejections,
                lockout_secs = LOCKOUT.as_secs(),
                "rate limit triggered — locking account"
            );
        } else {
            tracing::debug!(
                account_id,
                rejections = record.rejections,
                max = MAX_REJECTIONS,
                "submission rejected — incrementing counter"
            );
        }
    }

    /// Record an approved submission — reset the rejection counter.
    pub fn record_approval(&mut self, account_id: &str) {
        self.records.remove(account_id);
    }
}
