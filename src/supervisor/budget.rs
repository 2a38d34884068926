//! Optional spend tracking for stages that consume metered resources
//! (model tokens, paid API calls).

use parking_lot::Mutex;

use crate::errors::ArtemisError;

/// Tracks cumulative spend against a daily and monthly limit, rejecting
/// further charges once either is exhausted.
///
/// Absent from a `Supervisor` unless explicitly configured: stages that
/// never call `charge` are unaffected.
#[derive(Debug)]
pub struct BudgetTracker {
    daily_limit: f64,
    monthly_limit: f64,
    unit: String,
    spent_today: Mutex<f64>,
    spent_this_month: Mutex<f64>,
}

impl BudgetTracker {
    /// Creates a tracker with the given limits.
    #[must_use]
    pub fn new(daily_limit: f64, monthly_limit: f64, unit: impl Into<String>) -> Self {
        Self {
            daily_limit,
            monthly_limit,
            unit: unit.into(),
            spent_today: Mutex::new(0.0),
            spent_this_month: Mutex::new(0.0),
        }
    }

    /// Attempts to charge `amount`, rejecting the charge entirely if it
    /// would push either counter past its limit.
    ///
    /// # Errors
    ///
    /// Returns `ArtemisError::BudgetExceeded` naming whichever limit was
    /// hit.
    pub fn charge(&self, amount: f64) -> Result<(), ArtemisError> {
        let mut today = self.spent_today.lock();
        let mut month = self.spent_this_month.lock();

        if *today + amount > self.daily_limit {
            return Err(ArtemisError::BudgetExceeded {
                spent: *today + amount,
                limit: self.daily_limit,
                unit: format!("{}/day", self.unit),
            });
        }
        if *month + amount > self.monthly_limit {
            return Err(ArtemisError::BudgetExceeded {
                spent: *month + amount,
                limit: self.monthly_limit,
                unit: format!("{}/month", self.unit),
            });
        }

        *today += amount;
        *month += amount;
        Ok(())
    }

    /// Returns `(spent_today, spent_this_month)`.
    #[must_use]
    pub fn spent(&self) -> (f64, f64) {
        (*self.spent_today.lock(), *self.spent_this_month.lock())
    }

    /// Resets the daily counter, called by a scheduled day rollover.
    pub fn reset_daily(&self) {
        *self.spent_today.lock() = 0.0;
    }

    /// Resets the monthly counter, called by a scheduled month rollover.
    pub fn reset_monthly(&self) {
        *self.spent_this_month.lock() = 0.0;
    }
}
