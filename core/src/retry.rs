//! Bounded retry policy for provider matching.
//!
//! A booking has one retry counter shared by assignment misses and provider
//! rejections. When it reaches the ceiling the booking is forced to `Failed`.
//!
//! # Example
//!
//! ```
//! use fieldserve_core::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::builder()
//!     .ceiling(5)
//!     .reset_on_revive(true)
//!     .build();
//!
//! assert_eq!(policy.ceiling, 5);
//! assert!(policy.reset_on_revive);
//! ```

use serde::{Deserialize, Serialize};

/// Number of misses/rejections after which a booking fails.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `ceiling`: 3
/// - `reset_on_revive`: false (a revived booking keeps its counter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of matching misses and rejections per booking
    pub ceiling: u32,
    /// Whether `retry` zeroes the counter before matching again
    pub reset_on_revive: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_RETRY_CEILING,
            reset_on_revive: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            ceiling: DEFAULT_RETRY_CEILING,
            reset_on_revive: false,
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyBuilder {
    ceiling: u32,
    reset_on_revive: bool,
}

impl RetryPolicyBuilder {
    /// Set the retry ceiling. Values below 1 are raised to 1.
    #[must_use]
    pub const fn ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = if ceiling == 0 { 1 } else { ceiling };
        self
    }

    /// Choose whether `retry` resets the counter.
    #[must_use]
    pub const fn reset_on_revive(mut self, reset: bool) -> Self {
        self.reset_on_revive = reset;
        self
    }

    /// Build the policy.
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        RetryPolicy {
            ceiling: self.ceiling,
            reset_on_revive: self.reset_on_revive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ceiling_is_three() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.ceiling, 3);
        assert!(!policy.reset_on_revive);
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        let policy = RetryPolicy::builder().ceiling(0).build();
        assert_eq!(policy.ceiling, 1);
    }
}
