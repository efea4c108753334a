// SPDX-License-Identifier: Apache-2.0

mod async_timeout;
mod watchdog;

pub use async_timeout::*;
pub use watchdog::*;

use std::time::{Duration, Instant};
use crate::{Error, Result};
use crate::error::OperationKind;

/// A time limit on stream operations: a per-operation budget, an absolute
/// deadline, or both. A timeout with neither never expires.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Timeout {
	timeout: Option<Duration>,
	deadline: Option<Instant>,
}

impl Timeout {
	/// A timeout that never expires.
	pub const NONE: Self = Self::new();

	pub const fn new() -> Self {
		Self { timeout: None, deadline: None }
	}

	/// Sets the per-operation budget. A zero duration means no budget.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.set_timeout(timeout);
		self
	}

	/// Sets the per-operation budget. A zero duration means no budget.
	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = (!timeout.is_zero()).then_some(timeout);
	}

	/// Sets the absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.set_deadline(deadline);
		self
	}

	/// Sets the deadline to `duration` from now. A deadline too far away to
	/// represent is left unset.
	pub fn with_deadline_after(self, duration: Duration) -> Self {
		match Instant::now().checked_add(duration) {
			Some(deadline) => self.with_deadline(deadline),
			None => self
		}
	}

	/// Sets the absolute deadline.
	pub fn set_deadline(&mut self, deadline: Instant) {
		self.deadline = Some(deadline);
	}

	pub fn clear_timeout(&mut self) -> &mut Self {
		self.timeout = None;
		self
	}

	pub fn clear_deadline(&mut self) -> &mut Self {
		self.deadline = None;
		self
	}

	/// Returns the per-operation budget, if any.
	pub fn timeout(&self) -> Option<Duration> { self.timeout }
	/// Returns the absolute deadline, if any.
	pub fn deadline(&self) -> Option<Instant> { self.deadline }
	pub fn has_deadline(&self) -> bool { self.deadline.is_some() }
	/// Returns `true` if the timeout has neither a budget nor a deadline.
	pub fn is_none(&self) -> bool { self.timeout.is_none() && self.deadline.is_none() }

	/// Returns the instant an operation starting at `now` times out: the sooner
	/// of `now` plus the budget and the deadline. Returns `None` if the timeout
	/// never expires.
	pub fn timeout_at(&self, now: Instant) -> Option<Instant> {
		let budget = self.timeout.and_then(|timeout| now.checked_add(timeout));
		match (budget, self.deadline) {
			(Some(budget), Some(deadline)) => Some(budget.min(deadline)),
			(budget, deadline) => budget.or(deadline)
		}
	}

	/// Fails with a timeout error if the deadline has passed.
	pub fn check(&self) -> Result {
		match self.deadline {
			Some(deadline) if Instant::now() >= deadline =>
				Err(Error::timeout(OperationKind::Unknown, None)),
			_ => Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use std::time::{Duration, Instant};
	use super::Timeout;

	#[test]
	fn none_never_expires() {
		assert!(Timeout::NONE.is_none());
		assert_eq!(Timeout::NONE.timeout_at(Instant::now()), None);
		assert!(Timeout::NONE.check().is_ok());
		assert!(Timeout::new().with_timeout(Duration::ZERO).is_none());
	}

	#[test]
	fn timeout_at_picks_sooner() {
		let now = Instant::now();
		let budget = Timeout::new().with_timeout(Duration::from_secs(5));
		assert_eq!(budget.timeout_at(now), Some(now + Duration::from_secs(5)));

		let both = budget.with_deadline(now + Duration::from_secs(1));
		assert_eq!(both.timeout_at(now), Some(now + Duration::from_secs(1)));

		let both = budget.with_deadline(now + Duration::from_secs(10));
		assert_eq!(both.timeout_at(now), Some(now + Duration::from_secs(5)));
	}

	#[test]
	fn distant_deadline_is_unset() {
		let timeout = Timeout::new().with_deadline_after(Duration::MAX);
		assert!(!timeout.has_deadline());
		assert!(timeout.check().is_ok());

		let timeout = Timeout::new().with_deadline_after(Duration::from_secs(60));
		assert!(timeout.has_deadline());
	}

	#[test]
	fn passed_deadline_fails_check() {
		let mut timeout = Timeout::new().with_deadline(Instant::now());
		assert!(timeout.check().unwrap_err().is_timeout());
		timeout.clear_deadline();
		assert!(timeout.check().is_ok());
	}
}
