// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::sync::Arc;
use std::time::Instant;
use crate::{Buffer, Error, Result};
use crate::error::ResultContext;
use crate::error::OperationKind::{self, Close, Flush, Read, Write};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};
use super::{Timeout, TimeoutHandler, Watchdog};
use super::watchdog::Watch;

/// The most bytes written under a single watch, so that large writes make
/// progress toward their deadline rather than timing out as a whole.
const WRITE_CHUNK: usize = 64 * 1024;

/// A timeout enforced by a [`Watchdog`]: while entered, the watchdog runs the
/// handler if the deadline passes. Blocking operations wrapped in
/// [`with_timeout`](Self::with_timeout) are interrupted by the handler, usually
/// by closing whatever they're blocked on, and the resulting failure is
/// reported as a timeout.
pub struct AsyncTimeout {
	timeout: Timeout,
	handler: Arc<dyn TimeoutHandler>,
	watchdog: Watchdog,
	watch: Option<Watch>,
	entered: bool,
}

impl AsyncTimeout {
	/// Creates a timeout serviced by the process-wide watchdog.
	pub fn new(handler: impl TimeoutHandler) -> Self {
		Self::with_watchdog(handler, Watchdog::global().clone())
	}

	pub fn with_watchdog(handler: impl TimeoutHandler, watchdog: Watchdog) -> Self {
		Self {
			timeout: Timeout::NONE,
			handler: Arc::new(handler),
			watchdog,
			watch: None,
			entered: false,
		}
	}

	pub fn timeout(&self) -> Timeout { self.timeout }

	pub fn timeout_mut(&mut self) -> &mut Timeout { &mut self.timeout }

	pub fn set_timeout(&mut self, timeout: Timeout) { self.timeout = timeout }

	/// Starts watching for the timeout. Has no effect on the watchdog if neither a
	/// budget nor a deadline is set.
	///
	/// # Panics
	///
	/// Panics if already entered without a matching [`exit`](Self::exit).
	pub fn enter(&mut self) -> Result {
		assert!(!self.entered, "unbalanced enter/exit");
		let Some(at) = self.timeout.timeout_at(Instant::now()) else {
			self.entered = true;
			return Ok(())
		};

		let watch = self.watchdog
						.schedule(at, Arc::clone(&self.handler))
						.context(OperationKind::Other("enter timeout"))?;
		self.watch = Some(watch);
		self.entered = true;
		Ok(())
	}

	/// Stops watching, returning `true` if the timeout fired while entered.
	pub fn exit(&mut self) -> bool {
		if !self.entered { return false }
		self.entered = false;
		match self.watch.take() {
			Some(watch) => self.watchdog.cancel(watch),
			None => false
		}
	}

	/// Runs `op` within the timeout. If the timeout fires, the result is replaced
	/// by a timeout error, carrying the failure as its cause if `op` failed.
	pub fn with_timeout<T>(&mut self, op: impl FnOnce() -> Result<T>) -> Result<T> {
		self.enter()?;
		let result = op();
		if !self.exit() {
			return result
		}

		match result {
			Ok(_) => Err(Error::timeout(OperationKind::Unknown, None)),
			Err(error) => Err(Error::timeout(error.operation(), Some(error)))
		}
	}

	/// Wraps `sink`, guarding its operations with this timeout.
	pub fn sink<S: Sink>(self, sink: S) -> TimeoutSink<S> {
		TimeoutSink { guard: self, sink }
	}

	/// Wraps `source`, guarding its operations with this timeout.
	pub fn source<S: Source>(self, source: S) -> TimeoutSource<S> {
		TimeoutSource { guard: self, source }
	}
}

impl Drop for AsyncTimeout {
	fn drop(&mut self) {
		self.exit();
	}
}

/// A [`Sink`] whose writes, flushes, and close are guarded by an [`AsyncTimeout`].
pub struct TimeoutSink<S: Sink> {
	guard: AsyncTimeout,
	sink: S,
}

impl<S: Sink> TimeoutSink<S> {
	pub fn timeout_mut(&mut self) -> &mut Timeout { self.guard.timeout_mut() }

	pub fn get_ref(&self) -> &S { &self.sink }

	pub fn get_mut(&mut self) -> &mut S { &mut self.sink }

	pub fn into_inner(self) -> S { self.sink }
}

impl<S: Sink> Stream for TimeoutSink<S> {
	fn close(&mut self) -> Result {
		let Self { guard, sink } = self;
		guard.with_timeout(|| sink.close()).context(Close)
	}

	fn timeout(&self) -> Timeout { self.guard.timeout() }
}

impl<S: Sink> Sink for TimeoutSink<S> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.size() {
			return Err(Error::out_of_range(Write))
		}

		let Self { guard, sink } = self;
		let mut remaining = count;
		while remaining > 0 {
			let chunk = min(remaining, WRITE_CHUNK);
			guard.with_timeout(|| sink.write(source, chunk)).context(Write)?;
			remaining -= chunk;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		let Self { guard, sink } = self;
		guard.with_timeout(|| sink.flush()).context(Flush)
	}
}

/// A [`Source`] whose reads and close are guarded by an [`AsyncTimeout`].
pub struct TimeoutSource<S: Source> {
	guard: AsyncTimeout,
	source: S,
}

impl<S: Source> TimeoutSource<S> {
	pub fn timeout_mut(&mut self) -> &mut Timeout { self.guard.timeout_mut() }

	pub fn get_ref(&self) -> &S { &self.source }

	pub fn get_mut(&mut self) -> &mut S { &mut self.source }

	pub fn into_inner(self) -> S { self.source }
}

impl<S: Source> Stream for TimeoutSource<S> {
	fn close(&mut self) -> Result {
		let Self { guard, source } = self;
		guard.with_timeout(|| source.close()).context(Close)
	}

	fn timeout(&self) -> Timeout { self.guard.timeout() }
}

impl<S: Source> Source for TimeoutSource<S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if count == 0 { return Ok(0) }
		let Self { guard, source } = self;
		guard.with_timeout(|| source.read(sink, count)).context(Read)
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::thread;
	use std::time::Duration;
	use crate::{Error, ErrorKind, Result};
	use crate::error::OperationKind;
	use crate::timeout::{Timeout, Watchdog, WatchdogOptions};
	use super::AsyncTimeout;

	fn counting(watchdog: &Watchdog) -> (AsyncTimeout, Arc<AtomicUsize>) {
		let count = Arc::new(AtomicUsize::new(0));
		let handler = {
			let count = Arc::clone(&count);
			move || { count.fetch_add(1, Ordering::SeqCst); }
		};
		(AsyncTimeout::with_watchdog(handler, watchdog.clone()), count)
	}

	fn millis(ms: u64) -> Timeout {
		Timeout::new().with_timeout(Duration::from_millis(ms))
	}

	#[test]
	fn fast_operation_is_not_timed_out() {
		let watchdog = Watchdog::new(WatchdogOptions::default());
		let (mut timeout, count) = counting(&watchdog);
		timeout.set_timeout(millis(50));
		timeout.enter().unwrap();
		thread::sleep(Duration::from_millis(10));
		assert!(!timeout.exit());
		assert_eq!(count.load(Ordering::SeqCst), 0);
		assert_eq!(watchdog.pending(), 0);
	}

	#[test]
	fn slow_operation_is_timed_out() {
		let watchdog = Watchdog::new(WatchdogOptions::default());
		let (mut timeout, count) = counting(&watchdog);
		timeout.set_timeout(millis(20));
		timeout.enter().unwrap();
		thread::sleep(Duration::from_millis(100));
		assert!(timeout.exit());
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn no_timeout_is_never_scheduled() {
		let watchdog = Watchdog::new(WatchdogOptions::default());
		let (mut timeout, _) = counting(&watchdog);
		timeout.enter().unwrap();
		assert_eq!(watchdog.pending(), 0);
		assert!(!watchdog.is_running());
		assert!(!timeout.exit());
	}

	#[test]
	#[should_panic(expected = "unbalanced enter/exit")]
	fn double_enter_panics() {
		let (mut timeout, _) = counting(Watchdog::global());
		timeout.enter().unwrap();
		let _ = timeout.enter();
	}

	#[test]
	fn late_results_are_timeouts() {
		let watchdog = Watchdog::new(WatchdogOptions::default());
		let (mut timeout, _) = counting(&watchdog);
		timeout.set_timeout(millis(10));

		let late = timeout.with_timeout(|| {
			thread::sleep(Duration::from_millis(60));
			Ok(())
		});
		assert!(late.unwrap_err().is_timeout());

		let failed: Result<()> = timeout.with_timeout(|| {
			thread::sleep(Duration::from_millis(60));
			Err(Error::closed(OperationKind::Read))
		});
		let failed = failed.unwrap_err();
		assert_eq!(failed.kind(), ErrorKind::Timeout);
		assert_eq!(failed.operation(), OperationKind::Read);

		let early: Result<()> = timeout.with_timeout(|| Err(Error::closed(OperationKind::Read)));
		assert_eq!(early.unwrap_err().kind(), ErrorKind::Closed);
	}
}
