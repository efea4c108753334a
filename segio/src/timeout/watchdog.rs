// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Options for a [`Watchdog`].
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct WatchdogOptions {
	pub idle_timeout: Duration,
	pub thread_name: &'static str,
}

impl Default for WatchdogOptions {
	fn default() -> Self { Self::new() }
}

impl WatchdogOptions {
	pub const fn new() -> Self {
		Self {
			idle_timeout: Duration::from_secs(60),
			thread_name: "segio watchdog",
		}
	}

	/// Returns how long the service thread waits with nothing to watch before
	/// stopping.
	#[inline]
	pub const fn idle_timeout(&self) -> Duration { self.idle_timeout }

	#[inline]
	pub const fn with_idle_timeout(mut self, value: Duration) -> Self {
		self.idle_timeout = value;
		self
	}

	/// Returns the name given to the service thread.
	#[inline]
	pub const fn thread_name(&self) -> &'static str { self.thread_name }

	#[inline]
	pub const fn with_thread_name(mut self, value: &'static str) -> Self {
		self.thread_name = value;
		self
	}
}

/// A callback run on the watchdog thread when a watched operation overruns its
/// deadline. Handlers usually close or shut down the resource the operation is
/// blocked on, and must not block for long.
pub trait TimeoutHandler: Send + Sync + 'static {
	fn timed_out(&self);
}

impl<F: Fn() + Send + Sync + 'static> TimeoutHandler for F {
	fn timed_out(&self) { self() }
}

type Key = (Instant, u64);

struct Node {
	handler: Arc<dyn TimeoutHandler>,
	fired: AtomicBool,
}

/// A scheduled node, returned to [`Watchdog::cancel`] on exit.
pub(crate) struct Watch {
	key: Key,
	node: Arc<Node>,
}

#[derive(Default)]
struct Queue {
	nodes: BTreeMap<Key, Arc<Node>>,
	next_seq: u64,
	running: bool,
}

struct Inner {
	queue: Mutex<Queue>,
	wake: Condvar,
	options: WatchdogOptions,
}

/// A deadline queue serviced by a single background thread, which runs the
/// handler of every node whose deadline passes before it's cancelled.
///
/// Nodes are ordered by deadline, nodes with equal deadlines in the order they
/// were scheduled. The thread is started when the first node is scheduled, and
/// stops once the queue has been empty for the idle timeout. Scheduling after it
/// stops starts a new thread.
///
/// Handles are cheap to clone, all clones service the same queue.
#[derive(Clone)]
pub struct Watchdog(Arc<Inner>);

static GLOBAL: Lazy<Watchdog> = Lazy::new(|| Watchdog::new(WatchdogOptions::default()));

impl Watchdog {
	/// Creates a new watchdog, independent of the process-wide one.
	pub fn new(options: WatchdogOptions) -> Self {
		Self(Arc::new(Inner {
			queue: Mutex::default(),
			wake: Condvar::new(),
			options,
		}))
	}

	/// Returns the process-wide watchdog.
	pub fn global() -> &'static Watchdog { &GLOBAL }

	/// Returns `true` if the service thread is running.
	pub fn is_running(&self) -> bool { self.0.queue.lock().running }

	/// Returns the number of nodes waiting for their deadline.
	pub fn pending(&self) -> usize { self.0.queue.lock().nodes.len() }

	/// Schedules `handler` to run at `at`, starting the service thread if needed.
	pub(crate) fn schedule(&self, at: Instant, handler: Arc<dyn TimeoutHandler>) -> io::Result<Watch> {
		let mut queue = self.0.queue.lock();
		let key = (at, queue.next_seq);
		queue.next_seq += 1;

		let node = Arc::new(Node { handler, fired: AtomicBool::new(false) });
		let first = queue.nodes.first_key_value().map_or(true, |(&head, _)| key < head);
		queue.nodes.insert(key, Arc::clone(&node));

		if !queue.running {
			let inner = Arc::clone(&self.0);
			let spawned = thread::Builder::new()
				.name(self.0.options.thread_name.into())
				.spawn(move || run(&inner));
			if let Err(error) = spawned {
				queue.nodes.remove(&key);
				return Err(error)
			}
			queue.running = true;
			tracing::debug!(name = self.0.options.thread_name, "watchdog started");
		} else if first {
			self.0.wake.notify_one();
		}

		Ok(Watch { key, node })
	}

	/// Cancels a scheduled node, returning `true` if its deadline had already
	/// passed.
	pub(crate) fn cancel(&self, Watch { key, node }: Watch) -> bool {
		let mut queue = self.0.queue.lock();
		queue.nodes.remove(&key).is_none() && node.fired.load(Ordering::Acquire)
	}
}

fn run(inner: &Inner) {
	let mut queue = inner.queue.lock();
	loop {
		let head = queue.nodes.first_key_value().map(|(&(at, _), _)| at);
		let Some(at) = head else {
			let idle_until = Instant::now() + inner.options.idle_timeout;
			let result = inner.wake.wait_until(&mut queue, idle_until);
			if result.timed_out() && queue.nodes.is_empty() {
				queue.running = false;
				tracing::debug!(name = inner.options.thread_name, "watchdog idle, stopping");
				return
			}
			continue
		};

		if at > Instant::now() {
			inner.wake.wait_until(&mut queue, at);
			continue
		}

		let Some((_, node)) = queue.nodes.pop_first() else { continue };
		node.fired.store(true, Ordering::Release);
		MutexGuard::unlocked(&mut queue, || fire(&node));
	}
}

fn fire(node: &Node) {
	tracing::debug!("timeout fired");
	if panic::catch_unwind(AssertUnwindSafe(|| node.handler.timed_out())).is_err() {
		tracing::warn!("timeout handler panicked");
	}
}
