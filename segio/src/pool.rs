// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use crate::segment::{Block, Segment};
use crate::SIZE;

/// The default maximum number of bytes kept by a pool: eight segments.
pub const DEFAULT_POOL_BYTES: usize = 64 * 1024;

/// Options for a [`SegmentPool`].
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct PoolOptions {
	pub max_bytes: usize,
}

impl Default for PoolOptions {
	fn default() -> Self { Self::new() }
}

impl PoolOptions {
	/// Creates a new set of pool options.
	pub const fn new() -> Self {
		Self { max_bytes: DEFAULT_POOL_BYTES }
	}

	/// Returns the maximum number of bytes kept in the pool.
	#[inline]
	pub const fn max_bytes(&self) -> usize { self.max_bytes }

	/// Sets the maximum number of bytes kept in the pool. Segments recycled past
	/// this cap are dropped.
	#[inline]
	pub const fn with_max_bytes(mut self, value: usize) -> Self {
		self.max_bytes = value;
		self
	}
}

/// A capped free list of segment memory, shared between buffers on any thread.
#[derive(Debug, Default)]
pub struct SegmentPool {
	blocks: Mutex<Vec<Arc<Block>>>,
	options: PoolOptions,
}

static GLOBAL: Lazy<SegmentPool> = Lazy::new(SegmentPool::default);

impl SegmentPool {
	/// Creates a new, empty pool.
	pub fn new(options: PoolOptions) -> Self {
		Self { blocks: Mutex::default(), options }
	}

	/// Returns the process-wide pool.
	pub fn global() -> &'static SegmentPool { &GLOBAL }

	/// Returns the number of bytes of free memory held by the pool.
	pub fn byte_count(&self) -> usize { self.blocks.lock().len() * SIZE }

	/// Claims an empty segment, recycling pooled memory if any is free.
	pub fn take(&self) -> Segment {
		let block = self.blocks.lock().pop();
		block.map_or_else(Segment::new, Segment::from)
	}

	/// Returns a segment to the pool. Shared segments are dropped, as their
	/// memory is still being read elsewhere; so are segments past the pool cap.
	pub fn recycle(&self, segment: Segment) {
		let Some(block) = segment.into_block() else { return };
		let mut blocks = self.blocks.lock();
		self.push(&mut blocks, block);
	}

	/// Returns many segments to the pool under a single lock.
	pub fn recycle_all(&self, segments: impl IntoIterator<Item = Segment>) {
		let mut blocks = self.blocks.lock();
		for block in segments.into_iter().filter_map(Segment::into_block) {
			self.push(&mut blocks, block);
		}
	}

	/// Drops all free memory held by the pool.
	pub fn shed(&self) {
		self.blocks.lock().clear();
	}

	fn push(&self, blocks: &mut Vec<Arc<Block>>, block: Arc<Block>) {
		if (blocks.len() + 1) * SIZE > self.options.max_bytes {
			tracing::trace!(max_bytes = self.options.max_bytes, "segment pool full, dropping segment");
			return
		}
		blocks.push(block);
	}
}

/// A source of segments for buffers to claim from and recycle to.
pub trait Pool: Clone {
	/// Gets a default instance of the pool.
	fn get() -> Self;

	/// Claims an empty segment.
	fn take(&self) -> Segment;

	/// Collects a segment back into the pool.
	fn recycle(&self, segment: Segment);

	/// Collects many segments back into the pool.
	fn recycle_all(&self, segments: impl IntoIterator<Item = Segment>) {
		for seg in segments {
			self.recycle(seg)
		}
	}
}

/// A handle to the process-wide [`SegmentPool`].
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultPool;

impl Pool for DefaultPool {
	fn get() -> Self { Self }

	fn take(&self) -> Segment { SegmentPool::global().take() }

	fn recycle(&self, segment: Segment) {
		SegmentPool::global().recycle(segment)
	}

	fn recycle_all(&self, segments: impl IntoIterator<Item = Segment>) {
		SegmentPool::global().recycle_all(segments)
	}
}

impl Pool for Arc<SegmentPool> {
	/// Creates a new, independent pool.
	fn get() -> Self { Self::default() }

	fn take(&self) -> Segment { SegmentPool::take(self) }

	fn recycle(&self, segment: Segment) {
		SegmentPool::recycle(self, segment)
	}

	fn recycle_all(&self, segments: impl IntoIterator<Item = Segment>) {
		SegmentPool::recycle_all(self, segments)
	}
}
