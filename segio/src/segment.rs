// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp::min;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use all_asserts::{assert_le, debug_assert_le};
use crate::pool::Pool;
use crate::SIZE;

pub(crate) type Block = [u8; SIZE];

pub(crate) fn alloc_block() -> Arc<Block> { Arc::new([0; SIZE]) }

/// A fixed-size buffer segment, a window `[pos, limit)` of readable bytes into
/// a block of [`SIZE`] bytes.
///
/// Blocks are copy-on-write: [`share`](Self::share) hands out another segment
/// reading the same block. While a block has more than one reader the segment is
/// *shared* and its memory is never written; writers [`unshare`](Self::unshare)
/// first, copying the readable bytes into a fresh block. Once every other
/// reader is gone the segment is exclusive again.
pub struct Segment {
	block: Arc<Block>,
	pos: usize,
	limit: usize,
}

impl Segment {
	/// Returns a new, empty segment with freshly allocated memory. Prefer
	/// claiming segments from a [`Pool`].
	pub fn new() -> Self { alloc_block().into() }

	/// Returns the position of the first readable byte.
	pub fn pos(&self) -> usize { self.pos }
	/// Returns the position one past the last readable byte.
	pub fn limit(&self) -> usize { self.limit }
	/// Returns the number of readable bytes.
	pub fn len(&self) -> usize { self.limit - self.pos }
	/// Returns the number of bytes that can be written after [`limit`], or `0`
	/// if the segment is shared.
	///
	/// [`limit`]: Self::limit
	pub fn spare(&self) -> usize {
		if self.is_shared() { 0 } else { SIZE - self.limit }
	}

	/// Returns `true` if the segment has no readable bytes.
	pub fn is_empty(&self) -> bool { self.pos == self.limit }
	/// Returns `true` if no bytes can be written after the limit.
	pub fn is_full(&self) -> bool { self.limit == SIZE }
	/// Returns `true` if the memory is shared with another segment.
	pub fn is_shared(&self) -> bool { Arc::strong_count(&self.block) > 1 }

	/// Returns a pointer to the start of the underlying block, identifying the
	/// memory the segment reads.
	pub fn as_ptr(&self) -> *const u8 { self.block.as_ptr() }

	/// Returns a slice of the readable bytes.
	pub fn data(&self) -> &[u8] { &self.block[self.pos..self.limit] }

	/// Returns a mutable slice of the writable bytes after the limit.
	///
	/// # Panics
	///
	/// Panics if the segment is shared.
	pub fn spare_mut(&mut self) -> &mut [u8] {
		let limit = self.limit;
		&mut self.block_mut()[limit..]
	}

	/// Returns a new segment reading the same memory, without copying.
	pub fn share(&self) -> Self {
		Self {
			block: Arc::clone(&self.block),
			pos: self.pos,
			limit: self.limit,
		}
	}

	/// Copies shared data into an exclusive segment claimed from `pool`. Has no
	/// effect on exclusive segments.
	pub fn unshare(&mut self, pool: &impl Pool) -> bool {
		if !self.is_shared() {
			return false
		}

		let mut owned = pool.take();
		owned.push_slice(self.data());
		// The old handle drops here, leaving the block to its other readers.
		*self = owned;
		true
	}

	/// Splits the first `count` readable bytes into a new segment, consuming them
	/// from this one. Memory is shared if `count` is at least `share_threshold`,
	/// otherwise the bytes are copied into a segment from `pool`.
	///
	/// # Panics
	///
	/// Panics if `count` is greater than the readable length.
	pub fn split(&mut self, count: usize, pool: &impl Pool, share_threshold: usize) -> Self {
		assert_le!(count, self.len());
		let prefix = if count >= share_threshold {
			tracing::trace!(count, "sharing segment prefix");
			let mut shared = self.share();
			shared.limit = shared.pos + count;
			shared
		} else {
			let mut copy = pool.take();
			copy.push_slice(&self.data()[..count]);
			copy
		};
		self.consume(count);
		prefix
	}

	/// Returns `true` if `count` more bytes fit in this segment, possibly after
	/// shifting its data to the start of the block.
	pub fn can_absorb(&self, count: usize) -> bool {
		!self.is_shared() && count <= SIZE - self.len()
	}

	/// Moves `count` bytes from this segment into `sink`, shifting the sink's
	/// data to the start of its block if there isn't room after its limit.
	///
	/// # Panics
	///
	/// Panics if `sink` is shared or can't absorb `count` bytes, or if `count`
	/// is greater than the readable length.
	pub fn move_into(&mut self, sink: &mut Segment, count: usize) {
		assert!(sink.can_absorb(count), "sink segment cannot absorb {count} bytes");
		assert_le!(count, self.len());

		if sink.limit + count > SIZE {
			sink.shift();
		}

		let limit = sink.limit;
		sink.block_mut()[limit..limit + count].copy_from_slice(&self.data()[..count]);
		sink.limit += count;
		self.consume(count);
	}

	/// Copies bytes from `data` into the writable space, returning the number of
	/// bytes written.
	pub fn push_slice(&mut self, data: &[u8]) -> usize {
		let count = min(self.spare(), data.len());
		if count > 0 {
			self.spare_mut()[..count].copy_from_slice(&data[..count]);
			self.grow(count);
		}
		count
	}

	/// Copies readable bytes into `dst`, consuming them and returning the number
	/// of bytes read.
	pub fn pop_into_slice(&mut self, dst: &mut [u8]) -> usize {
		let count = min(self.len(), dst.len());
		dst[..count].copy_from_slice(&self.data()[..count]);
		self.consume(count);
		count
	}

	/// Grows the readable window by `count` bytes after writing into
	/// [`spare_mut`](Self::spare_mut).
	pub fn grow(&mut self, count: usize) {
		assert_le!(self.limit + count, SIZE);
		self.limit += count;
	}

	/// Consumes `count` bytes after reading.
	pub fn consume(&mut self, count: usize) {
		debug_assert_le!(count, self.len());
		self.pos += count;
	}

	/// Truncates the readable window to at most `count` bytes.
	pub(crate) fn truncate(&mut self, count: usize) {
		self.limit = min(self.limit, self.pos + count);
	}

	/// Resets the window, leaving the memory as-is.
	pub fn clear(&mut self) {
		self.pos = 0;
		self.limit = 0;
	}

	/// Consumes the segment, returning its block if exclusively owned.
	pub(crate) fn into_block(mut self) -> Option<Arc<Block>> {
		Arc::get_mut(&mut self.block)?;
		Some(self.block)
	}

	/// Moves readable bytes to the start of the block.
	fn shift(&mut self) {
		let Self { pos, limit, .. } = *self;
		if pos == 0 { return }

		self.block_mut().copy_within(pos..limit, 0);
		self.pos = 0;
		self.limit = limit - pos;
	}

	fn block_mut(&mut self) -> &mut Block {
		Arc::get_mut(&mut self.block).expect("shared segment memory must not be written")
	}
}

impl Default for Segment {
	fn default() -> Self { Self::new() }
}

impl From<Arc<Block>> for Segment {
	fn from(block: Arc<Block>) -> Self {
		Self { block, pos: 0, limit: 0 }
	}
}

impl Debug for Segment {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Segment")
		 .field("pos", &self.pos)
		 .field("limit", &self.limit)
		 .field("shared", &self.is_shared())
		 .finish_non_exhaustive()
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use crate::pool::SegmentPool;
	use crate::SIZE;
	use super::Segment;

	fn filled(data: &[u8]) -> Segment {
		let mut seg = Segment::new();
		assert_eq!(seg.push_slice(data), data.len());
		seg
	}

	#[test]
	fn share_is_copy_on_write() {
		let pool = Arc::new(SegmentPool::default());
		let mut seg = filled(b"hello");
		let shared = seg.share();
		assert!(seg.is_shared());
		assert_eq!(seg.spare(), 0);

		assert!(seg.unshare(&pool));
		assert!(!seg.is_shared());
		assert!(!shared.is_shared());
		assert_ne!(seg.as_ptr(), shared.as_ptr());
		seg.push_slice(b" world");
		assert_eq!(seg.data(), b"hello world");
		assert_eq!(shared.data(), b"hello");
	}

	#[test]
	fn split_below_threshold_copies() {
		let pool = Arc::new(SegmentPool::default());
		let mut seg = filled(&[7; 100]);
		let prefix = seg.split(10, &pool, 1024);
		assert!(!prefix.is_shared());
		assert_eq!(prefix.len(), 10);
		assert_eq!(seg.len(), 90);
		assert_eq!(seg.pos(), 10);
	}

	#[test]
	fn split_above_threshold_shares() {
		let pool = Arc::new(SegmentPool::default());
		let mut seg = filled(&[1; 4096]);
		let prefix = seg.split(2048, &pool, 1024);
		assert!(prefix.is_shared());
		assert_eq!(prefix.as_ptr(), seg.as_ptr());
		assert_eq!(prefix.len(), 2048);
		assert_eq!(seg.len(), 2048);
	}

	#[test]
	fn move_into_shifts_sink() {
		let mut sink = filled(&[1; SIZE]);
		sink.consume(SIZE - 10);
		let mut source = filled(&[2; 100]);
		assert!(sink.can_absorb(100));
		source.move_into(&mut sink, 100);
		assert_eq!(sink.pos(), 0);
		assert_eq!(sink.len(), 110);
		assert_eq!(&sink.data()[..10], &[1; 10]);
		assert_eq!(&sink.data()[10..], &[2; 100][..]);
		assert!(source.is_empty());
	}

	#[test]
	fn shared_block_is_not_returned() {
		let seg = filled(b"abc");
		let shared = seg.share();
		assert!(seg.into_block().is_none());
		assert!(shared.into_block().is_some());
	}
}
