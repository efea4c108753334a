// SPDX-License-Identifier: Apache-2.0

mod options;
mod read;
mod write;

pub use options::*;
pub(crate) use read::decode_utf8;

use std::cmp::min;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::io;
use std::io::{ErrorKind, Read, Write};
use std::ops::Deref;
use crate::error::{ResultContext, OperationKind::{BufCopy, BufRead, BufSkip, BufWrite}};
use crate::pool::{DefaultPool, Pool};
use crate::segment::Segment;
use crate::{Error, Result, SIZE};

const DEBUG_BYTES: usize = 64;

pub type DefaultBuffer = Buffer<DefaultPool>;

/// A FIFO byte queue backed by a ring of segments. Bytes are written to the
/// tail segment and read from the head segment, claiming segments from the
/// pool as the buffer fills and recycling them as it drains.
///
/// Moving data between buffers moves whole segments rather than copying them,
/// and [cloning](Clone) shares segment memory instead of copying it.
pub struct Buffer<P: Pool = DefaultPool> {
	segments: VecDeque<Segment>,
	size: usize,
	pool: P,
	share_threshold: usize,
}

impl<P: Pool> Default for Buffer<P> {
	fn default() -> Self { Self::new(P::get(), BufferOptions::default()) }
}

impl<P: Pool> From<BufferOptions> for Buffer<P> {
	fn from(options: BufferOptions) -> Self {
		Self::new(P::get(), options)
	}
}

impl Buffer {
	/// Creates a new "lean" buffer. See [`BufferOptions::lean`] for details.
	pub fn lean() -> Self { BufferOptions::lean().into() }

	/// Creates a new buffer containing a copy of `data`.
	pub fn from_slice(data: &[u8]) -> Self {
		let mut buf = Self::default();
		buf.push_slice(data);
		buf
	}
}

impl<P: Pool> Buffer<P> {
	/// Creates a new buffer.
	pub fn new(pool: P, BufferOptions { share_threshold }: BufferOptions) -> Self {
		Self {
			segments: VecDeque::new(),
			size: 0,
			pool,
			share_threshold,
		}
	}

	/// Creates a new buffer claiming segments from `pool`.
	pub fn with_pool(pool: P) -> Self {
		Self::new(pool, BufferOptions::default())
	}

	/// Returns the options used to create the buffer.
	pub fn options(&self) -> BufferOptions {
		BufferOptions { share_threshold: self.share_threshold }
	}

	/// Returns the pool segments are claimed from.
	pub fn pool(&self) -> &P { &self.pool }

	/// Returns the number of readable bytes in the buffer.
	pub fn size(&self) -> usize { self.size }
	/// Returns `true` if the buffer is empty.
	pub fn is_empty(&self) -> bool { self.size == 0 }
	/// Returns the number of segments in the buffer.
	pub fn segment_count(&self) -> usize { self.segments.len() }

	/// Returns the number of bytes in segments that won't be written to again,
	/// that is every byte except those in a writable tail.
	pub fn complete_segment_byte_count(&self) -> usize {
		match self.segments.back() {
			Some(tail) if tail.spare() > 0 => self.size - tail.len(),
			_ => self.size
		}
	}

	/// Iterates over the readable bytes of each segment, head to tail.
	pub fn slices(&self) -> impl Iterator<Item = &[u8]> + '_ {
		self.segments.iter().map(Segment::data)
	}

	/// Iterates over readable bytes.
	pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
		self.slices().flatten().copied()
	}

	/// Returns the tail segment with at least `min_capacity` bytes of writable
	/// space, claiming a new segment from the pool if the tail is full, shared,
	/// or missing. The buffer size is updated when the returned guard is dropped.
	///
	/// # Panics
	///
	/// Panics if `min_capacity` is zero or greater than the segment size.
	/// Callers needing more space loop, writing a segment at a time.
	pub fn writable_segment(&mut self, min_capacity: usize) -> WritableSegment<'_, P> {
		assert!(
			(1..=SIZE).contains(&min_capacity),
			"minimum capacity {min_capacity} must be within 1..={SIZE}"
		);

		let Self { segments, size, pool, .. } = self;
		if segments.back().map_or(true, |tail| tail.spare() < min_capacity) {
			segments.push_back(pool.take());
		}

		let start_len = segments.back().map_or(0, Segment::len);
		WritableSegment { segments, size, pool, start_len }
	}

	/// Writes a copy of `data` to the buffer.
	pub fn push_slice(&mut self, mut data: &[u8]) {
		while !data.is_empty() {
			let mut seg = self.writable_segment(1);
			let count = seg.push_slice(data);
			data = &data[count..];
		}
	}

	/// Reads bytes into `dst`, returning the number of bytes read.
	pub fn pop_slice(&mut self, dst: &mut [u8]) -> usize {
		let mut read = 0;
		while read < dst.len() {
			let Some(head) = self.segments.front_mut() else { break };
			read += head.pop_into_slice(&mut dst[read..]);
			if head.is_empty() {
				self.recycle_head();
			}
		}
		self.size -= read;
		read
	}

	/// Reads exactly enough bytes to fill `dst`, failing with an end-of-stream
	/// error and reading nothing if the buffer doesn't contain enough bytes.
	pub fn pop_exact(&mut self, dst: &mut [u8]) -> Result {
		if self.size < dst.len() {
			return Err(Error::eos(BufRead))
		}
		self.pop_slice(dst);
		Ok(())
	}

	/// Reads `count` bytes into a new vector.
	pub fn pop_vec(&mut self, count: usize) -> Result<Vec<u8>> {
		if self.size < count {
			return Err(Error::eos(BufRead))
		}
		let mut vec = vec![0; count];
		self.pop_slice(&mut vec);
		Ok(vec)
	}

	/// Discards `count` bytes from the head of the buffer.
	pub fn skip(&mut self, count: usize) -> Result {
		if count > self.size {
			return Err(Error::out_of_range(BufSkip))
		}

		let mut remaining = count;
		while remaining > 0 {
			let Some(head) = self.segments.front_mut() else { break };
			let n = min(remaining, head.len());
			head.consume(n);
			remaining -= n;
			self.size -= n;
			if head.is_empty() {
				self.recycle_head();
			}
		}
		Ok(())
	}

	/// Discards all bytes, recycling every segment.
	pub fn clear(&mut self) {
		let Self { segments, size, pool, .. } = self;
		*size = 0;
		pool.recycle_all(segments.drain(..));
	}

	/// Returns the byte at `index`, or `None` if out of bounds.
	pub fn get(&self, mut index: usize) -> Option<u8> {
		if index >= self.size { return None }

		for seg in &self.segments {
			if index < seg.len() {
				return Some(seg.data()[index])
			}
			index -= seg.len();
		}
		None
	}

	/// Returns the index of the first occurrence of `byte`.
	pub fn index_of(&self, byte: u8) -> Option<usize> {
		let mut offset = 0;
		for data in self.slices() {
			if let Some(pos) = data.iter().position(|&b| b == byte) {
				return Some(offset + pos)
			}
			offset += data.len();
		}
		None
	}

	/// Moves `count` bytes from `source` to the end of this buffer. Whole segments
	/// are moved without copying; a partial head segment is either copied into
	/// the tail, if it fits, or split off.
	pub fn write_from(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.size {
			return Err(Error::out_of_range(BufWrite))
		}

		let mut remaining = count;
		while remaining > 0 {
			let Some(head) = source.segments.front_mut() else { break };

			if remaining < head.len() {
				if let Some(tail) = self.segments.back_mut() {
					if tail.can_absorb(remaining) {
						head.move_into(tail, remaining);
						source.size -= remaining;
						self.size += remaining;
						return Ok(())
					}
				}

				// Split off the head so only whole segments are moved.
				let prefix = head.split(remaining, &self.pool, self.share_threshold);
				source.segments.push_front(prefix);
			}

			let Some(seg) = source.segments.pop_front() else { break };
			let len = seg.len();
			source.size -= len;
			self.size += len;
			remaining -= len;
			self.push_compacted(seg);
		}
		Ok(())
	}

	/// Shares `count` bytes starting at `offset` into `out` without consuming them.
	pub fn copy_to(&self, out: &mut Buffer<impl Pool>, offset: usize, count: usize) -> Result {
		if offset.checked_add(count).map_or(true, |end| end > self.size) {
			return Err(Error::out_of_range(BufCopy))
		}

		let mut offset = offset;
		let mut remaining = count;
		for seg in &self.segments {
			if remaining == 0 { break }
			if offset >= seg.len() {
				offset -= seg.len();
				continue
			}

			let mut shared = seg.share();
			shared.consume(offset);
			shared.truncate(remaining);
			offset = 0;

			let len = shared.len();
			remaining -= len;
			out.size += len;
			out.segments.push_back(shared);
		}
		Ok(())
	}

	/// Reads at most `count` bytes from `reader` into the tail segment with a
	/// single read call, returning the number of bytes read.
	pub fn read_from_reader(&mut self, reader: &mut impl Read, count: usize) -> io::Result<usize> {
		if count == 0 { return Ok(0) }

		let mut seg = self.writable_segment(1);
		let max = min(count, seg.spare());
		loop {
			match reader.read(&mut seg.spare_mut()[..max]) {
				Ok(n) => {
					seg.grow(n);
					return Ok(n)
				}
				Err(err) if err.kind() == ErrorKind::Interrupted => continue,
				Err(err) => return Err(err)
			}
		}
	}

	/// Writes exactly `count` bytes from the head of the buffer into `writer`.
	pub fn write_to_writer(&mut self, writer: &mut impl Write, count: usize) -> Result {
		if count > self.size {
			return Err(Error::out_of_range(BufRead))
		}

		let mut remaining = count;
		while remaining > 0 {
			let Some(head) = self.segments.front_mut() else { break };
			let n = min(remaining, head.len());
			writer.write_all(&head.data()[..n]).context(BufRead)?;
			head.consume(n);
			remaining -= n;
			self.size -= n;
			if head.is_empty() {
				self.recycle_head();
			}
		}
		Ok(())
	}

	/// Pushes a segment to the tail, compacting it into the current tail if its
	/// data fits there.
	fn push_compacted(&mut self, mut seg: Segment) {
		if let Some(tail) = self.segments.back_mut() {
			let len = seg.len();
			if tail.can_absorb(len) {
				seg.move_into(tail, len);
				self.pool.recycle(seg);
				return
			}
		}
		self.segments.push_back(seg);
	}

	fn recycle_head(&mut self) {
		if let Some(seg) = self.segments.pop_front() {
			self.pool.recycle(seg);
		}
	}
}

impl<P: Pool> Clone for Buffer<P> {
	/// Clones the buffer, sharing its segments rather than copying.
	fn clone(&self) -> Self {
		Self {
			segments: self.segments.iter().map(Segment::share).collect(),
			size: self.size,
			pool: self.pool.clone(),
			share_threshold: self.share_threshold,
		}
	}
}

impl<P: Pool> Drop for Buffer<P> {
	fn drop(&mut self) {
		self.clear();
	}
}

impl<P: Pool> Debug for Buffer<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let head: Vec<u8> = self.bytes().take(DEBUG_BYTES).collect();
		let hex = base16ct::lower::encode_string(&head);
		if self.size > DEBUG_BYTES {
			write!(f, "Buffer[size={} hex={hex}…]", self.size)
		} else {
			write!(f, "Buffer[size={} hex={hex}]", self.size)
		}
	}
}

impl<P: Pool, Q: Pool> PartialEq<Buffer<Q>> for Buffer<P> {
	fn eq(&self, other: &Buffer<Q>) -> bool {
		self.size == other.size &&
		itertools::equal(self.bytes(), other.bytes())
	}
}

impl<P: Pool> PartialEq<[u8]> for Buffer<P> {
	fn eq(&self, other: &[u8]) -> bool {
		self.size == other.len() &&
		itertools::equal(self.bytes(), other.iter().copied())
	}
}

impl<P: Pool> PartialEq<&[u8]> for Buffer<P> {
	fn eq(&self, other: &&[u8]) -> bool { self == *other }
}

impl<P: Pool> PartialEq<Vec<u8>> for Buffer<P> {
	fn eq(&self, other: &Vec<u8>) -> bool { self == other.as_slice() }
}

/// A drop guard over a buffer's tail segment returned from
/// [`Buffer::writable_segment`]. Bytes written into it are added to the buffer's
/// size when dropped; an untouched, newly claimed segment is recycled.
pub struct WritableSegment<'b, P: Pool> {
	segments: &'b mut VecDeque<Segment>,
	size: &'b mut usize,
	pool: &'b P,
	start_len: usize,
}

impl<P: Pool> WritableSegment<'_, P> {
	/// Returns a mutable slice of the writable space after the tail's limit.
	pub fn spare_mut(&mut self) -> &mut [u8] { self.tail_mut().spare_mut() }

	/// Grows the tail by `count` bytes written into [`spare_mut`](Self::spare_mut).
	pub fn grow(&mut self, count: usize) { self.tail_mut().grow(count) }

	/// Copies bytes from `data` into the tail, returning the number written.
	pub fn push_slice(&mut self, data: &[u8]) -> usize { self.tail_mut().push_slice(data) }

	fn tail_mut(&mut self) -> &mut Segment {
		self.segments.back_mut().expect("writable segment should be present")
	}
}

impl<P: Pool> Deref for WritableSegment<'_, P> {
	type Target = Segment;

	fn deref(&self) -> &Segment {
		self.segments.back().expect("writable segment should be present")
	}
}

impl<P: Pool> Drop for WritableSegment<'_, P> {
	fn drop(&mut self) {
		let Some(tail) = self.segments.back() else { return };
		*self.size = *self.size + tail.len() - self.start_len;

		if tail.is_empty() {
			if let Some(seg) = self.segments.pop_back() {
				self.pool.recycle(seg);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;
	use quickcheck::Arbitrary;
	use quickcheck_macros::quickcheck;
	use crate::pool::{Pool, SegmentPool};
	use crate::{BufferOptions, ErrorKind, SIZE};
	use super::{Buffer, DefaultBuffer};

	type TestBuffer = Buffer<Arc<SegmentPool>>;

	fn assert_size_invariant<P: Pool>(buf: &Buffer<P>) {
		let sum: usize = buf.segments.iter().map(|seg| seg.len()).sum();
		assert_eq!(buf.size, sum, "size diverged from segment lengths");
		assert!(buf.segments.iter().all(|seg| !seg.is_empty()), "buffer holds an empty segment");
		assert_eq!(buf.segments.is_empty(), buf.size == 0);
	}

	#[derive(Copy, Clone, Debug)]
	enum Op {
		Write(u16),
		Read(u16),
		Skip(u16),
		Move(u16),
	}

	impl Arbitrary for Op {
		fn arbitrary(g: &mut quickcheck::Gen) -> Self {
			let n = u16::arbitrary(g) % (3 * SIZE as u16);
			match u8::arbitrary(g) % 4 {
				0 => Op::Write(n),
				1 => Op::Read(n),
				2 => Op::Skip(n),
				_ => Op::Move(n),
			}
		}
	}

	#[quickcheck]
	fn size_invariant(ops: Vec<Op>) {
		let pool = Arc::new(SegmentPool::default());
		let mut buf = TestBuffer::with_pool(pool.clone());
		let mut other = TestBuffer::with_pool(pool);
		let mut model: Vec<u8> = Vec::new();
		let mut next = 0u8;

		for op in ops {
			match op {
				Op::Write(n) => {
					let data: Vec<u8> = (0..n).map(|_| { next = next.wrapping_add(1); next }).collect();
					buf.push_slice(&data);
					model.extend_from_slice(&data);
				}
				Op::Read(n) => {
					let mut dst = vec![0; n as usize];
					let read = buf.pop_slice(&mut dst);
					assert_eq!(&dst[..read], &model[..read]);
					model.drain(..read);
				}
				Op::Skip(n) => {
					let n = (n as usize).min(buf.size());
					buf.skip(n).unwrap();
					model.drain(..n);
				}
				Op::Move(n) => {
					let n = (n as usize).min(buf.size());
					other.write_from(&mut buf, n).unwrap();
					assert_size_invariant(&other);
					buf.write_from(&mut other, n).unwrap();
					model.rotate_left(n);
				}
			}
			assert_size_invariant(&buf);
			assert!(buf == model);
		}
	}

	#[test]
	fn skip_past_end_is_out_of_range() {
		let mut buf = Buffer::from_slice(b"abc");
		assert_eq!(buf.skip(4).unwrap_err().kind(), ErrorKind::OutOfRange);
		buf.skip(3).unwrap();
		assert!(buf.is_empty());
	}

	#[test]
	fn unused_writable_segment_is_recycled() {
		let pool = Arc::new(SegmentPool::default());
		let mut buf = TestBuffer::with_pool(pool.clone());
		drop(buf.writable_segment(1));
		assert_eq!(buf.segment_count(), 0);
		assert_eq!(pool.byte_count(), SIZE);
	}

	#[test]
	#[should_panic]
	fn writable_segment_rejects_oversized_request() {
		let mut buf = DefaultBuffer::default();
		let _ = buf.writable_segment(SIZE + 1);
	}

	#[test]
	fn whole_segments_move_without_copying() {
		let mut source = Buffer::from_slice(&[3; SIZE * 2]);
		let ptr = source.segments[0].as_ptr();
		let mut sink = DefaultBuffer::default();
		sink.write_from(&mut source, SIZE).unwrap();
		assert_eq!(sink.segments[0].as_ptr(), ptr);
		assert_eq!(source.size(), SIZE);
	}

	#[test]
	fn large_partial_moves_share() {
		let mut source = Buffer::from_slice(&[5; 4000]);
		let ptr = source.segments[0].as_ptr();
		let mut sink = DefaultBuffer::default();
		sink.write_from(&mut source, 2000).unwrap();
		assert_eq!(sink.segments[0].as_ptr(), ptr);
		assert!(sink.segments[0].is_shared());
		assert_size_invariant(&sink);
		assert_size_invariant(&source);
	}

	#[test]
	fn lean_partial_moves_copy() {
		let mut source = Buffer::from_slice(&[5; 4000]);
		let ptr = source.segments[0].as_ptr();
		let mut sink = Buffer::new(crate::pool::DefaultPool, BufferOptions::lean());
		sink.write_from(&mut source, 2000).unwrap();
		assert_ne!(sink.segments[0].as_ptr(), ptr);
		assert!(!sink.segments[0].is_shared());
	}

	#[test]
	fn small_segments_compact() {
		let mut sink = Buffer::from_slice(b"head");
		for _ in 0..10 {
			let mut source = Buffer::from_slice(b"-chunk");
			sink.write_from(&mut source, 6).unwrap();
		}
		assert_eq!(sink.segment_count(), 1);
		assert_eq!(sink.size(), 4 + 60);
	}

	#[test]
	fn shared_segments_are_not_mutated() {
		let mut buf = Buffer::from_slice(b"shared");
		let copy = buf.clone();
		buf.push_slice(b" and appended");
		assert!(copy == b"shared".as_slice());
		assert!(buf == b"shared and appended".as_slice());
		assert_eq!(buf.segment_count(), 2);
	}

	#[test]
	fn copy_to_range() {
		let mut data = vec![0u8; SIZE + 100];
		data.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
		let buf = Buffer::from_slice(&data);
		let mut out = DefaultBuffer::default();
		buf.copy_to(&mut out, SIZE - 10, 20).unwrap();
		assert!(out == &data[SIZE - 10..SIZE + 10]);
		assert_eq!(buf.size(), data.len());
		assert_eq!(buf.copy_to(&mut out, SIZE, 101).unwrap_err().kind(), ErrorKind::OutOfRange);
	}

	#[test]
	fn get_and_index_of() {
		let mut buf = Buffer::from_slice(&[0; SIZE]);
		buf.push_slice(b"xyz");
		assert_eq!(buf.get(SIZE + 1), Some(b'y'));
		assert_eq!(buf.get(SIZE + 3), None);
		assert_eq!(buf.index_of(b'z'), Some(SIZE + 2));
		assert_eq!(buf.index_of(b'q'), None);
	}

	#[test]
	fn debug_prints_hex() {
		let buf = Buffer::from_slice(b"\x01\xff");
		assert_eq!(format!("{buf:?}"), "Buffer[size=2 hex=01ff]");
	}
}
