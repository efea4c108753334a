// SPDX-License-Identifier: Apache-2.0

use crate::{Buffer, Error, Result, SIZE};
use crate::error::ResultContext;
use crate::error::OperationKind::{self, Close, Flush, Read, Write};
use crate::pool::{DefaultPool, Pool};
use crate::streams::{close_quietly, BufSink, BufSource, BufStream, Sink, Source, Stream};
use crate::timeout::Timeout;

/// A [`Source`] reading through an internal [`Buffer`], filling it from the
/// wrapped source a segment at a time.
pub struct BufferedSource<S: Source, P: Pool = DefaultPool> {
	buffer: Buffer<P>,
	source: S,
	closed: bool,
}

impl<S: Source> BufferedSource<S> {
	pub fn new(source: S) -> Self {
		Self::with_buffer(source, Buffer::default())
	}
}

impl<S: Source, P: Pool> BufferedSource<S, P> {
	/// Wraps `source`, buffering into `buffer`. Any data already in the buffer is
	/// read first.
	pub fn with_buffer(source: S, buffer: Buffer<P>) -> Self {
		Self { buffer, source, closed: false }
	}

	pub fn get_ref(&self) -> &S { &self.source }

	pub fn get_mut(&mut self) -> &mut S { &mut self.source }

	/// Consumes the wrapper, returning the inner source. Buffered data is
	/// discarded.
	pub fn into_inner(self) -> S { self.source }

	fn check_open(&self, op: OperationKind) -> Result {
		if self.closed {
			Err(Error::closed(op))
		} else {
			Ok(())
		}
	}
}

impl<S: Source, P: Pool> Stream for BufferedSource<S, P> {
	fn close(&mut self) -> Result {
		if !self.closed {
			self.closed = true;
			self.buffer.clear();
			self.source.close().context(Close)?;
		}
		Ok(())
	}

	fn timeout(&self) -> Timeout { self.source.timeout() }
}

impl<S: Source, P: Pool> Source for BufferedSource<S, P> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		self.check_open(Read)?;
		if count == 0 { return Ok(0) }

		if self.buffer.is_empty() && self.source.read(&mut self.buffer, SIZE).context(Read)? == 0 {
			return Ok(0)
		}

		self.buffer.read(sink, count)
	}
}

impl<S: Source, P: Pool> BufStream for BufferedSource<S, P> {
	type Pool = P;

	fn buf(&self) -> &Buffer<P> { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer<P> { &mut self.buffer }
}

impl<S: Source, P: Pool> BufSource for BufferedSource<S, P> {
	fn request(&mut self, count: usize) -> Result<bool> {
		self.check_open(Read)?;

		let Self { source, buffer, .. } = self;
		while buffer.size() < count {
			if source.read(buffer, SIZE).context(Read)? == 0 {
				return Ok(false)
			}
		}
		Ok(true)
	}

	/// Emits complete segments to `sink` as they fill, then the remainder once
	/// the source is exhausted.
	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		self.check_open(Read)?;

		let mut total = 0;
		loop {
			let read = self.source.read(&mut self.buffer, SIZE).context(Read)?;
			let complete = self.buffer.complete_segment_byte_count();
			if complete > 0 {
				total += complete;
				sink.write(&mut self.buffer, complete)?;
			}
			if read == 0 { break }
		}

		let rest = self.buffer.size();
		if rest > 0 {
			total += rest;
			sink.write(&mut self.buffer, rest)?;
		}
		Ok(total)
	}
}

/// A [`Sink`] writing through an internal [`Buffer`], emitting complete
/// segments to the wrapped sink as they fill.
///
/// Buffered data is emitted on [`flush`](Sink::flush) and [`close`](Stream::close).
/// Dropping the sink closes it, logging any failure.
pub struct BufferedSink<S: Sink, P: Pool = DefaultPool> {
	buffer: Buffer<P>,
	sink: S,
	closed: bool,
}

impl<S: Sink> BufferedSink<S> {
	pub fn new(sink: S) -> Self {
		Self::with_buffer(sink, Buffer::default())
	}
}

impl<S: Sink, P: Pool> BufferedSink<S, P> {
	/// Wraps `sink`, buffering into `buffer`. Any data already in the buffer is
	/// written first.
	pub fn with_buffer(sink: S, buffer: Buffer<P>) -> Self {
		Self { buffer, sink, closed: false }
	}

	pub fn get_ref(&self) -> &S { &self.sink }

	pub fn get_mut(&mut self) -> &mut S { &mut self.sink }

	fn check_open(&self, op: OperationKind) -> Result {
		if self.closed {
			Err(Error::closed(op))
		} else {
			Ok(())
		}
	}
}

impl<S: Sink, P: Pool> Stream for BufferedSink<S, P> {
	/// Emits buffered data, then closes the inner sink. The sink is closed even if
	/// emitting fails; the first failure is returned.
	fn close(&mut self) -> Result {
		if self.closed { return Ok(()) }
		self.closed = true;

		let size = self.buffer.size();
		let emitted = if size > 0 {
			self.sink.write(&mut self.buffer, size).context(Close)
		} else {
			Ok(())
		};
		let closed = self.sink.close().context(Close);
		self.buffer.clear();
		emitted.and(closed)
	}

	fn timeout(&self) -> Timeout { self.sink.timeout() }
}

impl<S: Sink, P: Pool> Sink for BufferedSink<S, P> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		self.check_open(Write)?;
		self.buffer.write_from(source, count).context(Write)?;
		self.emit_complete_segments()
	}

	fn flush(&mut self) -> Result {
		self.check_open(Flush)?;
		self.emit()?;
		self.sink.flush().context(Flush)
	}
}

impl<S: Sink, P: Pool> BufStream for BufferedSink<S, P> {
	type Pool = P;

	fn buf(&self) -> &Buffer<P> { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer<P> { &mut self.buffer }
}

impl<S: Sink, P: Pool> BufSink for BufferedSink<S, P> {
	fn write_slice(&mut self, data: &[u8]) -> Result {
		self.check_open(Write)?;
		self.buffer.push_slice(data);
		self.emit_complete_segments()
	}

	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		self.check_open(Write)?;
		let mut total = 0;
		loop {
			let count = source.read(&mut self.buffer, SIZE)?;
			if count == 0 { break }
			total += count;
			self.emit_complete_segments()?;
		}
		Ok(total)
	}

	fn emit_complete_segments(&mut self) -> Result {
		self.check_open(Write)?;
		let count = self.buffer.complete_segment_byte_count();
		if count > 0 {
			self.sink.write(&mut self.buffer, count).context(Write)?;
		}
		Ok(())
	}

	fn emit(&mut self) -> Result {
		self.check_open(Write)?;
		let count = self.buffer.size();
		if count > 0 {
			self.sink.write(&mut self.buffer, count).context(Write)?;
		}
		Ok(())
	}
}

impl<S: Sink, P: Pool> Drop for BufferedSink<S, P> {
	fn drop(&mut self) {
		close_quietly(self)
	}
}
