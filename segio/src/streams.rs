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

mod file;
mod socket;
mod void;

pub use file::*;
pub use socket::*;
pub use void::*;
pub use crate::buffered_wrappers::{BufferedSink, BufferedSource};
pub use crate::std_io::{IntoRead, IntoWrite, ReaderSource, SinkWriter, SourceReader, WriterSink};

use num_traits::PrimInt;
use bytemuck::{Pod, Zeroable};
use crate::{Buffer, Result, SIZE};
use crate::buffer::decode_utf8;
use crate::error::{Error, OperationKind::BufRead};
use crate::pool::Pool;
use crate::timeout::Timeout;

/// A data stream, either [`Source`] or [`Sink`].
pub trait Stream {
	/// Closes the stream, releasing its resources. Closing is idempotent,
	/// [`close`](Self::close) may be called more than once with no effect.
	fn close(&mut self) -> Result { Ok(()) }

	/// Returns the timeout applied to operations on this stream.
	fn timeout(&self) -> Timeout { Timeout::NONE }
}

/// A data source.
pub trait Source: Stream {
	/// Reads up to `count` bytes from the source into the buffer, returning the
	/// number of bytes read. Returns `0` when `count` is zero or the end of the
	/// stream has been reached.
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize>;
}

/// A data sink.
pub trait Sink: Stream {
	/// Writes exactly `count` bytes from the buffer into the sink, failing if the
	/// buffer holds fewer.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result;

	/// Writes all buffered data to its final target.
	fn flush(&mut self) -> Result { Ok(()) }
}

impl<S: Stream + ?Sized> Stream for &mut S {
	fn close(&mut self) -> Result { (**self).close() }

	fn timeout(&self) -> Timeout { (**self).timeout() }
}

impl<S: Source + ?Sized> Source for &mut S {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		(**self).read(sink, count)
	}
}

impl<S: Sink + ?Sized> Sink for &mut S {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		(**self).write(source, count)
	}

	fn flush(&mut self) -> Result { (**self).flush() }
}

/// Wraps `source` in a [`BufferedSource`].
pub fn buffer_source<S: Source>(source: S) -> BufferedSource<S> {
	BufferedSource::new(source)
}

/// Wraps `sink` in a [`BufferedSink`].
pub fn buffer_sink<S: Sink>(sink: S) -> BufferedSink<S> {
	BufferedSink::new(sink)
}

pub trait SourceExt: Source + Sized {
	/// Wraps the source in a buffered source.
	fn buffered(self) -> BufferedSource<Self> { buffer_source(self) }

	/// Wraps the source in a buffered source claiming segments from `pool`.
	fn buffered_with<P: Pool>(self, buffer: Buffer<P>) -> BufferedSource<Self, P> {
		BufferedSource::with_buffer(self, buffer)
	}
}

impl<S: Source> SourceExt for S { }

pub trait SinkExt: Sink + Sized {
	/// Wraps the sink in a buffered sink.
	fn buffered(self) -> BufferedSink<Self> { buffer_sink(self) }

	/// Wraps the sink in a buffered sink claiming segments from `pool`.
	fn buffered_with<P: Pool>(self, buffer: Buffer<P>) -> BufferedSink<Self, P> {
		BufferedSink::with_buffer(self, buffer)
	}
}

impl<S: Sink> SinkExt for S { }

/// A stream with an internal [`Buffer`].
pub trait BufStream {
	type Pool: Pool;

	fn buf(&self) -> &Buffer<Self::Pool>;
	fn buf_mut(&mut self) -> &mut Buffer<Self::Pool>;
}

/// A buffered [`Source`], reading typed data from its buffer and filling it from
/// the underlying source as needed.
pub trait BufSource: BufStream + Source {
	/// Fills the buffer until it contains at least `count` bytes, returning
	/// `false` if the source was exhausted first.
	fn request(&mut self, count: usize) -> Result<bool>;

	/// Fills the buffer until it contains at least `count` bytes, failing with an
	/// end-of-stream error if the source was exhausted first.
	fn require(&mut self, count: usize) -> Result {
		if self.request(count)? {
			Ok(())
		} else {
			Err(Error::eos(BufRead))
		}
	}

	/// Returns `true` if no more bytes can be read.
	fn exhausted(&mut self) -> Result<bool> {
		Ok(!self.request(1)?)
	}

	fn read_u8(&mut self) -> Result<u8> {
		let mut byte = [0];
		self.read_exact(&mut byte)?;
		Ok(byte[0])
	}

	/// Reads a big-endian integer.
	fn read_int<T: PrimInt + Pod>(&mut self) -> Result<T> {
		let mut value = <T as Zeroable>::zeroed();
		self.read_exact(bytemuck::bytes_of_mut(&mut value))?;
		Ok(T::from_be(value))
	}

	/// Reads a little-endian integer.
	fn read_int_le<T: PrimInt + Pod>(&mut self) -> Result<T> {
		let mut value = <T as Zeroable>::zeroed();
		self.read_exact(bytemuck::bytes_of_mut(&mut value))?;
		Ok(T::from_le(value))
	}

	/// Reads into `dst` from whatever is buffered, filling the buffer first if
	/// empty. Returns the number of bytes read, `0` at the end of the stream.
	fn read_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		if dst.is_empty() || !self.request(1)? {
			return Ok(0)
		}
		Ok(self.buf_mut().pop_slice(dst))
	}

	/// Reads exactly enough bytes to fill `dst`.
	fn read_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		self.buf_mut().pop_exact(dst)
	}

	/// Reads `count` bytes into a new vector.
	fn read_vec(&mut self, count: usize) -> Result<Vec<u8>> {
		self.require(count)?;
		self.buf_mut().pop_vec(count)
	}

	/// Reads `count` bytes as UTF-8, replacing invalid sequences.
	fn read_utf8(&mut self, count: usize) -> Result<String> {
		Ok(decode_utf8(self.read_vec(count)?))
	}

	/// Reads all remaining bytes as UTF-8, replacing invalid sequences.
	fn read_utf8_to_end(&mut self) -> Result<String> {
		while self.request(self.buf().size() + 1)? { }
		let count = self.buf().size();
		self.read_utf8(count)
	}

	/// Skips `count` bytes, failing with an end-of-stream error if the source is
	/// exhausted first.
	fn skip(&mut self, mut count: usize) -> Result {
		while count > 0 {
			if !self.request(1)? {
				return Err(Error::eos(BufRead))
			}
			let n = count.min(self.buf().size());
			self.buf_mut().skip(n)?;
			count -= n;
		}
		Ok(())
	}

	/// Reads all bytes from the source into `sink`, returning the number of bytes
	/// read.
	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		let mut total = 0;
		while self.request(1)? {
			let count = self.buf().size();
			sink.write(self.buf_mut(), count)?;
			total += count;
		}
		Ok(total)
	}
}

/// A buffered [`Sink`], writing typed data to its buffer and emitting it to the
/// underlying sink as segments fill.
pub trait BufSink: BufStream + Sink {
	/// Writes complete segments to the underlying sink.
	fn emit_complete_segments(&mut self) -> Result;

	/// Writes all buffered data to the underlying sink, without flushing it.
	fn emit(&mut self) -> Result;

	fn write_slice(&mut self, data: &[u8]) -> Result {
		self.buf_mut().push_slice(data);
		self.emit_complete_segments()
	}

	fn write_u8(&mut self, value: u8) -> Result {
		self.write_slice(&[value])
	}

	/// Writes a big-endian integer.
	fn write_int<T: PrimInt + Pod>(&mut self, value: T) -> Result {
		self.write_slice(bytemuck::bytes_of(&value.to_be()))
	}

	/// Writes a little-endian integer.
	fn write_int_le<T: PrimInt + Pod>(&mut self, value: T) -> Result {
		self.write_slice(bytemuck::bytes_of(&value.to_le()))
	}

	fn write_utf8(&mut self, value: &str) -> Result {
		self.write_slice(value.as_bytes())
	}

	/// Writes all bytes from `source`, returning the number of bytes written.
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		let mut total = 0;
		loop {
			let count = source.read(self.buf_mut(), SIZE)?;
			if count == 0 { break }
			total += count;
			self.emit_complete_segments()?;
		}
		Ok(total)
	}
}

/// Closes `stream`, logging rather than returning any failure.
pub fn close_quietly(stream: &mut (impl Stream + ?Sized)) {
	if let Err(error) = stream.close() {
		tracing::warn!(%error, "failed to close stream");
	}
}

/// Closes every stream, even if some fail to close. Returns the first failure.
pub fn close_all<'a>(streams: impl IntoIterator<Item = &'a mut dyn Stream>) -> Result {
	let mut first = None;
	for stream in streams {
		if let Err(error) = stream.close() {
			tracing::warn!(%error, "failed to close stream");
			first.get_or_insert(error);
		}
	}
	first.map_or(Ok(()), Err)
}
