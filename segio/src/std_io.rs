// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::{Read, Write};
use crate::{Buffer, Error, Result};
use crate::error::ResultContext;
use crate::error::OperationKind::{Close, Flush, Read as ReadOp, Write as WriteOp};
use crate::pool::Pool;
use crate::streams::{close_quietly, BufSink, BufSource, Sink, Source, Stream};
use crate::timeout::Timeout;

/// A [`Source`] reading from a wrapped [`Read`]er.
pub struct ReaderSource<R: Read> {
	reader: Option<R>,
	timeout: Timeout,
}

/// A [`Sink`] writing to a wrapped [`Write`]r.
pub struct WriterSink<W: Write> {
	writer: Option<W>,
	timeout: Timeout,
}

impl<R: Read> From<R> for ReaderSource<R> {
	fn from(reader: R) -> Self {
		Self {
			reader: Some(reader),
			timeout: Timeout::NONE,
		}
	}
}

impl<W: Write> From<W> for WriterSink<W> {
	fn from(writer: W) -> Self {
		Self {
			writer: Some(writer),
			timeout: Timeout::NONE,
		}
	}
}

impl<R: Read> ReaderSource<R> {
	/// Returns the timeout checked before each read.
	pub fn timeout_mut(&mut self) -> &mut Timeout { &mut self.timeout }

	/// Sets the timeout checked before each read.
	pub fn set_timeout(&mut self, timeout: Timeout) { self.timeout = timeout }

	/// Returns the inner reader, or `None` if the source is closed.
	pub fn get_mut(&mut self) -> Option<&mut R> { self.reader.as_mut() }

	/// Consumes the source, returning the inner reader, or `None` if the source
	/// was closed.
	pub fn into_inner(self) -> Option<R> { self.reader }
}

impl<W: Write> WriterSink<W> {
	/// Returns the timeout checked before each write.
	pub fn timeout_mut(&mut self) -> &mut Timeout { &mut self.timeout }

	/// Sets the timeout checked before each write.
	pub fn set_timeout(&mut self, timeout: Timeout) { self.timeout = timeout }

	/// Returns the inner writer, or `None` if the sink is closed.
	pub fn get_mut(&mut self) -> Option<&mut W> { self.writer.as_mut() }

	/// Consumes the sink, returning the inner writer, or `None` if the sink was
	/// closed.
	pub fn into_inner(self) -> Option<W> { self.writer }
}

impl<R: Read> Stream for ReaderSource<R> {
	/// Closes the underlying reader by letting it fall out of scope. Subsequent
	/// reads will fail.
	fn close(&mut self) -> Result {
		self.reader.take();
		Ok(())
	}

	fn timeout(&self) -> Timeout { self.timeout }
}

impl<R: Read> Source for ReaderSource<R> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if count == 0 { return Ok(0) }
		let reader = self.reader
						 .as_mut()
						 .ok_or_else(|| Error::closed(ReadOp))?;
		self.timeout.check().context(ReadOp)?;
		sink.read_from_reader(reader, count).context(ReadOp)
	}
}

impl<W: Write> Stream for WriterSink<W> {
	/// Flushes and closes the underlying writer by letting it fall out of scope.
	/// Subsequent writes will fail.
	fn close(&mut self) -> Result {
		match self.writer.take() {
			Some(mut writer) => writer.flush().context(Close),
			None => Ok(())
		}
	}

	fn timeout(&self) -> Timeout { self.timeout }
}

impl<W: Write> Sink for WriterSink<W> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		if count > source.size() {
			return Err(Error::out_of_range(WriteOp))
		}
		let writer = self.writer.as_mut().ok_or_else(|| Error::closed(WriteOp))?;
		self.timeout.check().context(WriteOp)?;
		source.write_to_writer(writer, count).map_err(|err| err.with_operation(WriteOp))
	}

	fn flush(&mut self) -> Result {
		self.writer
			.as_mut()
			.ok_or_else(|| Error::closed(Flush))?
			.flush()
			.context(Flush)
	}
}

/// A wrapper implementing the [`Read`] trait for a [`BufSource`].
pub struct SourceReader<S: BufSource>(S);

/// A wrapper implementing the [`Write`] trait for a [`BufSink`].
pub struct SinkWriter<S: BufSink>(S);

impl<S: BufSource> SourceReader<S> {
	pub fn new(source: S) -> Self { Self(source) }

	pub fn get_mut(&mut self) -> &mut S { &mut self.0 }
}

impl<S: BufSink> SinkWriter<S> {
	pub fn new(sink: S) -> Self { Self(sink) }

	pub fn get_mut(&mut self) -> &mut S { &mut self.0 }
}

pub trait IntoRead: BufSource + Sized {
	/// Wraps the source in a [`Read`] implementation.
	fn into_read(self) -> SourceReader<Self> { SourceReader(self) }
}

pub trait IntoWrite: BufSink + Sized {
	/// Wraps the sink in a [`Write`] implementation.
	fn into_write(self) -> SinkWriter<Self> { SinkWriter(self) }
}

impl<S: BufSource> IntoRead for S { }
impl<S: BufSink> IntoWrite for S { }

impl<S: BufSource> Read for SourceReader<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let Self(source) = self;
		Ok(source.read_slice(buf)?)
	}
}

impl<S: BufSource> Drop for SourceReader<S> {
	fn drop(&mut self) {
		close_quietly(&mut self.0)
	}
}

impl<S: BufSink> Write for SinkWriter<S> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let Self(sink) = self;
		sink.write_slice(buf)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		let Self(sink) = self;
		Ok(sink.flush()?)
	}
}

impl<S: BufSink> Drop for SinkWriter<S> {
	fn drop(&mut self) {
		close_quietly(&mut self.0)
	}
}
