// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use crate::{Buffer, Result};
use crate::error::{OperationKind::BufRead, ResultContext};
use crate::pool::Pool;
use crate::streams::{BufSource, BufStream, Sink, Source, Stream};

impl<P: Pool> Stream for Buffer<P> {
	/// Clears the buffer, recycling its segments.
	fn close(&mut self) -> Result {
		self.clear();
		Ok(())
	}
}

impl<P: Pool> Source for Buffer<P> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if count == 0 || self.is_empty() {
			return Ok(0)
		}

		let count = min(count, self.size());
		sink.write_from(self, count).context(BufRead)?;
		Ok(count)
	}
}

impl<P: Pool> BufStream for Buffer<P> {
	type Pool = P;

	fn buf(&self) -> &Buffer<P> { self }
	fn buf_mut(&mut self) -> &mut Buffer<P> { self }
}

impl<P: Pool> BufSource for Buffer<P> {
	/// Returns whether the buffer already holds `count` bytes. A buffer has no
	/// underlying source to fill from.
	fn request(&mut self, count: usize) -> Result<bool> {
		Ok(self.size() >= count)
	}

	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		let count = self.size();
		if count > 0 {
			sink.write(self, count)?;
		}
		Ok(count)
	}
}

/// Decodes bytes as UTF-8, replacing invalid sequences with `U+FFFD`.
pub(crate) fn decode_utf8(bytes: Vec<u8>) -> String {
	if simdutf8::basic::from_utf8(&bytes).is_ok() {
		// Safety: validated above.
		unsafe { String::from_utf8_unchecked(bytes) }
	} else {
		String::from_utf8_lossy(&bytes).into_owned()
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::DefaultBuffer;
	use crate::streams::{BufSource, Source};
	use super::decode_utf8;

	#[test]
	fn read_is_bounded_by_size() {
		let mut source = DefaultBuffer::from_slice(b"abc");
		let mut sink = DefaultBuffer::default();
		assert_eq!(source.read(&mut sink, 0).unwrap(), 0);
		assert_eq!(source.read(&mut sink, 10).unwrap(), 3);
		assert_eq!(source.read(&mut sink, 10).unwrap(), 0);
		assert_eq!(sink, &b"abc"[..]);
	}

	#[test]
	fn typed_reads() {
		let mut buf = DefaultBuffer::from_slice(&[0x12, 0x34, 0x56, 0x78, 0xFF, b'h', b'i']);
		assert_eq!(buf.read_int::<u16>().unwrap(), 0x1234);
		assert_eq!(buf.read_int_le::<u16>().unwrap(), 0x7856);
		assert_eq!(buf.read_u8().unwrap(), 0xFF);
		assert_eq!(buf.read_utf8_to_end().unwrap(), "hi");
		assert!(buf.exhausted().unwrap());
		assert!(buf.read_u8().unwrap_err().is_eos());
	}

	#[test]
	fn invalid_utf8_is_replaced() {
		assert_eq!(decode_utf8(vec![b'a', 0xFF, b'b']), "a\u{FFFD}b");
		assert_eq!(decode_utf8("ünïcödé".into()), "ünïcödé");
	}
}
