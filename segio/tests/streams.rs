// SPDX-License-Identifier: Apache-2.0

use std::io::Cursor;
use pretty_assertions::assert_eq;
use segio::{DefaultBuffer, Error, ErrorKind, OperationKind, Result, SIZE};
use segio::streams::{
	blackhole,
	buffer_sink,
	buffer_source,
	close_all,
	close_quietly,
	BufSink,
	BufSource,
	ReaderSource,
	Sink,
	SinkExt,
	Source,
	SourceExt,
	Stream,
	WriterSink,
};

mod common;

#[derive(Default)]
struct FailingClose {
	attempts: usize,
}

impl Stream for FailingClose {
	fn close(&mut self) -> Result {
		self.attempts += 1;
		Err(Error::other(OperationKind::Close, "refused", None))
	}
}

#[test]
fn blackhole_consumes_any_size() {
	let mut sink = blackhole();
	for len in [0, 1, SIZE - 1, SIZE, SIZE + 1, 10 * SIZE] {
		let mut source = DefaultBuffer::from_slice(&common::data(len));
		sink.write(&mut source, len).unwrap();
		assert_eq!(source.size(), 0, "length {len}");
	}
}

#[test]
fn close_is_idempotent() -> Result {
	let mut reader = ReaderSource::from(Cursor::new(common::data(10)));
	reader.close()?;
	reader.close()?;

	let mut writer = WriterSink::from(Vec::new());
	writer.close()?;
	writer.close()?;

	let mut source = buffer_source(ReaderSource::from(&b"abc"[..]));
	source.close()?;
	source.close()?;

	let mut sink = buffer_sink(WriterSink::from(Vec::new()));
	sink.close()?;
	sink.close()?;

	let mut hole = blackhole();
	hole.close()?;
	hole.close()
}

#[test]
fn closed_streams_reject_io() {
	let mut source = ReaderSource::from(&b"abc"[..]).buffered();
	source.close().unwrap();
	assert_eq!(source.read_u8().unwrap_err().kind(), ErrorKind::Closed);

	let mut sink = WriterSink::from(Vec::new());
	sink.close().unwrap();
	let mut data = DefaultBuffer::from_slice(b"abc");
	assert_eq!(sink.write(&mut data, 3).unwrap_err().kind(), ErrorKind::Closed);
	assert_eq!(data.size(), 3);
}

#[test]
fn buffered_cursor_round_trip() -> Result {
	let data = common::data(3 * SIZE + 17);
	let mut sink = WriterSink::from(Cursor::new(Vec::new())).buffered();
	let mut input = ReaderSource::from(&data[..]);
	assert_eq!(sink.write_all(&mut input)?, data.len());
	sink.flush()?;

	let written = sink.get_mut().get_mut().map(|cursor| cursor.get_ref().clone());
	let written = written.unwrap_or_default();
	assert_eq!(written, data);

	let mut source = ReaderSource::from(Cursor::new(written)).buffered();
	assert_eq!(source.read_vec(SIZE)?, &data[..SIZE]);
	source.skip(SIZE)?;
	assert_eq!(source.read_u8()?, data[2 * SIZE]);
	let mut rest = DefaultBuffer::default();
	assert_eq!(source.read_all(&mut rest)?, SIZE + 16);
	assert_eq!(rest, &data[2 * SIZE + 1..]);
	assert!(source.exhausted()?);
	Ok(())
}

#[test]
fn reads_from_exhausted_source_return_zero() -> Result {
	let mut source = ReaderSource::from(&b""[..]);
	let mut sink = DefaultBuffer::default();
	assert_eq!(source.read(&mut sink, SIZE)?, 0);
	assert_eq!(source.read(&mut sink, SIZE)?, 0);
	Ok(())
}

#[test]
fn close_all_visits_every_stream() {
	let mut first = FailingClose::default();
	let mut buffer = DefaultBuffer::from_slice(b"data");
	let mut last = FailingClose::default();

	let error = close_all([
		&mut first as &mut dyn Stream,
		&mut buffer,
		&mut last,
	]).unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Other("refused"));
	assert_eq!(first.attempts, 1);
	assert!(buffer.is_empty());
	assert_eq!(last.attempts, 1);

	close_quietly(&mut first);
	assert_eq!(first.attempts, 2);
}
