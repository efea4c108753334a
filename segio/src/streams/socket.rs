// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Weak};
use crate::timeout::{AsyncTimeout, TimeoutHandler, TimeoutSink, TimeoutSource};
use super::{ReaderSource, WriterSink};

/// A [`Source`](super::Source) reading from a TCP socket, shut down if a read
/// overruns its timeout.
pub type SocketSource = TimeoutSource<ReaderSource<SocketStream>>;

/// A [`Sink`](super::Sink) writing to a TCP socket, shut down if a write
/// overruns its timeout.
pub type SocketSink = TimeoutSink<WriterSink<SocketStream>>;

/// A TCP stream shared with the timeout handler shutting it down.
pub struct SocketStream(Arc<TcpStream>);

impl SocketStream {
	pub fn get_ref(&self) -> &TcpStream { &self.0 }
}

impl Read for SocketStream {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { (&*self.0).read(buf) }
}

impl Write for SocketStream {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> { (&*self.0).write(buf) }

	fn flush(&mut self) -> io::Result<()> { (&*self.0).flush() }
}

/// Shuts both halves of the socket down, unblocking any pending read or write.
struct ShutdownOnTimeout(Weak<TcpStream>);

impl TimeoutHandler for ShutdownOnTimeout {
	fn timed_out(&self) {
		let Some(stream) = self.0.upgrade() else { return };
		if let Err(error) = stream.shutdown(Shutdown::Both) {
			tracing::warn!(%error, "failed to shut down timed out socket");
		}
	}
}

fn guarded(stream: TcpStream) -> (SocketStream, AsyncTimeout) {
	let stream = Arc::new(stream);
	let timeout = AsyncTimeout::new(ShutdownOnTimeout(Arc::downgrade(&stream)));
	(SocketStream(stream), timeout)
}

/// Returns a source reading from `stream`. Set a timeout with
/// [`timeout_mut`](TimeoutSource::timeout_mut) to bound each read.
pub fn socket_source(stream: TcpStream) -> SocketSource {
	let (stream, timeout) = guarded(stream);
	timeout.source(stream.into())
}

/// Returns a sink writing to `stream`. Set a timeout with
/// [`timeout_mut`](TimeoutSink::timeout_mut) to bound each write.
pub fn socket_sink(stream: TcpStream) -> SocketSink {
	let (stream, timeout) = guarded(stream);
	timeout.sink(stream.into())
}
