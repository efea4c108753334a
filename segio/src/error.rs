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

use std::{fmt, io, result};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use amplify_derive::Display;

pub type ErrorBox = Box<dyn StdError + Send + Sync>;
pub type Result<T = ()> = result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum OperationKind {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("read from buffer")]
	BufRead,
	#[display("write to buffer")]
	BufWrite,
	#[display("skip buffer")]
	BufSkip,
	#[display("copy buffer")]
	BufCopy,
	#[display("read")]
	Read,
	#[display("write")]
	Write,
	#[display("flush")]
	Flush,
	#[display("close")]
	Close,
	#[display("{0}")]
	Other(&'static str)
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	#[display("premature end-of-stream")]
	Eos,
	#[display("IO error")]
	Io,
	#[display("stream closed")]
	Closed,
	#[display("timeout")]
	Timeout,
	#[display("byte count out of range")]
	OutOfRange,
	#[display("{0}")]
	Other(&'static str),
}

#[derive(Debug)]
pub struct Error {
	op: OperationKind,
	kind: ErrorKind,
	source: Option<ErrorBox>,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let Self { op, kind, source } = self;
		if let Some(source) = source {
			write!(f, "{op} failed; {kind} ({source})")
		} else {
			write!(f, "{op} failed; {kind}")
		}
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		if let Some(ref source) = self.source {
			Some(source.as_ref())
		} else {
			None
		}
	}
}

impl Error {
	pub(crate) fn new(
		op: OperationKind,
		kind: ErrorKind,
		source: Option<ErrorBox>
	) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new error with a custom message.
	pub fn other(
		op: OperationKind,
		message: &'static str,
		source: Option<ErrorBox>
	) -> Self {
		Self::new(op, ErrorKind::Other(message), source)
	}

	/// Creates a new "end-of-stream" error.
	pub fn eos(op: OperationKind) -> Self { Self::new(op, ErrorKind::Eos, None) }

	/// Creates a new IO error.
	pub fn io(op: OperationKind, error: io::Error) -> Self {
		Self::new(op, ErrorKind::Io, Some(error.into()))
	}

	/// Creates a new "closed" error.
	pub fn closed(op: OperationKind) -> Self {
		Self::new(op, ErrorKind::Closed, None)
	}

	/// Creates a new timeout error, wrapping the failure it interrupted, if any.
	pub fn timeout(op: OperationKind, cause: Option<Error>) -> Self {
		Self::new(op, ErrorKind::Timeout, cause.map(Into::into))
	}

	/// Creates a new "out of range" error for a byte count exceeding what is
	/// available.
	pub fn out_of_range(op: OperationKind) -> Self {
		Self::new(op, ErrorKind::OutOfRange, None)
	}

	/// Returns the operation kind.
	pub fn operation(&self) -> OperationKind { self.op }

	/// Sets the operation kind.
	pub fn with_operation(mut self, op: OperationKind) -> Self {
		self.op = op;
		self
	}

	/// Returns the error kind.
	pub fn kind(&self) -> ErrorKind { self.kind }

	/// Returns `true` if the error is a premature end-of-stream.
	pub fn is_eos(&self) -> bool { self.kind == ErrorKind::Eos }

	/// Returns `true` if the error was caused by an expired timeout.
	pub fn is_timeout(&self) -> bool { self.kind == ErrorKind::Timeout }

	/// Returns the source downcast into an IO Error, if possible.
	pub fn io_source(&self) -> Option<&io::Error> {
		self.source.as_ref()?.downcast_ref()
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		match value.kind() {
			io::ErrorKind::UnexpectedEof => Self::eos(OperationKind::Unknown),
			_ => Self::io(OperationKind::Unknown, value)
		}
	}
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		let kind = match value.kind {
			ErrorKind::Eos => io::ErrorKind::UnexpectedEof,
			ErrorKind::Timeout => io::ErrorKind::TimedOut,
			ErrorKind::OutOfRange => io::ErrorKind::InvalidInput,
			ErrorKind::Io => match value.io_source() {
				Some(source) => source.kind(),
				None => io::ErrorKind::Other
			},
			ErrorKind::Closed |
			ErrorKind::Other(_) => io::ErrorKind::Other,
		};
		io::Error::new(kind, value)
	}
}

/// Sets the operation kind on errors as they propagate.
pub(crate) trait ResultContext<T> {
	fn context(self, op: OperationKind) -> Result<T>;
}

impl<T, E: Into<Error>> ResultContext<T> for result::Result<T, E> {
	fn context(self, op: OperationKind) -> Result<T> {
		self.map_err(|err| {
			let err = err.into();
			if err.op == OperationKind::Unknown {
				err.with_operation(op)
			} else {
				err
			}
		})
	}
}

#[cfg(test)]
mod test {
	use std::io;
	use super::{Error, ErrorKind, OperationKind, ResultContext};

	#[test]
	fn display_with_source() {
		let err = Error::io(OperationKind::Read, io::Error::other("broken pipe"));
		assert_eq!(err.to_string(), "read failed; IO error (broken pipe)");
		assert_eq!(Error::eos(OperationKind::BufRead).to_string(), "read from buffer failed; premature end-of-stream");
	}

	#[test]
	fn context_keeps_known_operation() {
		let known: Result<(), Error> = Err(Error::closed(OperationKind::Flush));
		assert_eq!(known.context(OperationKind::Close).unwrap_err().operation(), OperationKind::Flush);

		let unknown: Result<(), io::Error> = Err(io::ErrorKind::UnexpectedEof.into());
		let err = unknown.context(OperationKind::Read).unwrap_err();
		assert_eq!(err.operation(), OperationKind::Read);
		assert_eq!(err.kind(), ErrorKind::Eos);
	}

	#[test]
	fn timeout_into_io() {
		let err: io::Error = Error::timeout(OperationKind::Read, None).into();
		assert_eq!(err.kind(), io::ErrorKind::TimedOut);
	}
}
