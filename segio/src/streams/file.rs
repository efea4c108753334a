// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use super::{ReaderSource, WriterSink};

/// A [`Source`](super::Source) reading from a [file](File).
pub type FileSource = ReaderSource<File>;

/// A [`Sink`](super::Sink) writing to a [file](File).
pub type FileSink = WriterSink<File>;

/// Returns a source reading from `file`.
pub fn file_source(file: File) -> FileSource { file.into() }

/// Opens the file at `path` for reading.
pub fn path_source(path: impl AsRef<Path>) -> io::Result<FileSource> {
	File::open(path).map(file_source)
}

/// Opens the file at `path` with `options`, which should allow reading.
pub fn path_source_with(path: impl AsRef<Path>, options: &OpenOptions) -> io::Result<FileSource> {
	options.open(path).map(file_source)
}

/// Returns a sink writing to `file`.
pub fn file_sink(file: File) -> FileSink { file.into() }

/// Opens the file at `path` for writing, creating it if it doesn't exist and
/// truncating it if it does.
pub fn path_sink(path: impl AsRef<Path>) -> io::Result<FileSink> {
	File::create(path).map(file_sink)
}

/// Opens the file at `path` with `options`, which should allow writing.
pub fn path_sink_with(path: impl AsRef<Path>, options: &OpenOptions) -> io::Result<FileSink> {
	options.open(path).map(file_sink)
}

/// Opens the file at `path` for appending, creating it if it doesn't exist.
pub fn appending_sink(path: impl AsRef<Path>) -> io::Result<FileSink> {
	OpenOptions::new()
		.append(true)
		.create(true)
		.open(path)
		.map(file_sink)
}
