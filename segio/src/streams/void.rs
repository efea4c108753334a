// SPDX-License-Identifier: Apache-2.0

use crate::{Buffer, Result};
use crate::error::{OperationKind::Write, ResultContext};
use crate::pool::Pool;
use super::{Sink, Stream};

/// Returns a [`Sink`] that writes to nowhere, dropping any data written to it.
pub fn blackhole() -> Blackhole { Blackhole }

/// A [`Sink`] that writes to nowhere, dropping any data written to it.
#[derive(Copy, Clone, Debug, Default)]
pub struct Blackhole;

impl Stream for Blackhole { }

impl Sink for Blackhole {
	/// Skips `count` bytes at `source`.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		source.skip(count).context(Write)
	}
}
