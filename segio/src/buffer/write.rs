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

use crate::{Buffer, Result};
use crate::pool::Pool;
use crate::streams::{BufSink, Sink};

impl<P: Pool> Sink for Buffer<P> {
	/// Moves `count` bytes from `source` into this buffer.
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result {
		self.write_from(source, count)
	}
}

// A buffer is its own target, so there is nothing to emit.
impl<P: Pool> BufSink for Buffer<P> {
	fn emit_complete_segments(&mut self) -> Result { Ok(()) }

	fn emit(&mut self) -> Result { Ok(()) }
}
