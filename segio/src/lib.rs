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

//! Segmented byte buffers and blocking streams, with watchdog-enforced timeouts.
//!
//! ## How it works
//!
//! Data is written to and read from reusable bits of memory called *segments*.
//! When a segment is consumed, it's returned to a *pool*. To write data, segments
//! are claimed from this pool, or allocated when the pool is empty. The pool is
//! shared by every buffer in the process and keeps a capped amount of free memory,
//! 64KiB by default; segments recycled past the cap are dropped.
//!
//! ### Segments
//!
//! Segments are fixed-size chunks of memory arranged in a ring. Memory within
//! segments can either be owned by or shared between segments, avoiding expensive
//! mem-copy operations as much as possible. Shared memory is copy-on-write; it can
//! be read by multiple segments, only copying when written. Small amounts of data
//! under a set threshold (1024B by default) are not shared, as a tradeoff between
//! memory allocation performance and speed.
//!
//! The ring behaves as a continuous byte deque. Bytes are read from the head and
//! written to the tail, claiming new segments from the pool as it fills. Moving
//! data from one buffer to another moves whole segments; a partial head segment is
//! either copied into the receiving tail, if it fits, or split off. Small segments
//! landing after a tail with room are compacted into it.
//!
//! ### Timeouts
//!
//! Blocking streams are bounded with a [`Timeout`], a per-operation budget and/or
//! an absolute deadline. Operations that can't check a deadline while blocked are
//! wrapped in an [`AsyncTimeout`], which registers a deadline with a background
//! [`Watchdog`] thread. If the deadline passes first, the watchdog runs a handler
//! to interrupt the operation, for sockets by shutting them down, and the failure
//! is reported as a timeout.

mod buffer;
mod buffered_wrappers;
mod error;
pub mod pool;
mod segment;
mod std_io;
pub mod streams;
mod timeout;

pub use buffer::*;
pub use error::*;
pub use segment::Segment;
pub use pool::{DefaultPool, Pool, PoolOptions, SegmentPool};
pub use timeout::*;

/// The size of segment memory blocks.
pub const SIZE: usize = 8192;
