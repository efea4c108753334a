// SPDX-License-Identifier: Apache-2.0

use crate::SIZE;

/// Options for tuning [`Buffer`](super::Buffer)'s behavior and performance.
///
/// # Share threshold
///
/// The minimum size for segment data to be shared rather than copied into
/// another segment when a partial segment moves between buffers. Defaults to
/// `1024B`, one eighth the segment size. With a value more than the segment
/// size, segments are never shared on a split.
///
/// Sharing is significantly faster than copying for large segments, O(1) vs O(n)
/// complexity. For small amounts of data the tradeoff isn't worth it: a shared
/// segment can't be written to, so the receiving buffer needs a fresh segment for
/// its next write, wasting most of the shared one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct BufferOptions {
	pub share_threshold: usize,
}

impl Default for BufferOptions {
	fn default() -> Self { Self::new() }
}

impl BufferOptions {
	/// Creates a new set of buffer options.
	pub const fn new() -> Self {
		Self {
			share_threshold: SIZE / 8,
		}
	}

	/// Presets the options to create a "lean" buffer, disabling data sharing on
	/// splits. Whole segments are still moved between buffers.
	#[inline]
	pub const fn lean() -> Self {
		Self {
			share_threshold: usize::MAX,
		}
	}

	/// Returns the segment share threshold.
	#[inline]
	pub const fn share_threshold(&self) -> usize { self.share_threshold }

	/// Sets the segment share threshold.
	#[inline]
	pub fn set_share_threshold(&mut self, value: usize) {
		self.share_threshold = value;
	}

	/// Sets the segment share threshold.
	#[inline]
	pub const fn with_share_threshold(mut self, value: usize) -> Self {
		self.share_threshold = value;
		self
	}
}
