//! Shared scratch buffers: one for paths, one for data, both allocated once
//! at construction and never resized.
//!
//! The teacher's `socket_server::buffer::Buffer` is a fixed-capacity boxed
//! array reused across every client because only one request is ever being
//! serviced at a time; the same reasoning applies here (spec.md §5: "the
//! path buffer and data buffer are exclusively owned by whichever request is
//! currently being processed... aliasing cannot occur").

/// Shared path and data scratch buffers.
///
/// Their capacities bound the largest path and data payload the server will
/// accept without draining (spec.md §3). Both are boxed once in
/// [`SharedBuffers::new`] — the one allocation this crate ever performs past
/// construction-time setup.
#[derive(Debug)]
pub struct SharedBuffers {
	path: Box<[u8]>,
	data: Box<[u8]>,
}

impl SharedBuffers {
	pub fn new(path_capacity: usize, data_capacity: usize) -> Self {
		Self { path: vec![0u8; path_capacity].into_boxed_slice(), data: vec![0u8; data_capacity].into_boxed_slice() }
	}

	pub fn path_capacity(&self) -> usize {
		self.path.len()
	}

	pub fn data_capacity(&self) -> usize {
		self.data.len()
	}

	pub fn path_mut(&mut self) -> &mut [u8] {
		&mut self.path
	}

	pub fn data_mut(&mut self) -> &mut [u8] {
		&mut self.data
	}

	pub fn path(&self) -> &[u8] {
		&self.path
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capacities_match_construction_args() {
		let buffers = SharedBuffers::new(64, 256);
		assert_eq!(buffers.path_capacity(), 64);
		assert_eq!(buffers.data_capacity(), 256);
	}
}
