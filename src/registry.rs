//! The file registry: a fixed-size table mapping names to read/write
//! handlers.
//!
//! Grounded on the teacher's `object_map::Objects` — a table of borrowed,
//! lifetime-tied slots with `Entry`/`Occupied`/`Vacant` accessors — scaled
//! down to the much simpler shape this spec needs: linear-scan lookup by
//! name instead of direct indexing by id, and a flat `Option<FileSlot>`
//! table instead of an `Entry` enum, since register/unregister never need to
//! hand back a typed view of a single slot the way object insertion does.

use std::fmt;
use std::io::{Error, ErrorKind, Result};

/// A single request as handed to a [`FileHandler`]: the path the client
/// asked for (always fits in the server's path buffer) and the request
/// body.
pub struct HandlerRequest<'a> {
	pub path: &'a [u8],
	pub data: &'a [u8],
}

/// The reply a [`FileHandler`] hands back. `path`/`data` typically borrow
/// either the request's path (to echo it) or the `scratch` buffer the
/// handler was given to write its output into — both share the same
/// lifetime, so either is valid to return.
pub struct HandlerResponse<'a> {
	pub path: &'a [u8],
	pub data: &'a [u8],
}

impl<'a> HandlerResponse<'a> {
	/// A reply with no body, echoing `req`'s path.
	pub fn empty(req: &HandlerRequest<'a>) -> Self {
		Self { path: req.path, data: &[] }
	}
}

/// A per-file read or write handler.
///
/// Handlers are trusted with respect to buffer lifetime (spec.md §4.6): if
/// they write into `scratch` they must finish before returning, and the
/// server sends the response before the next request is serviced, so
/// `scratch` is free again by the next call.
pub trait FileHandler {
	fn call<'a>(&self, req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a>;
}

impl<F> FileHandler for F
where
	F: for<'a> Fn(HandlerRequest<'a>, &'a mut [u8]) -> HandlerResponse<'a>,
{
	fn call<'a>(&self, req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a> {
		(self)(req, scratch)
	}
}

/// A registered file: a borrowed name plus its read/write handlers.
///
/// Nothing here is copied or owned — `register` borrows the caller's
/// storage for the table's lifetime `'a`, resolving spec.md §9's open
/// question (the "caller must keep the name alive" contract is now a
/// lifetime the borrow checker enforces, not documentation).
pub struct FileSlot<'a> {
	pub name: &'a [u8],
	pub reader: &'a dyn FileHandler,
	pub writer: &'a dyn FileHandler,
}

impl fmt::Debug for FileSlot<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FileSlot").field("name", &String::from_utf8_lossy(self.name)).finish()
	}
}

/// Fixed-size table of file slots, allocated once and never resized.
#[derive(Debug)]
pub struct FileTable<'a> {
	slots: Vec<Option<FileSlot<'a>>>,
}

impl<'a> FileTable<'a> {
	pub fn new(capacity: usize) -> Self {
		Self { slots: (0..capacity).map(|_| None).collect() }
	}

	pub fn capacity(&self) -> usize {
		self.slots.len()
	}

	/// Names compare by length plus bytewise content (spec.md §3); a path
	/// containing an embedded NUL within its length never matches anything,
	/// per spec.md §4.4 (registered names themselves never contain one, so
	/// this rejects exactly the malformed lookups the spec calls out).
	pub fn get_index(&self, path: &[u8]) -> Option<usize> {
		if path.contains(&0) {
			return None;
		}
		self.slots.iter().position(|slot| matches!(slot, Some(f) if f.name == path))
	}

	pub fn get(&self, index: usize) -> Option<&FileSlot<'a>> {
		self.slots[index].as_ref()
	}

	/// Register `name` with its read/write handlers. Rejects a name
	/// collision or a full table without mutating anything, matching the
	/// teacher's `Entry::into_vacant`/`into_occupied` convention of reporting
	/// slot conflicts as `io::Error`.
	pub fn register(&mut self, name: &'a [u8], reader: &'a dyn FileHandler, writer: &'a dyn FileHandler) -> Result<usize> {
		if self.slots.iter().any(|slot| matches!(slot, Some(f) if f.name == name)) {
			return Err(Error::new(ErrorKind::AlreadyExists, format!("file {:?} already registered", String::from_utf8_lossy(name))));
		}
		let index = self
			.slots
			.iter()
			.position(|slot| slot.is_none())
			.ok_or_else(|| Error::new(ErrorKind::Other, "file table is full"))?;
		self.slots[index] = Some(FileSlot { name, reader, writer });
		Ok(index)
	}

	/// Unregister the file named `name`, if present. No deallocation is
	/// performed beyond dropping the slot's borrow.
	pub fn unregister(&mut self, name: &[u8]) -> bool {
		match self.get_index(name) {
			Some(index) => {
				self.slots[index] = None;
				true
			},
			None => false,
		}
	}

	/// Iterate over the names of every registered (nonempty) file, in table
	/// order — used by the LS handler (spec.md §4.5).
	pub fn names(&self) -> impl Iterator<Item = &[u8]> + '_ {
		self.slots.iter().filter_map(|slot| slot.as_ref().map(|f| f.name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn echo<'a>(req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a> {
		scratch[..req.data.len()].copy_from_slice(req.data);
		HandlerResponse { path: req.path, data: &scratch[..req.data.len()] }
	}

	#[test]
	fn register_then_lookup_by_name() {
		let mut table = FileTable::new(4);
		table.register(b"hi", &echo, &echo).unwrap();
		let idx = table.get_index(b"hi").unwrap();
		assert_eq!(table.get(idx).unwrap().name, b"hi");
		assert!(table.get_index(b"missing").is_none());
	}

	#[test]
	fn duplicate_name_rejected() {
		let mut table = FileTable::new(4);
		table.register(b"hi", &echo, &echo).unwrap();
		assert_eq!(table.register(b"hi", &echo, &echo).unwrap_err().kind(), ErrorKind::AlreadyExists);
	}

	#[test]
	fn full_table_rejected() {
		let mut table = FileTable::new(1);
		table.register(b"a", &echo, &echo).unwrap();
		assert_eq!(table.register(b"b", &echo, &echo).unwrap_err().kind(), ErrorKind::Other);
	}

	#[test]
	fn unregister_frees_the_slot() {
		let mut table = FileTable::new(1);
		table.register(b"a", &echo, &echo).unwrap();
		assert!(table.unregister(b"a"));
		assert!(table.get_index(b"a").is_none());
		table.register(b"b", &echo, &echo).unwrap();
	}

	#[test]
	fn embedded_nul_never_matches() {
		let mut table = FileTable::new(1);
		table.register(b"a", &echo, &echo).unwrap();
		assert!(table.get_index(b"a\0").is_none());
	}
}
