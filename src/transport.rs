//! The transport capability bundle.
//!
//! spec.md §9 asks for the transport contract to be modeled as "a capability
//! bundle (a trait/interface or a struct of callable values), injected at
//! construction" rather than as free-floating indirect function calls. This
//! mirrors how the teacher wraps OS resources (`Epoll`, `Accept`) as structs
//! with narrow method surfaces instead of calling `libc`/`nix` directly from
//! the server loop.

use crate::client::ClientId;
use std::io;

pub mod mock;
pub mod tcp;

/// Everything the protocol core needs from the outside world: accepting
/// connections, polling/reading/writing bytes, closing a connection, and a
/// monotonic clock. The core calls these and assumes they block to their
/// documented contract (spec.md §6); it never spawns a thread or sleeps
/// itself (spec.md §5).
pub trait Transport {
	/// Accept a waiting connection, if any. Returns `None` if none is
	/// waiting right now — it does not block.
	fn accept(&mut self) -> Option<ClientId>;

	/// Number of bytes immediately readable from `client` without blocking.
	fn available(&mut self, client: ClientId) -> usize;

	/// Read exactly `buf.len()` bytes from `client` into `buf`, blocking
	/// until they are delivered or the call fails. Returns the number of
	/// bytes actually read; per spec.md §6 this should always equal
	/// `buf.len()` on success, but the core defensively treats a short
	/// return the same as a transport failure (the contract is assumed,
	/// never trusted blindly).
	fn read(&mut self, client: ClientId, buf: &mut [u8]) -> io::Result<usize>;

	/// Write exactly `buf.len()` bytes to `client`, blocking until
	/// delivered or the call fails. Returns the number of bytes actually
	/// written, checked the same defensive way as `read`.
	fn write(&mut self, client: ClientId, buf: &[u8]) -> io::Result<usize>;

	/// Close the connection to `client` and release any transport-side
	/// resources for it.
	fn close(&mut self, client: ClientId);

	/// Current time, as milliseconds on a monotonic clock.
	fn now_ms(&mut self) -> u64;
}

/// Read exactly `buf.len()` bytes, treating a short read as failure.
///
/// This is the one place the "MUST block until n bytes are delivered or
/// fails" contract from spec.md §6 is defensively re-checked, since the
/// dispatcher needs to distinguish "got everything" from "got partial data"
/// to decide whether to drop the client (spec.md §4.2, §7).
pub fn read_exact<T: Transport + ?Sized>(transport: &mut T, client: ClientId, buf: &mut [u8]) -> io::Result<bool> {
	if buf.is_empty() {
		return Ok(true);
	}
	let n = transport.read(client, buf)?;
	Ok(n == buf.len())
}

/// Write exactly `buf.len()` bytes, treating a short write as failure.
pub fn write_exact<T: Transport + ?Sized>(transport: &mut T, client: ClientId, buf: &[u8]) -> io::Result<bool> {
	if buf.is_empty() {
		return Ok(true);
	}
	let n = transport.write(client, buf)?;
	Ok(n == buf.len())
}
