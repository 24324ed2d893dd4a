//! Opt-in wire-level tracing, independent of the `log` level filter.
//!
//! Grounded on the teacher's `logging.rs`: a `Lazy<bool>` gate read once from
//! an environment variable, plus a reused thread-local buffer so tracing a
//! message never allocates on the hot path. `MFS_DEBUG=1` plays the role
//! `WAYLAND_DEBUG=1` plays there; the per-message fields are this protocol's
//! header instead of an interface/object/event triple.

use crate::client::ClientId;
use crate::codec::Header;
use once_cell::sync::Lazy;
use std::{
	cell::Cell,
	env,
	fmt::Write as _,
	io::{stderr, Write as _},
};

static MFS_DEBUG: Lazy<bool> = Lazy::new(|| matches!(env::var("MFS_DEBUG").as_deref(), Ok("1")));

thread_local! {
	/// A reused buffer for building logs. Each log line is written in parts to this buffer before being emitted as a complete line to stderr.
	///
	/// Instead of requiring a separate `impl FnOnce` for every request and event to call in `LocalKey::with`, we take the buffer out and put it back when we're done. In case the buffer doesn't get put back for some reason, a usable but empty string is left in its place.
	static BUFFER: Cell<String> = Cell::default();
}

pub fn log_request(client: ClientId, header: Header) -> Option<LogMessage> {
	log_message("", client, header)
}

pub fn log_response(client: ClientId, header: Header) -> Option<LogMessage> {
	log_message(" -> ", client, header)
}

fn log_message(prefix: &'static str, client: ClientId, header: Header) -> Option<LogMessage> {
	if !*MFS_DEBUG {
		return None;
	}

	let mut buffer = BUFFER.with(|cell| cell.take());
	buffer.clear();

	let _ = write!(buffer, "{prefix}client {client} op={} psize={} dsize={}(", header.op, header.psize, header.dsize);
	Some(LogMessage { buffer })
}

pub struct LogMessage {
	buffer: String,
}

impl LogMessage {
	pub fn arg_path(&mut self, path: &[u8]) {
		let _ = write!(self.buffer, "path={:?}, ", String::from_utf8_lossy(path));
	}

	pub fn arg_len(&mut self, label: &str, len: usize) {
		let _ = write!(self.buffer, "{label}={len}, ");
	}

	pub fn finish(mut self) {
		if self.buffer.ends_with(", ") {
			self.buffer.truncate(self.buffer.len() - 2);
		}
		self.buffer.push_str(")\n");
		let _ = stderr().lock().write_all(self.buffer.as_bytes());
	}
}

impl Drop for LogMessage {
	fn drop(&mut self) {
		let buffer = std::mem::take(&mut self.buffer);
		BUFFER.with(|cell| cell.set(buffer));
	}
}
