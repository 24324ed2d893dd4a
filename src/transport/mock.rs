//! An in-memory [`Transport`] for deterministic tests.
//!
//! Queues per-client inbound bytes, captures everything written back, and
//! lets a test advance the clock and queue new connections by hand — no
//! real sockets involved.
#![cfg(test)]

use crate::client::ClientId;
use crate::transport::Transport;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct ClientState {
	inbound: VecDeque<u8>,
	outbound: Vec<u8>,
	closed: bool,
}

/// In-memory transport. `pending_accepts` is drained one-per-call by
/// [`MockTransport::accept`]; `now_ms` is advanced explicitly by the test.
#[derive(Debug, Default)]
pub struct MockTransport {
	pending_accepts: VecDeque<ClientId>,
	clients: HashMap<u64, ClientState>,
	now_ms: u64,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a client to be returned by the next `accept()` call.
	pub fn queue_accept(&mut self, id: ClientId) {
		self.pending_accepts.push_back(id);
		self.clients.entry(id.get()).or_default();
	}

	/// Feed bytes that will be readable from `client`.
	pub fn push_inbound(&mut self, client: ClientId, bytes: &[u8]) {
		self.clients.entry(client.get()).or_default().inbound.extend(bytes);
	}

	/// Drain and return everything written to `client` so far.
	pub fn take_outbound(&mut self, client: ClientId) -> Vec<u8> {
		match self.clients.get_mut(&client.get()) {
			Some(state) => std::mem::take(&mut state.outbound),
			None => Vec::new(),
		}
	}

	pub fn is_closed(&self, client: ClientId) -> bool {
		self.clients.get(&client.get()).map_or(true, |s| s.closed)
	}

	pub fn set_now_ms(&mut self, now: u64) {
		self.now_ms = now;
	}

	pub fn advance_ms(&mut self, delta: u64) {
		self.now_ms += delta;
	}
}

impl Transport for MockTransport {
	fn accept(&mut self) -> Option<ClientId> {
		self.pending_accepts.pop_front()
	}

	fn available(&mut self, client: ClientId) -> usize {
		self.clients.get(&client.get()).map_or(0, |s| s.inbound.len())
	}

	fn read(&mut self, client: ClientId, buf: &mut [u8]) -> std::io::Result<usize> {
		let state = self
			.clients
			.get_mut(&client.get())
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unknown client"))?;
		let n = Ord::min(buf.len(), state.inbound.len());
		for slot in buf.iter_mut().take(n) {
			*slot = state.inbound.pop_front().unwrap();
		}
		Ok(n)
	}

	fn write(&mut self, client: ClientId, buf: &[u8]) -> std::io::Result<usize> {
		let state = self
			.clients
			.get_mut(&client.get())
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unknown client"))?;
		state.outbound.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn close(&mut self, client: ClientId) {
		if let Some(state) = self.clients.get_mut(&client.get()) {
			state.closed = true;
		}
	}

	fn now_ms(&mut self) -> u64 {
		self.now_ms
	}
}
