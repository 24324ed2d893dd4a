//! Server construction and the accept/serve tick loop.
//!
//! Grounded on the teacher's `socket_server::SocketServer`: a `bind`
//! constructor taking the resources it needs, plus a single per-tick
//! entrypoint (`wait`) that first drains pending accepts and then services
//! every occupied slot. This crate splits that single `wait` into the two
//! named operations spec.md §2/§4.6/§4.7 call for
//! (`accept_clients`/`serve_clients`), with `tick` as the convenience that
//! runs both in the order spec.md §2 describes.

use crate::buffers::SharedBuffers;
use crate::client::{ClientId, ClientTable};
use crate::codec::error_code;
use crate::dispatch::{dispatch, read_message, send_error, ReadOutcome};
use crate::registry::FileTable;
use crate::transport::Transport;
use log::{debug, trace, warn};

/// Default request-size ceiling (spec.md §3): requests advertising a larger
/// `psize`/`dsize` are dropped without being consumed.
pub const DEFAULT_HARD_LIMIT: u32 = 10_000;

/// Default idle timeout, in milliseconds (spec.md §3).
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Construction parameters for a [`Server`] (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
	pub path_capacity: usize,
	pub data_capacity: usize,
	pub max_clients: usize,
	pub max_files: usize,
	pub timeout_ms: u64,
	pub hard_limit: u32,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			path_capacity: 256,
			data_capacity: 4096,
			max_clients: 16,
			max_files: 16,
			timeout_ms: DEFAULT_TIMEOUT_MS,
			hard_limit: DEFAULT_HARD_LIMIT,
		}
	}
}

/// The embedded file-service server.
///
/// `'a` is the lifetime for which registered file names and handlers must
/// stay alive (spec.md §4.4/§9); `T` is the transport capability bundle
/// (spec.md §6).
pub struct Server<'a, T: Transport> {
	transport: T,
	buffers: SharedBuffers,
	clients: ClientTable,
	files: FileTable<'a>,
	timeout_ms: u64,
	hard_limit: u32,
}

impl<'a, T: Transport> Server<'a, T> {
	pub fn new(transport: T, config: ServerConfig) -> Self {
		Self {
			transport,
			buffers: SharedBuffers::new(config.path_capacity, config.data_capacity),
			clients: ClientTable::new(config.max_clients),
			files: FileTable::new(config.max_files),
			timeout_ms: config.timeout_ms,
			hard_limit: config.hard_limit,
		}
	}

	pub fn files_mut(&mut self) -> &mut FileTable<'a> {
		&mut self.files
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	/// Fill empty client slots by polling the accept callback once per slot
	/// (spec.md §4.7).
	pub fn accept_clients(&mut self) {
		let empty_slots = (0..self.clients.capacity()).filter(|&i| self.clients.get(i).is_none()).count();
		for _ in 0..empty_slots {
			match self.transport.accept() {
				Some(id) => {
					let now = self.transport.now_ms();
					match self.clients.insert(id, now + self.timeout_ms) {
						Some(slot) => debug!("accepted client {id} into slot {slot}"),
						None => {
							warn!("client table unexpectedly full while an empty slot was counted");
						},
					}
				},
				None => break,
			}
		}
	}

	/// Walk the client table once: time out overdue clients, and for any
	/// client with a full header's worth of bytes available, read and
	/// dispatch exactly one request (spec.md §2/§4.6).
	pub fn serve_clients(&mut self) {
		for index in self.clients.occupied_indices().collect::<Vec<_>>() {
			let Some(slot) = self.clients.get(index).copied() else { continue };
			let now = self.transport.now_ms();

			if now >= slot.deadline_ms {
				trace!("client {} deadline expired", slot.id);
				let _ = send_error(&mut self.transport, slot.id, &[], error_code::DEADLINE_EXPIRED, self.buffers.data_mut());
				self.drop_client(index);
				continue;
			}

			if self.transport.available(slot.id) < crate::codec::HEADER_LEN {
				continue;
			}

			match read_message(&mut self.transport, slot.id, &mut self.buffers, self.hard_limit) {
				ReadOutcome::Sentinel { drop_client: true } => {
					self.drop_client(index);
					continue;
				},
				ReadOutcome::Sentinel { drop_client: false } => {
					self.reset_deadline(index, now);
					continue;
				},
				ReadOutcome::Message { header, path, .. } => {
					self.reset_deadline(index, now);
					if !dispatch(&mut self.transport, slot.id, &mut self.buffers, &mut self.files, header, path) {
						self.drop_client(index);
					}
				},
			}
		}
	}

	/// Run one full tick: accept, then serve (spec.md §2).
	pub fn tick(&mut self) {
		self.accept_clients();
		self.serve_clients();
	}

	fn reset_deadline(&mut self, index: usize, now: u64) {
		if let Some(slot) = self.clients.get_mut(index) {
			slot.deadline_ms = now + self.timeout_ms;
		}
	}

	fn drop_client(&mut self, index: usize) {
		if let Some(slot) = self.clients.clear(index) {
			self.transport.close(slot.id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::{HandlerRequest, HandlerResponse};
	use crate::transport::mock::MockTransport;

	fn echo<'r>(req: HandlerRequest<'r>, scratch: &'r mut [u8]) -> HandlerResponse<'r> {
		scratch[..req.data.len()].copy_from_slice(req.data);
		HandlerResponse { path: req.path, data: &scratch[..req.data.len()] }
	}

	fn config() -> ServerConfig {
		ServerConfig { path_capacity: 64, data_capacity: 64, max_clients: 2, max_files: 2, timeout_ms: 1000, hard_limit: 10_000 }
	}

	#[test]
	fn accept_fills_empty_slots_up_to_capacity() {
		let mut server = Server::new(MockTransport::new(), config());
		let a = ClientId::new(1).unwrap();
		let b = ClientId::new(2).unwrap();
		let c = ClientId::new(3).unwrap();
		server.transport_mut().queue_accept(a);
		server.transport_mut().queue_accept(b);
		server.transport_mut().queue_accept(c);
		server.accept_clients();
		assert_eq!(server.clients.occupied_indices().count(), 2);
	}

	#[test]
	fn idle_client_past_deadline_gets_timeout_error_and_is_dropped() {
		let mut server = Server::new(MockTransport::new(), config());
		let a = ClientId::new(1).unwrap();
		server.transport_mut().queue_accept(a);
		server.accept_clients();
		server.transport_mut().advance_ms(5000);
		server.serve_clients();
		let mut expected = vec![0, 0, 0, 0, 2, 0, 0, 0, 0x84];
		expected.extend_from_slice(&3000u16.to_le_bytes());
		assert_eq!(server.transport_mut().take_outbound(a), expected);
		assert!(server.transport_mut().is_closed(a));
		assert_eq!(server.clients.occupied_indices().count(), 0);
	}

	#[test]
	fn full_request_response_round_trip_through_tick() {
		let mut server = Server::new(MockTransport::new(), config());
		server.files_mut().register(b"hi", &echo, &echo).unwrap();
		let a = ClientId::new(1).unwrap();
		server.transport_mut().queue_accept(a);
		server.tick();
		let mut req = vec![2, 0, 0, 0, 1, 0, 0, 0, 1];
		req.extend_from_slice(b"hi");
		req.push(b'X');
		server.transport_mut().push_inbound(a, &req);
		server.serve_clients();
		let mut expected = vec![2, 0, 0, 0, 1, 0, 0, 0, 0x81];
		expected.extend_from_slice(b"hi");
		expected.push(b'X');
		assert_eq!(server.transport_mut().take_outbound(a), expected);
		assert!(!server.transport_mut().is_closed(a));
	}
}
