//! A runnable demo transport over blocking TCP sockets.
//!
//! This is the kind of concrete transport spec.md §1 scopes out of the
//! *protocol core*, but the teacher ships a concrete `UnixListener`-backed
//! listener alongside its protocol core (`main.rs`/`accept.rs`), so a demo
//! transport belongs in this crate's ambient stack the same way.

use crate::client::ClientId;
use crate::transport::Transport;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Instant;

/// Largest byte count `available()` can report. `std` has no portable
/// `FIONREAD`-style query, so availability is approximated by peeking this
/// many bytes; a socket holding more than this just reports the cap, which
/// is still correct for the one thing callers need to know — whether at
/// least `HEADER_LEN` bytes are ready.
const PEEK_BUFFER_LEN: usize = 4096;

/// TCP-backed [`Transport`]. The listener and every accepted stream are put
/// into blocking mode; `available` peeks into a scratch buffer rather than
/// reading, since `std` has no portable non-blocking byte count query.
pub struct TcpTransport {
	listener: TcpListener,
	streams: HashMap<u64, TcpStream>,
	next_id: u64,
	epoch: Instant,
}

impl TcpTransport {
	pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
		let listener = TcpListener::bind(addr)?;
		listener.set_nonblocking(true)?;
		Ok(Self { listener, streams: HashMap::new(), next_id: 1, epoch: Instant::now() })
	}

	fn stream(&mut self, client: ClientId) -> io::Result<&mut TcpStream> {
		self.streams
			.get_mut(&client.get())
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown client"))
	}
}

impl Transport for TcpTransport {
	fn accept(&mut self) -> Option<ClientId> {
		match self.listener.accept() {
			Ok((sock, addr)) => {
				debug!("accepted TCP connection from {addr}");
				if sock.set_nonblocking(false).is_err() {
					warn!("failed to set accepted socket to blocking mode, dropping it");
					return None;
				}
				let id = self.next_id;
				self.next_id += 1;
				self.streams.insert(id, sock);
				ClientId::new(id)
			},
			Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
			Err(err) => {
				warn!("accept() failed: {err}");
				None
			},
		}
	}

	fn available(&mut self, client: ClientId) -> usize {
		let Ok(sock) = self.stream(client) else { return 0 };
		// Peeked at the kernel's socket receive buffer, not just the header: a
		// 1-byte probe here would cap every return at 1, so `serve_clients`'s
		// `available(..) >= HEADER_LEN` gate would never pass.
		let mut probe = [0u8; PEEK_BUFFER_LEN];
		let _ = sock.set_nonblocking(true);
		let n = match sock.peek(&mut probe) {
			Ok(n) => n,
			Err(_) => 0,
		};
		let _ = sock.set_nonblocking(false);
		n
	}

	fn read(&mut self, client: ClientId, buf: &mut [u8]) -> io::Result<usize> {
		let sock = self.stream(client)?;
		trace!("read({} bytes) from client {client}", buf.len());
		sock.read_exact(buf).map(|()| buf.len())
	}

	fn write(&mut self, client: ClientId, buf: &[u8]) -> io::Result<usize> {
		let sock = self.stream(client)?;
		trace!("write({} bytes) to client {client}", buf.len());
		sock.write_all(buf).map(|()| buf.len())
	}

	fn close(&mut self, client: ClientId) {
		debug!("closing client {client}");
		self.streams.remove(&client.get());
	}

	fn now_ms(&mut self) -> u64 {
		self.epoch.elapsed().as_millis() as u64
	}
}
