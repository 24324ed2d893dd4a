//! Message I/O and the opcode dispatcher.
//!
//! Grounded on the teacher's `client::recv::fill_words` (read until enough
//! bytes are buffered, treating anything less as not-yet-available) and
//! `object_map::Objects::dispatch_request` (resolve a target, then switch on
//! the message's opcode) — scaled down to this spec's much simpler framing
//! (one fixed 9-byte header instead of Wayland's variable-length word
//! stream) and its five fixed opcodes instead of a generated interface
//! table.

use crate::buffers::SharedBuffers;
use crate::client::ClientId;
use crate::codec::{error_code, Header, Opcode, HEADER_LEN};
use crate::logging::{log_request, log_response};
use crate::registry::{FileTable, HandlerRequest};
use crate::transport::{read_exact, write_exact, Transport};
use log::{trace, warn};

/// A fully decoded, or sentinel, inbound message.
pub enum ReadOutcome<'b> {
	Message { header: Header, path: &'b [u8], data: &'b [u8] },
	/// No usable message was produced; `drop_client` says whether the
	/// caller must close the connection (spec.md §4.2/§7).
	Sentinel { drop_client: bool },
}

/// Read one full request from `client` into the shared buffers, per
/// spec.md §4.2's five-step algorithm.
pub fn read_message<'b, T: Transport + ?Sized>(
	transport: &mut T,
	client: ClientId,
	buffers: &'b mut SharedBuffers,
	hard_limit: u32,
) -> ReadOutcome<'b> {
	let mut header_bytes = [0u8; HEADER_LEN];
	match read_exact(transport, client, &mut header_bytes) {
		Ok(true) => {},
		_ => {
			trace!("short header read from client {client}");
			let _ = send_error(transport, client, &[], error_code::HEADER_READ_FAILED, buffers.data_mut());
			return ReadOutcome::Sentinel { drop_client: true };
		},
	}
	let header = Header::decode(header_bytes);

	if header.psize > hard_limit || header.dsize > hard_limit {
		warn!(
			"client {client} advertised psize={} dsize={} over the hard limit {hard_limit}, dropping",
			header.psize, header.dsize
		);
		return ReadOutcome::Sentinel { drop_client: true };
	}

	let psize = header.psize as usize;
	let dsize = header.dsize as usize;

	if psize > buffers.path_capacity() || dsize > buffers.data_capacity() {
		if !drain(transport, client, psize, buffers.path_capacity()) || !drain(transport, client, dsize, buffers.data_capacity())
		{
			return ReadOutcome::Sentinel { drop_client: true };
		}
		let _ = send_error(transport, client, &[], error_code::TOO_LARGE_FOR_BUFFERS, buffers.data_mut());
		return ReadOutcome::Sentinel { drop_client: false };
	}

	if !matches!(read_exact(transport, client, &mut buffers.path_mut()[..psize]), Ok(true)) {
		let _ = send_error(transport, client, &[], error_code::TOO_LARGE_FOR_BUFFERS, buffers.data_mut());
		return ReadOutcome::Sentinel { drop_client: true };
	}
	if !matches!(read_exact(transport, client, &mut buffers.data_mut()[..dsize]), Ok(true)) {
		let echoed_path: Vec<u8> = buffers.path()[..psize].to_vec();
		let _ = send_error(transport, client, &echoed_path, error_code::TOO_LARGE_FOR_BUFFERS, buffers.data_mut());
		return ReadOutcome::Sentinel { drop_client: true };
	}

	ReadOutcome::Message { header, path: &buffers.path()[..psize], data: &buffers.data()[..dsize] }
}

/// Read and discard `total` bytes in chunks of at most `chunk` bytes, to
/// resynchronise the stream after an oversized-but-legal request. Returns
/// `false` (caller must drop the client) on any short read.
fn drain<T: Transport + ?Sized>(transport: &mut T, client: ClientId, total: usize, chunk: usize) -> bool {
	let mut scratch = vec![0u8; chunk.max(1)];
	let mut remaining = total;
	while remaining > 0 {
		let n = remaining.min(scratch.len());
		match read_exact(transport, client, &mut scratch[..n]) {
			Ok(true) => remaining -= n,
			_ => return false,
		}
	}
	true
}

/// Write one full message out, per spec.md §4.3. Returns `false` (caller
/// must drop the client) on any short write.
pub fn send_message<T: Transport + ?Sized>(
	transport: &mut T,
	client: ClientId,
	header: Header,
	path: &[u8],
	data: &[u8],
) -> bool {
	if let Some(mut msg) = log_response(client, header) {
		msg.arg_len("psize", path.len());
		msg.arg_len("dsize", data.len());
		msg.finish();
	}
	if !matches!(write_exact(transport, client, &header.encode()), Ok(true)) {
		return false;
	}
	if !matches!(write_exact(transport, client, path), Ok(true)) {
		return false;
	}
	matches!(write_exact(transport, client, data), Ok(true))
}

/// Send an error response: `op = response-of(ERROR)`, `dsize = 2`, and the
/// code written little-endian into the first two bytes of `scratch`. `path`
/// is echoed verbatim (spec.md §4.3).
pub fn send_error<T: Transport + ?Sized>(
	transport: &mut T,
	client: ClientId,
	path: &[u8],
	code: u16,
	scratch: &mut [u8],
) -> bool {
	scratch[0..2].copy_from_slice(&code.to_le_bytes());
	let header = Header { psize: path.len() as u32, dsize: 2, op: Opcode::ERROR.response_of() };
	send_message(transport, client, header, path, &scratch[0..2])
}

/// Send the header-only NOOP response (spec.md §4.6).
fn send_noop_response<T: Transport + ?Sized>(transport: &mut T, client: ClientId) -> bool {
	let header = Header { psize: 0, dsize: 0, op: Opcode::NOOP.response_of() };
	send_message(transport, client, header, &[], &[])
}

/// List every registered file name, zero-terminated and concatenated, per
/// spec.md §4.5. Uses the fast path (assemble in the data buffer) when the
/// payload fits, otherwise streams it directly through the write callback.
pub fn list_files<T: Transport + ?Sized>(transport: &mut T, client: ClientId, buffers: &mut SharedBuffers, files: &FileTable<'_>) -> bool {
	let total_size: usize = files.names().map(|name| name.len() + 1).sum();
	let header = Header { psize: 0, dsize: total_size as u32, op: Opcode::LS.response_of() };

	if total_size <= buffers.data_capacity() {
		let mut offset = 0;
		for name in files.names() {
			buffers.data_mut()[offset..offset + name.len()].copy_from_slice(name);
			offset += name.len();
			buffers.data_mut()[offset] = 0;
			offset += 1;
		}
		return send_message(transport, client, header, &[], &buffers.data()[..total_size]);
	}

	if let Some(mut msg) = log_response(client, header) {
		msg.arg_len("psize", header.psize as usize);
		msg.arg_len("dsize", header.dsize as usize);
		msg.finish();
	}
	if !matches!(write_exact(transport, client, &header.encode()), Ok(true)) {
		return false;
	}
	for name in files.names() {
		if !matches!(write_exact(transport, client, name), Ok(true)) {
			return false;
		}
		if !matches!(write_exact(transport, client, &[0u8]), Ok(true)) {
			return false;
		}
	}
	true
}

/// Dispatch one already-read request and send its response.
///
/// Returns `false` if the caller must drop the client (a send failed along
/// the way); otherwise the client is kept, per spec.md §4.6 and §7.
pub fn dispatch<T: Transport + ?Sized>(
	transport: &mut T,
	client: ClientId,
	buffers: &mut SharedBuffers,
	files: &mut FileTable<'_>,
	header: Header,
	path: &[u8],
) -> bool {
	if let Some(mut msg) = log_request(client, header) {
		msg.arg_path(path);
		msg.finish();
	}

	let op = Opcode(header.op);
	let is_ls_or_noop = op == Opcode::LS || op == Opcode::NOOP;
	let file_index = files.get_index(path);

	if file_index.is_none() && !is_ls_or_noop {
		return send_error(transport, client, path, error_code::FILE_NOT_FOUND, buffers.data_mut());
	}

	match op {
		Opcode::ERROR => send_noop_response(transport, client),
		Opcode::LS => list_files(transport, client, buffers, files),
		Opcode::NOOP => send_noop_response(transport, client),
		Opcode::READ | Opcode::WRITE => {
			let index = file_index.expect("checked above: LS/NOOP excepted, others require a resolved file");
			let dsize = header.dsize as usize;
			let (req_data, scratch) = buffers.data_mut().split_at_mut(dsize);
			let req = HandlerRequest { path, data: req_data };
			let slot = files.get(index).expect("index came from get_index on this table");
			let response = if op == Opcode::READ { slot.reader.call(req, scratch) } else { slot.writer.call(req, scratch) };
			let resp_header = Header { psize: response.path.len() as u32, dsize: response.data.len() as u32, op: op.response_of() };
			send_message(transport, client, resp_header, response.path, response.data)
		},
		_ if !op.is_illegal() => send_noop_response(transport, client),
		_ => send_error(transport, client, path, error_code::ILLEGAL_OPCODE, buffers.data_mut()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::ClientId;
	use crate::registry::{FileHandler, HandlerResponse};
	use crate::transport::mock::MockTransport;

	fn echo<'a>(req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a> {
		scratch[..req.data.len()].copy_from_slice(req.data);
		HandlerResponse { path: req.path, data: &scratch[..req.data.len()] }
	}

	fn client() -> (MockTransport, ClientId) {
		let mut t = MockTransport::new();
		let id = ClientId::new(1).unwrap();
		t.queue_accept(id);
		assert_eq!(t.accept(), Some(id));
		(t, id)
	}

	#[test]
	fn noop_round_trip() {
		let (mut t, c) = client();
		t.push_inbound(c, &[0, 0, 0, 0, 0, 0, 0, 0, 0]);
		let mut buffers = SharedBuffers::new(64, 64);
		let outcome = read_message(&mut t, c, &mut buffers, 10_000);
		let (header, path) = match outcome {
			ReadOutcome::Message { header, path, .. } => (header, path),
			ReadOutcome::Sentinel { .. } => panic!("expected message"),
		};
		let mut files = FileTable::new(1);
		assert!(dispatch(&mut t, c, &mut buffers, &mut files, header, path));
		assert_eq!(t.take_outbound(c), vec![0, 0, 0, 0, 0, 0, 0, 0, 0x80]);
	}

	#[test]
	fn ls_on_empty_registry() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let files = FileTable::new(1);
		assert!(list_files(&mut t, c, &mut buffers, &files));
		assert_eq!(t.take_outbound(c), vec![0, 0, 0, 0, 0, 0, 0, 0, 0x83]);
	}

	#[test]
	fn ls_with_one_file() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let mut files = FileTable::new(1);
		files.register(b"hi", &echo, &echo).unwrap();
		assert!(list_files(&mut t, c, &mut buffers, &files));
		let mut expected = vec![0, 0, 0, 0, 3, 0, 0, 0, 0x83];
		expected.extend_from_slice(b"hi\0");
		assert_eq!(t.take_outbound(c), expected);
	}

	#[test]
	fn read_unknown_file_reports_not_found() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let mut files = FileTable::new(1);
		files.register(b"hi", &echo, &echo).unwrap();
		let header = Header { psize: 2, dsize: 0, op: Opcode::READ.0 };
		assert!(dispatch(&mut t, c, &mut buffers, &mut files, header, b"no"));
		let mut expected = vec![2, 0, 0, 0, 2, 0, 0, 0, 0x84];
		expected.extend_from_slice(b"no");
		expected.extend_from_slice(&1000u16.to_le_bytes());
		assert_eq!(t.take_outbound(c), expected);
	}

	#[test]
	fn read_known_file_invokes_handler() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let mut files = FileTable::new(1);
		files.register(b"hi", &echo, &echo).unwrap();
		buffers.data_mut()[0] = b'X';
		let header = Header { psize: 2, dsize: 1, op: Opcode::READ.0 };
		assert!(dispatch(&mut t, c, &mut buffers, &mut files, header, b"hi"));
		let mut expected = vec![2, 0, 0, 0, 1, 0, 0, 0, 0x81];
		expected.extend_from_slice(b"hi");
		expected.push(b'X');
		assert_eq!(t.take_outbound(c), expected);
	}

	#[test]
	fn illegal_opcode_errors() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let mut files = FileTable::new(1);
		let header = Header { psize: 0, dsize: 0, op: 30 };
		assert!(dispatch(&mut t, c, &mut buffers, &mut files, header, b""));
		let mut expected = vec![0, 0, 0, 0, 2, 0, 0, 0, 0x84];
		expected.extend_from_slice(&3003u16.to_le_bytes());
		assert_eq!(t.take_outbound(c), expected);
	}

	#[test]
	fn reserved_range_unknown_opcode_is_silent_noop() {
		let (mut t, c) = client();
		let mut buffers = SharedBuffers::new(64, 64);
		let mut files = FileTable::new(1);
		let header = Header { psize: 0, dsize: 0, op: 29 };
		assert!(dispatch(&mut t, c, &mut buffers, &mut files, header, b""));
		assert_eq!(t.take_outbound(c), vec![0, 0, 0, 0, 0, 0, 0, 0, 0x80]);
	}

	#[test]
	fn oversize_over_hard_limit_drops_without_reply() {
		let (mut t, c) = client();
		let mut header = [0u8; HEADER_LEN];
		header[4..8].copy_from_slice(&20_000u32.to_le_bytes());
		header[8] = 2;
		t.push_inbound(c, &header);
		let mut buffers = SharedBuffers::new(64, 64);
		match read_message(&mut t, c, &mut buffers, 10_000) {
			ReadOutcome::Sentinel { drop_client: true } => {},
			_ => panic!("expected a drop sentinel"),
		}
		assert!(t.take_outbound(c).is_empty());
	}

	#[test]
	fn oversize_within_hard_limit_drains_and_keeps_client() {
		let (mut t, c) = client();
		let mut header = [0u8; HEADER_LEN];
		header[4..8].copy_from_slice(&100u32.to_le_bytes());
		header[8] = 2;
		t.push_inbound(c, &header);
		t.push_inbound(c, &vec![0xAB; 100]);
		let mut buffers = SharedBuffers::new(64, 16);
		match read_message(&mut t, c, &mut buffers, 10_000) {
			ReadOutcome::Sentinel { drop_client: false } => {},
			_ => panic!("expected a kept sentinel"),
		}
		let mut expected = vec![0, 0, 0, 0, 2, 0, 0, 0, 0x84];
		expected.extend_from_slice(&1u16.to_le_bytes());
		assert_eq!(t.take_outbound(c), expected);
	}

	#[test]
	fn short_header_read_drops_after_notifying() {
		let (mut t, c) = client();
		t.push_inbound(c, &[0, 0, 0]);
		let mut buffers = SharedBuffers::new(64, 64);
		match read_message(&mut t, c, &mut buffers, 10_000) {
			ReadOutcome::Sentinel { drop_client: true } => {},
			_ => panic!("expected a drop sentinel"),
		}
		let mut expected = vec![0, 0, 0, 0, 2, 0, 0, 0, 0x84];
		expected.extend_from_slice(&3u16.to_le_bytes());
		assert_eq!(t.take_outbound(c), expected);
	}
}
