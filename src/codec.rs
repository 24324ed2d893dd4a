//! The 9-byte MFS header and the opcode constants carried on the wire.
//!
//! Framing, little-endian throughout:
//!
//! ```text
//! byte 0..3  psize (u32)
//! byte 4..7  dsize (u32)
//! byte 8     op    (u8)
//! ```
//!
//! followed on the wire by `psize` bytes of path and `dsize` bytes of data.
//! There is no other framing; the header is pure and total over any 9-byte
//! buffer.

/// Size of the fixed header, in bytes.
pub const HEADER_LEN: usize = 9;

/// Opcode values at or above this are "illegal" and produce an error
/// response; values below it that aren't one of the defined request
/// opcodes are treated as NOOP (forward-compatibility range).
pub const RESERVED_OP_RANGE: u8 = 30;

/// High bit set on a request opcode to form the matching response opcode.
const RESPONSE_BIT: u8 = 0x80;

/// Request opcodes a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u8);

impl Opcode {
	pub const NOOP: Opcode = Opcode(0);
	pub const READ: Opcode = Opcode(1);
	pub const WRITE: Opcode = Opcode(2);
	pub const LS: Opcode = Opcode(3);
	pub const ERROR: Opcode = Opcode(4);

	/// Response opcode: the request opcode with its high bit set.
	pub const fn response_of(self) -> u8 {
		self.0 | RESPONSE_BIT
	}

	/// Whether this opcode is `>= RESERVED_OP_RANGE`, and therefore illegal.
	pub const fn is_illegal(self) -> bool {
		self.0 >= RESERVED_OP_RANGE
	}
}

/// Defined error codes (spec.md §6).
pub mod error_code {
	/// Request too large for the server's scratch buffers, but within the
	/// hard limit; the body was drained and the client is kept.
	pub const TOO_LARGE_FOR_BUFFERS: u16 = 1;
	/// A header read came back short.
	pub const HEADER_READ_FAILED: u16 = 3;
	/// `READ`/`WRITE` named a file that isn't registered.
	pub const FILE_NOT_FOUND: u16 = 1000;
	/// The client's deadline expired.
	pub const DEADLINE_EXPIRED: u16 = 3000;
	/// The request opcode was `>= RESERVED_OP_RANGE`.
	pub const ILLEGAL_OPCODE: u16 = 3003;
}

/// A decoded 9-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	pub psize: u32,
	pub dsize: u32,
	pub op: u8,
}

impl Header {
	/// Decode a header from its wire representation.
	pub fn decode(buf: [u8; HEADER_LEN]) -> Self {
		let psize = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
		let dsize = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
		let op = buf[8];
		Self { psize, dsize, op }
	}

	/// Encode this header to its wire representation.
	pub fn encode(self) -> [u8; HEADER_LEN] {
		let mut buf = [0u8; HEADER_LEN];
		buf[0..4].copy_from_slice(&self.psize.to_le_bytes());
		buf[4..8].copy_from_slice(&self.dsize.to_le_bytes());
		buf[8] = self.op;
		buf
	}
}
