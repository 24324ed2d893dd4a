use clap::Parser;
use log::info;
use mfs_server::registry::{HandlerRequest, HandlerResponse};
use mfs_server::server::{Server, ServerConfig};
use mfs_server::transport::tcp::TcpTransport;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

/// MFS file-service demo server
#[derive(Debug, Parser)]
struct Args {
	/// Address to listen on
	#[clap(long, default_value = "127.0.0.1:7732")]
	listen: SocketAddr,

	/// Milliseconds of client inactivity before a connection is dropped
	#[clap(long, default_value_t = mfs_server::server::DEFAULT_TIMEOUT_MS)]
	timeout_ms: u64,

	/// Largest request the server will accept before dropping the client
	#[clap(long, default_value_t = mfs_server::server::DEFAULT_HARD_LIMIT)]
	hard_limit: u32,
}

/// An in-memory scratch file: `READ` returns its current contents, `WRITE`
/// replaces them and echoes back what was stored.
static SCRATCH: Mutex<Vec<u8>> = Mutex::new(Vec::new());

fn read_scratch<'a>(req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a> {
	let contents = SCRATCH.lock().unwrap();
	let n = contents.len().min(scratch.len());
	scratch[..n].copy_from_slice(&contents[..n]);
	HandlerResponse { path: req.path, data: &scratch[..n] }
}

fn write_scratch<'a>(req: HandlerRequest<'a>, scratch: &'a mut [u8]) -> HandlerResponse<'a> {
	*SCRATCH.lock().unwrap() = req.data.to_vec();
	let n = req.data.len().min(scratch.len());
	scratch[..n].copy_from_slice(&req.data[..n]);
	HandlerResponse { path: req.path, data: &scratch[..n] }
}

fn main() -> io::Result<()> {
	mfs_server::logger::init();

	let Args { listen, timeout_ms, hard_limit } = Args::parse();

	let transport = TcpTransport::bind(listen)?;
	info!("listening on {listen}");

	let config = ServerConfig { timeout_ms, hard_limit, ..ServerConfig::default() };
	let mut server = Server::new(transport, config);
	server.files_mut().register(b"scratch", &read_scratch, &write_scratch).expect("fresh table has room for one file");

	loop {
		server.tick();
		sleep(Duration::from_millis(10));
	}
}
