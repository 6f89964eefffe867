//! Connection transport: plain/TLS streams and TLS configuration.

mod stream;
mod tls;

pub use stream::SmtpStream;
pub use tls::{build_acceptor, load_server_config};
