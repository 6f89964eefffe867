//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use crate::limits::MAX_LINE_LENGTH;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

/// SMTP stream (plain TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::server::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Wraps a freshly accepted TCP connection.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    /// True once the stream runs over TLS.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads one line, bounded by the line-length ceiling.
    ///
    /// Returns `None` on a clean EOF. The trailing CRLF is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] if no line terminator appears
    /// within the ceiling; the offending bytes up to the next newline
    /// are drained so the caller can keep the dialog in sync. I/O
    /// failures surface as [`Error::Io`].
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let limit = MAX_LINE_LENGTH as u64;

        let n = match self {
            Self::Tcp(reader) => (&mut *reader).take(limit).read_line(&mut line).await?,
            Self::Tls(reader) => (&mut **reader).take(limit).read_line(&mut line).await?,
        };

        if n == 0 {
            return Ok(None);
        }

        if !line.ends_with('\n') && n >= MAX_LINE_LENGTH {
            self.drain_line().await?;
            return Err(Error::LineTooLong);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Discards input until the next newline or EOF.
    ///
    /// Works buffer by buffer without accumulating the discarded bytes,
    /// so an unterminated line cannot grow memory.
    async fn drain_line(&mut self) -> Result<()> {
        loop {
            let (newline_found, used) = match self {
                Self::Tcp(reader) => scan_for_newline(reader.fill_buf().await?),
                Self::Tls(reader) => scan_for_newline(reader.fill_buf().await?),
            };
            if used == 0 {
                return Ok(());
            }
            match self {
                Self::Tcp(reader) => reader.consume(used),
                Self::Tls(reader) => reader.consume(used),
            }
            if newline_found {
                return Ok(());
            }
        }
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a plaintext stream to TLS via the acceptor.
    ///
    /// Dropping the old `BufReader` discards anything the client sent
    /// ahead of the handshake, so no pre-upgrade plaintext can smuggle
    /// a command into the encrypted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the
    /// handshake fails; in both cases the connection is unusable.
    pub async fn upgrade_to_tls(self, acceptor: &TlsAcceptor) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::TlsAlreadyActive),
        };

        let tls_stream = acceptor.accept(tcp_stream).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Returns whether the buffer holds a newline and how many bytes to
/// discard, up to and including it.
fn scan_for_newline(buf: &[u8]) -> (bool, usize) {
    buf.iter()
        .position(|&b| b == b'\n')
        .map_or((false, buf.len()), |pos| (true, pos + 1))
}
