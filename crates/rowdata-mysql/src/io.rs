//! Byte source and session collaborators.
//!
//! The decoder does not own a connection. It reads through a [`ByteSource`]
//! and keeps protocol state (sequence counter, active-result flag) on a
//! [`Session`] supplied by whoever issued the query.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// A blocking stream of bytes from the server.
pub trait ByteSource {
    /// Apply a read timeout. `None` blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    ///
    /// `ErrorKind::Interrupted` is retried by the framer; every other error
    /// is fatal for the connection.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Shut the stream down in both directions.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl ByteSource for TcpStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Adapts any `Read` (captured traffic, an in-memory buffer) into a
/// byte source. Timeouts are ignored.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
    closed: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.inner.read(buf)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Per-connection protocol state the decoder reads and updates.
pub trait Session {
    /// The live byte source, or `None` once the connection is closed.
    fn byte_source(&mut self) -> Option<&mut dyn ByteSource>;

    /// Timeout applied to the byte source before each read.
    fn read_timeout(&self) -> Option<Duration>;

    /// Next sequence id expected from the server.
    fn sequence_id(&self) -> u8;

    fn set_sequence_id(&mut self, sequence_id: u8);

    /// Force-close the connection. Best effort: failures are not reported.
    fn abort(&mut self);

    /// Whether an unbuffered result is still being streamed.
    fn unbuffered_active(&self) -> bool {
        true
    }

    fn set_unbuffered_active(&mut self, _active: bool) {}
}

/// A session over a concrete byte source.
#[derive(Debug)]
pub struct WireSession<S> {
    source: Option<S>,
    read_timeout: Option<Duration>,
    sequence_id: u8,
    unbuffered_active: bool,
}

impl<S: ByteSource> WireSession<S> {
    /// Wrap a source whose next packet carries `sequence_id`.
    pub fn new(source: S, sequence_id: u8) -> Self {
        Self {
            source: Some(source),
            read_timeout: None,
            sequence_id,
            unbuffered_active: true,
        }
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn into_source(self) -> Option<S> {
        self.source
    }
}

impl<S: ByteSource> Session for WireSession<S> {
    fn byte_source(&mut self) -> Option<&mut dyn ByteSource> {
        self.source.as_mut().map(|s| s as &mut dyn ByteSource)
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn set_sequence_id(&mut self, sequence_id: u8) {
        self.sequence_id = sequence_id;
    }

    fn abort(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Err(e) = source.shutdown() {
                tracing::warn!(error = %e, "shutdown of aborted connection failed");
            }
        }
        self.unbuffered_active = false;
    }

    fn unbuffered_active(&self) -> bool {
        self.unbuffered_active
    }

    fn set_unbuffered_active(&mut self, active: bool) {
        self.unbuffered_active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingShutdown;

    impl ByteSource for FailingShutdown {
        fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn shutdown(&mut self) -> io::Result<()> {
            Err(io::Error::other("already reset"))
        }
    }

    #[test]
    fn test_reader_source_reads_until_shutdown() {
        let mut source = ReaderSource::new(Cursor::new(vec![1, 2, 3]));
        let mut buf = [0u8; 2];
        assert_eq!(ByteSource::read(&mut source, &mut buf).unwrap(), 2);
        source.shutdown().unwrap();
        assert!(source.is_closed());
        assert!(ByteSource::read(&mut source, &mut buf).is_err());
    }

    #[test]
    fn test_wire_session_abort_drops_source() {
        let mut session = WireSession::new(ReaderSource::new(Cursor::new(Vec::new())), 1)
            .with_read_timeout(Duration::from_secs(5));
        assert_eq!(session.sequence_id(), 1);
        assert_eq!(session.read_timeout(), Some(Duration::from_secs(5)));
        assert!(session.byte_source().is_some());

        session.abort();
        assert!(session.is_closed());
        assert!(session.byte_source().is_none());
        assert!(!session.unbuffered_active());
    }

    #[test]
    fn test_abort_swallows_shutdown_error() {
        let mut session = WireSession::new(FailingShutdown, 0);
        session.abort();
        assert!(session.is_closed());
    }
}
