//! Packet framing over a [`Session`]'s byte source.
//!
//! Reads one logical packet (reassembling maximum-size continuations),
//! validates the cyclic sequence counter on every sub-packet and classifies
//! the result as row data, EOF or ERR.

use std::io;

use rowdata_core::{
    AllocationError, ConnectionError, ConnectionErrorKind, Error, ProtocolError,
    ProtocolErrorKind, Result,
};

use crate::io::{ByteSource, Session};
use crate::protocol::{EofPacket, ErrPacket, PacketHeader, PacketReader, PacketType};

/// One reassembled logical packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence id of the first sub-packet
    pub sequence_id: u8,
    pub payload: Vec<u8>,
}

/// A classified packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Packet),
    Eof(EofPacket),
    Error(ErrPacket),
}

/// Read the next logical packet from `session`.
///
/// `expected_seq` is checked against every sub-packet and advanced past the
/// last one. Any failure other than an ERR packet from the server closes
/// the connection before it is returned.
pub fn next_packet<S: Session + ?Sized>(session: &mut S, expected_seq: &mut u8) -> Result<Frame> {
    let mut payload: Vec<u8> = Vec::new();
    let first_seq = *expected_seq;

    loop {
        let mut header_buf = [0u8; PacketHeader::SIZE];
        read_full(session, &mut header_buf)?;
        let header = PacketHeader::from_bytes(&header_buf);

        if header.sequence_id != *expected_seq {
            return Err(sequence_error(session, header.sequence_id, *expected_seq));
        }
        *expected_seq = expected_seq.wrapping_add(1);

        let len = header.payload_length as usize;
        tracing::trace!(len, sequence_id = header.sequence_id, "read packet header");

        if len > 0 {
            if let Err(e) = payload.try_reserve_exact(len) {
                session.abort();
                return Err(Error::Allocation(AllocationError {
                    requested: payload.len() + len,
                    message: format!("cannot buffer packet payload: {}", e),
                }));
            }
            let start = payload.len();
            payload.resize(start + len, 0);
            read_full(session, &mut payload[start..])?;
        }

        if !header.is_continued() {
            break;
        }
    }

    match PacketType::of_payload(&payload) {
        PacketType::Data => Ok(Frame::Data(Packet {
            sequence_id: first_seq,
            payload,
        })),
        PacketType::Eof => Ok(Frame::Eof(PacketReader::new(&payload).parse_eof_packet())),
        PacketType::Error => match PacketReader::new(&payload).parse_err_packet() {
            Some(err) => Ok(Frame::Error(err)),
            None => {
                session.abort();
                Err(Error::Protocol(ProtocolError {
                    kind: ProtocolErrorKind::MalformedPacket,
                    message: "truncated error packet".to_string(),
                    raw_data: Some(payload),
                }))
            }
        },
    }
}

/// Fill `buf` completely, closing the connection on failure.
fn read_full<S: Session + ?Sized>(session: &mut S, buf: &mut [u8]) -> Result<()> {
    let timeout = session.read_timeout();
    let outcome = match session.byte_source() {
        Some(source) => fill(source, timeout, buf),
        None => {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Closed,
                message: "connection already closed".to_string(),
                source: None,
            }));
        }
    };
    outcome.map_err(|e| connection_lost(session, e))
}

fn fill(
    source: &mut dyn ByteSource,
    timeout: Option<std::time::Duration>,
    buf: &mut [u8],
) -> io::Result<()> {
    source.set_timeout(timeout)?;
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short read: {} of {} bytes", filled, buf.len()),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn connection_lost<S: Session + ?Sized>(session: &mut S, err: io::Error) -> Error {
    tracing::warn!(error = %err, "closing connection after read failure");
    session.abort();
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Lost,
        message: "Lost connection to MySQL server during query".to_string(),
        source: Some(Box::new(err)),
    })
}

/// A server that dropped the query restarts numbering at 0; anything else
/// is a desync.
fn sequence_error<S: Session + ?Sized>(session: &mut S, got: u8, expected: u8) -> Error {
    tracing::warn!(got, expected, "closing connection after sequence mismatch");
    session.abort();
    if got == 0 {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Lost,
            message: "Lost connection to MySQL server during query".to_string(),
            source: None,
        })
    } else {
        Error::Protocol(ProtocolError {
            kind: ProtocolErrorKind::SequenceMismatch,
            message: format!(
                "Packet sequence number wrong - got {} expected {}",
                got, expected
            ),
            raw_data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ReaderSource, WireSession};
    use crate::protocol::writer::{build_packet_from_payload, eof_payload, err_payload};
    use std::io::Cursor;
    use std::time::Duration;

    fn session(bytes: Vec<u8>, seq: u8) -> WireSession<ReaderSource<Cursor<Vec<u8>>>> {
        WireSession::new(ReaderSource::new(Cursor::new(bytes)), seq)
    }

    /// Hands out one byte per read and interrupts every other call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        interrupt: bool,
        timeouts_set: usize,
    }

    impl ByteSource for Trickle {
        fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            self.timeouts_set += 1;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }

        fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_data_packet() {
        let mut s = session(build_packet_from_payload(b"\x0242", 3), 3);
        let mut seq = 3;
        let frame = next_packet(&mut s, &mut seq).unwrap();
        assert_eq!(
            frame,
            Frame::Data(Packet {
                sequence_id: 3,
                payload: b"\x0242".to_vec()
            })
        );
        assert_eq!(seq, 4);
    }

    #[test]
    fn test_eof_and_error_classification() {
        let mut bytes = build_packet_from_payload(&eof_payload(2, 0x0008), 0);
        bytes.extend(build_packet_from_payload(
            &err_payload(1064, "42000", "syntax"),
            1,
        ));
        let mut s = session(bytes, 0);
        let mut seq = 0;

        match next_packet(&mut s, &mut seq).unwrap() {
            Frame::Eof(eof) => {
                assert_eq!(eof.warnings, 2);
                assert!(eof.has_more_results());
            }
            other => panic!("expected EOF, got {other:?}"),
        }
        match next_packet(&mut s, &mut seq).unwrap() {
            Frame::Error(err) => {
                assert_eq!(err.error_code, 1064);
                assert_eq!(err.sql_state, "42000");
                assert_eq!(err.error_message, "syntax");
            }
            other => panic!("expected ERR, got {other:?}"),
        }
        assert!(!s.is_closed());
    }

    #[test]
    fn test_sequence_wraps_after_255() {
        let mut bytes = build_packet_from_payload(b"\x01a", 255);
        bytes.extend(build_packet_from_payload(b"\x01b", 0));
        let mut s = session(bytes, 255);
        let mut seq = 255;
        assert!(matches!(next_packet(&mut s, &mut seq).unwrap(), Frame::Data(_)));
        assert_eq!(seq, 0);
        assert!(matches!(next_packet(&mut s, &mut seq).unwrap(), Frame::Data(_)));
        assert_eq!(seq, 1);
    }

    #[test]
    fn test_sequence_mismatch_aborts() {
        let mut s = session(build_packet_from_payload(b"\x01a", 7), 5);
        let mut seq = 5;
        let err = next_packet(&mut s, &mut seq).unwrap_err();
        match err {
            Error::Protocol(p) => assert_eq!(p.kind, ProtocolErrorKind::SequenceMismatch),
            other => panic!("unexpected error: {other}"),
        }
        assert!(s.is_closed());
    }

    #[test]
    fn test_sequence_zero_is_lost_connection() {
        let mut s = session(build_packet_from_payload(b"\x01a", 0), 5);
        let mut seq = 5;
        let err = next_packet(&mut s, &mut seq).unwrap_err();
        match err {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Lost),
            other => panic!("unexpected error: {other}"),
        }
        assert!(s.is_closed());
    }

    #[test]
    fn test_short_read_is_lost_connection() {
        let mut bytes = build_packet_from_payload(b"\x05hello", 0);
        bytes.truncate(bytes.len() - 2);
        let mut s = session(bytes, 0);
        let mut seq = 0;
        let err = next_packet(&mut s, &mut seq).unwrap_err();
        assert!(err.is_connection_error());
        assert!(s.is_closed());

        // A second read finds the connection closed
        let err = next_packet(&mut s, &mut seq).unwrap_err();
        match err {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Closed),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interrupted_reads_are_retried() {
        let source = Trickle {
            data: build_packet_from_payload(b"\x03abc", 1),
            pos: 0,
            interrupt: false,
            timeouts_set: 0,
        };
        let mut s = WireSession::new(source, 1);
        let mut seq = 1;
        match next_packet(&mut s, &mut seq).unwrap() {
            Frame::Data(p) => assert_eq!(p.payload, b"\x03abc"),
            other => panic!("unexpected frame: {other:?}"),
        }
        // One timeout per header read and per payload read
        assert_eq!(s.source().unwrap().timeouts_set, 2);
    }

    #[test]
    fn test_empty_payload_after_max_packet() {
        let payload = vec![b'x'; crate::protocol::MAX_PACKET_SIZE];
        let mut s = session(build_packet_from_payload(&payload, 0), 0);
        let mut seq = 0;
        match next_packet(&mut s, &mut seq).unwrap() {
            Frame::Data(p) => assert_eq!(p.payload.len(), crate::protocol::MAX_PACKET_SIZE),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert_eq!(seq, 2);
    }

    #[test]
    fn test_continuation_sequence_is_checked() {
        let max = crate::protocol::MAX_PACKET_SIZE;
        let payload = vec![b'x'; max + 10];
        let mut bytes = build_packet_from_payload(&payload, 4);
        // First chunk is fine, the continuation header claims 9 instead of 5
        let continuation_seq = PacketHeader::SIZE + max + 3;
        assert_eq!(bytes[continuation_seq], 5);
        bytes[continuation_seq] = 9;

        let mut s = session(bytes, 4);
        let mut seq = 4;
        match next_packet(&mut s, &mut seq).unwrap_err() {
            Error::Protocol(p) => {
                assert_eq!(p.kind, ProtocolErrorKind::SequenceMismatch);
                assert!(p.message.contains("got 9 expected 5"), "{}", p.message);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(s.is_closed());
        assert_eq!(seq, 5);
    }
}
