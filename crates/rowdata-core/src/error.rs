//! Error types for result-set decoding.

use std::fmt;

/// The primary error type for all decoding operations.
#[derive(Debug)]
pub enum Error {
    /// The byte stream to the server is gone (short read, I/O failure)
    Connection(ConnectionError),
    /// Wire-level inconsistencies (sequence mismatch, unknown type codes)
    Protocol(ProtocolError),
    /// The server answered with an error packet
    Server(ServerError),
    /// A cell could not be turned into a value
    Decode(DecodeError),
    /// A buffer could not be grown
    Allocation(AllocationError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors that were not classified as a lost connection
    Io(std::io::Error),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Connection lost while reading a result set
    Lost,
    /// The connection was already closed by an earlier failure
    Closed,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Packet sequence number did not match the expected value
    SequenceMismatch,
    /// Column metadata carries a type code the decoder does not know
    UnknownTypeCode,
    /// A packet could not be parsed
    MalformedPacket,
    /// The result set can no longer be read (after a fatal error)
    ResultAborted,
}

/// Error reported by the server in an ERR packet.
#[derive(Debug, Clone)]
pub struct ServerError {
    /// Server error code
    pub code: u16,
    /// SQL state (5 characters, may be empty)
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

#[derive(Debug)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub column: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Bytes are not valid in the column's declared encoding
    Encoding,
    /// A custom converter rejected the cell
    Converter,
    /// Typed access asked for a type the value cannot become
    Type,
}

#[derive(Debug)]
pub struct AllocationError {
    pub requested: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Is this an error after which the connection cannot be used anymore?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Io(_) => true,
            Error::Protocol(p) => p.kind == ProtocolErrorKind::SequenceMismatch,
            _ => false,
        }
    }

    /// Fatal errors leave the result set unreadable. Server errors do not:
    /// the connection stays usable per protocol semantics.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Server(_) | Error::Config(_))
    }

    /// Server error code, if this came from an ERR packet.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server(s) => Some(s.code),
            _ => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "23000" for a duplicate key)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(s) if !s.sql_state.is_empty() => Some(s.sql_state.as_str()),
            _ => None,
        }
    }
}

impl ServerError {
    /// Check if this is a unique constraint violation.
    pub fn is_duplicate_key(&self) -> bool {
        // ER_DUP_ENTRY
        self.code == 1062
    }

    /// Check if this is a foreign key constraint violation.
    pub fn is_foreign_key_violation(&self) -> bool {
        self.code == 1451 || self.code == 1452
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Server(e) => {
                if e.sql_state.is_empty() {
                    write!(f, "Server error {}: {}", e.code, e.message)
                } else {
                    write!(
                        f,
                        "Server error {} (SQLSTATE {}): {}",
                        e.code, e.sql_state, e.message
                    )
                }
            }
            Error::Decode(e) => {
                if let Some(col) = &e.column {
                    write!(f, "Decode error in column '{}': {}", col, e.message)
                } else {
                    write!(f, "Decode error: {}", e.message)
                }
            }
            Error::Allocation(e) => write!(f, "Allocation error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Decode(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::Server(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<AllocationError> for Error {
    fn from(err: AllocationError) -> Self {
        Error::Allocation(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Error::Allocation(AllocationError {
            requested: 0,
            message: err.to_string(),
        })
    }
}

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;
