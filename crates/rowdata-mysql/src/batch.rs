//! Batch driver.
//!
//! A [`DecoderState`] owns everything needed to decode one result set:
//! column descriptors, options, output buffers and counters. Each call to
//! [`DecoderState::fetch_batch`] pulls packets through the framer until the
//! requested number of rows has been decoded or the result ends.
//!
//! # States
//!
//! ```text
//! Fresh -> Streaming -> EofReached
//!                   \-> Errored
//! ```
//!
//! A state may stream any number of batches. Reaching EOF or failing is
//! terminal.

use rowdata_core::{Error, ProtocolError, ProtocolErrorKind, Result};

use crate::columnar::{ColumnarBatch, ColumnarBuffers};
use crate::config::DecoderOptions;
use crate::io::Session;
use crate::protocol::{EofPacket, Frame, next_packet};
use crate::row::{RowAssembler, RowRecord, output_names};
use crate::types::ColumnDescriptor;

/// Where a result set is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No packet consumed yet
    Fresh,
    /// Rows have been read and more may follow
    Streaming,
    /// The EOF packet has been read
    EofReached,
    /// The server or the connection failed mid-result
    Errored,
}

/// Rows produced by one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputBatch {
    Rows(Vec<RowRecord>),
    /// Every row decoded so far, one buffer per column
    Columnar(ColumnarBatch),
}

impl OutputBatch {
    /// Rows in this batch (for columnar output, the shared shape).
    pub fn len(&self) -> usize {
        match self {
            OutputBatch::Rows(rows) => rows.len(),
            OutputBatch::Columnar(batch) => batch.shape(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Option<&[RowRecord]> {
        match self {
            OutputBatch::Rows(rows) => Some(rows),
            OutputBatch::Columnar(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<RowRecord>> {
        match self {
            OutputBatch::Rows(rows) => Some(rows),
            OutputBatch::Columnar(_) => None,
        }
    }

    pub fn columnar(&self) -> Option<&ColumnarBatch> {
        match self {
            OutputBatch::Columnar(batch) => Some(batch),
            OutputBatch::Rows(_) => None,
        }
    }
}

/// Decoding state of one result set.
#[derive(Debug)]
pub struct DecoderState {
    columns: Vec<ColumnDescriptor>,
    options: DecoderOptions,
    assembler: RowAssembler,
    columnar: Option<ColumnarBuffers>,
    state: BatchState,
    rows_read: u64,
    invalid_cells: u64,
    eof: Option<EofPacket>,
}

impl DecoderState {
    /// Prepare to decode rows described by `columns`.
    ///
    /// Columnar buffers are allocated here, so this fails only when they
    /// cannot be.
    pub fn new(columns: Vec<ColumnDescriptor>, options: DecoderOptions) -> Result<Self> {
        let names = output_names(&columns);
        let columnar = if options.results_type.is_columnar() {
            Some(ColumnarBuffers::new(
                &columns,
                names.clone(),
                options.initial_capacity,
            )?)
        } else {
            None
        };
        Ok(Self {
            assembler: RowAssembler::new(names, options.results_type),
            columns,
            options,
            columnar,
            state: BatchState::Fresh,
            rows_read: 0,
            invalid_cells: 0,
            eof: None,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Whether no more rows can be read: EOF was seen or the result failed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, BatchState::EofReached | BatchState::Errored)
    }

    /// Rows decoded over the whole result set.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Malformed temporal cells resolved by fallback so far.
    pub fn invalid_cells(&self) -> u64 {
        self.invalid_cells
    }

    /// Warning count from the EOF packet (0 before EOF).
    pub fn warnings(&self) -> u16 {
        self.eof.map_or(0, |eof| eof.warnings)
    }

    /// Whether the server announced another result set after this one.
    pub fn has_more_results(&self) -> bool {
        self.eof.is_some_and(|eof| eof.has_more_results())
    }

    /// Columnar buffer capacity in rows, if columnar output is selected.
    pub fn columnar_capacity(&self) -> Option<usize> {
        self.columnar.as_ref().map(ColumnarBuffers::capacity)
    }

    /// Number of columnar buffer growths so far.
    pub fn columnar_growths(&self) -> usize {
        self.columnar.as_ref().map_or(0, ColumnarBuffers::growths)
    }

    /// Decode up to `max_rows` rows (0 reads until EOF).
    ///
    /// Returns `Ok(None)` in unbuffered mode when the session has no active
    /// result, or when the result ends without yielding a row. After EOF a
    /// buffered state returns empty batches.
    ///
    /// The session's sequence id is read at the start and the advanced
    /// value written back at the end, whether or not the fetch succeeds.
    /// A failure other than a server ERR packet closes the connection,
    /// since the rest of the result is left unread.
    #[tracing::instrument(level = "debug", skip(self, session))]
    pub fn fetch_batch<S: Session + ?Sized>(
        &mut self,
        session: &mut S,
        max_rows: usize,
    ) -> Result<Option<OutputBatch>> {
        if self.state == BatchState::Errored {
            return Err(Error::Protocol(ProtocolError {
                kind: ProtocolErrorKind::ResultAborted,
                message: "result set was aborted by an earlier error".to_string(),
                raw_data: None,
            }));
        }
        let unbuffered = self.options.unbuffered;
        if unbuffered && !session.unbuffered_active() {
            return Ok(None);
        }
        if self.state == BatchState::EofReached {
            return Ok(if unbuffered { None } else { Some(self.output(Vec::new())) });
        }

        tracing::debug!(
            mode = self.options.results_type.name(),
            unbuffered,
            "starting batch"
        );
        self.state = BatchState::Streaming;
        let mut seq = session.sequence_id();
        let outcome = self.stream(session, &mut seq, max_rows);
        session.set_sequence_id(seq);

        let (rows, batch_rows) = match outcome {
            Ok(out) => out,
            Err(e) => {
                self.state = BatchState::Errored;
                session.set_unbuffered_active(false);
                // An ERR packet ends the result; anything else leaves rows unread
                if !matches!(e, Error::Server(_)) && session.byte_source().is_some() {
                    tracing::warn!(error = %e, "closing connection after failed batch");
                    session.abort();
                }
                return Err(e);
            }
        };

        let eof = self.state == BatchState::EofReached;
        tracing::debug!(
            rows = batch_rows,
            total = self.rows_read,
            eof,
            "finished batch"
        );

        if unbuffered && eof && batch_rows == 0 {
            return Ok(None);
        }
        Ok(Some(self.output(rows)))
    }

    /// Pull packets until `max_rows` rows are decoded or the result ends.
    ///
    /// Returns the row records (empty in columnar mode, where rows go to
    /// the buffers) and the number of rows decoded.
    fn stream<S: Session + ?Sized>(
        &mut self,
        session: &mut S,
        seq: &mut u8,
        max_rows: usize,
    ) -> Result<(Vec<RowRecord>, usize)> {
        let mut rows = Vec::new();
        let mut batch_rows = 0usize;

        while max_rows == 0 || batch_rows < max_rows {
            match next_packet(session, seq)? {
                Frame::Eof(eof) => {
                    self.eof = Some(eof);
                    self.state = BatchState::EofReached;
                    session.set_unbuffered_active(false);
                    break;
                }
                Frame::Error(err) => {
                    return Err(Error::Server(err.into()));
                }
                Frame::Data(packet) => {
                    let malformed = match &mut self.columnar {
                        Some(buffers) => buffers.push_row(&packet.payload, &self.columns, &self.options),
                        None => self
                            .assembler
                            .read_row(&packet.payload, &self.columns, &self.options)
                            .map(|(record, malformed)| {
                                rows.push(record);
                                malformed
                            }),
                    };
                    let malformed = malformed?;
                    self.invalid_cells += malformed as u64;
                    self.rows_read += 1;
                    batch_rows += 1;
                }
            }
        }

        Ok((rows, batch_rows))
    }

    fn output(&self, rows: Vec<RowRecord>) -> OutputBatch {
        match &self.columnar {
            Some(buffers) => OutputBatch::Columnar(buffers.snapshot()),
            None => OutputBatch::Rows(rows),
        }
    }
}

/// Create the decoding state for a result set described by `columns`.
pub fn start_batch(columns: Vec<ColumnDescriptor>, options: DecoderOptions) -> Result<DecoderState> {
    DecoderState::new(columns, options)
}

/// Decode up to `max_rows` rows (0 reads until EOF). See
/// [`DecoderState::fetch_batch`].
pub fn fetch_batch<S: Session + ?Sized>(
    state: &mut DecoderState,
    session: &mut S,
    max_rows: usize,
) -> Result<Option<OutputBatch>> {
    state.fetch_batch(session, max_rows)
}

pub fn is_exhausted(state: &DecoderState) -> bool {
    state.is_exhausted()
}
