//! Ticket demultiplexing over one half-duplex PCIC connection.
//!
//! Replies to commands and unsolicited results share one byte stream. The
//! demultiplexer sends a command, then reads frames until the reply with the
//! same ticket shows up; `0000` frames seen on the way are queued for
//! [`TicketDemux::read_next_async`] in wire order.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Instant;

use sensorprims_frame::{Frame, FrameReader, FrameWriter, Ticket};

use crate::error::{PcicError, Result};

/// Default bound on queued asynchronous frames.
pub const DEFAULT_MAX_ASYNC_QUEUE: usize = 64;

/// A command that was written and whose reply has not been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCall {
    pub ticket: Ticket,
    pub sent_at: Instant,
}

pub struct TicketDemux<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    async_queue: VecDeque<Frame>,
    max_async_queue: usize,
    pending: Option<PendingCall>,
}

impl<R: Read, W: Write> TicketDemux<R, W> {
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self::with_queue_limit(reader, writer, DEFAULT_MAX_ASYNC_QUEUE)
    }

    pub fn with_queue_limit(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        max_async_queue: usize,
    ) -> Self {
        Self {
            reader,
            writer,
            async_queue: VecDeque::new(),
            max_async_queue,
            pending: None,
        }
    }

    /// Send `payload` under `ticket` and block until the matching reply arrives.
    ///
    /// If this call fails after the command was written, the call stays
    /// pending and every later `send_and_await` fails with
    /// [`PcicError::Desynchronized`].
    pub fn send_and_await(&mut self, ticket: Ticket, payload: &[u8]) -> Result<Frame> {
        if ticket.is_async() {
            return Err(PcicError::InvalidArgument(
                "ticket 0000 is reserved for asynchronous output".to_string(),
            ));
        }
        if let Some(pending) = self.pending {
            return Err(PcicError::Desynchronized {
                ticket: pending.ticket,
            });
        }

        self.pending = Some(PendingCall {
            ticket,
            sent_at: Instant::now(),
        });
        self.writer.send(ticket, payload)?;
        tracing::debug!(%ticket, len = payload.len(), "command sent");

        loop {
            let frame = self.reader.read_frame()?;
            if frame.ticket == ticket {
                if let Some(pending) = self.pending.take() {
                    tracing::debug!(
                        %ticket,
                        len = frame.body.len(),
                        elapsed = ?pending.sent_at.elapsed(),
                        "reply received"
                    );
                }
                return Ok(frame);
            }
            if frame.ticket.is_async() {
                self.enqueue(frame)?;
                continue;
            }
            tracing::warn!(
                expected = %ticket,
                got = %frame.ticket,
                len = frame.body.len(),
                "discarding frame with unexpected ticket"
            );
        }
    }

    /// Next unsolicited frame: queued ones first, then the stream.
    pub fn read_next_async(&mut self) -> Result<Frame> {
        if let Some(frame) = self.async_queue.pop_front() {
            return Ok(frame);
        }

        loop {
            let frame = self.reader.read_frame()?;
            if frame.ticket.is_async() {
                return Ok(frame);
            }
            match self.pending {
                Some(pending) if pending.ticket == frame.ticket => {
                    tracing::warn!(ticket = %frame.ticket, "late reply arrived, call no longer pending");
                    self.pending = None;
                }
                _ => tracing::warn!(
                    ticket = %frame.ticket,
                    len = frame.body.len(),
                    "discarding frame with unexpected ticket"
                ),
            }
        }
    }

    fn enqueue(&mut self, frame: Frame) -> Result<()> {
        if self.async_queue.len() >= self.max_async_queue {
            tracing::warn!(
                ticket = %frame.ticket,
                len = frame.body.len(),
                queued = self.async_queue.len(),
                limit = self.max_async_queue,
                "async queue full, dropping result"
            );
            return Err(PcicError::BufferFull(self.max_async_queue));
        }
        tracing::debug!(len = frame.body.len(), queued = self.async_queue.len() + 1, "queued async frame");
        self.async_queue.push_back(frame);
        Ok(())
    }

    /// The call in flight, if a previous call was interrupted.
    pub fn pending(&self) -> Option<&PendingCall> {
        self.pending.as_ref()
    }

    /// Number of asynchronous frames waiting in the queue.
    pub fn queued(&self) -> usize {
        self.async_queue.len()
    }

    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }

    pub fn writer(&self) -> &FrameWriter<W> {
        &self.writer
    }
}
