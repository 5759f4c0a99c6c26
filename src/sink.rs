//! Byte sinks and the factories that open them.
//!
//! A [`SinkFactory`] is the only transport-specific piece of a resilient
//! stream: it knows how to open a brand-new [`Sink`] and how to describe it.
//! The stream owns whatever the factory returns and replaces it wholesale
//! when it breaks.

use std::io::{self, Write};

use crate::error::OpenError;

/// Minimal byte-sink contract.
pub trait Sink: Send {
    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Push buffered bytes to the underlying destination.
    fn flush(&mut self) -> io::Result<()>;

    /// Release the sink. Called at most once by the stream; the sink is
    /// dropped immediately afterwards.
    fn close(&mut self) -> io::Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Transport strategy for acquiring sinks.
pub trait SinkFactory: Send {
    type Sink: Sink;

    /// Open a fresh sink. Each call yields a new, independent sink.
    fn open_sink(&mut self) -> Result<Self::Sink, OpenError>;

    /// Human-readable identity of the sink for diagnostics. Must not depend on
    /// whether a sink was ever opened successfully.
    fn describe(&self) -> String;
}

/// Adapts any [`Write`] implementation into a [`Sink`].
///
/// Closing flushes the writer; the writer itself is released on drop.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
