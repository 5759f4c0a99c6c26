//! A sink factory whose behaviour tests switch at runtime.
//!
//! The factory is moved into the stream under test while the paired
//! [`FactoryControl`] stays with the test to flip reachability, break sinks
//! and inspect what each sink received.

use std::{io, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::OpenError,
    sink::{Sink, SinkFactory},
};

#[derive(Debug, Default)]
struct Script {
    unreachable: bool,
    writes_fail: bool,
    flush_fails: bool,
    close_fails: bool,
    opens: usize,
    closes: usize,
    sinks: Vec<SinkRecord>,
}

#[derive(Debug, Default)]
struct SinkRecord {
    bytes: Vec<u8>,
    writes: usize,
    broken: bool,
}

/// Factory handing out in-memory sinks that fail on demand.
#[derive(Debug)]
pub struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
    description: String,
}

/// Test-side handle to a [`ScriptedFactory`].
#[derive(Clone, Debug)]
pub struct FactoryControl {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFactory {
    /// Create a reachable factory describing itself as `description`.
    pub fn new(description: impl Into<String>) -> (Self, FactoryControl) {
        let script = Arc::new(Mutex::new(Script::default()));
        let factory = Self {
            script: Arc::clone(&script),
            description: description.into(),
        };
        (factory, FactoryControl { script })
    }
}

impl SinkFactory for ScriptedFactory {
    type Sink = ScriptedSink;

    fn open_sink(&mut self) -> Result<ScriptedSink, OpenError> {
        let mut script = self.script.lock();
        script.opens += 1;
        if script.unreachable {
            return Err(OpenError::ConnectFailed {
                target: self.description.clone(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        script.sinks.push(SinkRecord::default());
        Ok(ScriptedSink {
            index: script.sinks.len() - 1,
            script: Arc::clone(&self.script),
        })
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Sink produced by [`ScriptedFactory`].
#[derive(Debug)]
pub struct ScriptedSink {
    index: usize,
    script: Arc<Mutex<Script>>,
}

impl Sink for ScriptedSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut script = self.script.lock();
        let writes_fail = script.writes_fail;
        let record = &mut script.sinks[self.index];
        if writes_fail || record.broken {
            record.broken = true;
            return Err(io::Error::from(io::ErrorKind::ConnectionReset));
        }
        record.bytes.extend_from_slice(buf);
        record.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let script = self.script.lock();
        if script.flush_fails || script.sinks[self.index].broken {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut script = self.script.lock();
        script.closes += 1;
        if script.close_fails {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }
}

impl FactoryControl {
    /// Make subsequent `open_sink` calls fail with a refused connection.
    pub fn set_reachable(&self, reachable: bool) {
        self.script.lock().unreachable = !reachable;
    }

    /// Make every write on every sink fail while set.
    pub fn set_writes_fail(&self, fail: bool) {
        self.script.lock().writes_fail = fail;
    }

    pub fn set_flush_fails(&self, fail: bool) {
        self.script.lock().flush_fails = fail;
    }

    pub fn set_close_fails(&self, fail: bool) {
        self.script.lock().close_fails = fail;
    }

    /// Break the most recently opened sink, as a connection reset would.
    pub fn break_current_sink(&self) {
        if let Some(record) = self.script.lock().sinks.last_mut() {
            record.broken = true;
        }
    }

    /// Number of `open_sink` calls, successful or not.
    pub fn open_calls(&self) -> usize {
        self.script.lock().opens
    }

    /// Number of sinks opened successfully.
    pub fn sinks_opened(&self) -> usize {
        self.script.lock().sinks.len()
    }

    /// Number of `close` calls across all sinks.
    pub fn close_calls(&self) -> usize {
        self.script.lock().closes
    }

    /// Bytes received by the sink opened `index`-th (zero based).
    pub fn received(&self, index: usize) -> Vec<u8> {
        self.script
            .lock()
            .sinks
            .get(index)
            .map(|record| record.bytes.clone())
            .unwrap_or_default()
    }

    /// Successful writes on the sink opened `index`-th.
    pub fn writes(&self, index: usize) -> usize {
        self.script
            .lock()
            .sinks
            .get(index)
            .map_or(0, |record| record.writes)
    }

    /// Bytes received by all sinks, in opening order.
    pub fn all_received(&self) -> Vec<u8> {
        self.script
            .lock()
            .sinks
            .iter()
            .flat_map(|record| record.bytes.iter().copied())
            .collect()
    }
}
