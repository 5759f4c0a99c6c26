//! File specialisation of the resilient stream.
//!
//! Each [`open_sink`](SinkFactory::open_sink) opens a new handle on the same
//! path. Only the first open honours `append = false`; reopening after a
//! failure always appends so that output written before the failure survives.

use std::{
    fs::{self, File, OpenOptions},
    io::BufWriter,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    error::OpenError,
    reporter::LOG_TARGET,
    sink::{SinkFactory, WriterSink},
};

/// Sink produced by [`FileSinkFactory`].
pub type FileSink = WriterSink<BufWriter<File>>;

/// Opens files for a [`ResilientStream`](crate::ResilientStream).
#[derive(Clone, Debug)]
pub struct FileSinkFactory {
    path: PathBuf,
    append: bool,
    create_dirs: bool,
    opened_once: bool,
}

impl FileSinkFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
            create_dirs: false,
            opened_once: false,
        }
    }

    /// Truncate the file on the first open when `append` is false.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Create missing parent directories before opening.
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_failed(&self, source: std::io::Error) -> OpenError {
        OpenError::Io {
            target: self.describe(),
            source,
        }
    }
}

impl SinkFactory for FileSinkFactory {
    type Sink = FileSink;

    fn open_sink(&mut self) -> Result<FileSink, OpenError> {
        if self.create_dirs
            && let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|source| self.io_failed(source))?;
        }
        let append = self.append || self.opened_once;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.path)
            .map_err(|source| self.io_failed(source))?;
        self.opened_once = true;
        debug!(target: LOG_TARGET, "opened {}", self.describe());
        Ok(WriterSink::new(BufWriter::new(file)))
    }

    fn describe(&self) -> String {
        format!("file [{}]", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::{ResilientStream, reporter::StatusRecorder, sink::Sink};

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    #[rstest]
    fn describes_path() {
        let factory = FileSinkFactory::new("/var/log/app.log");
        assert_eq!(factory.describe(), "file [/var/log/app.log]");
    }

    #[rstest]
    fn stream_writes_reach_file(dir: TempDir) {
        let path = dir.path().join("out.log");
        let stream = ResilientStream::new(
            FileSinkFactory::new(&path),
            Arc::new(StatusRecorder::new()),
        );
        stream.open().expect("file opens");
        stream.write(b"hello ");
        stream.write(b"world");
        stream.close();

        assert_eq!(fs::read(&path).expect("read file"), b"hello world");
    }

    #[rstest]
    #[case(true, "existing\nnew\n")]
    #[case(false, "new\n")]
    fn first_open_honours_append(dir: TempDir, #[case] append: bool, #[case] expected: &str) {
        let path = dir.path().join("out.log");
        fs::write(&path, "existing\n").expect("seed file");
        let mut factory = FileSinkFactory::new(&path).with_append(append);

        let mut sink = factory.open_sink().expect("open file");
        sink.write_all(b"new\n").expect("write");
        sink.close().expect("close");

        assert_eq!(fs::read_to_string(&path).expect("read file"), expected);
    }

    #[rstest]
    fn reopen_never_truncates(dir: TempDir) {
        let path = dir.path().join("out.log");
        let mut factory = FileSinkFactory::new(&path).with_append(false);

        for line in [b"one\n".as_slice(), b"two\n".as_slice()] {
            let mut sink = factory.open_sink().expect("open file");
            sink.write_all(line).expect("write");
            sink.close().expect("close");
        }

        assert_eq!(fs::read_to_string(&path).expect("read file"), "one\ntwo\n");
    }

    #[rstest]
    fn creates_missing_directories_on_request(dir: TempDir) {
        let path = dir.path().join("nested/deeper/out.log");

        let err = FileSinkFactory::new(&path)
            .open_sink()
            .expect_err("parent is missing");
        assert!(matches!(err, OpenError::Io { ref target, .. } if target.starts_with("file [")));

        FileSinkFactory::new(&path)
            .with_create_dirs(true)
            .open_sink()
            .expect("directories created");
        assert!(path.exists());
    }
}
