//! Builder for file-backed [`ResilientStream`]s.

use std::path::PathBuf;

use crate::{
    error::BuildError,
    file::FileSinkFactory,
    reporter::SharedReporter,
    stream::{ResilientStream, StreamOptions},
};

use super::{builder_macros::stream_settings_setters, common::StreamSettings};

/// Stream type produced by [`FileStreamBuilder`].
pub type FileStream = ResilientStream<FileSinkFactory>;

/// Builder for constructing [`FileStream`] instances.
#[derive(Clone, Debug)]
pub struct FileStreamBuilder {
    path: PathBuf,
    append: bool,
    create_dirs: bool,
    settings: StreamSettings,
}

impl FileStreamBuilder {
    /// Create a builder targeting the specified file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
            create_dirs: false,
            settings: StreamSettings::default(),
        }
    }

    /// Append to an existing file (the default) or truncate it on first open.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Create missing parent directories when opening.
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    stream_settings_setters!();

    fn validate(&self) -> Result<(), BuildError> {
        if self.path.as_os_str().is_empty() {
            return Err(BuildError::InvalidConfig(
                "file path must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn build_factory(&self) -> Result<FileSinkFactory, BuildError> {
        self.validate()?;
        Ok(FileSinkFactory::new(self.path.clone())
            .with_append(self.append)
            .with_create_dirs(self.create_dirs))
    }

    pub(crate) fn build_parts(
        &self,
    ) -> Result<(FileSinkFactory, StreamOptions, SharedReporter), BuildError> {
        let options = self.settings.options()?;
        let factory = self.build_factory()?;
        Ok((factory, options, self.settings.reporter()))
    }

    /// Build an unopened stream.
    pub fn build(&self) -> Result<FileStream, BuildError> {
        let (factory, options, reporter) = self.build_parts()?;
        Ok(ResilientStream::with_options(factory, reporter, options))
    }

    /// Build the stream and perform the initial open.
    pub fn connect(&self) -> Result<FileStream, BuildError> {
        let stream = self.build()?;
        stream.open()?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use rstest::rstest;

    use super::*;
    use crate::{error::OpenError, reporter::StatusRecorder};

    #[rstest]
    fn rejects_empty_path() {
        let err = FileStreamBuilder::new("").build().expect_err("empty path");
        assert!(matches!(err, BuildError::InvalidConfig(ref msg) if msg.contains("path")));
    }

    #[rstest]
    fn rejects_zero_warn_interval() {
        let err = FileStreamBuilder::new("out.log")
            .with_warn_interval_ms(0)
            .build()
            .expect_err("zero interval");
        assert!(matches!(err, BuildError::InvalidConfig(ref msg) if msg.contains("warn_interval_ms")));
    }

    #[rstest]
    fn connect_writes_to_nested_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("logs/app.log");
        let stream = FileStreamBuilder::new(&path)
            .with_create_dirs(true)
            .with_reporter(Arc::new(StatusRecorder::new()))
            .connect()
            .expect("file opens");
        assert_eq!(stream.describe(), format!("file [{}]", path.display()));
        stream.write(b"line\n");
        stream.close();

        assert_eq!(fs::read_to_string(&path).expect("read"), "line\n");
    }

    #[rstest]
    fn connect_reports_missing_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = FileStreamBuilder::new(dir.path().join("missing/app.log"))
            .connect()
            .expect_err("parent missing");
        assert!(matches!(err, BuildError::Open(OpenError::Io { .. })));
    }
}
