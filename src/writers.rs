use crate::error::ExportError;
use crate::locale::LocaleGroup;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Produces the byte sink behind each feed file.
pub trait SinkFactory {
    type Sink: Write;
    fn create(&self, path: &Path) -> io::Result<Self::Sink>;
}

/// Buffered files on the local filesystem.
#[derive(Clone, Copy, Debug)]
pub struct FileSinks {
    pub write_buffer_bytes: usize,
}

impl Default for FileSinks {
    fn default() -> Self {
        Self { write_buffer_bytes: 256 * 1024 }
    }
}

impl SinkFactory for FileSinks {
    type Sink = BufWriter<File>;

    fn create(&self, path: &Path) -> io::Result<Self::Sink> {
        let f = File::create(path)?;
        Ok(BufWriter::with_capacity(self.write_buffer_bytes.max(8 * 1024), f))
    }
}

/// Where the feeds of one run go.
///
/// Layout:
///   <export_root>/TurnTo/<segment>/<base_name>_<segment>_<site_id>.txt
/// where `segment` is a locale (orders) or a locale group id (catalog).
#[derive(Clone, Debug)]
pub struct FeedTarget {
    pub export_root: PathBuf,
    pub base_name: String,
    pub site_id: String,
}

impl FeedTarget {
    pub fn new(export_root: impl AsRef<Path>, base_name: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self { export_root: export_root.as_ref().to_path_buf(), base_name: base_name.into(), site_id: site_id.into() }
    }

    pub fn path_for(&self, segment: &str) -> PathBuf {
        self.export_root
            .join("TurnTo")
            .join(segment)
            .join(format!("{}_{}_{}.txt", self.base_name, segment, self.site_id))
    }
}

/// One open feed file. The header goes out on creation; `close()` flushes and releases the
/// sink, and a closed writer never reopens.
pub struct FeedWriter<W: Write> {
    path: PathBuf,
    w: Option<W>,
    lines: u64,
}

impl<W: Write> FeedWriter<W> {
    /// Create parent directories, open the sink and write `header`.
    pub fn create<F>(sinks: &F, path: PathBuf, header: &str) -> Result<Self, ExportError>
    where
        F: SinkFactory<Sink = W>,
    {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ExportError::resource(dir, e))?;
        }
        let sink = sinks.create(&path).map_err(|e| ExportError::resource(&path, e))?;
        let mut writer = Self { path, w: Some(sink), lines: 0 };
        writer.write_raw(header)?;
        Ok(writer)
    }

    fn write_raw(&mut self, line: &str) -> Result<(), ExportError> {
        let Some(w) = self.w.as_mut() else {
            return Err(ExportError::resource(
                &self.path,
                io::Error::new(io::ErrorKind::BrokenPipe, "feed writer already closed"),
            ));
        };
        w.write_all(line.as_bytes())
            .and_then(|_| w.write_all(b"\n"))
            .map_err(|e| ExportError::resource(&self.path, e))
    }

    /// Write one record line; the terminator is added here.
    pub fn write_line(&mut self, line: &str) -> Result<(), ExportError> {
        self.write_raw(line)?;
        self.lines += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.w.is_some()
    }

    /// Records written, header excluded.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Flush and release the sink. Idempotent; the sink is dropped even when the flush fails.
    pub fn close(&mut self) -> Result<(), ExportError> {
        match self.w.take() {
            Some(mut w) => w.flush().map_err(|e| ExportError::resource(&self.path, e)),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for FeedWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("closing {} on drop failed: {}", self.path.display(), e);
        }
    }
}

/// One feed writer per active locale group, keyed by group id.
///
/// A group whose file cannot be set up, written or closed is recorded in `failures()` and
/// retired; the remaining groups keep going.
pub struct WriterPool<F: SinkFactory = FileSinks> {
    writers: BTreeMap<String, FeedWriter<F::Sink>>,
    failed: BTreeMap<String, String>,
}

impl<F: SinkFactory> WriterPool<F> {
    /// Open a writer for every group and emit `header` into each.
    pub fn open(groups: &[LocaleGroup], target: &FeedTarget, header: &str, sinks: &F) -> Self {
        let mut writers = BTreeMap::new();
        let mut failed = BTreeMap::new();

        for group in groups {
            let id = group.id();
            if writers.contains_key(&id) || failed.contains_key(&id) {
                continue;
            }
            let path = target.path_for(&id);
            match FeedWriter::create(sinks, path, header) {
                Ok(w) => {
                    tracing::info!(group = %id, key = %group.key, "opened feed {}", w.path().display());
                    writers.insert(id, w);
                }
                Err(e) => {
                    tracing::error!(group = %id, "could not set up feed file: {}", e);
                    failed.insert(id, e.to_string());
                }
            }
        }

        Self { writers, failed }
    }

    /// Route one line to the group's writer. Lines for a retired group are dropped.
    pub fn write(&mut self, group_id: &str, line: &str) -> Result<(), ExportError> {
        let Some(w) = self.writers.get_mut(group_id) else {
            return Ok(());
        };
        if !w.is_open() {
            return Ok(());
        }
        if let Err(e) = w.write_line(line) {
            tracing::error!(group = %group_id, "write failed; retiring feed: {}", e);
            if let Err(close_err) = w.close() {
                tracing::warn!(group = %group_id, "close after write failure: {}", close_err);
            }
            self.failed.insert(group_id.to_string(), e.to_string());
            return Err(e);
        }
        Ok(())
    }

    pub fn is_open(&self, group_id: &str) -> bool {
        self.writers.get(group_id).is_some_and(FeedWriter::is_open)
    }

    pub fn open_count(&self) -> usize {
        self.writers.values().filter(|w| w.is_open()).count()
    }

    /// Group id -> reason, for every group that failed at any stage.
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failed
    }

    /// Paths of every file that was created, in group order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.writers.values().map(|w| w.path().to_path_buf()).collect()
    }

    pub fn lines_written(&self, group_id: &str) -> u64 {
        self.writers.get(group_id).map_or(0, FeedWriter::lines_written)
    }

    /// Close every writer still open. Safe to call repeatedly; one failed close does not
    /// stop the others. Returns how many writers this call closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for (id, w) in self.writers.iter_mut() {
            if !w.is_open() {
                continue;
            }
            closed += 1;
            if let Err(e) = w.close() {
                tracing::error!(group = %id, "close failed: {}", e);
                self.failed.entry(id.clone()).or_insert_with(|| e.to_string());
            }
        }
        closed
    }
}
