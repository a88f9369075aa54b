use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use zstd::stream::read::Decoder;

/// `.zst` files are decoded on the fly; anything else is read as plain text.
pub fn is_zstd(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("zst"))
}

/// Minimal NDJSON reader with buffering, transparent zstd decoding and line tracking.
pub struct NdjsonReader {
    rdr: Box<dyn BufRead>,
    line_no: u64,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let inner: Box<dyn Read> = if is_zstd(path) {
            let mut decoder = Decoder::new(f).with_context(|| format!("zstd init {}", path.display()))?;
            // Large frames need a wider window than the decoder default.
            decoder.window_log_max(31)?;
            Box::new(decoder)
        } else {
            Box::new(f)
        };
        Ok(Self {
            rdr: Box::new(BufReader::with_capacity(buf_bytes.max(8 * 1024), inner)),
            line_no: 0,
        })
    }

    /// Read the next line into `buf` as raw bytes. Returns the number of bytes read (0 on
    /// EOF). Strips trailing `\r?\n`. Decoding is left to the caller so one bad line never
    /// poisons the stream.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_until(b'\n', buf)?;
        if n == 0 { return Ok(0); }
        self.line_no += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') { buf.pop(); }
        }
        Ok(n)
    }

    /// Advance to the next non-blank line. Returns false on EOF.
    pub fn next_record(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        loop {
            if self.read_line(buf)? == 0 {
                return Ok(false);
            }
            if !buf.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
        }
    }

    /// 1-based number of the line last read.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

/// Count non-blank lines, whatever their encoding; a cheap pre-pass for progress totals.
pub fn count_records(path: &Path, buf_bytes: usize) -> Result<u64> {
    let mut rdr = NdjsonReader::open(path, buf_bytes)?;
    let mut buf = Vec::with_capacity(16 * 1024);
    let mut n = 0u64;
    while rdr.next_record(&mut buf).with_context(|| format!("read {}", path.display()))? {
        n += 1;
    }
    Ok(n)
}

/// Decode every non-blank line as `T` and hand it to `f`. Unparseable lines (bad JSON or
/// bad UTF-8) are logged and skipped. Returns the number of records delivered.
pub fn for_each_record<T, F>(path: &Path, buf_bytes: usize, mut f: F) -> Result<u64>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let mut rdr = NdjsonReader::open(path, buf_bytes)?;
    let mut buf = Vec::with_capacity(16 * 1024);
    let mut n = 0u64;
    while rdr.next_record(&mut buf).with_context(|| format!("read {}", path.display()))? {
        match serde_json::from_slice::<T>(&buf) {
            Ok(v) => {
                f(v);
                n += 1;
            }
            Err(e) => tracing::warn!(
                "skipping malformed line {} in {}: {}",
                rdr.line_no(),
                path.display(),
                e
            ),
        }
    }
    Ok(n)
}

/// Parse every non-blank line as `T`, skipping the ones that do not decode.
pub fn read_all<T: DeserializeOwned>(path: &Path, buf_bytes: usize) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for_each_record(path, buf_bytes, |v| out.push(v))?;
    Ok(out)
}
