use flate2::read::{GzDecoder, MultiGzDecoder};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

/// Bytes pulled from the source per read call.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Prefix length sampled by [`estimate_line_count`].
pub const ESTIMATE_SAMPLE_SIZE: usize = 10_000;

const ACCEPTED_EXTENSIONS: &[&str] = &["log", "txt", "gz"];

pub fn is_gzip_filename(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

pub fn is_supported_filename(filename: &str) -> bool {
    extension_of(filename)
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|e| e.to_str())
}

/// Byte source, decompressed on the fly when the filename says gzip.
pub enum Source<R: Read> {
    Plain(R),
    Gzip(MultiGzDecoder<R>),
}

impl<R: Read> Source<R> {
    pub fn open(reader: R, filename: &str) -> Self {
        if is_gzip_filename(filename) {
            Source::Gzip(MultiGzDecoder::new(reader))
        } else {
            Source::Plain(reader)
        }
    }

    pub fn is_gzip(&self) -> bool {
        matches!(self, Source::Gzip(_))
    }

    pub fn into_inner(self) -> R {
        match self {
            Source::Plain(r) => r,
            Source::Gzip(d) => d.into_inner(),
        }
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Gzip(d) => d.read(buf),
        }
    }
}

/// Lazy line iterator over a byte source.
///
/// Memory stays at one chunk plus the longest line seen: complete lines are cut
/// out of the chunk buffer as they are requested and only the trailing partial
/// line is carried over to the next read. Lines are decoded lossily, so invalid
/// UTF-8 turns into U+FFFD rather than an error.
///
/// A read or decompression failure ends the stream early; the failure is kept
/// and can be inspected through [`LineReader::error`].
pub struct LineReader<R: Read> {
    source: Source<R>,
    chunk: Vec<u8>,
    pos: usize,
    len: usize,
    partial: Vec<u8>,
    finished: bool,
    lines_read: usize,
    bytes_read: u64,
    error: Option<io::Error>,
}

pub fn read_lines<R: Read>(reader: R, filename: &str) -> LineReader<R> {
    LineReader::new(Source::open(reader, filename))
}

impl<R: Read> LineReader<R> {
    pub fn new(source: Source<R>) -> Self {
        Self::with_chunk_size(source, CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: Source<R>, chunk_size: usize) -> Self {
        Self {
            source,
            chunk: vec![0; chunk_size.max(1)],
            pos: 0,
            len: 0,
            partial: Vec::new(),
            finished: false,
            lines_read: 0,
            bytes_read: 0,
            error: None,
        }
    }

    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Bytes consumed after decompression.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn emit(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        self.lines_read += 1;
        line
    }

    fn fill(&mut self) -> bool {
        loop {
            match self.source.read(&mut self.chunk) {
                Ok(0) => {
                    debug!(bytes = self.bytes_read, "input exhausted");
                    self.finished = true;
                    return false;
                }
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                    self.bytes_read += n as u64;
                    return true;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(
                        error = %e,
                        lines_read = self.lines_read,
                        gzip = self.source.is_gzip(),
                        "input stream ended early"
                    );
                    self.error = Some(e);
                    self.finished = true;
                    return false;
                }
            }
        }
    }
}

impl<R: Read + Seek> LineReader<R> {
    /// Rewinds the underlying reader and starts over from the first line.
    pub fn restart(self) -> io::Result<Self> {
        let gzip = self.source.is_gzip();
        let chunk_size = self.chunk.len();
        let mut inner = self.source.into_inner();
        inner.seek(SeekFrom::Start(0))?;
        let source = if gzip {
            Source::Gzip(MultiGzDecoder::new(inner))
        } else {
            Source::Plain(inner)
        };
        Ok(Self::with_chunk_size(source, chunk_size))
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.pos < self.len {
                let window = &self.chunk[self.pos..self.len];
                match window.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.partial.extend_from_slice(&window[..i]);
                        self.pos += i + 1;
                        return Some(self.emit());
                    }
                    None => {
                        self.partial.extend_from_slice(window);
                        self.pos = self.len;
                    }
                }
            }
            if self.finished || !self.fill() {
                if self.partial.is_empty() {
                    return None;
                }
                return Some(self.emit());
            }
        }
    }
}

/// Approximates the number of lines in `file` from a sample of its prefix.
/// Best-effort only; the file position is restored to the start afterwards.
pub fn estimate_line_count<R: Read + Seek>(file: &mut R, filename: &str) -> io::Result<usize> {
    estimate_line_count_with_sample(file, filename, ESTIMATE_SAMPLE_SIZE)
}

pub fn estimate_line_count_with_sample<R: Read + Seek>(
    file: &mut R,
    filename: &str,
    sample_size: usize,
) -> io::Result<usize> {
    let total_size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    if total_size == 0 {
        return Ok(0);
    }

    let mut sample = Vec::with_capacity(sample_size);
    file.by_ref().take(sample_size as u64).read_to_end(&mut sample)?;
    file.seek(SeekFrom::Start(0))?;
    let sample_len = sample.len().max(1) as f64;

    let estimated = if is_gzip_filename(filename) {
        let mut decoder = GzDecoder::new(sample.as_slice());
        let mut decoded = Vec::new();
        // The sample cuts the stream short, so the decoder errors at the end; keep what came out.
        let _ = decoder.read_to_end(&mut decoded);
        if decoded.is_empty() {
            (total_size / 100) as usize
        } else if sample.len() as u64 == total_size {
            count_newlines(&decoded)
        } else {
            let lines_in_sample = count_newlines(&decoded) as f64;
            ((total_size as f64 * 10.0 / sample_len) * lines_in_sample) as usize
        }
    } else {
        let lines_in_sample = count_newlines(&sample);
        if lines_in_sample == 0 {
            return Ok(1);
        }
        let avg_line_length = sample_len / lines_in_sample as f64;
        (total_size as f64 / avg_line_length) as usize
    };

    Ok(estimated.max(1))
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}
