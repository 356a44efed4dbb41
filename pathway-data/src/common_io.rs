use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Column delimiter: either a literal string or a set of characters
pub enum Delimiter {
    Str(String),
    Chars(Vec<char>),
}

impl From<&str> for Delimiter {
    fn from(s: &str) -> Self {
        Delimiter::Str(s.to_string())
    }
}

impl<const N: usize> From<&[char; N]> for Delimiter {
    fn from(chars: &[char; N]) -> Self {
        Delimiter::Chars(chars.to_vec())
    }
}

impl Delimiter {
    fn split_words(&self, line: &str) -> Vec<Box<str>> {
        match self {
            Delimiter::Str(s) => line.split(s.as_str()).map(|x| x.trim().into()).collect(),
            Delimiter::Chars(chars) => line
                .split(chars.as_slice())
                .map(|x| x.trim().into())
                .collect(),
        }
    }
}

pub struct ReadLinesOut {
    pub lines: Vec<Vec<Box<str>>>,
    pub header: Vec<Box<str>>,
}

fn is_not_comment_line(line: &str) -> bool {
    !(line.starts_with('#') || line.starts_with('%'))
}

///
/// Read lines of words split by `delim`, skipping comment lines
///
/// * `input_file` - file name--either gzipped or not
/// * `delim` - delimiter
/// * `hdr_line` - location of a header line (-1 = no header line)
///
pub fn read_lines_of_words_delim(
    input_file: &str,
    delim: impl Into<Delimiter>,
    hdr_line: i64,
) -> anyhow::Result<ReadLinesOut> {
    let delim = delim.into();
    let buf_reader = open_buf_reader(input_file)?;

    let mut lines_raw: Vec<Box<str>> = vec![];
    for line in buf_reader.lines() {
        let line = line?;
        if is_not_comment_line(&line) {
            lines_raw.push(line.into_boxed_str());
        }
    }

    let mut header = vec![];
    let body = if hdr_line < 0 {
        &lines_raw[..]
    } else {
        let n_skip = hdr_line as usize;
        if lines_raw.len() < (n_skip + 1) {
            return Err(anyhow::anyhow!("{}: not enough lines", input_file));
        }
        header.extend(delim.split_words(&lines_raw[n_skip]));
        &lines_raw[(n_skip + 1)..]
    };

    // order is kept by the indexed parallel iterator
    let lines = body
        .par_iter()
        .map(|s| delim.split_words(s))
        .collect::<Vec<_>>();

    Ok(ReadLinesOut { lines, header })
}

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
///
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file, e))?;
    match Path::new(input_file).extension().and_then(|x| x.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

/// Buffered text output that can close its gzip stream explicitly
pub enum TextWriter {
    Gz(BufWriter<GzEncoder<File>>),
    Plain(BufWriter<File>),
    Stdout(BufWriter<std::io::Stdout>),
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TextWriter::Gz(w) => w.write(buf),
            TextWriter::Plain(w) => w.write(buf),
            TextWriter::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TextWriter::Gz(w) => w.flush(),
            TextWriter::Plain(w) => w.flush(),
            TextWriter::Stdout(w) => w.flush(),
        }
    }
}

impl TextWriter {
    /// Flush, and write the gzip trailer for `.gz` output. The file is
    /// complete afterwards even if the writer is never dropped.
    pub fn finish(&mut self) -> std::io::Result<()> {
        self.flush()?;
        if let TextWriter::Gz(w) = self {
            w.get_mut().try_finish()?;
        }
        Ok(())
    }
}

///
/// Open a file for writing
/// * `output_file` - file name--either gzipped or not, or `stdout`
///
pub fn open_text_writer(output_file: &str) -> anyhow::Result<TextWriter> {
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(TextWriter::Stdout(BufWriter::new(std::io::stdout())));
    }

    mkdir(output_file)?;

    let file = File::create(output_file)?;
    match Path::new(output_file).extension().and_then(|x| x.to_str()) {
        Some("gz") => Ok(TextWriter::Gz(BufWriter::new(GzEncoder::new(
            file,
            flate2::Compression::default(),
        )))),
        _ => Ok(TextWriter::Plain(BufWriter::new(file))),
    }
}

///
/// Write every line into the output_file
///
/// * `lines` - vector of lines
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_text_writer(output_file)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(anyhow::anyhow!("unexpected error: {}", e));
        }
    }
    buf.finish()?;
    Ok(())
}

///
/// Create the parent directory of a file if needed
/// * `file` - file name
///
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    if let Some(dir) = Path::new(file).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
