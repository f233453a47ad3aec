use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::corpus::CladeCorpus;
use crate::error::CladeError;

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CladeError + '_ {
    move |source| CladeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, CladeError> {
    let f = File::open(path).map_err(io_error(path))?;
    if is_gz(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Read a tree or clade-list file into memory.
/// Files ending in `.gz` are decompressed on the fly.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String, CladeError> {
    let p = path.as_ref();
    let mut content = String::new();
    open_reader(p)?
        .read_to_string(&mut content)
        .map_err(io_error(p))?;
    Ok(content)
}

/// First line of a file, used for the single rooted tree to score.
pub fn read_first_line<P: AsRef<Path>>(path: P) -> Result<String, CladeError> {
    let p = path.as_ref();
    let mut line = String::new();
    open_reader(p)?.read_line(&mut line).map_err(io_error(p))?;
    Ok(line.trim_end().to_string())
}

/// Write every clade of the corpus, one per line, smallest first.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the clades are written to stdout (uncompressed).
pub fn write_clades<P: AsRef<Path>>(path: P, corpus: &CladeCorpus) -> Result<(), CladeError> {
    let p = path.as_ref();

    let mut out: Box<dyn Write> = if p.as_os_str() == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else if is_gz(p) {
        let f = File::create(p).map_err(io_error(p))?;
        let enc = GzEncoder::new(f, Compression::default());
        Box::new(BufWriter::new(enc))
    } else {
        Box::new(BufWriter::new(File::create(p).map_err(io_error(p))?))
    };

    write_clade_lines(&mut out, corpus).map_err(io_error(p))
}

fn write_clade_lines<W: Write>(out: &mut W, corpus: &CladeCorpus) -> io::Result<()> {
    let taxa = corpus.taxa();
    for clade in corpus.sorted() {
        writeln!(out, "{}", clade.named(taxa))?;
    }
    out.flush()
}
