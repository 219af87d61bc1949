//! Chunked accumulation and persistence of cleaned lines.
//!
//! A [`ChunkWriter`] buffers the cleaned lines of one input file. Once the
//! buffered bytes pass the flush threshold the chunk is post-processed and
//! written out as one or more numbered `.txt` files, bounding peak memory per
//! input regardless of its size. A writer that fails part way can
//! [`discard`](ChunkWriter::discard) what it already wrote.

use crate::error::Result;
use crate::pipeline_options::{OutputNaming, PipelineOptions};
use crate::script::ScriptConversion;
use crate::stopwords::StopWords;
use crate::worker::CancelToken;
use std::fs;
use std::path::{Path, PathBuf};

/// Accumulates cleaned lines for one input and writes numbered output files.
#[derive(Debug)]
pub struct ChunkWriter<'a> {
    output_dir: PathBuf,
    basename: String,
    max_line_length: usize,
    max_file_size: usize,
    chunk_threshold: usize,
    conversion: ScriptConversion,
    naming: OutputNaming,
    stopwords: &'a StopWords,
    pending: Vec<String>,
    pending_bytes: usize,
    next_index: usize,
    written: Vec<PathBuf>,
    cancel: Option<CancelToken>,
}

impl<'a> ChunkWriter<'a> {
    /// Creates a writer producing `{basename}_{n}.txt` files in `output_dir`.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        basename: impl Into<String>,
        options: &PipelineOptions,
        stopwords: &'a StopWords,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            basename: basename.into(),
            max_line_length: options.max_line_length,
            max_file_size: options.max_file_size,
            chunk_threshold: options.chunk_threshold,
            conversion: ScriptConversion::from_enabled(options.convert_script),
            naming: options.output_naming,
            stopwords: if options.stopwords_enabled {
                stopwords
            } else {
                empty_stopwords()
            },
            pending: Vec::new(),
            pending_bytes: 0,
            next_index: 1,
            written: Vec::new(),
            cancel: None,
        }
    }

    /// Stops writing with [`Error::Cancelled`](crate::Error::Cancelled) once
    /// `token` is set.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bytes buffered since the last flush.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Output files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Appends a cleaned line, flushing when the threshold is exceeded.
    pub fn push(&mut self, line: impl Into<String>) -> Result<()> {
        let line = line.into();
        self.pending_bytes += line.len();
        self.pending.push(line);

        if self.pending_bytes > self.chunk_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Post-processes the buffered lines and writes them out.
    ///
    /// Steps: drop empty lines, hard-split long lines, filter stopwords, join,
    /// convert script, split by file size, write each piece trimmed.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let entries = std::mem::take(&mut self.pending);
        self.pending_bytes = 0;

        let lines: Vec<String> = entries
            .iter()
            .flat_map(|entry| entry.split('\n'))
            .filter(|line| !line.trim().is_empty())
            .flat_map(|line| split_long_line(line, self.max_line_length))
            .collect();
        drop(entries);

        let lines = self.stopwords.filter_lines(lines);
        if lines.is_empty() {
            return Ok(());
        }

        let joined = lines.join("\n");
        drop(lines);
        let text = self.conversion.convert(&joined);

        for piece in split_by_size(&text, self.max_file_size) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            self.write_piece(piece)?;
        }

        Ok(())
    }

    /// Flushes the remainder and returns every output path.
    ///
    /// With [`OutputNaming::Compact`], a single output is renamed to
    /// `{basename}.txt`.
    /// Any output already written is removed if the final flush fails.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Err(err) = self.finish_in_place() {
            self.discard();
            return Err(err);
        }
        Ok(self.written)
    }

    /// Removes every output written so far.
    pub fn discard(&mut self) {
        for path in self.written.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove partial output")
                }
            }
        }
    }

    fn finish_in_place(&mut self) -> Result<()> {
        self.flush()?;

        if self.naming == OutputNaming::Compact && self.written.len() == 1 {
            let single = self.output_dir.join(format!("{}.txt", self.basename));
            fs::rename(&self.written[0], &single)?;
            self.written[0] = single;
        }
        Ok(())
    }

    fn write_piece(&mut self, piece: &str) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            cancel.check()?;
        }
        if self.written.is_empty() {
            fs::create_dir_all(&self.output_dir)?;
        }

        let path = numbered_path(&self.output_dir, &self.basename, self.next_index);
        fs::write(&path, piece)?;
        tracing::debug!(path = %path.display(), bytes = piece.len(), "wrote chunk");

        self.next_index += 1;
        self.written.push(path);
        Ok(())
    }
}

fn empty_stopwords() -> &'static StopWords {
    static EMPTY: std::sync::OnceLock<StopWords> = std::sync::OnceLock::new();
    EMPTY.get_or_init(StopWords::empty)
}

/// `{dir}/{basename}_{index}.txt`
pub fn numbered_path(dir: &Path, basename: &str, index: usize) -> PathBuf {
    dir.join(format!("{}_{}.txt", basename, index))
}

/// Hard-splits a line into segments of at most `max_chars` characters.
///
/// No word-boundary awareness; concatenating the segments gives the line back.
pub fn split_long_line(line: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if line.chars().count() <= max_chars {
        return vec![line.to_string()];
    }

    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|segment| segment.iter().collect())
        .collect()
}

/// Splits text into pieces of at most `max_bytes` bytes.
///
/// A cut prefers the last newline inside the window and never falls inside a
/// UTF-8 character.
pub fn split_by_size(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            pieces.push(rest);
            break;
        }

        let mut cut = max_bytes;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // Window smaller than one character: take the character anyway.
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        } else if let Some(newline) = rest[..cut].rfind('\n') {
            if newline > 0 {
                cut = newline + 1;
            }
        }

        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece);
        rest = tail;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> PipelineOptions {
        PipelineOptions::default().without_script_conversion()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_split_long_line() {
        let line = "一二三四五六七";
        let segments = split_long_line(line, 3);
        assert_eq!(segments, vec!["一二三", "四五六", "七"]);
        assert!(segments.iter().all(|s| s.chars().count() <= 3));
        assert_eq!(segments.concat(), line);

        assert_eq!(split_long_line("abc", 3), vec!["abc"]);
    }

    #[test]
    fn test_split_by_size_prefers_newline() {
        let pieces = split_by_size("aaaa\nbbbb\ncc", 7);
        assert_eq!(pieces, vec!["aaaa\n", "bbbb\ncc"]);
    }

    #[test]
    fn test_split_by_size_char_boundary() {
        // Each ideograph is three bytes.
        let pieces = split_by_size("汉字汉字", 7);
        assert_eq!(pieces, vec!["汉字", "汉字"]);
        assert!(pieces.iter().all(|p| p.len() <= 7));
    }

    #[test]
    fn test_single_flush_at_finish() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let mut writer = ChunkWriter::new(dir.path(), "book", &options(), &stop);

        writer.push("第一行").unwrap();
        writer.push("").unwrap();
        writer.push("第二行\n\n第三行").unwrap();
        assert!(writer.written().is_empty());

        let outputs = writer.finish().unwrap();
        assert_eq!(outputs, vec![dir.path().join("book_1.txt")]);
        assert_eq!(read(&outputs[0]), "第一行\n第二行\n第三行");
    }

    #[test]
    fn test_threshold_flush_continues_numbering() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = options().with_chunk_threshold(8);
        let mut writer = ChunkWriter::new(dir.path(), "part", &opts, &stop);

        writer.push("甲乙").unwrap(); // 6 bytes
        assert_eq!(writer.pending_bytes(), 6);
        writer.push("丙丁").unwrap(); // 12 bytes, flush
        assert_eq!(writer.pending_bytes(), 0);
        assert_eq!(writer.written().len(), 1);
        writer.push("戊").unwrap();

        let outputs = writer.finish().unwrap();
        assert_eq!(
            outputs,
            vec![dir.path().join("part_1.txt"), dir.path().join("part_2.txt")]
        );
        assert_eq!(read(&outputs[0]), "甲乙\n丙丁");
        assert_eq!(read(&outputs[1]), "戊");
    }

    #[test]
    fn test_max_file_size_split() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = options().with_max_file_size(10);
        let mut writer = ChunkWriter::new(dir.path(), "big", &opts, &stop);

        for line in ["abcd", "efgh", "ijkl"] {
            writer.push(line).unwrap();
        }

        let outputs = writer.finish().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(read(&outputs[0]), "abcd\nefgh");
        assert_eq!(read(&outputs[1]), "ijkl");
        for path in &outputs {
            assert!(fs::metadata(path).unwrap().len() <= 10);
        }
    }

    #[test]
    fn test_long_lines_split_at_flush() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = options().with_max_line_length(4);
        let mut writer = ChunkWriter::new(dir.path(), "long", &opts, &stop);

        writer.push("abcdefghij").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(read(&outputs[0]), "abcd\nefgh\nij");
    }

    #[test]
    fn test_stopwords_applied_when_enabled() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::from_words(["的"]);

        let opts = options().with_stopwords("unused.txt");
        let mut writer = ChunkWriter::new(dir.path(), "on", &opts, &stop);
        writer.push("的\n书").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(read(&outputs[0]), "书");

        let mut writer = ChunkWriter::new(dir.path(), "off", &options(), &stop);
        writer.push("的\n书").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(read(&outputs[0]), "的\n书");
    }

    #[test]
    fn test_script_conversion_on_flush() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = PipelineOptions::default();
        let mut writer = ChunkWriter::new(dir.path(), "trad", &opts, &stop);

        writer.push("漢字").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(read(&outputs[0]), "汉字");
    }

    #[test]
    fn test_compact_naming() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = options().with_compact_names();

        let mut writer = ChunkWriter::new(dir.path(), "solo", &opts, &stop);
        writer.push("内容").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(outputs, vec![dir.path().join("solo.txt")]);
        assert!(!dir.path().join("solo_1.txt").exists());

        let opts = opts.with_max_file_size(7);
        let mut writer = ChunkWriter::new(dir.path(), "many", &opts, &stop);
        writer.push("一二\n三四").unwrap();
        let outputs = writer.finish().unwrap();
        assert_eq!(
            outputs,
            vec![dir.path().join("many_1.txt"), dir.path().join("many_2.txt")]
        );
    }

    #[test]
    fn test_cancelled_writer_stops_before_writing() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let token = CancelToken::new();
        let opts = options().with_chunk_threshold(4);
        let mut writer =
            ChunkWriter::new(dir.path(), "stop", &opts, &stop).with_cancel(token.clone());

        writer.push("甲乙").unwrap();
        assert_eq!(writer.written().len(), 1);

        token.cancel();
        assert!(writer.push("丙丁").unwrap_err().is_cancelled());
        assert_eq!(writer.written().len(), 1);
        assert!(!dir.path().join("stop_2.txt").exists());

        writer.push("戊").unwrap();
        assert!(writer.finish().unwrap_err().is_cancelled());
        assert!(!dir.path().join("stop_1.txt").exists());
    }

    #[test]
    fn test_discard_removes_outputs() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let opts = options().with_chunk_threshold(4);
        let mut writer = ChunkWriter::new(dir.path(), "gone", &opts, &stop);

        writer.push("甲乙").unwrap();
        writer.push("丙丁").unwrap();
        assert_eq!(writer.written().len(), 2);

        writer.discard();
        assert!(writer.written().is_empty());
        assert!(!dir.path().join("gone_1.txt").exists());
        assert!(!dir.path().join("gone_2.txt").exists());
    }

    #[test]
    fn test_nothing_written_for_empty_input() {
        let dir = TempDir::new().unwrap();
        let stop = StopWords::empty();
        let mut writer = ChunkWriter::new(dir.path().join("nested"), "none", &options(), &stop);
        writer.push("\n\n").unwrap();
        assert!(writer.finish().unwrap().is_empty());
        assert!(!dir.path().join("nested").exists());
    }
}
