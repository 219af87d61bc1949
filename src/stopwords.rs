//! Stopword filtering applied at chunk flush.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;

/// A set of words removed token-wise from output lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    /// An empty set; filtering is then a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads one word per line. Surrounding whitespace and blank lines are
    /// ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Stopwords {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_words(text.lines()))
    }

    /// Builds a set from an iterator of words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Removes stopword tokens from a whitespace-separated line.
    ///
    /// Remaining tokens are joined by single spaces. Returns `None` when
    /// nothing is left.
    pub fn filter_line(&self, line: &str) -> Option<String> {
        let kept: Vec<&str> = line
            .split_whitespace()
            .filter(|token| !self.words.contains(*token))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(kept.join(" "))
        }
    }

    /// Filters every line, dropping the ones that become empty.
    ///
    /// With an empty set the lines pass through unchanged.
    pub fn filter_lines(&self, lines: Vec<String>) -> Vec<String> {
        if self.is_empty() {
            return lines;
        }
        lines
            .iter()
            .filter_map(|line| self.filter_line(line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_tokens() {
        let stop = StopWords::from_words(["的", "了"]);
        assert_eq!(stop.filter_line("我 的 书 了").as_deref(), Some("我 书"));
        assert_eq!(stop.filter_line("的  了"), None);
    }

    #[test]
    fn test_whole_line_tokens() {
        // Cleaned lines carry no spaces, so a line is one token.
        let stop = StopWords::from_words(["的"]);
        let lines = vec!["的".to_string(), "的确".to_string(), "书".to_string()];
        assert_eq!(stop.filter_lines(lines), vec!["的确", "书"]);
    }

    #[test]
    fn test_empty_set_passthrough() {
        let lines = vec!["a  b".to_string(), String::new()];
        assert_eq!(StopWords::empty().filter_lines(lines.clone()), lines);
    }

    #[test]
    fn test_load_trims_and_skips_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.txt");
        std::fs::write(&path, "的\n  了 \n\n\r\n").unwrap();

        let stop = StopWords::load(&path).unwrap();
        assert_eq!(stop.len(), 2);
        assert!(stop.contains("了"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = StopWords::load("/definitely/not/here/stop.txt");
        assert!(matches!(result, Err(Error::Stopwords { .. })));
    }
}
