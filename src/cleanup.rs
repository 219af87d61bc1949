//! # Cleanup Pipeline
//!
//! Line normalization for corpus text destined for language-model training.
//!
//! ## Pipeline Stages
//!
//! 0. **Pre-pass** (opt-in) - Unicode NFC, then leftover JSON keys from
//!    half-parsed dumps (this must see the raw colons and commas)
//! 1. **Stage 1: Sentence Splitting** - Delimiter punctuation becomes line breaks
//! 2. **Stage 2: Noise Removal** - Corpus-metadata phrases are deleted
//! 3. **Stage 3: Charset Restriction** - Only alphanumerics and CJK ideographs survive
//! 4. **Stage 4: Final Trim** - Blank sub-lines and surrounding whitespace removed
//!
//! The order is part of the output contract: phrases are matched after
//! splitting and before restriction.

use crate::error::{Error, Result};
use crate::pipeline_options::{CharsetMode, PipelineOptions};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Stage 1: Sentence Splitting
// ============================================================================

/// Sentence and clause delimiters, ASCII and full-width.
pub const SENTENCE_DELIMITERS: &[char] = &[
    '。', '．', '.', // period
    '；', ';', // semicolon
    '：', ':', // colon
    '，', ',', '、', // comma
    '！', '!', // exclamation
    '？', '?', // question
];

/// Literal `\n` escape sequences left in JSON-escaped text.
static RE_ESCAPED_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\n").unwrap());

/// Stage 1: Replace delimiter punctuation (and escaped newlines) with `\n`.
pub fn stage1_split_sentences(input: &str) -> String {
    let unescaped = RE_ESCAPED_NEWLINE.replace_all(input, "\n");
    unescaped
        .chars()
        .map(|c| if SENTENCE_DELIMITERS.contains(&c) { '\n' } else { c })
        .collect()
}

// ============================================================================
// Stage 2: Noise Removal
// ============================================================================

/// Corpus-metadata phrases that leak into raw dumps.
pub const NOISE_PHRASES: &[&str] = &[
    "翻译成文言文",
    "翻译成现代文",
    "是否待查文件",
    "是否重复文件",
    "文件大小",
    "最长段落长度",
    "段落数",
    "去重段落数",
    "低质量段落数",
    "段落行号",
    "是否重复",
    "是否跨文件重复",
];

/// Builds one alternation over the phrases, longest first.
///
/// The regex engine prefers earlier alternatives, so `去重段落数` must be tried
/// before `段落数`. Empty phrases are ignored.
pub fn build_noise_regex<S: AsRef<str>>(phrases: &[S]) -> Result<Regex> {
    let mut sorted: Vec<&str> = phrases
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.is_empty())
        .collect();
    if sorted.is_empty() {
        return Err(Error::Config("no noise phrases given".into()));
    }
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    sorted.dedup();

    let pattern = sorted
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&pattern)?)
}

static RE_DEFAULT_NOISE: LazyLock<Regex> =
    LazyLock::new(|| build_noise_regex(NOISE_PHRASES).unwrap());

/// Stage 2: Delete every noise phrase, wherever it appears.
///
/// Repeats until no phrase is left, since a deletion can join the halves of
/// another phrase.
pub fn stage2_remove_noise<'a>(input: &'a str, noise: &Regex) -> Cow<'a, str> {
    let mut current = Cow::Borrowed(input);
    while noise.is_match(&current) {
        current = Cow::Owned(noise.replace_all(&current, "").into_owned());
    }
    current
}

// ============================================================================
// Pre-pass: JSON Residue
// ============================================================================

static RE_JSON_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:title|category)\b|\}").unwrap());

static RE_ID_QUESTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id":\s*".*?",\s*"问":\s*".*?""#).unwrap());

/// Pre-pass: Break lines at bare `title`/`category`/`}` tokens and drop
/// `"id": ..., "问": ...` fragments from text that was never parsed as JSON.
pub fn strip_json_residue(input: &str) -> String {
    let without_ids = RE_ID_QUESTION.replace_all(input, "");
    RE_JSON_KEYWORDS
        .replace_all(&without_ids, "\n")
        .into_owned()
}

// ============================================================================
// Stage 3: Charset Restriction
// ============================================================================

/// CJK Unified Ideographs and extension blocks A through G.
const CJK_RANGES: &[(u32, u32)] = &[
    (0x4E00, 0x9FFF),   // CJK Unified Ideographs
    (0x3400, 0x4DBF),   // Extension A
    (0x20000, 0x2A6DF), // Extension B
    (0x2A700, 0x2B73F), // Extension C
    (0x2B740, 0x2B81F), // Extension D
    (0x2B820, 0x2CEAF), // Extension E
    (0x2CEB0, 0x2EBEF), // Extension F
    (0x30000, 0x3134F), // Extension G
];

/// Check if character is a CJK ideograph in one of the allowed blocks
pub fn is_cjk_ideograph(c: char) -> bool {
    let code = c as u32;
    CJK_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

/// Check if character survives restriction under the given mode.
///
/// Line breaks always survive; they carry the sentence splits.
pub fn is_allowed_char(c: char, mode: CharsetMode) -> bool {
    if c == '\n' || is_cjk_ideograph(c) {
        return true;
    }
    match mode {
        CharsetMode::AlphanumericCjk => c.is_ascii_alphanumeric(),
        CharsetMode::CjkOnly => false,
    }
}

/// Stage 3: Delete every character outside the allow-list.
pub fn stage3_restrict_charset(input: &str, mode: CharsetMode) -> String {
    input.chars().filter(|&c| is_allowed_char(c, mode)).collect()
}

// ============================================================================
// Stage 4: Final Trim
// ============================================================================

/// Stage 4: Drop blank sub-lines and trim each remaining one.
pub fn stage4_trim(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Normalizer
// ============================================================================

/// Compiled line normalizer.
///
/// Built once per run from [`PipelineOptions`] and shared read-only across
/// workers.
#[derive(Debug, Clone)]
pub struct LineNormalizer {
    charset: CharsetMode,
    nfc: bool,
    strip_json_residue: bool,
    noise: Regex,
}

impl Default for LineNormalizer {
    fn default() -> Self {
        Self {
            charset: CharsetMode::default(),
            nfc: false,
            strip_json_residue: false,
            noise: RE_DEFAULT_NOISE.clone(),
        }
    }
}

impl LineNormalizer {
    /// Creates a normalizer from run options.
    pub fn new(options: &PipelineOptions) -> Result<Self> {
        let noise = if options.extra_noise_phrases.is_empty() {
            RE_DEFAULT_NOISE.clone()
        } else {
            let mut phrases: Vec<&str> = NOISE_PHRASES.to_vec();
            phrases.extend(options.extra_noise_phrases.iter().map(String::as_str));
            build_noise_regex(phrases.as_slice())?
        };

        Ok(Self {
            charset: options.charset,
            nfc: options.nfc_normalize,
            strip_json_residue: options.strip_json_residue,
            noise,
        })
    }

    /// Character classes this normalizer keeps.
    pub fn charset(&self) -> CharsetMode {
        self.charset
    }

    /// Cleans one line or multi-line block.
    ///
    /// Returns `None` when nothing survives; such input must be dropped.
    pub fn normalize(&self, input: &str) -> Option<String> {
        let composed: Cow<'_, str> = if self.nfc {
            Cow::Owned(input.nfc().collect())
        } else {
            Cow::Borrowed(input)
        };
        let raw: Cow<'_, str> = if self.strip_json_residue {
            Cow::Owned(strip_json_residue(&composed))
        } else {
            composed
        };

        let split = stage1_split_sentences(&raw);
        let denoised = stage2_remove_noise(&split, &self.noise);
        let mut restricted = stage3_restrict_charset(&denoised, self.charset);

        // Restriction can glue together a phrase that was interrupted by
        // deleted characters.
        while self.noise.is_match(&restricted) {
            let denoised = stage2_remove_noise(&restricted, &self.noise);
            restricted = stage3_restrict_charset(&denoised, self.charset);
        }

        let cleaned = stage4_trim(&restricted);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn normalize(input: &str) -> Option<String> {
        LineNormalizer::default().normalize(input)
    }

    #[test]
    fn test_sentence_split() {
        assert_eq!(stage1_split_sentences("甲。乙，丙!丁"), "甲\n乙\n丙\n丁");
        assert_eq!(stage1_split_sentences(r"上\n下"), "上\n下");
    }

    #[test]
    fn test_formatted_entry_scenario() {
        let entry = format!("Title: X\noutput: Y。Z\n{}\n", "=".repeat(40));
        assert_eq!(normalize(&entry).unwrap(), "Title\nX\noutput\nY\nZ");
    }

    #[test]
    fn test_noise_phrases_removed() {
        for phrase in NOISE_PHRASES {
            let line = format!("前文{}后文", phrase);
            let cleaned = normalize(&line).unwrap();
            assert!(!cleaned.contains(phrase), "{phrase} survived in {cleaned}");
        }
    }

    #[test]
    fn test_longest_phrase_wins() {
        assert_eq!(normalize("统计去重段落数完毕").unwrap(), "统计完毕");
        assert_eq!(normalize("甲是否跨文件重复乙").unwrap(), "甲乙");
    }

    #[test]
    fn test_nested_noise_removed() {
        // Removing the inner phrase re-forms the outer one.
        assert_eq!(normalize("文件文件大小大小正文").unwrap(), "正文");
    }

    #[test]
    fn test_noise_rejoined_by_restriction() {
        assert_eq!(normalize("文件~大小正文").unwrap(), "正文");
        assert_eq!(normalize("文件 大小正文").unwrap(), "正文");
    }

    #[test]
    fn test_charset_alphanumeric() {
        assert_eq!(normalize("abc 123 《书》「引」—测试").unwrap(), "abc123书引测试");
    }

    #[test]
    fn test_charset_cjk_only() {
        let normalizer = LineNormalizer::new(&PipelineOptions::default().cjk_only()).unwrap();
        assert_eq!(normalizer.normalize("abc中文123").unwrap(), "中文");
        assert_eq!(normalizer.normalize("only ascii"), None);
    }

    #[test]
    fn test_extension_blocks_kept() {
        assert_eq!(normalize("㐀𠀀𪜀").unwrap(), "㐀𠀀𪜀");
        // Hangul and kana are outside the allow-list.
        assert_eq!(normalize("한국어かな"), None);
    }

    #[test]
    fn test_empty_result_is_none() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("  ，。！  "), None);
        assert_eq!(normalize("文件大小"), None);
    }

    #[test]
    fn test_trim_collapses_blank_lines() {
        assert_eq!(normalize("\n\n甲。。。乙\n\n").unwrap(), "甲\n乙");
    }

    #[test]
    fn test_extra_noise_phrase() {
        let options = PipelineOptions::default().with_noise_phrase("广告");
        let normalizer = LineNormalizer::new(&options).unwrap();
        assert_eq!(normalizer.normalize("正文广告正文").unwrap(), "正文正文");
    }

    #[test]
    fn test_extra_noise_phrase_is_literal() {
        let options = PipelineOptions::default().with_noise_phrase("a.b");
        let normalizer = LineNormalizer::new(&options).unwrap();
        // Stage 1 already split "a.b", so only the literal phrase is affected.
        assert_eq!(normalizer.normalize("axb").unwrap(), "axb");
    }

    #[test]
    fn test_json_residue_stripping() {
        let options = PipelineOptions::default().with_json_residue_stripping();
        let normalizer = LineNormalizer::new(&options).unwrap();
        let line = r#"{"id": "17", "问": "为何", "title" 春晓}"#;
        assert_eq!(normalizer.normalize(line).unwrap(), "春晓");
    }

    #[test]
    fn test_nfc_folds_compatibility_ideographs() {
        // U+F900 is a compatibility ideograph for U+8C48.
        assert_eq!(normalize("\u{F900}"), None);

        let normalizer = LineNormalizer::new(&PipelineOptions::default().with_nfc()).unwrap();
        assert_eq!(normalizer.normalize("\u{F900}").unwrap(), "\u{8C48}");
    }

    #[test]
    fn test_randomized_output_invariants() {
        const PALETTE: &[char] = &[
            '文', '件', '大', '小', '段', '落', '数', '去', '重', '是', '否', '复', '中', '国',
            '𠀀', 'a', 'Z', '7', ' ', '\t', '\n', '。', '，', ',', '.', '!', '？', '~', '《',
            '》', '-', '=', '\\', 'n', 'é', 'ア',
        ];

        let normalizer = LineNormalizer::default();
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let len = rng.gen_range(0..40);
            let input: String = (0..len)
                .map(|_| PALETTE[rng.gen_range(0..PALETTE.len())])
                .collect();

            let Some(cleaned) = normalizer.normalize(&input) else {
                continue;
            };

            assert!(
                cleaned
                    .chars()
                    .all(|c| is_allowed_char(c, CharsetMode::AlphanumericCjk)),
                "disallowed char in {cleaned:?} from {input:?}"
            );
            assert_eq!(cleaned, cleaned.trim());
            for phrase in NOISE_PHRASES {
                assert!(!cleaned.contains(phrase), "{phrase} in {cleaned:?}");
            }
            assert_eq!(
                normalizer.normalize(&cleaned).as_deref(),
                Some(cleaned.as_str()),
                "not idempotent for {input:?}"
            );
        }
    }
}
