//! Narration excerpt selection.
//!
//! Picks the paragraph of a story that reads best aloud: paragraphs are scored
//! by tone vocabulary, the best one wins, and long text is cut back to a
//! sentence boundary.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_EXCERPT_MAX_CHARS;

/// Source text shorter than this cannot be narrated.
pub const MIN_SOURCE_CHARS: usize = 100;

/// Paragraphs shorter than this are not considered.
pub const MIN_PARAGRAPH_CHARS: usize = 40;

/// Score deducted per disallowed word.
pub const DISALLOWED_PENALTY: i64 = 100;

/// Backtrack windows, as fractions of the cap, tried in order.
const SENTENCE_WINDOWS: [f64; 2] = [0.7, 0.5];

const TONE_WORDS: &[&str] = &[
    "heart", "kiss", "love", "desire", "touch", "breath", "lips", "whisper", "pulse", "longing",
    "passion", "embrace", "gaze", "warmth", "ache", "tension", "secret", "forbidden", "blush",
    "skin", "tremble",
];

/// Suffixes accepted after a vocabulary stem ("kissed", "whispers").
const WORD_SUFFIXES: &[&str] = &["", "s", "es", "d", "ed", "ing"];

/// The chosen excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneExcerpt {
    pub text: String,
    /// Index of the source paragraph
    pub paragraph: usize,
    pub score: i64,
    /// Whether the paragraph was cut to fit the cap
    pub truncated: bool,
}

/// Scores story paragraphs and extracts a bounded excerpt.
#[derive(Debug, Clone)]
pub struct SceneSelector {
    max_chars: usize,
    min_paragraph_chars: usize,
    tone_words: Vec<String>,
    disallowed_words: Vec<String>,
}

impl Default for SceneSelector {
    fn default() -> Self {
        Self::new(DEFAULT_EXCERPT_MAX_CHARS)
    }
}

impl SceneSelector {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            min_paragraph_chars: MIN_PARAGRAPH_CHARS,
            tone_words: TONE_WORDS.iter().map(|w| w.to_string()).collect(),
            disallowed_words: Vec::new(),
        }
    }

    pub fn with_disallowed_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_words = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Whether `text` is long enough to narrate at all.
    pub fn is_plausible_source(text: &str) -> bool {
        text.trim().chars().count() >= MIN_SOURCE_CHARS
    }

    /// Tone score of one paragraph.
    pub fn score(&self, paragraph: &str) -> i64 {
        let mut score = 0i64;
        for token in tokens(paragraph) {
            if self.disallowed_words.iter().any(|w| matches_word(&token, w)) {
                score -= DISALLOWED_PENALTY;
            } else if self.tone_words.iter().any(|w| matches_word(&token, w)) {
                score += 1;
            }
        }
        score
    }

    /// Select the excerpt to narrate from a full story.
    pub fn select(&self, text: &str) -> SceneExcerpt {
        let paragraphs = split_paragraphs(text);

        let mut best: Option<(usize, i64)> = None;
        let mut first_eligible: Option<usize> = None;
        for (index, paragraph) in paragraphs.iter().enumerate() {
            if paragraph.chars().count() < self.min_paragraph_chars {
                continue;
            }
            first_eligible.get_or_insert(index);

            let score = self.score(paragraph);
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        let (paragraph, score) = match (best, first_eligible) {
            (Some(found), _) => found,
            (None, Some(index)) => (index, self.score(&paragraphs[index])),
            (None, None) => (0, 0),
        };

        let source = paragraphs
            .get(paragraph)
            .cloned()
            .unwrap_or_else(|| text.trim().to_string());
        let truncated = source.chars().count() > self.max_chars;
        let text = truncate_at_sentence(&source, self.max_chars);

        SceneExcerpt {
            text,
            paragraph,
            score,
            truncated,
        }
    }
}

/// Blank-line delimited paragraphs, each collapsed onto one line.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn matches_word(token: &str, stem: &str) -> bool {
    token
        .strip_prefix(stem)
        .map_or(false, |rest| WORD_SUFFIXES.contains(&rest))
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201D}' | '\u{2019}' | ')')
}

/// End index (exclusive) of the last sentence ending at or after `min_end`.
fn last_sentence_end(chars: &[char], min_end: usize) -> Option<usize> {
    let index = chars.iter().rposition(|&c| is_terminal(c))?;
    let mut end = index + 1;
    while end < chars.len() && is_closing_quote(chars[end]) {
        end += 1;
    }
    if end >= min_end {
        Some(end)
    } else {
        None
    }
}

/// Cut `text` to at most `max_chars` characters, preferring a sentence end.
///
/// Tries the last sentence end past 70% of the cap, then past 50%, then the
/// last word boundary, and only then cuts hard.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let window = &chars[..max_chars];
    for ratio in SENTENCE_WINDOWS {
        let min_end = (max_chars as f64 * ratio).ceil() as usize;
        if let Some(end) = last_sentence_end(window, min_end) {
            return window[..end].iter().collect::<String>().trim_end().to_string();
        }
    }

    // Cap lands exactly on a word boundary.
    if chars[max_chars].is_whitespace() {
        return window.iter().collect::<String>().trim_end().to_string();
    }
    if let Some(space) = window.iter().rposition(|c| c.is_whitespace()) {
        let cut: String = window[..space].iter().collect();
        let cut = cut.trim_end();
        if !cut.is_empty() {
            return cut.to_string();
        }
    }
    window.iter().collect()
}

/// Sentences of `text`, terminal punctuation and closing quotes included.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        let ends_here = is_terminal(c)
            || (is_closing_quote(c) && i > 0 && is_terminal(chars[i - 1]));
        let at_boundary = chars.get(i + 1).map_or(true, |next| next.is_whitespace());
        if ends_here && at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Split an excerpt into at most `slides` groups of whole sentences with
/// roughly equal length.
pub fn split_slides(excerpt: &str, slides: usize) -> Vec<String> {
    let sentences = split_sentences(excerpt);
    if sentences.is_empty() {
        return vec![excerpt.trim().to_string()];
    }

    let count = slides.clamp(1, sentences.len());
    let lengths: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();
    let mut groups = Vec::with_capacity(count);
    let mut start = 0;

    for group in 0..count {
        let groups_left = count - group;
        if groups_left == 1 {
            groups.push(sentences[start..].join(" "));
            break;
        }

        let remaining: usize = lengths[start..].iter().sum();
        let target = remaining / groups_left;
        let last_allowed = sentences.len() - (groups_left - 1);
        let mut end = start + 1;
        let mut len = lengths[start];
        while end < last_allowed && len < target {
            len += lengths[end];
            end += 1;
        }
        groups.push(sentences[start..end].join(" "));
        start = end;
    }
    groups
}
