//! Text helpers for pulling clean fragments out of free-form model prose
//!
//! Nothing here panics on arbitrary input; every helper either returns a
//! cleaned fragment or `None`/a documented default.

use crate::knowledge::ParsingConfig;
use ahash::AHashSet;
use regex::Regex;

/// Longest run of words treated as a field label before a colon
const MAX_LABEL_WORDS: usize = 5;

/// Locate the section keyword and return up to two sentences after it
///
/// Leading `:`, `-`, `*` and whitespace after the keyword are skipped. The scan
/// stops at a section break (`**`, `---` or a blank line), at a line that opens
/// the next bullet or `Label:` field, after the second sentence end, or once
/// `max_len` is exceeded. Without any sentence end the text is cut at `max_len`
/// on a word boundary.
pub fn extract_clean_section(
    text: &str,
    keyword: &Regex,
    max_len: usize,
    rules: &ParsingConfig,
) -> Option<String> {
    let found = keyword.find(text)?;

    let body = text[found.end()..]
        .trim_start_matches(|c: char| c == ':' || c == '-' || c == '*' || c.is_whitespace());

    let mut sentence_end: Option<usize> = None;
    let mut sentences = 0;
    let mut stop = body.len();

    for (i, c) in body.char_indices() {
        if sentence_end.is_some_and(|end| end >= max_len) {
            break;
        }
        let tail = &body[i..];
        if tail.starts_with("**")
            || tail.starts_with("---")
            || tail.starts_with("\n\n")
            || (c == '\n' && opens_field(&tail[1..]))
        {
            stop = i;
            break;
        }
        if matches!(c, '.' | '!' | '?') {
            sentences += 1;
            sentence_end = Some(i + 1);
            if sentences >= 2 {
                break;
            }
        }
    }

    let end = match sentence_end {
        Some(end) => end,
        None => {
            let limit = floor_char_boundary(body, max_len.min(stop));
            if limit < stop {
                body[..limit].rfind(' ').unwrap_or(0)
            } else {
                limit
            }
        }
    };

    let extracted = body[..end].trim();
    if extracted.chars().count() <= 8 {
        return None;
    }
    clean_sentence(extracted, rules)
}

/// Strip markup and reject fragments that are too short or known garbage
///
/// Long fragments without terminal punctuation are cut back to the last
/// complete phrase and given a full stop.
pub fn clean_sentence(text: &str, rules: &ParsingConfig) -> Option<String> {
    let without_stars = text.replace('*', "");
    let stripped = without_stars.trim_start_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
    let mut cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.chars().count() < rules.min_fragment_len {
        return None;
    }

    let lower = cleaned.to_lowercase();
    if rules.denylist.iter().any(|d| lower.contains(d.as_str()))
        || rules
            .denied_prefixes
            .iter()
            .any(|p| lower.starts_with(p.as_str()))
    {
        return None;
    }

    if cleaned.len() > 15 && !cleaned.ends_with(['.', '!', '?']) {
        if cleaned.contains(" and ") {
            if let Some(pos) = cleaned.rfind(" and ").filter(|&p| p > 10) {
                cleaned.truncate(pos);
                cleaned.push('.');
            }
        } else if cleaned.len() > 50 && cleaned.contains(", ") {
            if let Some(pos) = cleaned.rfind(", ").filter(|&p| p > 20) {
                cleaned.truncate(pos);
                cleaned.push('.');
            }
        }
    }

    Some(cleaned)
}

/// "sweet corn" -> "Sweet Corn"
pub fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Whether a segment contains words that mark it as prose rather than a crop name
pub fn contains_filler(text: &str, rules: &ParsingConfig) -> bool {
    let lower = text.to_lowercase();
    rules.filler_words.iter().any(|w| lower.contains(w.as_str()))
}

/// Crop names found in a comma/semicolon/newline separated list
///
/// Known vocabulary entries are picked out of each segment; a short segment
/// (three words or fewer, no filler words) is accepted as a crop name itself.
/// Returns an empty list when nothing qualifies.
pub fn parse_crop_names(text: &str, rules: &ParsingConfig) -> Vec<String> {
    let cleaned = strip_list_markers(&text.to_lowercase());

    let mut seen = AHashSet::new();
    let mut crops = Vec::new();
    let mut push = |name: String, crops: &mut Vec<String>| {
        if seen.insert(name.clone()) {
            crops.push(name);
        }
    };

    for segment in cleaned
        .split([',', '\n', ';'])
        .map(str::trim)
        .filter(|s| s.chars().count() > 2)
    {
        for crop in &rules.crop_vocabulary {
            if segment.contains(crop.as_str()) {
                push(capitalize_words(crop), &mut crops);
            }
        }

        if segment.split_whitespace().count() <= 3 && !contains_filler(segment, rules) {
            if let Some(name) = clean_sentence(segment, rules) {
                let len = name.chars().count();
                if len > 2 && len < 25 {
                    push(capitalize_words(&name), &mut crops);
                }
            }
        }
    }

    crops
}

/// Words from `vocabulary` that occur anywhere in `text`, in vocabulary order
pub fn find_mentions(text: &str, vocabulary: &[String], limit: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .filter(|w| lower.contains(w.as_str()))
        .take(limit)
        .cloned()
        .collect()
}

/// Drop numbered-list markers ("1.") and parentheses/asterisks
fn strip_list_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == '.' && !digits.is_empty() {
            digits.clear();
            continue;
        }
        out.push_str(&digits);
        digits.clear();
        if !matches!(c, '(' | ')' | '*') {
            out.push(c);
        }
    }
    out.push_str(&digits);
    out
}

/// Whether a line starts a list item ("-", "*", "•", "3.") or a short "Label:"
fn opens_field(line: &str) -> bool {
    let line = line.trim_start_matches([' ', '\t']);
    if line.starts_with(['-', '*', '•']) {
        return true;
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && line[digits..].starts_with('.') {
        return true;
    }

    let first_line = line.split('\n').next().unwrap_or_default();
    first_line.split_once(':').is_some_and(|(label, _)| {
        let words = label.split_whitespace().count();
        (1..=MAX_LABEL_WORDS).contains(&words)
            && label
                .chars()
                .all(|c| c.is_alphabetic() || matches!(c, ' ' | '(' | ')' | '/' | '&'))
    })
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
