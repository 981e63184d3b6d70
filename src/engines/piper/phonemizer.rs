use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::config::PhonemeIdMap;
use super::model::PiperError;

/// Where to find espeak-ng.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// espeak-ng binary; `None` uses `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// Directory containing `espeak-ng-data`; `None` uses the built-in default.
    pub data_path: Option<PathBuf>,
}

/// Convert text to phoneme sentences via espeak-ng.
///
/// Each returned sentence is a list of IPA phoneme characters (plus mapped
/// punctuation and word spaces). Sentences end at `.`, `!` and `?`.
pub fn phonemize(
    text: &str,
    lang: &str,
    map: &PhonemeIdMap,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<char>>, PiperError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(Vec::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_phonemes = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, lang, espeak)?
    };

    let mut sentences = Vec::new();
    let mut current = Vec::new();
    let mut segment_index = 0usize;
    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(phonemes) = segment_phonemes.get(segment_index) {
                    if !current.is_empty() && current.last() != Some(&' ') {
                        current.push(' ');
                    }
                    current.extend_from_slice(phonemes);
                }
                segment_index += 1;
            }
            TextPart::Punct(ch) => {
                if map.contains(ch) {
                    current.push(ch);
                }
                if matches!(ch, '.' | '!' | '?') && !current.is_empty() {
                    sentences.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '¡' | '¿' | '—' | '…' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn phonemize_segments_batch(
    segments: &[&str],
    lang: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<char>>, PiperError> {
    let batched_input = segments.join("\n");
    let output = run_espeak(&batched_input, lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    // One output line per input line is expected; otherwise go one by one.
    if lines.len() != segments.len() {
        return segments
            .iter()
            .map(|segment| Ok(ipa_to_phonemes(&run_espeak(segment, lang, espeak)?)))
            .collect();
    }

    Ok(lines.iter().map(|line| ipa_to_phonemes(line)).collect())
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, PiperError> {
    let program = espeak
        .bin_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("espeak-ng"));
    let mut command = Command::new(program);
    command
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(data) = &espeak.data_path {
        command.env("ESPEAK_DATA_PATH", data);
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PiperError::EspeakNotFound
        } else {
            PiperError::Io(e)
        }
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        // Without a final newline espeak-ng can under-process the last token.
        let stdin_payload = canonicalize_espeak_stdin_payload(input);
        stdin
            .write_all(stdin_payload.as_bytes())
            .map_err(PiperError::Io)?;
    }

    let output = child.wait_with_output().map_err(PiperError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PiperError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

fn ipa_to_phonemes(ipa: &str) -> Vec<char> {
    let mut phonemes = Vec::new();
    for line in ipa.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !phonemes.is_empty() {
            phonemes.push(' ');
        }
        phonemes.extend(line.chars().filter(|&ch| ch != '_'));
    }
    phonemes
}
