//! Text repair used by the extractors before and during parsing.
//!
//! JSON repair is a single forward pass followed by one retry by the caller;
//! nothing here loops until success.

/// Outcome of [`repair_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRepair {
    pub text: String,
    /// Trailing commas removed before a closer.
    pub trailing_commas: usize,
    /// Bytes of the input dropped after the last balanced closer.
    pub trimmed_bytes: usize,
    /// Closers appended to balance the document.
    pub closers_added: usize,
    /// Text after the top-level value was dropped.
    pub postamble_dropped: bool,
}

impl JsonRepair {
    /// Whether the input ended before the document did.
    pub fn was_truncated(&self) -> bool {
        self.trimmed_bytes > 0 || self.closers_added > 0
    }

    pub fn describe(&self) -> String {
        let mut steps = Vec::new();
        if self.trailing_commas > 0 {
            steps.push(format!("removed {} trailing comma(s)", self.trailing_commas));
        }
        if self.trimmed_bytes > 0 {
            steps.push(format!(
                "trimmed {} byte(s) after the last balanced closer",
                self.trimmed_bytes
            ));
        }
        if self.closers_added > 0 {
            steps.push(format!("appended {} closer(s)", self.closers_added));
        }
        if self.postamble_dropped {
            steps.push("dropped text after the document".to_string());
        }
        format!("JSON repaired before parsing: {}", steps.join(", "))
    }
}

fn drop_trailing_comma(out: &mut String) -> bool {
    let kept = out.trim_end().len();
    if out[..kept].ends_with(',') {
        out.truncate(kept - 1);
        true
    } else {
        false
    }
}

fn closer_for(opener: char) -> char {
    if opener == '[' {
        ']'
    } else {
        '}'
    }
}

/// Balances a possibly truncated JSON document starting at its first `{` or `[`.
///
/// Returns `None` when the text needs no change or when no balanced prefix exists.
pub fn repair_json(text: &str) -> Option<JsonRepair> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut trailing_commas = 0;
    let mut safe_cut: Option<(usize, Vec<char>)> = None;
    let mut consumed = text.len();
    let mut started = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                started = true;
                stack.push(c);
                out.push(c);
            }
            '}' | ']' => {
                if drop_trailing_comma(&mut out) {
                    trailing_commas += 1;
                }
                // A mismatched closer is treated as closing the innermost open value.
                let Some(opener) = stack.pop() else {
                    continue;
                };
                out.push(closer_for(opener));
                if stack.is_empty() {
                    consumed = idx + c.len_utf8();
                    break;
                }
                safe_cut = Some((out.len(), stack.clone()));
            }
            _ => out.push(c),
        }
    }

    if !started {
        return None;
    }

    let postamble_dropped = consumed < text.len() && !text[consumed..].trim().is_empty();

    if stack.is_empty() {
        if trailing_commas == 0 && !postamble_dropped {
            return None;
        }
        return Some(JsonRepair {
            text: out,
            trailing_commas,
            trimmed_bytes: 0,
            closers_added: 0,
            postamble_dropped,
        });
    }

    let (cut, open) = safe_cut?;
    let trimmed_bytes = out.len() - cut;
    out.truncate(cut);
    let kept = out.trim_end().len();
    out.truncate(kept);
    drop_trailing_comma(&mut out);
    for opener in open.iter().rev() {
        out.push(closer_for(*opener));
    }

    Some(JsonRepair {
        text: out,
        trailing_commas,
        trimmed_bytes,
        closers_added: open.len(),
        postamble_dropped: false,
    })
}

/// Returns the JSON document inside `raw`, skipping a prose preamble and a code fence.
pub fn strip_to_json(raw: &str) -> &str {
    let mut body = raw.trim_start();
    if let Some(fence) = body.find("```") {
        let before = &body[..fence];
        if !before.contains('{') {
            let after_fence = &body[fence + 3..];
            let body_start = after_fence.find('\n').map(|n| n + 1).unwrap_or(after_fence.len());
            body = &after_fence[body_start..];
            if let Some(close) = body.rfind("```") {
                // A fence inside file content is not the closing fence.
                if body[..close].trim_end().ends_with(['}', ']']) {
                    body = &body[..close];
                }
            }
        }
    }
    match body.find(['{', '[']) {
        Some(start) => body[start..].trim_end(),
        None => body.trim(),
    }
}

/// A JSON string literal read from raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonString {
    pub value: String,
    pub terminated: bool,
    /// Byte offset just past the closing quote (or the end of the input).
    pub end: usize,
}

/// The UTF-16 code unit written as four hex digits at the start of `text`.
fn hex_unit(text: &str) -> Option<u32> {
    let hex = text.get(..4)?;
    u32::from_str_radix(hex, 16).ok()
}

/// Decodes the string literal whose opening quote is at `quote`.
///
/// An unterminated literal decodes up to the end of the text. A dangling
/// escape at the very end is dropped.
pub fn read_json_string(text: &str, quote: usize) -> Option<JsonString> {
    if !text[quote..].starts_with('"') {
        return None;
    }
    let mut value = String::new();
    let mut chars = text[quote + 1..].char_indices();
    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => {
                return Some(JsonString {
                    value,
                    terminated: true,
                    end: quote + 1 + offset + 1,
                })
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, 'b')) => value.push('\u{8}'),
                Some((_, 'f')) => value.push('\u{c}'),
                Some((_, 'u')) => {
                    let Some(unit) = hex_unit(chars.as_str()) else {
                        continue;
                    };
                    for _ in 0..4 {
                        chars.next();
                    }
                    if (0xD800..0xDC00).contains(&unit) {
                        let low = chars
                            .as_str()
                            .strip_prefix("\\u")
                            .and_then(hex_unit)
                            .filter(|low| (0xDC00..0xE000).contains(low));
                        if let Some(low) = low {
                            for _ in 0..6 {
                                chars.next();
                            }
                            let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                            value.extend(char::from_u32(combined));
                        }
                    } else {
                        value.extend(char::from_u32(unit));
                    }
                }
                Some((_, other)) => value.push(other),
                None => break,
            },
            _ => value.push(c),
        }
    }
    Some(JsonString {
        value,
        terminated: false,
        end: text.len(),
    })
}

/// Where a delimited section's body stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEnd {
    /// A matching closing sentinel: body ends at `body_end`, scanning resumes at `resume`.
    Closed { body_end: usize, resume: usize },
    /// No closer before the next opener: the boundary is inferred at the opener.
    Transition { body_end: usize },
    /// Neither closer nor opener follows.
    EndOfText,
}

/// Picks the end of a section given the next matching closer and the next opener.
pub fn infer_section_end(
    closer: Option<(usize, usize)>,
    next_opener: Option<usize>,
) -> SectionEnd {
    match (closer, next_opener) {
        (Some((start, end)), Some(open)) if start < open => SectionEnd::Closed {
            body_end: start,
            resume: end,
        },
        (Some((start, end)), None) => SectionEnd::Closed {
            body_end: start,
            resume: end,
        },
        (_, Some(open)) => SectionEnd::Transition { body_end: open },
        (None, None) => SectionEnd::EndOfText,
    }
}
