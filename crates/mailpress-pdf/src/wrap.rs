//! Line wrapping
//!
//! Shared by mail-header values and body text. A line is split into a
//! leading prefix (quote markers or plain indent) and wrappable text; words
//! are packed greedily against a measuring closure, and a word too long for
//! a whole line is broken at the widest fitting boundary. The prefix is
//! repeated on continuation lines or replaced by a blank indent of equal
//! character width, depending on the caller.

/// Measuring closure: rendered width of a string in layout units
pub type Measure<'a> = dyn Fn(&str) -> f64 + 'a;

/// Split a line into its quote/indent prefix and the text to wrap.
///
/// The prefix is a run of one-or-more `>` quote markers, each optionally
/// followed by whitespace, or failing that a run of leading whitespace. A
/// line literally starting with `>From ` first has the leading `>` stripped
/// (mbox escape artifact) before recognition.
#[must_use]
pub fn split_prefix(line: &str) -> (&str, &str) {
    let line = line.strip_prefix('>').filter(|rest| rest.starts_with("From ")).unwrap_or(line);

    let bytes = line.as_bytes();
    let mut end = 0;
    let mut markers = 0;
    while end < bytes.len() {
        if bytes[end] == b'>' {
            markers += 1;
            end += 1;
            while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
                end += 1;
            }
        } else {
            break;
        }
    }
    if markers > 0 {
        return (&line[..end], &line[end..]);
    }

    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    (&line[..indent], &line[indent..])
}

/// Wrap one logical line into drawable lines, prefix included.
///
/// Always emits at least one line, even for empty text. Termination is
/// bounded: every emitted line consumes at least one character of an
/// oversize word.
#[must_use]
pub fn wrap_line(line: &str, avail: f64, measure: &Measure<'_>, repeat_prefix: bool) -> Vec<String> {
    let (prefix, rest) = split_prefix(line);
    let blank_indent: String = " ".repeat(prefix.chars().count());

    let mut words: std::collections::VecDeque<&str> = rest.split_whitespace().collect();
    let mut out: Vec<String> = Vec::new();

    loop {
        let lead = if out.is_empty() || repeat_prefix {
            prefix.to_string()
        } else {
            blank_indent.clone()
        };

        if words.is_empty() {
            if out.is_empty() {
                out.push(lead.trim_end().to_string());
            }
            return out;
        }

        let mut current = lead.clone();
        let mut packed = 0;
        while let Some(word) = words.front() {
            let candidate = if current.len() > lead.len() {
                format!("{current} {word}")
            } else {
                format!("{current}{word}")
            };
            if measure(&candidate) <= avail {
                current = candidate;
                words.pop_front();
                packed += 1;
            } else {
                break;
            }
        }

        if packed == 0 {
            // first word wider than the whole line: break the word itself
            let word = words.pop_front().unwrap_or_default();
            let room = avail - measure(&current);
            let (head, tail) = break_word(word, room, measure);
            current.push_str(head);
            if !tail.is_empty() {
                words.push_front(tail);
            }
            out.push(current);
            continue;
        }

        out.push(current);
        if words.is_empty() {
            return out;
        }
    }
}

/// Break `word` at the widest prefix fitting into `room`.
///
/// Estimates the break point proportionally to character count versus
/// measured width, then adjusts one character at a time. Always takes at
/// least one character so the caller makes progress.
fn break_word<'a>(word: &'a str, room: f64, measure: &Measure<'_>) -> (&'a str, &'a str) {
    let count = word.chars().count();
    if count <= 1 {
        return (word, "");
    }
    let full = measure(word);
    if full <= room {
        return (word, "");
    }

    let estimate = if full > 0.0 {
        ((f64::from(u32::try_from(count).unwrap_or(u32::MAX)) * room / full) as usize)
            .clamp(1, count)
    } else {
        count
    };

    let boundary = |chars: usize| word.char_indices().nth(chars).map_or(word.len(), |(i, _)| i);

    // trim until it fits
    let mut cut = estimate;
    while cut > 1 && measure(&word[..boundary(cut)]) > room {
        cut -= 1;
    }
    // then extend while the next character still fits
    while cut < count && measure(&word[..boundary(cut + 1)]) <= room {
        cut += 1;
    }

    let at = boundary(cut);
    (&word[..at], &word[at..])
}
