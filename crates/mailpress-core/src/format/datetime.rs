//! `%`-escape recognition
//!
//! Date/time escapes compile down to validated strftime fragments that are
//! later rendered with chrono against the context timestamp. Validation
//! happens here, at compile time: anything outside the supported grammar is
//! a [`TemplateError`], so rendering can never hit an unknown pattern.

use crate::error::{CompileResult, TemplateError};

/// Single strftime letters accepted after `%`
const LETTERS: &str = "YCymbBhdejaAwuHIMSpPzZsDFRTvcrxXklGgVUW";

/// Letters that denote numeric fields and therefore accept a padding flag
const PADDABLE: &str = "YCymdejwuHIMSkl";

/// Words accepted inside `%{...}`, with their strftime equivalents
const WORDS: &[(&str, &str)] = &[
    ("year", "%Y"),
    ("month", "%m"),
    ("monthname", "%B"),
    ("day", "%d"),
    ("hour", "%H"),
    ("minute", "%M"),
    ("second", "%S"),
    ("weekday", "%A"),
    ("zone", "%Z"),
];

/// Outcome of scanning one `%` escape
pub(super) enum Percent {
    /// `%%`
    Literal(char),
    /// A validated strftime fragment such as `%Y`, `%-d`, `%3f` or `%B`
    Fragment(String),
}

/// Scan the escape following a consumed `%`. `pos` is advanced past it.
pub(super) fn parse_percent(chars: &[char], pos: &mut usize) -> CompileResult<Percent> {
    let Some(&first) = chars.get(*pos) else {
        return Err(TemplateError::TrailingEscape);
    };
    *pos += 1;

    match first {
        '%' => Ok(Percent::Literal('%')),
        '{' => {
            let word = read_braced(chars, pos)?;
            let fragment = WORDS
                .iter()
                .find(|(name, _)| *name == word)
                .map(|(_, fmt)| (*fmt).to_string())
                .ok_or(TemplateError::UnknownDateWord(word))?;
            Ok(Percent::Fragment(fragment))
        }
        // numeric+code pattern: fractional seconds with fixed precision
        '3' | '6' | '9' => match chars.get(*pos) {
            Some('f') => {
                *pos += 1;
                Ok(Percent::Fragment(format!("%{first}f")))
            }
            _ => Err(TemplateError::UnknownDateCode(first.to_string())),
        },
        // padding flag, must be followed by a numeric letter
        '-' | '0' | '_' => match chars.get(*pos) {
            Some(&letter) if PADDABLE.contains(letter) => {
                *pos += 1;
                Ok(Percent::Fragment(format!("%{first}{letter}")))
            }
            Some(&letter) => Err(TemplateError::UnknownDateCode(format!("{first}{letter}"))),
            None => Err(TemplateError::TrailingEscape),
        },
        letter if LETTERS.contains(letter) => Ok(Percent::Fragment(format!("%{letter}"))),
        other => Err(TemplateError::UnknownDateCode(other.to_string())),
    }
}

/// Read the word of a `%{word}` escape, consuming the closing brace
fn read_braced(chars: &[char], pos: &mut usize) -> CompileResult<String> {
    let mut word = String::new();
    loop {
        match chars.get(*pos) {
            Some('}') => {
                *pos += 1;
                return Ok(word);
            }
            Some(&c) => {
                word.push(c);
                *pos += 1;
            }
            None => return Err(TemplateError::UnterminatedBrace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(s: &str) -> CompileResult<String> {
        let chars: Vec<char> = s.chars().collect();
        let mut pos = 0;
        match parse_percent(&chars, &mut pos)? {
            Percent::Literal(c) => Ok(c.to_string()),
            Percent::Fragment(f) => Ok(f),
        }
    }

    #[test]
    fn test_single_letters() {
        assert_eq!(scan("Y").unwrap(), "%Y");
        assert_eq!(scan("B").unwrap(), "%B");
        assert_eq!(scan("S").unwrap(), "%S");
    }

    #[test]
    fn test_padding_flags() {
        assert_eq!(scan("-d").unwrap(), "%-d");
        assert_eq!(scan("0e").unwrap(), "%0e");
        assert_eq!(scan("_m").unwrap(), "%_m");
    }

    #[test]
    fn test_padding_flag_requires_numeric_letter() {
        assert!(matches!(
            scan("-B"),
            Err(TemplateError::UnknownDateCode(_))
        ));
    }

    #[test]
    fn test_fractional_seconds() {
        assert_eq!(scan("3f").unwrap(), "%3f");
        assert_eq!(scan("9f").unwrap(), "%9f");
        assert!(scan("4f").is_err());
    }

    #[test]
    fn test_braced_words() {
        assert_eq!(scan("{year}").unwrap(), "%Y");
        assert_eq!(scan("{monthname}").unwrap(), "%B");
        assert!(matches!(
            scan("{century}"),
            Err(TemplateError::UnknownDateWord(_))
        ));
    }

    #[test]
    fn test_unterminated_brace() {
        assert_eq!(scan("{year"), Err(TemplateError::UnterminatedBrace));
    }

    #[test]
    fn test_unknown_letter() {
        assert!(matches!(scan("q"), Err(TemplateError::UnknownDateCode(_))));
    }

    #[test]
    fn test_literal_percent() {
        assert_eq!(scan("%").unwrap(), "%");
    }
}
