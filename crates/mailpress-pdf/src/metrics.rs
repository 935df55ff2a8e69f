//! Width metrics for the built-in PDF fonts
//!
//! Character advance widths in 1/1000 em for the standard fonts mailpress
//! embeds by name (no font files involved). Values are the published AFM
//! widths for the printable ASCII range; characters outside it fall back to
//! a representative width so measurement stays monotonic.

use crate::canvas::FontFace;

/// Helvetica, codes 32..=126
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, // 'A'..'P'
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'Q'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, // 'a'..'p'
    556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'q'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold, codes 32..=126
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667,
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611,
    611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Courier is fixed-pitch
const COURIER_ADVANCE: u16 = 600;

/// Advance width of one character in 1/1000 em
#[must_use]
pub fn char_width(face: FontFace, c: char) -> u16 {
    match face {
        FontFace::Courier | FontFace::CourierBold => COURIER_ADVANCE,
        FontFace::Helvetica | FontFace::HelveticaBold => {
            let table = if face == FontFace::Helvetica {
                &HELVETICA
            } else {
                &HELVETICA_BOLD
            };
            match u32::from(c).checked_sub(32) {
                Some(idx) if (idx as usize) < table.len() => table[idx as usize],
                // control chars take no space; everything else measures as 'n'
                _ if c.is_control() => 0,
                _ => table[(b'n' - 32) as usize],
            }
        }
    }
}

/// Width of a string at a font size, in layout units (points)
#[must_use]
pub fn text_width(face: FontFace, size: f64, text: &str) -> f64 {
    let millems: u32 = text.chars().map(|c| u32::from(char_width(face, c))).sum();
    f64::from(millems) * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courier_is_fixed_pitch() {
        assert_eq!(char_width(FontFace::Courier, 'i'), 600);
        assert_eq!(char_width(FontFace::Courier, 'W'), 600);
        let w = text_width(FontFace::Courier, 10.0, "abcde");
        assert!((w - 5.0 * 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_helvetica_is_proportional() {
        assert!(char_width(FontFace::Helvetica, 'i') < char_width(FontFace::Helvetica, 'W'));
    }

    #[test]
    fn test_bold_at_least_as_wide() {
        for c in ' '..='~' {
            assert!(
                char_width(FontFace::HelveticaBold, c) + 60 >= char_width(FontFace::Helvetica, c),
                "suspicious width for {c:?}"
            );
        }
    }

    #[test]
    fn test_width_scales_with_size() {
        let small = text_width(FontFace::Helvetica, 8.0, "hello");
        let large = text_width(FontFace::Helvetica, 16.0, "hello");
        assert!((large - 2.0 * small).abs() < 1e-9);
    }

    #[test]
    fn test_control_chars_are_zero_width() {
        assert_eq!(char_width(FontFace::Helvetica, '\t'), 0);
    }
}
