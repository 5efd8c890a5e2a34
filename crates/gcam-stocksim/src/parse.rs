//! Line scanner for the G-code dialect gcam emits.
//!
//! Only what the simulator needs is recognized: letter/number words and the
//! `GCAM:` markers. Markers are found anywhere on the raw line, comments
//! included, before comments are stripped for word parsing.

use gcam_kernel_cam::{MARKER_ORIGIN, MARKER_TOOL_DIAMETER};
use tracing::debug;

const MARKER_PREFIX: &str = "GCAM:";

/// Machine state carried by a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marker {
    /// Diameter of the tool now in the spindle.
    ToolDiameter(f64),
    /// Program zero inside the stock, from the stock's min X, min Y, top.
    Origin([f64; 3]),
}

/// One address word such as `X1.5` or `G83`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Upper-case address letter.
    pub letter: char,
    /// Numeric value.
    pub value: f64,
}

/// Everything recognized on one program line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    /// Words in line order.
    pub words: Vec<Word>,
    /// Markers in line order.
    pub markers: Vec<Marker>,
}

impl Line {
    /// Value of the last word with `letter`.
    pub fn value(&self, letter: char) -> Option<f64> {
        self.words
            .iter()
            .rev()
            .find(|w| w.letter == letter)
            .map(|w| w.value)
    }

    /// Values of every word with `letter`, in order.
    pub fn values(&self, letter: char) -> impl Iterator<Item = f64> + '_ {
        self.words
            .iter()
            .filter(move |w| w.letter == letter)
            .map(|w| w.value)
    }

    /// True if the line names a G code.
    pub fn has_g(&self) -> bool {
        self.words.iter().any(|w| w.letter == 'G')
    }

    /// True if the line carries an X or Y coordinate.
    pub fn has_xy(&self) -> bool {
        self.words.iter().any(|w| matches!(w.letter, 'X' | 'Y'))
    }

    /// True if the line carries any of X, Y or Z.
    pub fn has_axis(&self) -> bool {
        self.words.iter().any(|w| matches!(w.letter, 'X' | 'Y' | 'Z'))
    }

    /// True for a blank or comment-only line.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.markers.is_empty()
    }
}

/// Scan one line.
pub fn parse_line(line: &str) -> Line {
    Line {
        markers: scan_markers(line),
        words: scan_words(&strip_comments(line)),
    }
}

fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_paren = false;
    for c in line.chars() {
        match c {
            ';' if !in_paren => break,
            '(' => in_paren = true,
            ')' if in_paren => in_paren = false,
            _ if !in_paren => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+')
}

fn scan_words(text: &str) -> Vec<Word> {
    let bytes = text.as_bytes();
    let mut words = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if !b.is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let letter = (b as char).to_ascii_uppercase();
        i += 1;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && is_number_byte(bytes[i]) {
            i += 1;
        }
        match text[start..i].parse::<f64>() {
            Ok(value) => words.push(Word { letter, value }),
            Err(_) if start == i => {}
            Err(_) => debug!(word = &text[start - 1..i], "unparsable word"),
        }
    }
    words
}

fn marker_values(mut tail: &str) -> Vec<f64> {
    let mut values = Vec::new();
    loop {
        let end = tail
            .bytes()
            .position(|b| !(is_number_byte(b) || b == b'e' || b == b'E'))
            .unwrap_or(tail.len());
        let Ok(v) = tail[..end].parse::<f64>() else {
            break;
        };
        values.push(v);
        match tail[end..].strip_prefix(':') {
            Some(rest) => tail = rest,
            None => break,
        }
    }
    values
}

fn scan_markers(line: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    for (at, _) in line.match_indices(MARKER_PREFIX) {
        let rest = &line[at + MARKER_PREFIX.len()..];
        let Some((name, tail)) = rest.split_once(':') else {
            continue;
        };
        match (name, marker_values(tail).as_slice()) {
            (MARKER_TOOL_DIAMETER, [d, ..]) => markers.push(Marker::ToolDiameter(*d)),
            (MARKER_ORIGIN, [x, y, z, ..]) => markers.push(Marker::Origin([*x, *y, *z])),
            _ => debug!(name, "ignoring marker"),
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(line: &Line) -> String {
        line.words.iter().map(|w| w.letter).collect()
    }

    #[test]
    fn test_words_and_comments() {
        let line = parse_line("  g01 X1.5 y-2 Z-0.25 F10 (move) ; trailing X9");
        assert_eq!(letters(&line), "GXYZF");
        assert_eq!(line.value('G'), Some(1.0));
        assert_eq!(line.value('Y'), Some(-2.0));
        assert_eq!(line.value('X'), Some(1.5));
        assert!(line.markers.is_empty());
    }

    #[test]
    fn test_multiple_g_codes() {
        let line = parse_line("G17 G40 G49 G80 G90");
        let codes: Vec<f64> = line.values('G').collect();
        assert_eq!(codes, vec![17.0, 40.0, 49.0, 80.0, 90.0]);
        assert!(!line.has_axis());
    }

    #[test]
    fn test_markers_inside_comments() {
        let line = parse_line("(GCAM:TOOL_DIAMETER:0.25000)");
        assert_eq!(line.markers, vec![Marker::ToolDiameter(0.25)]);
        assert!(line.words.is_empty());

        let line = parse_line("; GCAM:ORIGIN:1.00000:-0.50000:0.00000");
        assert_eq!(line.markers, vec![Marker::Origin([1.0, -0.5, 0.0])]);
    }

    #[test]
    fn test_marker_outside_comment_and_unknown_marker() {
        let line = parse_line("G00 Z0.1 GCAM:TOOL_DIAMETER:2 (GCAM:SPEED:9)");
        assert_eq!(line.markers, vec![Marker::ToolDiameter(2.0)]);
        // The marker letters are also read as words; none of them carry a
        // number so they are dropped.
        assert_eq!(line.value('Z'), Some(0.1));
    }

    #[test]
    fn test_incomplete_origin_is_ignored() {
        assert!(parse_line("(GCAM:ORIGIN:1:2)").markers.is_empty());
    }

    #[test]
    fn test_blank_and_percent_lines() {
        assert!(parse_line("").is_empty());
        assert!(parse_line("%").is_empty());
        assert!(parse_line("   (only a comment)").is_empty());
    }
}
