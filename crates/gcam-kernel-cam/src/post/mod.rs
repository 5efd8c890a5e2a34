//! Post-processors: controller dialects and the fragment builder.

mod haas;
mod linuxcnc;
mod turbocnc;

pub use haas::HaasPost;
pub use linuxcnc::LinuxCncPost;
pub use turbocnc::TurboCncPost;

use gcam_ir::{Document, Driver};
use gcam_kernel_math::{Point2, Vec2, PRECISION};
use serde::{Deserialize, Serialize};

/// Newline sequence of the emitted program. Defaults to the platform's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`.
    Lf,
    /// `\r\n`.
    Crlf,
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

impl LineEnding {
    /// Platform default.
    pub fn native() -> Self {
        if cfg!(windows) {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        }
    }

    /// Rewrite every `\n` in `text` to this ending without doubling an
    /// existing `\r`.
    pub fn apply(self, text: &str) -> String {
        match self {
            LineEnding::Lf => text.to_string(),
            LineEnding::Crlf => {
                let mut out = String::with_capacity(text.len() + text.len() / 8);
                let mut prev = '\0';
                for c in text.chars() {
                    if c == '\n' && prev != '\r' {
                        out.push('\r');
                    }
                    out.push(c);
                    prev = c;
                }
                out
            }
        }
    }
}

/// Numeric formatting for one synthesis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    /// Digits after the decimal point.
    pub decimals: usize,
}

impl Default for Format {
    fn default() -> Self {
        Self { decimals: 5 }
    }
}

impl Format {
    /// Format for a document: its override, else the driver default.
    pub fn for_document(doc: &Document) -> Self {
        Self {
            decimals: doc.machine.effective_decimals() as usize,
        }
    }

    /// Format a coordinate.
    pub fn coord(&self, value: f64) -> String {
        format_coord(value, self.decimals)
    }

    /// Address letter followed by a coordinate, e.g. `X1.50000`.
    pub fn word(&self, letter: char, value: f64) -> String {
        format!("{letter}{}", self.coord(value))
    }
}

/// Format a floating point value with a fixed number of decimals. Values
/// that round to zero never carry a minus sign.
pub fn format_coord(value: f64, precision: usize) -> String {
    let s = format!("{:.prec$}", value, prec = precision);
    match s.strip_prefix('-') {
        Some(digits) if digits.bytes().all(|b| b == b'0' || b == b'.') => digits.to_string(),
        _ => s,
    }
}

/// Controller dialect hooks.
pub trait PostProcessor {
    /// Driver this post targets.
    fn driver(&self) -> Driver;

    /// One comment line, newline terminated.
    fn comment(&self, text: &str) -> String;

    /// Lines that open the program, before the header block.
    fn program_start(&self, _doc: &Document) -> String {
        String::new()
    }

    /// Lines that close the program.
    fn program_end(&self) -> String {
        "M30\n".to_string()
    }

    /// Tool change to table slot `number`.
    fn tool_change(&self, number: u8) -> String {
        format!("T{number} M06\n")
    }
}

/// Post-processor for a driver.
pub fn post_for(driver: Driver) -> &'static dyn PostProcessor {
    match driver {
        Driver::LinuxCnc => &LinuxCncPost,
        Driver::TurboCnc => &TurboCncPost,
        Driver::Haas => &HaasPost,
    }
}

/// Parenthesized comment; nested parentheses are replaced so the comment
/// stays one token.
pub(crate) fn paren_comment(text: &str) -> String {
    text.lines()
        .map(|line| format!("({})\n", line.replace('(', "[").replace(')', "]")))
        .collect()
}

/// Builds one node's fragment, tracking the modal feed.
pub struct Program<'a> {
    post: &'a dyn PostProcessor,
    fmt: Format,
    out: String,
    feed: Option<f64>,
}

impl<'a> Program<'a> {
    /// Empty fragment.
    pub fn new(post: &'a dyn PostProcessor, fmt: Format) -> Self {
        Self {
            post,
            fmt,
            out: String::new(),
            feed: None,
        }
    }

    /// Numeric format in use.
    pub fn format(&self) -> Format {
        self.fmt
    }

    /// Finish and return the text.
    pub fn finish(self) -> String {
        self.out
    }

    /// Append raw text; a missing final newline is added.
    pub fn raw(&mut self, text: &str) -> &mut Self {
        if !text.is_empty() {
            self.out.push_str(text);
            if !text.ends_with('\n') {
                self.out.push('\n');
            }
        }
        self
    }

    /// Comment lines; empty text emits nothing.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        if !text.trim().is_empty() {
            let c = self.post.comment(text);
            self.out.push_str(&c);
        }
        self
    }

    /// `GCAM:<NAME>:<v>...` marker inside a comment.
    pub fn marker(&mut self, name: &str, values: &[f64]) -> &mut Self {
        let mut text = format!("GCAM:{name}");
        for v in values {
            text.push(':');
            text.push_str(&self.fmt.coord(*v));
        }
        self.comment(&text)
    }

    fn feed_word(&mut self, feed: f64) -> String {
        if self.feed.is_some_and(|f| (f - feed).abs() < PRECISION) {
            String::new()
        } else {
            self.feed = Some(feed);
            format!(" F{}", self.fmt.coord(feed))
        }
    }

    /// Rapid to a clearance height.
    pub fn rapid_z(&mut self, z: f64) -> &mut Self {
        let line = format!("G00 {}\n", self.fmt.word('Z', z));
        self.out.push_str(&line);
        self
    }

    /// Rapid in XY.
    pub fn rapid_xy(&mut self, p: Point2) -> &mut Self {
        let line = format!("G00 {} {}\n", self.fmt.word('X', p.x), self.fmt.word('Y', p.y));
        self.out.push_str(&line);
        self
    }

    /// Feed move in Z only.
    pub fn feed_z(&mut self, z: f64, feed: f64) -> &mut Self {
        let f = self.feed_word(feed);
        let line = format!("G01 {}{f}\n", self.fmt.word('Z', z));
        self.out.push_str(&line);
        self
    }

    /// Feed move in XY.
    pub fn feed_xy(&mut self, p: Point2, feed: Option<f64>) -> &mut Self {
        let f = feed.map(|f| self.feed_word(f)).unwrap_or_default();
        let line = format!("G01 {} {}{f}\n", self.fmt.word('X', p.x), self.fmt.word('Y', p.y));
        self.out.push_str(&line);
        self
    }

    /// Feed move in XYZ.
    pub fn feed_xyz(&mut self, p: Point2, z: f64, feed: f64) -> &mut Self {
        let f = self.feed_word(feed);
        let line = format!(
            "G01 {} {} {}{f}\n",
            self.fmt.word('X', p.x),
            self.fmt.word('Y', p.y),
            self.fmt.word('Z', z)
        );
        self.out.push_str(&line);
        self
    }

    /// Circular feed move to `end`; `ij` is the center relative to the
    /// current position.
    pub fn arc(&mut self, clockwise: bool, end: Point2, ij: Vec2, feed: Option<f64>) -> &mut Self {
        let f = feed.map(|f| self.feed_word(f)).unwrap_or_default();
        let line = format!(
            "{} {} {} {} {}{f}\n",
            if clockwise { "G02" } else { "G03" },
            self.fmt.word('X', end.x),
            self.fmt.word('Y', end.y),
            self.fmt.word('I', ij.x),
            self.fmt.word('J', ij.y),
        );
        self.out.push_str(&line);
        self
    }

    /// Tool change through the post.
    pub fn tool_change(&mut self, number: u8) -> &mut Self {
        let s = self.post.tool_change(number);
        self.out.push_str(&s);
        self
    }

    /// Program end through the post.
    pub fn program_end(&mut self) -> &mut Self {
        let s = self.post.program_end();
        self.out.push_str(&s);
        self
    }
}
