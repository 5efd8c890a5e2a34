//! Haas post-processor.

use gcam_ir::{Document, Driver};

use super::{paren_comment, PostProcessor};

/// Haas mills: `%`-delimited program with an O-number, tool length
/// compensation on every tool change.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaasPost;

impl PostProcessor for HaasPost {
    fn driver(&self) -> Driver {
        Driver::Haas
    }

    fn comment(&self, text: &str) -> String {
        paren_comment(text)
    }

    fn program_start(&self, doc: &Document) -> String {
        format!("%\nO{:05}\n", doc.project_number % 100_000)
    }

    fn program_end(&self) -> String {
        "M30\n%\n".to_string()
    }

    fn tool_change(&self, number: u8) -> String {
        format!("T{number} M06\nG43 H{number:02}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_number() {
        let mut doc = Document::new("p");
        doc.project_number = 1234;
        assert_eq!(HaasPost.program_start(&doc), "%\nO01234\n");
        assert_eq!(HaasPost.tool_change(3), "T3 M06\nG43 H03\n");
    }
}
