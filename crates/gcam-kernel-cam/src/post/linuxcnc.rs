//! LinuxCNC post-processor.

use gcam_ir::Driver;

use super::{paren_comment, PostProcessor};

/// LinuxCNC / EMC2: parenthesized comments, M30 end.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxCncPost;

impl PostProcessor for LinuxCncPost {
    fn driver(&self) -> Driver {
        Driver::LinuxCnc
    }

    fn comment(&self, text: &str) -> String {
        paren_comment(text)
    }
}
