//! TurboCNC post-processor.

use gcam_ir::Driver;

use super::PostProcessor;

/// TurboCNC: `;` comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurboCncPost;

impl PostProcessor for TurboCncPost {
    fn driver(&self) -> Driver {
        Driver::TurboCnc
    }

    fn comment(&self, text: &str) -> String {
        text.lines().map(|line| format!("; {line}\n")).collect()
    }
}
