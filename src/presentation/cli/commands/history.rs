use anyhow::Result;

use super::{CommandContext, OutputFormat};
use crate::common::error::WsyncError;
use crate::infrastructure::filesystem::{HistoryPointer, HistoryStore};

/// Handler for the history command
pub struct HistoryCommand {
    pub second_latest: bool,
    pub format: OutputFormat,
}

impl HistoryCommand {
    pub fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let pointer = if self.second_latest {
            HistoryPointer::SecondLatest
        } else {
            HistoryPointer::Latest
        };

        let entry = HistoryStore::new(ctx.workspace.history_dir())
            .with_read_retries(ctx.config.history_read_retries)
            .require(pointer)
            .map_err(WsyncError::from)?;

        print!("{}", self.format.render(&entry)?);
        Ok(())
    }
}
