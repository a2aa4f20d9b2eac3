use recovery_core::AssetKey;

use crate::Result;
use crate::traits::{CommandRunner, MetadataPublisher, ReplicationClient};

/// Replication daemon controlled through its command line client.
pub struct ReplicationCtl<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> ReplicationCtl<R> {
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl<R: CommandRunner> ReplicationClient for ReplicationCtl<R> {
    fn register(&self, asset: &AssetKey, dataset: &str) -> Result<()> {
        self.runner
            .run_checked(&self.program, &["register", asset.as_str(), dataset])?;
        Ok(())
    }

    fn deregister(&self, asset: &AssetKey) -> Result<()> {
        self.runner
            .run_checked(&self.program, &["deregister", asset.as_str()])?;
        Ok(())
    }
}

pub struct CommandMetadataPublisher<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> CommandMetadataPublisher<R> {
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl<R: CommandRunner> MetadataPublisher for CommandMetadataPublisher<R> {
    fn publish(&self, asset: &AssetKey) -> Result<()> {
        self.runner
            .run_checked(&self.program, &["publish", asset.as_str()])?;
        Ok(())
    }
}
