use std::sync::Arc;

use recovery_core::RestoreRecord;
use recovery_operations::RecoveryConfig;
use recovery_operations::operations::{ExportInput, ExportOperation, ExportOutput};
use recovery_operations::providers::{
    BlockDeviceMedia, FileCancellationMarker, FileExportLock, FileRestoreStore,
    QemuImageExporter, SystemCommandRunner, ZfsStorage,
};

use super::{ExportCreateArgs, ExportSlotArgs};
use crate::error::{CliError, Result};
use crate::progress::{print_audit, print_step};

type SystemExport = ExportOperation<
    FileExportLock,
    FileRestoreStore,
    ZfsStorage<SystemCommandRunner>,
    BlockDeviceMedia<SystemCommandRunner>,
    QemuImageExporter<SystemCommandRunner>,
    FileCancellationMarker,
>;

fn operation(config: &RecoveryConfig) -> SystemExport {
    let state_dir = config.export().state_dir();
    ExportOperation::new(
        config.clone(),
        Arc::new(FileExportLock::new(state_dir.join("locks"))),
        Arc::new(FileRestoreStore::new(state_dir)),
        Arc::new(ZfsStorage::new(SystemCommandRunner::new())),
        Arc::new(BlockDeviceMedia::new(SystemCommandRunner::new())),
        Arc::new(QemuImageExporter::new(SystemCommandRunner::new())),
        Arc::new(FileCancellationMarker::new(state_dir.join("cancel"))),
    )
}

pub(crate) fn create(args: ExportCreateArgs, config: &RecoveryConfig) -> Result<()> {
    let input = ExportInput {
        asset: args.asset,
        snapshot: args.snapshot,
        image_type: args.image_type,
        target: args.target,
    };
    let transaction = operation(config).build(&input);

    let (result, audit) = transaction.on_progress(print_step).commit_with_audit();
    let context = result.map_err(|e| {
        print_audit(&audit);
        CliError::from_export(e.into())
    })?;

    print_output(&ExportOutput::from(context));
    Ok(())
}

pub(crate) fn cancel(args: &ExportSlotArgs, config: &RecoveryConfig) -> Result<()> {
    operation(config).cancel(&args.asset, args.snapshot)?;
    println!(
        "Cancellation requested for {}-{}; the export stops before its next stage.",
        args.asset, args.snapshot
    );
    Ok(())
}

pub(crate) fn status(config: &RecoveryConfig) -> Result<()> {
    let records = operation(config).list()?;
    print_records(&records);
    Ok(())
}

fn print_output(output: &ExportOutput) {
    println!();
    println!(
        "Exported {} at {} as {}:",
        output.asset, output.snapshot, output.image_type
    );
    for file in &output.files {
        println!("  {}", file.display());
    }
    if let Some(share) = &output.share {
        println!("Shared as '{share}' from {}", output.destination.display());
    }
}

fn print_records(records: &[RestoreRecord]) {
    if records.is_empty() {
        println!("No exports.");
        return;
    }

    println!("Exports: {}", records.len());
    for record in records {
        let format = record
            .image_type
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        let target = record
            .target
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        println!(
            "  {}-{}  {format}  {target}  created {}",
            record.asset,
            record.snapshot,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}
