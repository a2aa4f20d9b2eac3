use std::sync::Arc;

use recovery_operations::RecoveryConfig;
use recovery_operations::operations::{RescueInput, RescueOperation, RescueOutput};
use recovery_operations::providers::{
    CommandMetadataPublisher, FileAssetRegistry, ReplicationCtl, SystemCommandRunner,
    VirshHypervisor, ZfsStorage,
};

use super::RescueCreateArgs;
use crate::error::{CliError, Result};
use crate::progress::{print_audit, print_step};

pub(crate) fn create(args: RescueCreateArgs, config: &RecoveryConfig) -> Result<()> {
    let commands = config.commands();
    let operation = RescueOperation::new(
        config.clone(),
        Arc::new(FileAssetRegistry::new(config.export().state_dir().join("assets"))),
        Arc::new(ZfsStorage::new(SystemCommandRunner::new())),
        Arc::new(ReplicationCtl::new(
            SystemCommandRunner::new(),
            commands.replication(),
        )),
        Arc::new(VirshHypervisor::new(SystemCommandRunner::new())),
        Arc::new(CommandMetadataPublisher::new(
            SystemCommandRunner::new(),
            commands.metadata(),
        )),
    );

    let input = input_from(args, config);
    let transaction = operation.build(&input).map_err(CliError::Rescue)?;

    let (result, audit) = transaction.on_progress(print_step).commit_with_audit();
    let context = result.map_err(|e| {
        print_audit(&audit);
        CliError::Rescue(e.into())
    })?;
    let output = RescueOutput::try_from(context).map_err(CliError::Rescue)?;

    print_output(&output);
    Ok(())
}

fn input_from(args: RescueCreateArgs, config: &RecoveryConfig) -> RescueInput {
    let mut input = RescueInput::with_defaults(args.asset, args.snapshot, config.rescue());
    if args.no_pause {
        input.pause_source = false;
    }
    if let Some(cpus) = args.cpus {
        input.cpu_count = cpus;
    }
    if let Some(memory) = args.memory {
        input.memory_mib = memory;
    }
    if let Some(network) = args.network {
        input.network_mode = network;
    }
    input
}

fn print_output(output: &RescueOutput) {
    println!();
    println!("Rescue asset: {}", output.rescue);
    println!("Virtual machine: {}", output.vm.name);
    println!("Dataset: {}", output.clone.dataset);
    println!("Initial snapshot: {}", output.initial_snapshot);
    if output.source_paused {
        println!("Backups of the source asset are paused.");
    }
    if !output.metadata_published {
        println!("Warning: asset metadata was not published.");
    }
}
