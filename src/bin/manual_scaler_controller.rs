// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::Parser;
use kube::{Client, CustomResourceExt};
use manual_scaler_controller::cli::{Cli, Command};
use manual_scaler_controller::manual_scaler_controller::trusted::exec_types::{ContainerizedWorkload, ManualScalerTrait};
use manual_scaler_controller::shim_layer::controller_runtime::run_controller;
use tracing::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    match cli.command {
        Command::Export => {
            info!("exporting custom resource definitions");
            println!("{}", serde_yaml::to_string(&ManualScalerTrait::crd())?);
            println!("---");
            println!("{}", serde_yaml::to_string(&ContainerizedWorkload::crd())?);
        }
        Command::Run(args) => {
            let config = args.reconciler_config();
            info!(
                retry_delay = ?config.retry_delay,
                error_backoff = ?config.error_backoff,
                optimistic_lock = config.optimistic_lock,
                "running manual-scaler-controller"
            );
            let client = Client::try_default().await?;
            run_controller(client, config).await?;
        }
    }
    Ok(())
}
