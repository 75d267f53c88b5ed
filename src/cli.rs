// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ReconcilerConfig;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "manual_scaler_controller")]
#[command(about = "Scales a workload's Deployment to the replica count of its ManualScalerTrait", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the custom resource definitions as YAML
    Export,
    /// Run the controller against the current kubeconfig context
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Seconds to wait before retrying a reconcile that reported an error on the status
    #[arg(long, env = "MANUAL_SCALER_RETRY_DELAY_SECS", default_value_t = 30)]
    pub retry_delay_secs: u64,

    /// Seconds to wait before retrying a reconcile that failed outright
    #[arg(long, env = "MANUAL_SCALER_ERROR_BACKOFF_SECS", default_value_t = 10)]
    pub error_backoff_secs: u64,

    /// Make the Deployment patch fail if the Deployment changed since it was read
    #[arg(long, env = "MANUAL_SCALER_OPTIMISTIC_LOCK")]
    pub optimistic_lock: bool,
}

impl RunArgs {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::default()
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_error_backoff(Duration::from_secs(self.error_backoff_secs))
            .with_optimistic_lock(self.optimistic_lock)
    }
}
