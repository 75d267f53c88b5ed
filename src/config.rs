// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use std::time::Duration;

/// Messages written into the Synced condition when a reconcile step fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub locate_workload: String,
    pub locate_deployment: String,
    pub update_deployment: String,
    pub scale_deployment: String,
}

impl Default for ErrorMessages {
    fn default() -> ErrorMessages {
        ErrorMessages {
            locate_workload: "cannot find workload".to_string(),
            locate_deployment: "cannot find deployment".to_string(),
            update_deployment: "cannot update deployment".to_string(),
            scale_deployment: "cannot scale deployment".to_string(),
        }
    }
}

/// ReconcilerConfig is handed to the reconciler when it is built and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Requeue delay after a failed step that was reported on the status.
    pub retry_delay: Duration,
    /// Requeue delay used by the error policy when reconcile returns an error.
    pub error_backoff: Duration,
    /// Kind of the workload's managed resource that gets scaled.
    pub deployment_kind: String,
    /// Whether the Deployment patch carries the resource version it was computed against.
    pub optimistic_lock: bool,
    pub messages: ErrorMessages,
}

impl Default for ReconcilerConfig {
    fn default() -> ReconcilerConfig {
        ReconcilerConfig {
            retry_delay: Duration::from_secs(30),
            error_backoff: Duration::from_secs(10),
            deployment_kind: "Deployment".to_string(),
            optimistic_lock: false,
            messages: ErrorMessages::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> ReconcilerConfig {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_error_backoff(mut self, error_backoff: Duration) -> ReconcilerConfig {
        self.error_backoff = error_backoff;
        self
    }

    pub fn with_optimistic_lock(mut self, optimistic_lock: bool) -> ReconcilerConfig {
        self.optimistic_lock = optimistic_lock;
        self
    }
}
