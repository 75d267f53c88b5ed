// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualScalerReconcileStep {
    Init,
    AfterGetWorkload,
    AfterGetDeployment,
    AfterPatchDeployment,
    AfterUpdateStatus,
    Done,
    Error(ReconcileCoreError),
}

/// Failures that end a reconcile without a status write reflecting them.
/// They are handed to the controller's error policy instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileCoreError {
    #[error("failed to update ManualScalerTrait status: {0}")]
    UpdateStatusFailed(#[source] APIError),
    #[error("reconcile_core got an unexpected response at step {0}")]
    UnexpectedResponse(&'static str),
}
