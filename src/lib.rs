// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod cli;
pub mod config;
pub mod kubernetes_api_objects;
pub mod manual_scaler_controller;
pub mod shim_layer;

use crate::kubernetes_api_objects::error::APIError;
use crate::manual_scaler_controller::trusted::step::ReconcileCoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("Failed to get ManualScalerTrait: {0}")]
    GetScalerFailed(#[source] APIError),
    #[error("ReconcileCoreError: {0}")]
    ReconcileCoreError(#[source] ReconcileCoreError),
}
