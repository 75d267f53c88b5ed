// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The channel this controller reports reconcile outcomes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionReason {
    ReconcileSuccess,
    CannotLocateWorkload,
    CannotLocateDeployment,
    CannotScaleDeployment,
}

impl fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionReason::ReconcileSuccess => "ReconcileSuccess",
            ConditionReason::CannotLocateWorkload => "CannotLocateWorkload",
            ConditionReason::CannotLocateDeployment => "CannotLocateDeployment",
            ConditionReason::CannotScaleDeployment => "CannotScaleDeployment",
        };
        f.write_str(s)
    }
}

/// Condition records the outcome of the most recent reconcile attempt.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub last_transition_time: Time,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn reconcile_success() -> Condition {
        Condition {
            type_: ConditionType::Synced,
            status: ConditionStatus::Success,
            last_transition_time: Time(Utc::now()),
            reason: ConditionReason::ReconcileSuccess,
            message: String::new(),
        }
    }

    pub fn reconcile_error(reason: ConditionReason, message: impl Into<String>) -> Condition {
        Condition {
            type_: ConditionType::Synced,
            status: ConditionStatus::Error,
            last_transition_time: Time(Utc::now()),
            reason,
            message: message.into(),
        }
    }

    /// Two conditions are equivalent when they only differ in transition time.
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// ConditionedStatus holds at most one condition per type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ConditionedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ConditionedStatus {
    pub fn get_condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Sets the supplied conditions, replacing any existing condition of the same type.
    /// Setting a condition equivalent to the existing one is a no-op, so the existing
    /// last_transition_time survives repeated reconciles with the same outcome.
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for new in conditions {
            match self.conditions.iter_mut().find(|c| c.type_ == new.type_) {
                Some(existing) => {
                    if !existing.equivalent(&new) {
                        *existing = new;
                    }
                }
                None => self.conditions.push(new),
            }
        }
    }
}
