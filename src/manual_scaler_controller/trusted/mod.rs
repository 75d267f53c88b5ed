// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod condition;
pub mod exec_types;
pub mod step;
