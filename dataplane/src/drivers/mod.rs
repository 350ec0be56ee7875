// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet capture/injection drivers the engine workers sit behind.

pub mod kernel;
