// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for gateway security simulation.
//!
//! Payload corpora and outcome tallies for exercising the rate limiter and
//! threat validator under attack-shaped traffic.

#![allow(dead_code)]

pub mod metrics;
pub mod payloads;
