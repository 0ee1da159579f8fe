// Copyright © 2019 Intel Corporation
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause
//
// Copyright © 2020, Microsoft Corporation
//
// Copyright 2018-2019 CrowdStrike, Inc.
//
//

//! Architectural definitions shared by the guest exit path
//!
//! This crate describes the saved vCPU state and the syndrome registers the
//! hardware fills in on a trap. It also defines the guest physical address
//! space interface used on the exit path.
//!
//! # Platform support
//!
//! - arm64
//!

#[cfg(feature = "with-serde")]
extern crate serde;
extern crate thiserror;

/// Architecture specific definitions
pub mod arch;

/// Vm related module
pub mod vm;

pub use arch::aarch64::regs::HcrEl2;
pub use arch::aarch64::syndrome::{
    ExceptionClass, ExceptionSyndrome, SystemInstruction, SystemRegister,
};
pub use arch::aarch64::GuestState;
pub use vm::{GuestAddressSpace, GuestFaultError, PageFaultFlags, VirtualizationControl};
