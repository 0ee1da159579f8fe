// Copyright © 2019 Intel Corporation
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause
//
// Copyright © 2020, Microsoft Corporation
//
// Copyright 2018-2019 CrowdStrike, Inc.
//
//

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use thiserror::Error;
use vm_memory::GuestAddress;

use crate::arch::aarch64::regs::HcrEl2;

bitflags! {
    /// Describes the access that caused a guest page fault.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PageFaultFlags: u32 {
        /// Fault reported by the hardware, as opposed to a software probe.
        const HW_FAULT = 1 << 0;
        const WRITE = 1 << 1;
        const INSTRUCTION = 1 << 2;
    }
}

#[derive(Error, Debug)]
///
/// Enum for guest page fault error
pub enum GuestFaultError {
    ///
    /// Address outside of the guest physical address space
    ///
    #[error("Guest physical address {0:#x} is outside the address space")]
    OutOfRange(u64),
    ///
    /// Backing memory could not be allocated
    ///
    #[error("Out of memory resolving fault at {0:#x}")]
    NoMemory(u64),
    ///
    /// Mapping exists but forbids the access
    ///
    #[error("Access to guest physical address {0:#x} denied")]
    AccessDenied(u64),
    ///
    /// Any other resolver failure
    ///
    #[error("Failed to resolve guest page fault: {0}")]
    Resolve(#[source] anyhow::Error),
}

impl GuestFaultError {
    /// Whether the same fault may succeed if the guest re-executes the access.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GuestFaultError::NoMemory(_))
    }
}

///
/// Result type for returning from a function
///
pub type Result<T> = std::result::Result<T, GuestFaultError>;

///
/// Trait to represent the stage 2 address space of a guest
///
/// Implementations are shared by every vCPU of the guest and must handle
/// concurrent calls.
///
pub trait GuestAddressSpace: Send + Sync {
    ///
    /// Resolves a fault at `addr` so that re-executing the access succeeds.
    ///
    fn handle_page_fault(&self, addr: GuestAddress, flags: PageFaultFlags) -> Result<()>;
}

/// HCR_EL2 value shared by every vCPU of a guest.
///
/// Bits are only ever changed with atomic read-modify-write operations so
/// sibling vCPUs never lose each other's updates. No ordering is implied
/// beyond the update itself.
#[derive(Debug)]
pub struct VirtualizationControl {
    hcr: AtomicU64,
}

impl VirtualizationControl {
    pub fn new(hcr: HcrEl2) -> Self {
        VirtualizationControl {
            hcr: AtomicU64::new(hcr.bits()),
        }
    }

    /// Current value of the shared HCR_EL2.
    pub fn hcr(&self) -> HcrEl2 {
        HcrEl2::from_bits_retain(self.hcr.load(Ordering::Relaxed))
    }

    /// Sets `flags`, returning the previous value.
    pub fn set(&self, flags: HcrEl2) -> HcrEl2 {
        HcrEl2::from_bits_retain(self.hcr.fetch_or(flags.bits(), Ordering::Relaxed))
    }

    /// Clears `flags`, returning the previous value.
    pub fn clear(&self, flags: HcrEl2) -> HcrEl2 {
        HcrEl2::from_bits_retain(self.hcr.fetch_and(!flags.bits(), Ordering::Relaxed))
    }

    /// Whether the guest is currently made to behave as if its stage 1 MMU
    /// were off.
    pub fn data_cache_disabled(&self) -> bool {
        self.hcr().contains(HcrEl2::DC)
    }
}

impl Default for VirtualizationControl {
    fn default() -> Self {
        VirtualizationControl::new(HcrEl2::empty())
    }
}
