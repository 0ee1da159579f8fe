// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

//! Guest exit handling for AArch64 guests.
//!
//! [`vmexit_handler`] is called on the vCPU thread after every trap to EL2.
//! It decodes ESR_EL2 and either emulates the trapped system register access,
//! resolves a stage 2 page fault, or turns a trapped MMIO access into an
//! [`ExitPacket`].

#[macro_use]
extern crate log;

use hypervisor::{GuestFaultError, SystemRegister};
use thiserror::Error;
use vm_device::{ExitPacket, TrapError, TrapKind};

mod fault;
mod handler;
mod mmio;
mod sysreg;
#[cfg(test)]
mod test_util;

pub use handler::vmexit_handler;

/// Outcome of a handled exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmExit {
    /// The guest can be resumed at its current ELR_EL2.
    Resume,
    /// The packet has to be handed to an external observer before the guest
    /// is resumed.
    DeliverPacket(ExitPacket),
}

/// Error category reported to the vCPU run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unsupported,
    Fault,
    BadState,
    Delivery,
    Lookup,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported exception class {0:#x}")]
    UnsupportedExceptionClass(u8),

    #[error("Unsupported system register {0:#x}")]
    UnsupportedSystemRegister(u16),

    #[error("Unsupported read of system register {0:?}")]
    UnsupportedSystemRegisterRead(SystemRegister),

    #[error("Error resolving guest page fault: {0}")]
    PageFault(#[source] GuestFaultError),

    #[error("Error looking up trap: {0}")]
    TrapLookup(#[source] TrapError),

    #[error("Unexpected {0:?} trap on a data abort")]
    BadState(TrapKind),

    #[error("Error delivering exit packet: {0}")]
    PacketDelivery(#[source] TrapError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedExceptionClass(_)
            | Error::UnsupportedSystemRegister(_)
            | Error::UnsupportedSystemRegisterRead(_) => ErrorKind::Unsupported,
            Error::PageFault(_) => ErrorKind::Fault,
            Error::TrapLookup(_) => ErrorKind::Lookup,
            Error::BadState(_) => ErrorKind::BadState,
            Error::PacketDelivery(_) => ErrorKind::Delivery,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
