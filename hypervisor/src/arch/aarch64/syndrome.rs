// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause
//
// Copyright © 2025, Microsoft Corporation
//

use super::regs::{sys_reg, EcCode, EsrEl2, IssSystemInstruction, SCTLR_EL1};

/// Exception classes the exit path knows how to handle.
///
/// Anything else is carried as `Other` with the raw EC value, so the caller
/// can report it instead of failing to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionClass {
    /// Trapped MSR, MRS or system instruction.
    SystemInstruction,
    /// Instruction abort from a lower exception level.
    InstructionAbort,
    /// Data abort from a lower exception level.
    DataAbort,
    Other(u8),
}

impl From<EcCode> for ExceptionClass {
    fn from(ec: EcCode) -> Self {
        match ec {
            EcCode::SYSTEM => ExceptionClass::SystemInstruction,
            EcCode::INSTRUCTION_ABORT_LOWER => ExceptionClass::InstructionAbort,
            EcCode::DATA_ABORT_LOWER => ExceptionClass::DataAbort,
            EcCode(ec) => ExceptionClass::Other(ec),
        }
    }
}

/// Decoded view of ESR_EL2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExceptionSyndrome {
    pub ec: ExceptionClass,
    /// Instruction specific syndrome, ESR_EL2[24:0].
    pub iss: u32,
}

impl From<u32> for ExceptionSyndrome {
    fn from(esr: u32) -> Self {
        let esr_el2 = EsrEl2::from(esr);
        ExceptionSyndrome {
            ec: ExceptionClass::from(EcCode(esr_el2.ec())),
            iss: esr_el2.iss(),
        }
    }
}

/// System registers with an emulation in the exit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemRegister {
    SctlrEl1,
    /// Any other register identifier, see [`sys_reg`].
    Unsupported(u16),
}

impl SystemRegister {
    /// Register identifier in the [`sys_reg`] encoding.
    pub fn id(self) -> u16 {
        match self {
            SystemRegister::SctlrEl1 => SCTLR_EL1,
            SystemRegister::Unsupported(id) => id,
        }
    }
}

impl From<u16> for SystemRegister {
    fn from(id: u16) -> Self {
        match id {
            SCTLR_EL1 => SystemRegister::SctlrEl1,
            id => SystemRegister::Unsupported(id),
        }
    }
}

/// A trapped MSR or MRS, decoded from the ISS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemInstruction {
    pub sr: SystemRegister,
    /// Index of the general purpose register holding the operand. 31 is XZR.
    pub xt: u8,
    /// MRS when set, MSR otherwise.
    pub read: bool,
}

impl From<u32> for SystemInstruction {
    fn from(iss: u32) -> Self {
        let iss = IssSystemInstruction::from(iss);
        SystemInstruction {
            sr: SystemRegister::from(sys_reg(
                iss.op0(),
                iss.op1(),
                iss.crn(),
                iss.crm(),
                iss.op2(),
            )),
            xt: iss.rt(),
            read: iss.read(),
        }
    }
}
