// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause
//
// Copyright © 2025, Microsoft Corporation
//

use bitfield_struct::bitfield;
use bitflags::bitflags;
use open_enum::open_enum;

/// ESR_EL2, exception syndrome register.
#[bitfield(u32)]
pub struct EsrEl2 {
    #[bits(25)]
    pub iss: u32,
    pub il: bool,
    #[bits(6)]
    pub ec: u8,
}

#[open_enum]
#[derive(Debug)]
#[repr(u8)]
pub enum EcCode {
    UNKNOWN = 0b000000,
    WFI = 0b000001,
    MCR_MRC_COPROC_15 = 0b000011,
    MCRR_MRRC_COPROC_15 = 0b000100,
    MCR_MRC_COPROC_14 = 0b000101,
    LDC_STC = 0b000110,
    FP_OR_SIMD = 0b000111,
    ILLEGAL_STATE = 0b001110,
    SVC32 = 0b010001,
    HVC32 = 0b010010,
    SMC32 = 0b010011,
    SVC = 0b010101,
    HVC = 0b010110,
    SMC = 0b010111,
    SYSTEM = 0b011000,
    SVE = 0b011001,
    INSTRUCTION_ABORT_LOWER = 0b100000,
    INSTRUCTION_ABORT = 0b100001,
    PC_ALIGNMENT = 0b100010,
    DATA_ABORT_LOWER = 0b100100,
    DATA_ABORT = 0b100101,
    SP_ALIGNMENT_FAULT = 0b100110,
    SERROR = 0b101111,
    BREAKPOINT_LOWER = 0b110000,
    STEP_LOWER = 0b110010,
    WATCHPOINT_LOWER = 0b110100,
    BRK = 0b111100,
}

/// ISS encoding for an exception from MSR, MRS or a system instruction
/// (EC == 0b011000).
#[bitfield(u32)]
pub struct IssSystemInstruction {
    /// Direction, set for MRS (read from the system register).
    pub read: bool,
    #[bits(4)]
    pub crm: u8,
    #[bits(5)]
    /// General purpose register used for the transfer.
    pub rt: u8,
    #[bits(4)]
    pub crn: u8,
    #[bits(3)]
    pub op1: u8,
    #[bits(3)]
    pub op2: u8,
    #[bits(2)]
    pub op0: u8,
    #[bits(10)]
    _rsvd: u16,
}

bitflags! {
    /// HCR_EL2, hypervisor configuration register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HcrEl2: u64 {
        /// Stage 2 translation enable.
        const VM = 1 << 0;
        const FMO = 1 << 3;
        const IMO = 1 << 4;
        const AMO = 1 << 5;
        /// Default cacheability. Makes the guest behave as if SCTLR_EL1.M
        /// were 0.
        const DC = 1 << 12;
        const TWI = 1 << 13;
        const TWE = 1 << 14;
        const TSC = 1 << 19;
        const TVM = 1 << 26;
        const TGE = 1 << 27;
        /// EL1 is AArch64.
        const RW = 1 << 31;
    }
}

// SCTLR_ELx.M, stage 1 MMU enable.
pub const SCTLR_ELX_M: u32 = 1 << 0;

// System register identifier, as reconstructed from the ISS of a trapped
// MSR/MRS:
//
//   15 14 13 11 10  8 7    4 3    0
//  +-----+-----+-----+------+------+
//  | op0 | op2 | op1 | CRn  | CRm  |
//  +-----+-----+-----+------+------+
pub const fn sys_reg(op0: u8, op1: u8, crn: u8, crm: u8, op2: u8) -> u16 {
    (((op0 as u16) & 0b11) << 14)
        | (((op2 as u16) & 0b111) << 11)
        | (((op1 as u16) & 0b111) << 8)
        | (((crn as u16) & 0b1111) << 4)
        | ((crm as u16) & 0b1111)
}

pub const SCTLR_EL1: u16 = sys_reg(3, 0, 1, 0, 0);
