// Copyright 2022 Arm Limited (or its affiliates). All rights reserved.

pub mod regs;
pub mod syndrome;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Number of general purpose registers, x0 to x30.
pub const NUM_GPRS: usize = 31;

/// Width of an A64 instruction.
pub const INSTRUCTION_WIDTH: u64 = 4;

/// Operand index of the zero register.
pub const XZR: u8 = 31;

/// Guest register state saved by the exit vector.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub struct GuestState {
    pub x: [u64; NUM_GPRS], // General Purpose Registers
    pub elr_el2: u64,       // Guest PC to return to
    pub spsr_el2: u32,      // Guest PSTATE to return to
    pub sctlr_el1: u32,     // Guest view of SCTLR_EL1
    pub esr_el2: u32,       // Exception syndrome of the last exit
    pub hpfar_el2: u64,     // Faulting guest physical address
}

impl GuestState {
    /// Reads the operand register of a trapped instruction.
    pub fn gpr(&self, index: u8) -> u64 {
        match index {
            XZR => 0,
            index => self.x.get(usize::from(index)).copied().unwrap_or(0),
        }
    }

    /// Retires the trapped instruction.
    pub fn next_pc(&mut self) {
        self.elr_el2 = self.elr_el2.wrapping_add(INSTRUCTION_WIDTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpr_reads_zero_register() {
        let mut state = GuestState::default();
        state.x = [u64::MAX; NUM_GPRS];
        state.x[30] = 0x30;

        assert_eq!(state.gpr(0), u64::MAX);
        assert_eq!(state.gpr(30), 0x30);
        assert_eq!(state.gpr(XZR), 0);
    }

    #[test]
    fn test_next_pc() {
        let mut state = GuestState {
            elr_el2: 0x4000_0000,
            ..Default::default()
        };
        state.next_pc();
        assert_eq!(state.elr_el2, 0x4000_0004);
        state.next_pc();
        assert_eq!(state.elr_el2, 0x4000_0008);
    }
}
