// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

use hypervisor::arch::aarch64::regs::SCTLR_ELX_M;
use hypervisor::{GuestState, HcrEl2, SystemInstruction, SystemRegister, VirtualizationControl};

use crate::{Error, Result, VmExit};

/// Emulates a trapped MSR/MRS described by `iss`.
pub(crate) fn handle_system_instruction(
    iss: u32,
    guest_state: &mut GuestState,
    hcr: &VirtualizationControl,
) -> Result<VmExit> {
    let si = SystemInstruction::from(iss);
    match si.sr {
        SystemRegister::SctlrEl1 => write_sctlr_el1(si, guest_state, hcr),
        SystemRegister::Unsupported(id) => {
            debug!("Unsupported system register {:#x}, x{}", id, si.xt);
            Err(Error::UnsupportedSystemRegister(id))
        }
    }
}

// With HCR_EL2.DC set the guest behaves as if its stage 1 MMU were off, except
// for reads of SCTLR_EL1 which are not trapped.
fn write_sctlr_el1(
    si: SystemInstruction,
    guest_state: &mut GuestState,
    hcr: &VirtualizationControl,
) -> Result<VmExit> {
    if si.read {
        debug!("Unsupported read of {:?}", si.sr);
        return Err(Error::UnsupportedSystemRegisterRead(si.sr));
    }

    let sctlr = guest_state.gpr(si.xt) as u32;
    if sctlr & SCTLR_ELX_M != 0 {
        hcr.clear(HcrEl2::DC);
    } else {
        hcr.set(HcrEl2::DC);
    }
    guest_state.sctlr_el1 = sctlr;
    guest_state.next_pc();

    trace!(
        "SCTLR_EL1 <- {:#x} from x{}, HCR_EL2 {:#x}",
        sctlr,
        si.xt,
        hcr.hcr().bits()
    );
    Ok(VmExit::Resume)
}
