// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

use hypervisor::{
    ExceptionClass, ExceptionSyndrome, GuestAddressSpace, GuestState, VirtualizationControl,
};
use vm_device::TrapLookup;

use crate::fault::handle_instruction_abort;
use crate::mmio::handle_data_abort;
use crate::sysreg::handle_system_instruction;
use crate::{Error, Result, VmExit};

/// Handles one guest exit.
///
/// `guest_state` holds the register file saved by the exit vector, including
/// the ESR_EL2 and HPFAR_EL2 values of the trap. `hcr` is shared by every vCPU
/// of the guest. On `Ok(VmExit::Resume)` the guest can be resumed at the
/// possibly advanced ELR_EL2. On `Ok(VmExit::DeliverPacket(_))` the packet has
/// to reach an external observer first.
pub fn vmexit_handler(
    guest_state: &mut GuestState,
    hcr: &VirtualizationControl,
    gpas: &dyn GuestAddressSpace,
    traps: &dyn TrapLookup,
) -> Result<VmExit> {
    trace!(
        "vmexit: esr {:#x} elr {:#x} spsr {:#x}",
        guest_state.esr_el2,
        guest_state.elr_el2,
        guest_state.spsr_el2
    );

    let syndrome = ExceptionSyndrome::from(guest_state.esr_el2);
    match syndrome.ec {
        ExceptionClass::SystemInstruction => {
            handle_system_instruction(syndrome.iss, guest_state, hcr)
        }
        ExceptionClass::InstructionAbort => handle_instruction_abort(guest_state, gpas),
        ExceptionClass::DataAbort => handle_data_abort(guest_state, gpas, traps),
        ExceptionClass::Other(ec) => {
            debug!(
                "Unsupported exception class {:#x}, esr {:#x}",
                ec, guest_state.esr_el2
            );
            Err(Error::UnsupportedExceptionClass(ec))
        }
    }
}
