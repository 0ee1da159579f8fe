// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

use hypervisor::{GuestAddressSpace, GuestState, PageFaultFlags};
use vm_memory::GuestAddress;

use crate::{Error, Result, VmExit};

/// Hands a stage 2 fault to the guest address space. ELR_EL2 is left alone so
/// the guest re-executes the access once the mapping exists.
pub(crate) fn handle_page_fault(
    gpas: &dyn GuestAddressSpace,
    addr: GuestAddress,
    flags: PageFaultFlags,
) -> Result<VmExit> {
    trace!("Page fault at {:#x}, flags {:?}", addr.0, flags);
    gpas.handle_page_fault(addr, flags).map_err(Error::PageFault)?;
    Ok(VmExit::Resume)
}

pub(crate) fn handle_instruction_abort(
    guest_state: &GuestState,
    gpas: &dyn GuestAddressSpace,
) -> Result<VmExit> {
    handle_page_fault(
        gpas,
        GuestAddress(guest_state.hpfar_el2),
        PageFaultFlags::HW_FAULT | PageFaultFlags::INSTRUCTION,
    )
}
