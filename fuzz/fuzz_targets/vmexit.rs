// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0

#![no_main]

use std::sync::Arc;

use hypervisor::vm::Result as FaultResult;
use hypervisor::{
    GuestAddressSpace, GuestFaultError, GuestState, HcrEl2, PageFaultFlags, VirtualizationControl,
};
use libfuzzer_sys::{fuzz_target, Corpus};
use vm_device::{ChannelError, ExitPacket, PacketChannel, TrapKind, TrapMap};
use vm_memory::GuestAddress;
use vmexit::{vmexit_handler, VmExit};

// Faults above this address are reported as out of range.
const GUEST_MEM_END: u64 = 1 << 40;

struct FuzzAddressSpace;

impl GuestAddressSpace for FuzzAddressSpace {
    fn handle_page_fault(&self, addr: GuestAddress, _flags: PageFaultFlags) -> FaultResult<()> {
        if addr.0 >= GUEST_MEM_END {
            return Err(GuestFaultError::OutOfRange(addr.0));
        }
        Ok(())
    }
}

struct FuzzChannel(bool);

impl PacketChannel for FuzzChannel {
    fn queue(&self, _packet: ExitPacket) -> Result<(), ChannelError> {
        if self.0 {
            Ok(())
        } else {
            Err(ChannelError::Full)
        }
    }
}

fuzz_target!(|bytes: &[u8]| -> Corpus {
    let (mut state, hcr, traps) = match generate_guest(bytes) {
        Ok(guest) => guest,
        Err(_) => return Corpus::Reject,
    };
    let before = state;

    match vmexit_handler(&mut state, &hcr, &FuzzAddressSpace, &traps) {
        Ok(VmExit::Resume) | Ok(VmExit::DeliverPacket(_)) => {}
        Err(_) => return Corpus::Keep,
    }

    // The PC only ever moves by one instruction.
    let advanced = state.elr_el2.wrapping_sub(before.elr_el2);
    assert!(advanced == 0 || advanced == 4);
    assert_eq!(state.x, before.x);

    Corpus::Keep
});

// Helper functions to generate structures from fuzzer input below

fn generate_guest(
    bytes: &[u8],
) -> arbitrary::Result<(GuestState, VirtualizationControl, TrapMap)> {
    let mut u = arbitrary::Unstructured::new(bytes);

    let state = GuestState {
        x: u.arbitrary()?,
        elr_el2: u.arbitrary()?,
        spsr_el2: u.arbitrary()?,
        sctlr_el1: u.arbitrary()?,
        esr_el2: u.arbitrary()?,
        hpfar_el2: u.arbitrary()?,
    };
    let hcr = VirtualizationControl::new(HcrEl2::from_bits_retain(u.arbitrary()?));

    let traps = TrapMap::new();
    let count: u8 = u.int_in_range(0..=8)?;
    for key in 0..u64::from(count) {
        let kind = match u.int_in_range(0..=2)? {
            0 => TrapKind::Bell,
            1 => TrapKind::Mem,
            _ => TrapKind::Io,
        };
        let channel: Option<Arc<dyn PacketChannel>> = if u.arbitrary()? {
            Some(Arc::new(FuzzChannel(u.arbitrary()?)))
        } else {
            None
        };
        // Overlapping or invalid ranges are just not registered.
        let _ = traps.insert_trap(
            kind,
            GuestAddress(u.arbitrary()?),
            u.arbitrary()?,
            key,
            channel,
        );
    }

    Ok((state, hcr, traps))
}
