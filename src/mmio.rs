// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

use hypervisor::{GuestAddressSpace, GuestState, PageFaultFlags};
use vm_device::{ExitPacket, TrapError, TrapKind, TrapLookup};
use vm_memory::GuestAddress;

use crate::fault::handle_page_fault;
use crate::{Error, Result, VmExit};

/// Handles a data abort from the guest.
///
/// An access inside a registered trap retires the instruction and produces a
/// packet. Any other access is a stage 2 fault.
pub(crate) fn handle_data_abort(
    guest_state: &mut GuestState,
    gpas: &dyn GuestAddressSpace,
    traps: &dyn TrapLookup,
) -> Result<VmExit> {
    let addr = GuestAddress(guest_state.hpfar_el2);

    let trap = match traps.find_trap(TrapKind::Bell, addr) {
        Ok(trap) => trap,
        Err(TrapError::NotFound(_)) => {
            return handle_page_fault(gpas, addr, PageFaultFlags::HW_FAULT | PageFaultFlags::WRITE)
        }
        Err(e) => return Err(Error::TrapLookup(e)),
    };

    // The access is complete as far as the guest is concerned, whatever
    // happens to the packet.
    guest_state.next_pc();
    trace!(
        "{:?} trap {:#x} hit at {:#x}",
        trap.kind(),
        trap.key(),
        addr.0
    );

    match trap.kind() {
        TrapKind::Bell => {
            let packet = ExitPacket::guest_bell(trap.key(), addr);
            if !trap.has_channel() {
                return Ok(VmExit::DeliverPacket(packet));
            }
            trap.queue(packet).map_err(|e| {
                warn!("Failed to queue packet for trap {:#x}: {}", trap.key(), e);
                Error::PacketDelivery(e)
            })?;
            Ok(VmExit::Resume)
        }
        // TODO: decode the faulting instruction so the packet carries the
        // access width and data.
        TrapKind::Mem => Ok(VmExit::DeliverPacket(ExitPacket::guest_mem(
            trap.key(),
            addr,
        ))),
        kind => Err(Error::BadState(kind)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hypervisor::GuestFaultError;
    use vm_device::{ChannelError, PacketChannel, PacketType, TrapMap};

    use super::*;
    use crate::test_util::{BrokenTraps, MockAddressSpace, RecordingChannel, SingleTrap};
    use crate::ErrorKind;

    const PC: u64 = 0x4008_0000;

    fn guest_state(hpfar: u64) -> GuestState {
        GuestState {
            elr_el2: PC,
            hpfar_el2: hpfar,
            ..Default::default()
        }
    }

    #[test]
    fn test_unclaimed_access_is_page_fault() {
        let gpas = MockAddressSpace::new();
        let traps = TrapMap::new();
        traps
            .insert_trap(TrapKind::Bell, GuestAddress(0x9000_0000), 0x1000, 1, None)
            .unwrap();
        let mut state = guest_state(0x8000_0000);

        let exit = handle_data_abort(&mut state, &gpas, &traps).unwrap();
        assert_eq!(exit, VmExit::Resume);
        assert_eq!(state.elr_el2, PC);
        assert_eq!(
            gpas.faults(),
            vec![(
                GuestAddress(0x8000_0000),
                PageFaultFlags::HW_FAULT | PageFaultFlags::WRITE
            )]
        );
    }

    #[test]
    fn test_unclaimed_access_fault_error() {
        let gpas = MockAddressSpace::failing(GuestFaultError::AccessDenied);
        let mut state = guest_state(0x8000_0000);

        let err = handle_data_abort(&mut state, &gpas, &TrapMap::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::PageFault(GuestFaultError::AccessDenied(0x8000_0000))
        ));
        assert_eq!(state.elr_el2, PC);
    }

    #[test]
    fn test_bell_with_channel() {
        let gpas = MockAddressSpace::new();
        let channel = RecordingChannel::new();
        let traps = SingleTrap::new(
            TrapKind::Bell,
            0x9000_0000,
            0x42,
            Some(channel.clone() as Arc<dyn PacketChannel>),
        );
        let mut state = guest_state(0x9000_0010);

        let exit = handle_data_abort(&mut state, &gpas, &traps).unwrap();
        assert_eq!(exit, VmExit::Resume);
        assert_eq!(state.elr_el2, PC + 4);
        assert_eq!(
            channel.packets(),
            vec![ExitPacket {
                key: 0x42,
                packet_type: PacketType::GuestBell,
                addr: GuestAddress(0x9000_0010),
            }]
        );
        assert!(gpas.faults().is_empty());
    }

    #[test]
    fn test_bell_without_channel() {
        let gpas = MockAddressSpace::new();
        let traps = SingleTrap::new(TrapKind::Bell, 0x9000_0000, 0x42, None);
        let mut state = guest_state(0x9000_0ffc);

        let exit = handle_data_abort(&mut state, &gpas, &traps).unwrap();
        assert_eq!(
            exit,
            VmExit::DeliverPacket(ExitPacket::guest_bell(0x42, GuestAddress(0x9000_0ffc)))
        );
        assert_eq!(state.elr_el2, PC + 4);
    }

    #[test]
    fn test_bell_delivery_failure_still_retires() {
        let gpas = MockAddressSpace::new();
        let channel = RecordingChannel::failing(ChannelError::Full);
        let traps = SingleTrap::new(
            TrapKind::Bell,
            0x9000_0000,
            0x42,
            Some(channel.clone() as Arc<dyn PacketChannel>),
        );
        let mut state = guest_state(0x9000_0000);

        let err = handle_data_abort(&mut state, &gpas, &traps).unwrap_err();
        assert!(matches!(
            err,
            Error::PacketDelivery(TrapError::Queue(ChannelError::Full))
        ));
        assert_eq!(err.kind(), ErrorKind::Delivery);
        assert_eq!(state.elr_el2, PC + 4);
        assert!(channel.packets().is_empty());
    }

    #[test]
    fn test_mem_always_delivers() {
        let gpas = MockAddressSpace::new();
        let channel = RecordingChannel::new();

        for channel in [None, Some(channel.clone() as Arc<dyn PacketChannel>)] {
            let traps = SingleTrap::new(TrapKind::Mem, 0xa000_0000, 7, channel);
            let mut state = guest_state(0xa000_0100);

            let exit = handle_data_abort(&mut state, &gpas, &traps).unwrap();
            assert_eq!(
                exit,
                VmExit::DeliverPacket(ExitPacket::guest_mem(7, GuestAddress(0xa000_0100)))
            );
            assert_eq!(state.elr_el2, PC + 4);
        }
        assert!(channel.packets().is_empty());
    }

    #[test]
    fn test_io_trap_is_bad_state() {
        let gpas = MockAddressSpace::new();
        let traps = SingleTrap::new(TrapKind::Io, 0x3f8, 1, None);
        let mut state = guest_state(0x3f8);

        let err = handle_data_abort(&mut state, &gpas, &traps).unwrap_err();
        assert!(matches!(err, Error::BadState(TrapKind::Io)));
        assert_eq!(err.kind(), ErrorKind::BadState);
        assert!(gpas.faults().is_empty());
    }

    #[test]
    fn test_lookup_failure() {
        let gpas = MockAddressSpace::new();
        let mut state = guest_state(0x9000_0000);

        let err = handle_data_abort(&mut state, &gpas, &BrokenTraps).unwrap_err();
        assert!(matches!(err, Error::TrapLookup(TrapError::Unavailable(_))));
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert_eq!(state.elr_el2, PC);
        assert!(gpas.faults().is_empty());
    }
}
