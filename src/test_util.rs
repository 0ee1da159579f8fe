// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause
//

use std::sync::{Arc, Mutex};

use hypervisor::vm::Result as FaultResult;
use hypervisor::{GuestAddressSpace, GuestFaultError, PageFaultFlags};
use vm_device::{
    ChannelError, ExitPacket, PacketChannel, Trap, TrapError, TrapKind, TrapLookup,
};
use vm_memory::GuestAddress;

// msr sctlr_el1, x3
pub const ESR_MSR_SCTLR_EL1_X3: u32 = 0x6230_0460;
// mrs x3, sctlr_el1
pub const ESR_MRS_SCTLR_EL1_X3: u32 = 0x6230_0461;
// msr tcr_el1, x0
pub const ESR_MSR_TCR_EL1_X0: u32 = 0x6234_0800;
pub const ESR_INSTRUCTION_ABORT: u32 = 0x8200_0007;
pub const ESR_DATA_ABORT: u32 = 0x9200_0046;
// hvc #0
pub const ESR_HVC: u32 = 0x5a00_0000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Address space recording every fault it is asked to resolve.
#[derive(Default)]
pub struct MockAddressSpace {
    faults: Mutex<Vec<(GuestAddress, PageFaultFlags)>>,
    error: Option<fn(u64) -> GuestFaultError>,
}

impl MockAddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: fn(u64) -> GuestFaultError) -> Self {
        MockAddressSpace {
            faults: Mutex::new(Vec::new()),
            error: Some(error),
        }
    }

    pub fn faults(&self) -> Vec<(GuestAddress, PageFaultFlags)> {
        self.faults.lock().unwrap().clone()
    }
}

impl GuestAddressSpace for MockAddressSpace {
    fn handle_page_fault(&self, addr: GuestAddress, flags: PageFaultFlags) -> FaultResult<()> {
        self.faults.lock().unwrap().push((addr, flags));
        match self.error {
            Some(error) => Err(error(addr.0)),
            None => Ok(()),
        }
    }
}

/// Channel recording queued packets, or refusing them with `error`.
#[derive(Default)]
pub struct RecordingChannel {
    packets: Mutex<Vec<ExitPacket>>,
    error: Option<ChannelError>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(error: ChannelError) -> Arc<Self> {
        Arc::new(RecordingChannel {
            packets: Mutex::new(Vec::new()),
            error: Some(error),
        })
    }

    pub fn packets(&self) -> Vec<ExitPacket> {
        self.packets.lock().unwrap().clone()
    }
}

impl PacketChannel for RecordingChannel {
    fn queue(&self, packet: ExitPacket) -> Result<(), ChannelError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.packets.lock().unwrap().push(packet);
        Ok(())
    }
}

/// Trap table holding a single trap, returned whatever the kind filter.
pub struct SingleTrap(pub Arc<Trap>);

impl SingleTrap {
    pub fn new(kind: TrapKind, addr: u64, key: u64, channel: Option<Arc<dyn PacketChannel>>) -> Self {
        SingleTrap(Arc::new(Trap::new(
            kind,
            GuestAddress(addr),
            0x1000,
            key,
            channel,
        )))
    }
}

impl TrapLookup for SingleTrap {
    fn find_trap(&self, _kind: TrapKind, addr: GuestAddress) -> vm_device::trap::Result<Arc<Trap>> {
        if self.0.contains(addr) {
            Ok(self.0.clone())
        } else {
            Err(TrapError::NotFound(addr.0))
        }
    }
}

/// Trap table whose lookups always fail.
pub struct BrokenTraps;

impl TrapLookup for BrokenTraps {
    fn find_trap(&self, _kind: TrapKind, _addr: GuestAddress) -> vm_device::trap::Result<Arc<Trap>> {
        Err(TrapError::Unavailable(anyhow::anyhow!("trap table torn down")))
    }
}
