// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

//! Packets describing a guest access that hit a trap.

use thiserror::Error;
use vm_memory::GuestAddress;

/// Packet type, derived from the kind of the trap that was hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    /// The guest rang a doorbell. Only the address matters.
    GuestBell,
    /// The guest accessed an emulated MMIO region.
    GuestMem,
}

/// Event produced when a guest memory access hits a trap.
///
/// A `GuestMem` packet only carries the faulting address. The access width
/// and data are left to the consumer, which has to decode the instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitPacket {
    /// Key the trap was registered with.
    pub key: u64,
    pub packet_type: PacketType,
    /// Guest physical address of the access.
    pub addr: GuestAddress,
}

impl ExitPacket {
    pub fn guest_bell(key: u64, addr: GuestAddress) -> Self {
        ExitPacket {
            key,
            packet_type: PacketType::GuestBell,
            addr,
        }
    }

    pub fn guest_mem(key: u64, addr: GuestAddress) -> Self {
        ExitPacket {
            key,
            packet_type: PacketType::GuestMem,
            addr,
        }
    }
}

/// Errors reported by a [`PacketChannel`].
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Packet channel is full")]
    Full,
    #[error("Packet channel is closed")]
    Closed,
}

/// Destination a trap delivers its packets to.
///
/// Queueing is called from the vCPU thread while it handles an exit, so
/// implementations must not block.
pub trait PacketChannel: Send + Sync {
    fn queue(&self, packet: ExitPacket) -> std::result::Result<(), ChannelError>;
}

impl PacketChannel for flume::Sender<ExitPacket> {
    fn queue(&self, packet: ExitPacket) -> std::result::Result<(), ChannelError> {
        self.try_send(packet).map_err(|e| match e {
            flume::TrySendError::Full(_) => ChannelError::Full,
            flume::TrySendError::Disconnected(_) => ChannelError::Closed,
        })
    }
}
