// Copyright © 2019 Intel Corporation. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 and BSD-3-Clause

//! Guest trap management.
//!
//! [TrapMap](struct.TrapMap.html) maps guest physical address ranges to
//! traps. vCPUs look traps up on their exit path to turn a guest access into
//! an [ExitPacket](../packet/struct.ExitPacket.html).

use std::cmp::{Ord, Ordering, PartialEq, PartialOrd};
use std::collections::btree_map::BTreeMap;
use std::fmt;
use std::result;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use vm_memory::{GuestAddress, GuestUsize};

use crate::packet::{ChannelError, ExitPacket, PacketChannel};

/// Guest physical address and size pair to describe a range.
#[derive(Eq, Debug, Copy, Clone)]
pub struct Range(pub GuestAddress, pub GuestUsize);

impl Range {
    /// Last address covered by the range.
    fn last(&self) -> u64 {
        self.0 .0 + (self.1 - 1)
    }

    fn contains(&self, addr: GuestAddress) -> bool {
        self.0 <= addr && addr.0 <= self.last()
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Range) -> bool {
        self.0 == other.0
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Range) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Range) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Kind of a trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapKind {
    /// Doorbell in the memory address space, the access carries no data.
    Bell,
    /// Emulated MMIO region.
    Mem,
    /// Port I/O range.
    Io,
}

/// Error type for trap table usage.
#[derive(Error, Debug)]
pub enum TrapError {
    /// No trap covers the address.
    #[error("No trap covers address {0:#x}")]
    NotFound(u64),
    /// The range is empty or wraps around the address space.
    #[error("Invalid trap range {0:#x}+{1:#x}")]
    InvalidRange(u64, u64),
    /// The insertion failed because the new trap overlapped with an old one.
    #[error("Trap at {0:#x} overlaps an existing trap")]
    Overlap(u64),
    /// The trap has no channel to queue packets on.
    #[error("Trap with key {0:#x} has no packet channel")]
    NoChannel(u64),
    #[error("Failed to queue packet: {0}")]
    Queue(#[source] ChannelError),
    #[error("Trap table unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Simplify the `Result` type.
pub type Result<T> = result::Result<T, TrapError>;

/// A registered trap.
pub struct Trap {
    kind: TrapKind,
    range: Range,
    key: u64,
    channel: Option<Arc<dyn PacketChannel>>,
}

impl Trap {
    pub fn new(
        kind: TrapKind,
        addr: GuestAddress,
        len: GuestUsize,
        key: u64,
        channel: Option<Arc<dyn PacketChannel>>,
    ) -> Self {
        Trap {
            kind,
            range: Range(addr, len),
            key,
            channel,
        }
    }

    pub fn kind(&self) -> TrapKind {
        self.kind
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn addr(&self) -> GuestAddress {
        self.range.0
    }

    pub fn len(&self) -> GuestUsize {
        self.range.1
    }

    pub fn is_empty(&self) -> bool {
        self.range.1 == 0
    }

    pub fn contains(&self, addr: GuestAddress) -> bool {
        !self.is_empty() && self.range.contains(addr)
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Hands `packet` to the channel bound to this trap.
    pub fn queue(&self, packet: ExitPacket) -> Result<()> {
        match &self.channel {
            Some(channel) => channel.queue(packet).map_err(TrapError::Queue),
            None => Err(TrapError::NoChannel(self.key)),
        }
    }
}

impl fmt::Debug for Trap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trap")
            .field("kind", &self.kind)
            .field("range", &self.range)
            .field("key", &self.key)
            .field("has_channel", &self.has_channel())
            .finish()
    }
}

/// Trap lookups done from the vCPU exit path.
///
/// Implementations are shared by all vCPUs of a guest and must handle
/// concurrent lookups.
pub trait TrapLookup: Send + Sync {
    /// Finds the trap covering `addr` in the address space of `kind`.
    ///
    /// `Bell` and `Mem` traps share the memory address space, so looking up
    /// either kind may return a trap of the other one.
    fn find_trap(&self, kind: TrapKind, addr: GuestAddress) -> Result<Arc<Trap>>;
}

/// Range mapping of the traps of one guest.
#[derive(Default)]
pub struct TrapMap {
    /// Bell and Mem traps.
    mem_traps: RwLock<BTreeMap<Range, Arc<Trap>>>,
    /// Io traps.
    io_traps: RwLock<BTreeMap<Range, Arc<Trap>>>,
}

impl TrapMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn traps(&self, kind: TrapKind) -> &RwLock<BTreeMap<Range, Arc<Trap>>> {
        match kind {
            TrapKind::Bell | TrapKind::Mem => &self.mem_traps,
            TrapKind::Io => &self.io_traps,
        }
    }

    /// Registers a trap for `[addr, addr + len)`.
    pub fn insert_trap(
        &self,
        kind: TrapKind,
        addr: GuestAddress,
        len: GuestUsize,
        key: u64,
        channel: Option<Arc<dyn PacketChannel>>,
    ) -> Result<()> {
        if len == 0 || addr.0.checked_add(len - 1).is_none() {
            return Err(TrapError::InvalidRange(addr.0, len));
        }
        let range = Range(addr, len);

        let mut traps = self
            .traps(kind)
            .write()
            .map_err(|_| TrapError::Unavailable(anyhow!("trap map lock poisoned")))?;

        // Only the closest trap starting at or before the new one's last
        // address can overlap it.
        let last = Range(GuestAddress(range.last()), 0);
        if let Some((existing, _)) = traps.range(..=last).next_back() {
            if existing.last() >= addr.0 {
                return Err(TrapError::Overlap(addr.0));
            }
        }

        debug!(
            "Inserting {:?} trap at {:#x}+{:#x}, key {:#x}",
            kind, addr.0, len, key
        );
        traps.insert(range, Arc::new(Trap::new(kind, addr, len, key, channel)));
        Ok(())
    }

    /// Number of traps registered in the address space of `kind`.
    pub fn len(&self, kind: TrapKind) -> usize {
        self.traps(kind).read().map(|traps| traps.len()).unwrap_or(0)
    }
}

impl TrapLookup for TrapMap {
    fn find_trap(&self, kind: TrapKind, addr: GuestAddress) -> Result<Arc<Trap>> {
        let traps = self
            .traps(kind)
            .read()
            .map_err(|_| TrapError::Unavailable(anyhow!("trap map lock poisoned")))?;

        traps
            .range(..=Range(addr, 0))
            .next_back()
            .filter(|(range, _)| range.contains(addr))
            .map(|(_, trap)| trap.clone())
            .ok_or(TrapError::NotFound(addr.0))
    }
}
