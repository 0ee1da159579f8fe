// Copyright © 2025 The Cloud Hypervisor Authors
//
// SPDX-License-Identifier: Apache-2.0 AND BSD-3-Clause

//! Guest traps and the packets they produce.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;
extern crate thiserror;

pub mod packet;
pub mod trap;

pub use packet::{ChannelError, ExitPacket, PacketChannel, PacketType};
pub use trap::{Trap, TrapError, TrapKind, TrapLookup, TrapMap};
