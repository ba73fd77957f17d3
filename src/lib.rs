// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

mod codec;
mod endpoint;
mod error;
mod frame;
mod master;
mod session;
mod util;

pub use codec::tcp;
pub use endpoint::*;
pub use error::*;
pub use frame::*;
pub use master::*;
pub use session::*;
pub use util::{pack_coils, packed_coils_len};

pub use tokio_util::sync::CancellationToken;
