//! Host-side tools for Aurora.
//!
//! - `mkinit` builds `/init`, the first user process the kernel loads: a
//!   single-segment static ELF64 image whose code and data sit at fixed
//!   addresses (see [`layout`]).
//! - `net-perf` sends a length-prefixed TCP stream to the guest's net bench.

pub mod cli;
pub mod elf;
pub mod error;
pub mod image;
pub mod inspect;
pub mod layout;
pub mod logging;
pub mod net_perf;
pub mod output;
pub mod payload;
pub mod persist;
