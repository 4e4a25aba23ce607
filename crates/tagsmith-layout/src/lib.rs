//! tagsmith layout - NTAG215 memory model
//!
//! Static description of the tag side of the write pipeline:
//! - Page map and factory lock/config patterns
//! - Header parsing and tag class detection
//! - Password derivation from the hardware serial
//! - READ/WRITE command framing
//!
//! Everything in this crate is pure data and pure functions. The session
//! crate owns the hardware and the ordering.
//!
//! # Example
//!
//! ```rust
//! use tagsmith_layout::{TagSerial, WritePassword};
//!
//! let serial = TagSerial::from_slice(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).unwrap();
//! let pwd = WritePassword::derive(&serial);
//! assert_eq!(pwd.as_page()[0], 0x11 ^ 0x33 ^ 0xAA);
//! ```

#![warn(unreachable_pub)]

pub mod command;
pub mod dump;
pub mod error;
pub mod layout;
pub mod password;

pub use command::{Command, Opcode};
pub use dump::{TagDump, TagHeader, TagSerial, UniqueId};
pub use error::LayoutError;
pub use layout::{Page, PageAddress, TagClass, DUMP_SIZE, PAGE_SIZE, TOTAL_PAGES};
pub use password::WritePassword;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
