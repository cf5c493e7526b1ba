//! camlink-core: wire format, command grammar, and configuration shared by
//! every camlink crate.

pub mod command;
pub mod config;
pub mod wire;

pub use command::{Command, CommandError, CommandResponse, Direction, RequestFormat};
pub use wire::{Datagram, FragmentHeader, FrameIdCounter, FrameMetadata, WireError};
