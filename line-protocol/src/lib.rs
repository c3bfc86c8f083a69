//! Scan line request protocol
//!
//! # Description
//! This crate implements the device side of a minimal request/response protocol used to read
//! scan lines out of a linear CCD front-end over a byte-stream transport (e.g. a USB CDC-ACM
//! serial port).
//!
//! The host sends one of two requests:
//!
//! * `GET` - The device answers with the most recent scan line, decimated and packed according
//!   to the active [Resolution]. Refer to [framer::encode] for the wire layout.
//! * `SET` followed by 4 payload bytes - The device echoes the 4 payload bytes and applies them as
//!   a new [Setup] (integration time, decimation level and bit depth level).
//!
//! Any other request is silently discarded. No error is ever reported to the host: every request
//! is answered by either a response or silence.
//!
//! # Design
//! The [Protocol] state machine is cooperative. It is advanced by calling [Protocol::poll] once
//! per main loop iteration and never blocks; all waiting is expressed as a state that is polled
//! again on the next iteration. Transfers are issued through the [Transport] trait, which models
//! a transport with asynchronous read/write requests and completion flags.
//!
//! Frame encoding is not performed by the state machine itself. When a `GET` is pending,
//! [Protocol::frame_requested] reports `true` and the application fills the transport write
//! buffer using [Protocol::provide_frame].
#![no_std]

pub mod command;
pub mod framer;
pub mod protocol;
pub mod transport;

pub use command::Command;
pub use framer::{BitDepth, Resolution, Setup, SETUP_DATA_SIZE};
pub use protocol::{Error, Protocol, State};
pub use transport::Transport;

/// The size of the host request buffer. One full-speed USB bulk packet.
pub const READ_BUFFER_SIZE: usize = 64;
