//! Firmware library for a linear CCD front-end.
//!
//! The sensor is driven by three signals: a continuous master clock, the shift pulse (SH) ending
//! each integration period, and the integration clear gate (ICG) starting a readout. The analog
//! output is sampled once per shifted out pixel into a [acquisition::SampleBuffer]. A host reads
//! lines and changes the acquisition setup over USB using the `line-protocol` crate.
#![no_std]

pub mod acquisition;
pub mod configuration;
pub mod design_parameters;
pub mod pulse;
pub mod scanner;
pub mod session;
pub mod usb;

#[cfg(target_os = "none")]
pub mod hardware;
