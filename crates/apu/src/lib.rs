//! APU (audio processing unit) node: the slave side of the TriBoy link
//! for the audio destination.

#![cfg_attr(not(any(test, feature = "std", feature = "sim")), no_std)]

pub mod handler;
pub mod slave_service;

pub use handler::ApuCommandHandler;
