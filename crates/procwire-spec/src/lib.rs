// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! procwire-spec
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Declarative model for descriptor-wired process spawning. Everything in
//! this crate is plain data plus validation: the engine crate (`procwire`)
//! is the only place file descriptors are opened or processes forked.

pub mod command;
pub mod env;
pub mod error;
pub mod spec;
pub mod status;

pub use command::{Command, SpawnSpec};
pub use env::EnvBlock;
pub use error::SpecError;
pub use spec::{DescriptorSet, DescriptorSpec, FileMode, PipeDirection};
pub use status::ProcStatus;
