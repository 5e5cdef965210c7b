#![doc = include_str!("../../README.md")]
#![forbid(missing_docs)]

pub mod catalog;
pub mod codec;
pub mod comment;
pub mod disasm;
pub mod driver;
pub mod error;
pub mod flags;
pub mod processor;
