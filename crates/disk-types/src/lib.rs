//! Types shared between the partition layout engine and the orchestrator that
//! reads and commits partition tables: MBR type codes, partition slots, the
//! fixed-size partition table, and disk geometry conversions.

extern crate failure;
#[macro_use]
extern crate failure_derive;

mod kind;
mod partition;
mod sector;
mod table;

pub use self::{kind::*, partition::*, sector::*, table::*};
