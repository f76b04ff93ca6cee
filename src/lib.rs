//! The partition layout engine behind the installer's disk screen.
//!
//! A disk's MBR table is read into a fixed 36-slot `PartInfoTable`, from which
//! two block-order lists are built: the primaries across the whole disk, and
//! the logicals inside the extended partition. Both lists interleave the
//! partitions shown to the operator with the gaps between them. Edits arrive
//! as [`Intent`]s and keep the table and the lists in step; the validator
//! then decides whether the proposed table can be handed to the orchestrator.

extern crate dirs;
extern crate disk_types;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate fern;
extern crate itertools;
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate smart_default;

pub mod blockorder;
mod config;
pub mod editor;
mod error;
pub mod invariants;
pub mod layout;
mod logging;
mod orchestrator;
mod screen;
mod validate;

pub use self::{
    blockorder::{BlockList, BlockNode, Dirty},
    config::{ResizePolicy, ScreenConfig},
    editor::{DiskEditState, EditOutcome, Intent, Notice, RowView},
    error::{EditError, ValidationError},
    invariants::InvariantViolation,
    layout::Layout,
    logging::log,
    orchestrator::{CanonicalizeError, DiskInfo, Orchestrator},
    screen::{DiskScreen, DiskSummary, InstallPartitionSize, InstallTarget, SelectedDisk},
    validate::{validate, Validation},
};
pub use disk_types::*;
