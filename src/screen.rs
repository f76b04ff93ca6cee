//! The disk screen: disk selection, the "use entire disk" choice, and the
//! hand-off of the accepted table to the orchestrator.

use crate::{
    config::ScreenConfig,
    editor::{DiskEditState, EditOutcome, Intent, RowView},
    error::{EditError, ValidationError},
    orchestrator::Orchestrator,
    validate::{self, Validation},
};
use disk_types::{round_mb_to_gb, PartInfoTable};

/// The disk and table that the installer will write.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDisk {
    pub name:  String,
    pub table: PartInfoTable,
}

/// Size of the Solaris partition being installed to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstallPartitionSize {
    pub mb: u64,
    pub gb: f64,
}

impl InstallPartitionSize {
    pub fn from_mb(mb: u64) -> Self { InstallPartitionSize { mb, gb: round_mb_to_gb(mb) } }
}

/// Everything the later install stages need from the disk screen.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallTarget {
    pub disk: SelectedDisk,
    pub size: InstallPartitionSize,
}

/// One entry of the disk list.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSummary {
    pub name:        String,
    pub size_gb:     f64,
    pub readable:    bool,
    pub too_small:   bool,
    pub boot_device: bool,
}

pub struct DiskScreen<O: Orchestrator> {
    orchestrator:   O,
    config:         ScreenConfig,
    disks:          Vec<DiskEditState>,
    active:         Option<usize>,
    use_whole_disk: bool,
    /// A table the orchestrator adjusted, waiting for the operator to accept
    /// it or go back.
    adjusted:       Option<PartInfoTable>,
}

impl<O: Orchestrator> DiskScreen<O> {
    /// Loads every disk the orchestrator reports. The boot device, or else the
    /// first disk, becomes active.
    pub fn new(orchestrator: O, config: ScreenConfig) -> Result<Self, EditError> {
        let min_mb = orchestrator.get_min_size();
        let disks = orchestrator
            .get_disks()
            .into_iter()
            .map(|info| {
                let table = orchestrator.get_disk_partitions(&info.name);
                if table.is_none() {
                    warn!("{}: unable to read the disk label", info.name);
                }
                let boot = orchestrator.disk_is_bootdevice(&info.name);
                DiskEditState::load(info, table, min_mb, boot)
            })
            .collect::<Result<Vec<_>, EditError>>()?;

        let active = disks.iter().position(|disk| disk.boot_device).or_else(|| if disks.is_empty() { None } else { Some(0) });

        info!("found {} disks; recommended install size is {} MB", disks.len(), orchestrator.get_recommended_size());

        Ok(DiskScreen { orchestrator, config, disks, active, use_whole_disk: false, adjusted: None })
    }

    pub fn disks(&self) -> Vec<DiskSummary> {
        self.disks
            .iter()
            .map(|disk| DiskSummary {
                name:        disk.name.clone(),
                size_gb:     disk.geometry.total_gb(),
                readable:    disk.readable,
                too_small:   disk.too_small,
                boot_device: disk.boot_device,
            })
            .collect()
    }

    pub fn active_index(&self) -> Option<usize> { self.active }

    pub fn active_disk(&self) -> Option<&DiskEditState> { self.active.and_then(|index| self.disks.get(index)) }

    pub fn config(&self) -> &ScreenConfig { &self.config }

    pub fn orchestrator(&self) -> &O { &self.orchestrator }

    /// Makes another disk active. Edits made to the previous disk are kept.
    pub fn select_disk(&mut self, index: usize) -> Result<&DiskEditState, EditError> {
        let disk = self.disks.get(index).ok_or(EditError::NoSuchDisk { index })?;
        info!("selected disk {}", disk.name);
        self.active = Some(index);
        self.adjusted = None;
        Ok(disk)
    }

    pub fn use_whole_disk(&self) -> bool { self.use_whole_disk }

    pub fn set_use_whole_disk(&mut self, use_whole_disk: bool) {
        info!("use entire disk: {}", use_whole_disk);
        self.use_whole_disk = use_whole_disk;
        self.adjusted = None;
    }

    /// Applies an edit to the active disk.
    pub fn apply(&mut self, intent: Intent) -> Result<EditOutcome, EditError> {
        if self.use_whole_disk {
            return Err(EditError::WholeDiskSelected);
        }

        let disk = match self.active {
            Some(index) => self.disks.get_mut(index),
            None => None,
        };
        let outcome = disk.ok_or(EditError::NoDiskSelected)?.apply(intent, &self.config)?;
        self.adjusted = None;
        Ok(outcome)
    }

    pub fn primary_rows(&self) -> Vec<RowView> {
        self.active_disk().map_or_else(Vec::new, |disk| disk.primary_rows(&self.config))
    }

    pub fn logical_rows(&self) -> Vec<RowView> {
        self.active_disk().map_or_else(Vec::new, |disk| disk.logical_rows(&self.config))
    }

    /// Discards the edits made to the active disk.
    pub fn reset(&mut self) -> Result<(), EditError> {
        let disk = self.active.and_then(|index| self.disks.get_mut(index)).ok_or(EditError::NoDiskSelected)?;
        disk.reset()?;
        self.adjusted = None;
        Ok(())
    }

    /// Leaves the disk screen, discarding unsaved edits to the active disk.
    pub fn go_back(&mut self) -> Result<(), EditError> {
        self.adjusted = None;
        match self.active {
            Some(_) => self.reset(),
            None => Ok(()),
        }
    }

    /// Declines an adjusted table, returning to the editor to review it.
    pub fn decline_adjusted(&mut self) {
        if self.adjusted.take().is_some() {
            info!("adjusted partition table declined");
        }
    }

    /// Validates the table proposed for the active disk. An adjusted table is
    /// held until `accept_adjusted` or `decline_adjusted`.
    pub fn validate(&mut self) -> Result<Validation, ValidationError> {
        let disk = self.active.and_then(|index| self.disks.get(index));
        let result = validate::validate(disk, self.use_whole_disk, &self.orchestrator, &self.config);
        match result {
            Ok(Validation::Adjusted(ref table)) => self.adjusted = Some(table.clone()),
            Ok(Validation::Accepted) => self.adjusted = None,
            Err(ref why) => warn!("validation failed: {}", why),
        }

        result
    }

    /// Replaces the proposed table with the one the orchestrator adjusted.
    pub fn accept_adjusted(&mut self) -> Result<(), EditError> {
        let table = match self.adjusted.take() {
            Some(table) => table,
            None => return Ok(()),
        };

        let use_whole_disk = self.use_whole_disk;
        let disk = self.active.and_then(|index| self.disks.get_mut(index)).ok_or(EditError::NoDiskSelected)?;
        info!("{}: accepted the adjusted partition table", disk.name);
        disk.adopt(table, use_whole_disk)
    }

    /// Validates the active disk and hands its table to the orchestrator.
    pub fn commit(&mut self) -> Result<InstallTarget, ValidationError> {
        if let Validation::Adjusted(_) = self.validate()? {
            return Err(ValidationError::AdjustmentPending);
        }

        let disk = self.active_disk().ok_or(ValidationError::NoDiskSelected)?;
        let name = disk.name.clone();
        let table = disk.proposed_parts(self.use_whole_disk).clone();
        let size = table.solaris_partitions().next().map_or(0, |part| part.size_mb);

        self.orchestrator.set_disk_partition_info(&name, &table)?;
        info!("{}: committed partition table with a {} MB install partition", name, size);

        Ok(InstallTarget { disk: SelectedDisk { name, table }, size: InstallPartitionSize::from_mb(size) })
    }
}
