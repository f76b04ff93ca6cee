use std::{fmt, str::FromStr};

/// The three MBR type bytes that mark a partition as an extended container.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ExtendedKind {
    /// `0x05`
    Dos,
    /// `0x0F`
    Win,
    /// `0x85`
    Lba,
}

/// Partition types that the installer preserves but never creates.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ForeignKind {
    Dos12,
    XenixRoot,
    XenixUsr,
    Dos16,
    DosHuge,
    Ntfs,
    Fat32,
    Fat32Lba,
    Fat16Lba,
    Diagnostic,
    DosData,
    PpcPrep,
    Unix,
    Novell,
    Pcix,
    LinuxNative,
    LinuxLvm,
    FreeBsd,
    OpenBsd,
    NetBsd,
    CpM,
    DellDiag,
    EfiPmbr,
    EfiFs,
    LinuxRaid,
    /// Any type byte without a dedicated variant.
    Other(u8),
}

/// The MBR type of a partition slot.
///
/// Codes are bit-exact with the type byte stored in the partition table.
/// Note that `0x82` is shared by legacy Solaris and Linux swap; the two are told
/// apart by the slot's [`ContentType`].
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum PartitionKind {
    Unused,
    Solaris,
    Solaris2,
    Extended(ExtendedKind),
    X86Boot,
    Foreign(ForeignKind),
}

/// What the installer believes lives inside a partition, independent of its type byte.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ContentType {
    Unknown,
    Solaris,
    Linux,
    LinuxSwap,
}

impl Default for PartitionKind {
    fn default() -> Self { PartitionKind::Unused }
}

impl Default for ContentType {
    fn default() -> Self { ContentType::Unknown }
}

/// The extended type used when the operator creates a new extended partition.
pub const EXTENDED: PartitionKind = PartitionKind::Extended(ExtendedKind::Dos);

impl PartitionKind {
    pub fn from_code(code: u8) -> PartitionKind {
        use self::ForeignKind::*;
        use self::PartitionKind::*;
        match code {
            0x00 => Unused,
            0x82 => Solaris,
            0xBF => Solaris2,
            0xBE => X86Boot,
            0x05 => Extended(ExtendedKind::Dos),
            0x0F => Extended(ExtendedKind::Win),
            0x85 => Extended(ExtendedKind::Lba),
            0x01 => Foreign(Dos12),
            0x02 => Foreign(XenixRoot),
            0x03 => Foreign(XenixUsr),
            0x04 => Foreign(Dos16),
            0x06 => Foreign(DosHuge),
            0x07 => Foreign(Ntfs),
            0x0B => Foreign(Fat32),
            0x0C => Foreign(Fat32Lba),
            0x0E => Foreign(Fat16Lba),
            0x12 => Foreign(Diagnostic),
            0x40 => Foreign(DosData),
            0x41 => Foreign(PpcPrep),
            0x63 => Foreign(Unix),
            0x64 => Foreign(Novell),
            0x75 => Foreign(Pcix),
            0x83 => Foreign(LinuxNative),
            0x8E => Foreign(LinuxLvm),
            0xA5 => Foreign(FreeBsd),
            0xA6 => Foreign(OpenBsd),
            0xA9 => Foreign(NetBsd),
            0xDB => Foreign(CpM),
            0xDE => Foreign(DellDiag),
            0xEE => Foreign(EfiPmbr),
            0xEF => Foreign(EfiFs),
            0xFD => Foreign(LinuxRaid),
            other => Foreign(Other(other)),
        }
    }

    pub fn code(self) -> u8 {
        use self::ForeignKind::*;
        use self::PartitionKind::*;
        match self {
            Unused => 0x00,
            Solaris => 0x82,
            Solaris2 => 0xBF,
            X86Boot => 0xBE,
            Extended(ExtendedKind::Dos) => 0x05,
            Extended(ExtendedKind::Win) => 0x0F,
            Extended(ExtendedKind::Lba) => 0x85,
            Foreign(kind) => match kind {
                Dos12 => 0x01,
                XenixRoot => 0x02,
                XenixUsr => 0x03,
                Dos16 => 0x04,
                DosHuge => 0x06,
                Ntfs => 0x07,
                Fat32 => 0x0B,
                Fat32Lba => 0x0C,
                Fat16Lba => 0x0E,
                Diagnostic => 0x12,
                DosData => 0x40,
                PpcPrep => 0x41,
                Unix => 0x63,
                Novell => 0x64,
                Pcix => 0x75,
                LinuxNative => 0x83,
                LinuxLvm => 0x8E,
                FreeBsd => 0xA5,
                OpenBsd => 0xA6,
                NetBsd => 0xA9,
                CpM => 0xDB,
                DellDiag => 0xDE,
                EfiPmbr => 0xEE,
                EfiFs => 0xEF,
                LinuxRaid => 0xFD,
                Other(code) => code,
            },
        }
    }

    pub fn is_unused(self) -> bool { self == PartitionKind::Unused }

    pub fn is_extended(self) -> bool {
        match self {
            PartitionKind::Extended(_) => true,
            _ => false,
        }
    }

    /// True for types the installer creates itself and may grow or shrink.
    pub fn is_resizable(self) -> bool {
        match self {
            PartitionKind::Solaris2 | PartitionKind::Extended(_) => true,
            _ => false,
        }
    }

    pub fn is_foreign(self) -> bool {
        match self {
            PartitionKind::Foreign(_) => true,
            _ => false,
        }
    }
}

impl FromStr for PartitionKind {
    type Err = &'static str;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let kind = match string.to_lowercase().as_str() {
            "unused" => PartitionKind::Unused,
            "solaris" => PartitionKind::Solaris,
            "solaris2" => PartitionKind::Solaris2,
            "x86boot" => PartitionKind::X86Boot,
            "extended" | "ext-dos" => PartitionKind::Extended(ExtendedKind::Dos),
            "ext-win" => PartitionKind::Extended(ExtendedKind::Win),
            "ext-lba" => PartitionKind::Extended(ExtendedKind::Lba),
            "ntfs" => PartitionKind::Foreign(ForeignKind::Ntfs),
            "fat32" => PartitionKind::Foreign(ForeignKind::Fat32),
            "linux" => PartitionKind::Foreign(ForeignKind::LinuxNative),
            other => {
                let hex = other.trim_start_matches("0x");
                match u8::from_str_radix(hex, 16) {
                    Ok(code) => PartitionKind::from_code(code),
                    Err(_) => return Err("invalid partition type"),
                }
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use self::ForeignKind::*;
        let name = match *self {
            PartitionKind::Unused => "Unused",
            PartitionKind::Solaris => "Solaris",
            PartitionKind::Solaris2 => "Solaris2",
            PartitionKind::X86Boot => "x86 Boot",
            PartitionKind::Extended(ExtendedKind::Dos) => "Extended",
            PartitionKind::Extended(ExtendedKind::Win) => "Win95 Extended",
            PartitionKind::Extended(ExtendedKind::Lba) => "Linux Extended",
            PartitionKind::Foreign(kind) => match kind {
                Dos12 => "FAT12",
                XenixRoot | XenixUsr => "Xenix",
                Dos16 | DosHuge => "FAT16",
                Ntfs => "NTFS",
                Fat32 | Fat32Lba => "FAT32",
                Fat16Lba => "FAT16 LBA",
                Diagnostic => "Diagnostic",
                DosData => "DOS Data",
                PpcPrep => "PPC PReP",
                Unix => "UNIX System",
                Novell => "Novell",
                Pcix => "PC/IX",
                LinuxNative => "Linux",
                LinuxLvm => "Linux LVM",
                FreeBsd => "FreeBSD",
                OpenBsd => "OpenBSD",
                NetBsd => "NetBSD",
                CpM => "CP/M",
                DellDiag => "Dell Diagnostic",
                EfiPmbr => "EFI Protective",
                EfiFs => "EFI System",
                LinuxRaid => "Linux RAID",
                Other(code) => return write!(f, "Other (0x{:02X})", code),
            },
        };
        f.write_str(name)
    }
}
