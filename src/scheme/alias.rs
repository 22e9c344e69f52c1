use std::fmt::Display;

/// Human-readable partition type aliases. Every scheme maps a subset of
/// these onto its own on-disk type codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Alias {
    Ebr,
    Efi,
    Fat16b,
    Fat32,
    FreeBsd,
    FreeBsdBoot,
    FreeBsdNandfs,
    FreeBsdSwap,
    FreeBsdUfs,
    FreeBsdVinum,
    FreeBsdZfs,
    Mbr,
    Ntfs,
    PrepBoot,
    Linux,
    LinuxRootX86,
    LinuxRootX86_64,
    LinuxRootArm32,
    LinuxRootArm64,
    LinuxRootIa64,
    LinuxReserved,
    LinuxHome,
    LinuxRaid,
    LinuxLvm,
    LinuxExtBoot,
    LinuxSwap,
    LinuxData,
    LinuxServerData,
    NetBsd,
    NetBsdFfs,
    NetBsdLfs,
    NetBsdSwap,
    NetBsdRaid,
    NetBsdCcd,
    NetBsdCgd,
}

/// Name/alias pairs, fixed at build time. Names are unique under
/// case-insensitive comparison and each variant appears exactly once, so
/// both lookup directions are total on their respective hits.
const ALIAS_TABLE: &[(&str, Alias)] = &[
    ("ebr", Alias::Ebr),
    ("efi", Alias::Efi),
    ("fat16b", Alias::Fat16b),
    ("fat32", Alias::Fat32),
    ("freebsd", Alias::FreeBsd),
    ("freebsd-boot", Alias::FreeBsdBoot),
    ("freebsd-nandfs", Alias::FreeBsdNandfs),
    ("freebsd-swap", Alias::FreeBsdSwap),
    ("freebsd-ufs", Alias::FreeBsdUfs),
    ("freebsd-vinum", Alias::FreeBsdVinum),
    ("freebsd-zfs", Alias::FreeBsdZfs),
    ("mbr", Alias::Mbr),
    ("ntfs", Alias::Ntfs),
    ("prepboot", Alias::PrepBoot),
    ("linux", Alias::Linux),
    ("linux-x86", Alias::LinuxRootX86),
    ("linux-x86-64", Alias::LinuxRootX86_64),
    ("linux-arm32", Alias::LinuxRootArm32),
    ("linux-arm64", Alias::LinuxRootArm64),
    ("linux-ia64", Alias::LinuxRootIa64),
    ("linux-reserved", Alias::LinuxReserved),
    ("linux-home", Alias::LinuxHome),
    ("linux-raid", Alias::LinuxRaid),
    ("linux-lvm", Alias::LinuxLvm),
    ("linux-ext-boot", Alias::LinuxExtBoot),
    ("linux-swap", Alias::LinuxSwap),
    ("linux-data", Alias::LinuxData),
    ("linux-server-data", Alias::LinuxServerData),
    ("netbsd", Alias::NetBsd),
    ("netbsd-ffs", Alias::NetBsdFfs),
    ("netbsd-lfs", Alias::NetBsdLfs),
    ("netbsd-swap", Alias::NetBsdSwap),
    ("netbsd-raid", Alias::NetBsdRaid),
    ("netbsd-ccd", Alias::NetBsdCcd),
    ("netbsd-cgd", Alias::NetBsdCgd),
];

/// Case-insensitive name lookup; `None` for anything not in the table.
pub fn parse_alias(name: &str) -> Option<Alias> {
    ALIAS_TABLE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, a)| a)
}

impl Alias {
    pub fn name(&self) -> &'static str {
        ALIAS_TABLE
            .iter()
            .find(|(_, a)| a == self)
            .map(|&(n, _)| n)
            .unwrap_or("?")
    }
}

impl Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(parse_alias("freebsd-ufs"), Some(Alias::FreeBsdUfs));
        assert_eq!(parse_alias("FreeBSD-UFS"), Some(Alias::FreeBsdUfs));
        assert_eq!(parse_alias("LINUX-SWAP"), Some(Alias::LinuxSwap));
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(parse_alias("hurd"), None);
        assert_eq!(parse_alias(""), None);
    }

    #[test]
    fn name_round_trips() {
        for &(name, alias) in ALIAS_TABLE {
            assert_eq!(alias.name(), name);
            assert_eq!(parse_alias(name), Some(alias));
        }
    }
}
