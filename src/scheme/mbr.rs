use super::{Alias, Lba, MetaRegion, PartType, Scheme, SchemeError};
use crate::image::Image;
use crate::part::Partition;

pub const MBR_BOOTCODE_SIZE: usize = 446;

const HEADS_PER_CYLINDER: usize = 16;
const SECTORS_PER_TRACK: usize = 63;

/// Legacy cylinder/head/sector address, saturated at the encoding limits.
struct Chs {
    head: usize,
    sector: usize,
    cylinder: usize,
}

impl Chs {
    fn saturate<T>(v: T, max: T) -> T
    where
        T: PartialOrd,
    {
        if v > max {
            max
        } else {
            v
        }
    }

    fn from_lba(lba: usize) -> Self {
        let cylinder = Self::saturate(lba / (HEADS_PER_CYLINDER * SECTORS_PER_TRACK), 0x3ff);
        let head = Self::saturate((lba / SECTORS_PER_TRACK) % HEADS_PER_CYLINDER, 0xff);
        let sector = Self::saturate((lba % SECTORS_PER_TRACK) + 1, 0x3f);

        Chs {
            head,
            sector,
            cylinder,
        }
    }

    fn to_bytes(&self) -> [u8; 3] {
        [
            self.head as u8,
            ((self.sector & 0x3f) | ((self.cylinder & 0x300) >> 2)) as u8,
            self.cylinder as u8,
        ]
    }
}

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct RawMbrEntry {
    pub status: u8,
    pub first_sector_chs: [u8; 3],
    pub ptype: u8,
    pub last_sector_chs: [u8; 3],
    pub first_sector_lba: u32,
    pub nr_sectors: u32,
}

impl RawMbrEntry {
    fn empty() -> Self {
        RawMbrEntry {
            status: 0,
            first_sector_chs: [0, 0, 0],
            ptype: 0,
            last_sector_chs: [0, 0, 0],
            first_sector_lba: 0,
            nr_sectors: 0,
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct RawMbr {
    pub bootstrap: [u8; MBR_BOOTCODE_SIZE],
    pub partition_entries: [RawMbrEntry; 4],
    pub signature: [u8; 2],
}

impl RawMbr {
    fn new() -> Self {
        RawMbr {
            bootstrap: [0; MBR_BOOTCODE_SIZE],
            partition_entries: [RawMbrEntry::empty(); 4],
            signature: [0x55, 0xaa],
        }
    }
}

static MBR_ALIASES: &[(Alias, PartType)] = &[
    (Alias::Ebr, PartType::Code(0x05)),
    (Alias::Efi, PartType::Code(0xef)),
    (Alias::Fat16b, PartType::Code(0x06)),
    (Alias::Fat32, PartType::Code(0x0b)),
    (Alias::FreeBsd, PartType::Code(0xa5)),
    (Alias::Ntfs, PartType::Code(0x07)),
    (Alias::PrepBoot, PartType::Code(0x41)),
    (Alias::Linux, PartType::Code(0x83)),
    (Alias::LinuxSwap, PartType::Code(0x82)),
    (Alias::NetBsd, PartType::Code(0xa9)),
];

/// Write a protective MBR covering the whole image, as GPT requires in
/// its first sector.
pub(crate) fn write_protective(image: &mut Image, nr_blocks: usize) {
    let mut mbr = RawMbr::new();
    let entry = &mut mbr.partition_entries[0];

    entry.ptype = 0xee;
    entry.first_sector_chs = Chs::from_lba(1).to_bytes();
    entry.last_sector_chs = [0xff, 0xff, 0xff];
    entry.first_sector_lba = 1;
    entry.nr_sectors = (nr_blocks - 1) as u32;

    image.write(0, mbr);
}

/// Classic Master Boot Record scheme.
pub struct Mbr;

impl Scheme for Mbr {
    fn name(&self) -> &'static str {
        "mbr"
    }

    fn description(&self) -> &'static str {
        "Master Boot Record"
    }

    fn label_len(&self) -> usize {
        0
    }

    fn nparts(&self) -> u32 {
        4
    }

    fn max_secsz(&self) -> u32 {
        4096
    }

    fn bootcode_size(&self) -> usize {
        MBR_BOOTCODE_SIZE
    }

    fn aliases(&self) -> &'static [(Alias, PartType)] {
        MBR_ALIASES
    }

    fn metadata(&self, region: MetaRegion, start: Lba) -> Lba {
        // The table itself lives in LBA 0.
        match region {
            MetaRegion::ImgStart => start.max(1),
            _ => start,
        }
    }

    fn write(
        &self,
        image: &mut Image,
        parts: &[Partition],
        _end: Lba,
        bootcode: Option<&[u8]>,
    ) -> Result<(), SchemeError> {
        let mut mbr = RawMbr::new();

        if let Some(code) = bootcode {
            let n = code.len().min(MBR_BOOTCODE_SIZE);
            mbr.bootstrap[..n].copy_from_slice(&code[..n]);
        }

        for (entry, p) in mbr.partition_entries.iter_mut().zip(parts) {
            entry.ptype = match p.part_type {
                Some(PartType::Code(code)) => code,
                _ => 0,
            };
            entry.first_sector_chs = Chs::from_lba(p.first_lba as usize).to_bytes();
            entry.last_sector_chs = Chs::from_lba(p.last_lba as usize).to_bytes();
            entry.first_sector_lba = p.first_lba as u32;
            entry.nr_sectors = (p.last_lba - p.first_lba + 1) as u32;
        }

        image.write(0, mbr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::parse_alias;

    fn test_image(blocks: usize) -> (tempfile::NamedTempFile, Image) {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len((blocks * 512) as u64).unwrap();
        let image = Image::open(file.path()).unwrap();
        (file, image)
    }

    #[test]
    fn metadata_reserves_the_table_sector() {
        assert_eq!(Mbr.metadata(MetaRegion::ImgStart, 0), 1);
        assert_eq!(Mbr.metadata(MetaRegion::ImgStart, 8), 8);
        assert_eq!(Mbr.metadata(MetaRegion::PartBefore, 7), 7);
        assert_eq!(Mbr.metadata(MetaRegion::ImgEnd, 100), 100);
    }

    #[test]
    fn type_lookup_uses_the_alias_list() {
        assert_eq!(Mbr.type_lookup(Alias::FreeBsd), Some(PartType::Code(0xa5)));
        assert_eq!(Mbr.type_lookup(Alias::NetBsdFfs), None);
    }

    #[test]
    fn write_emits_signature_bootcode_and_entries() {
        let (_file, mut image) = test_image(64);

        let mut p = Partition::new(parse_alias("linux").unwrap(), None, 16 * 512);
        p.part_type = Some(PartType::Code(0x83));
        p.first_lba = 1;
        p.last_lba = 16;

        Mbr.write(&mut image, &[p], 17, Some(&[0xeb, 0xfe])).unwrap();

        let sector = image.get_blocks(0, 1);
        assert_eq!(&sector[510..], &[0x55, 0xaa]);
        assert_eq!(&sector[..2], &[0xeb, 0xfe]);

        let entry = &sector[446..462];
        assert_eq!(entry[4], 0x83);
        assert_eq!(&entry[8..12], &1u32.to_le_bytes());
        assert_eq!(&entry[12..16], &16u32.to_le_bytes());
    }
}
