use uuid::{uuid, Uuid};

use super::{mbr, Alias, Lba, MetaRegion, PartType, Scheme, SchemeError};
use crate::image::{Image, BLOCK_SIZE};
use crate::part::Partition;

const GPT_ENTRIES: usize = 128;
const ENTRY_SIZE: usize = std::mem::size_of::<RawGptEntry>();
const ENTRY_BLOCKS: usize = GPT_ENTRIES * ENTRY_SIZE / BLOCK_SIZE;

/// Microsoft "basic data", used for the FAT and NTFS aliases.
const BASIC_DATA: Uuid = uuid!("EBD0A0A2-B9E5-4433-87C0-68B6B72699C7");

fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = crc_any::CRC::crc32();
    crc.digest(data);

    crc.get_crc() as u32
}

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct RawGptEntry {
    pub ptype: [u8; 16],
    pub ident: [u8; 16],
    pub starting_lba: u64,
    pub ending_lba: u64,
    pub attributes: u64,
    pub name: [u8; 72],
}

impl RawGptEntry {
    fn empty() -> Self {
        RawGptEntry {
            ptype: [0; 16],
            ident: [0; 16],
            starting_lba: 0,
            ending_lba: 0,
            attributes: 0,
            name: [0; 72],
        }
    }
}

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct RawGptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_checksum: u32,
    pub reserved: u32,
    pub this_header_lba: u64,
    pub other_header_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: [u8; 16],
    pub partition_entries_lba: u64,
    pub nr_partition_entries: u32,
    pub partition_entry_size: u32,
    pub partition_entries_checksum: u32,
}

impl RawGptHeader {
    fn new() -> Self {
        RawGptHeader {
            signature: *b"EFI PART",
            revision: 0x00010000,
            header_size: std::mem::size_of::<Self>() as u32,
            header_checksum: 0,
            reserved: 0,
            this_header_lba: 0,
            other_header_lba: 0,
            first_usable_lba: 0,
            last_usable_lba: 0,
            disk_guid: [0; 16],
            partition_entries_lba: 0,
            nr_partition_entries: 0,
            partition_entry_size: ENTRY_SIZE as u32,
            partition_entries_checksum: 0,
        }
    }

    fn compute_checksum(&self) -> u32 {
        let data = unsafe {
            ::std::slice::from_raw_parts(
                (self as *const _) as *const u8,
                ::std::mem::size_of::<Self>(),
            )
        };

        compute_crc32(data)
    }
}

static GPT_ALIASES: &[(Alias, PartType)] = &[
    (Alias::Efi, PartType::Guid(uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B"))),
    (Alias::Mbr, PartType::Guid(uuid!("024DEE41-33E7-11D3-9D69-0008C781F39F"))),
    (Alias::Fat16b, PartType::Guid(BASIC_DATA)),
    (Alias::Fat32, PartType::Guid(BASIC_DATA)),
    (Alias::Ntfs, PartType::Guid(BASIC_DATA)),
    (Alias::FreeBsd, PartType::Guid(uuid!("516E7CB4-6ECF-11D6-8FF8-00022D09712B"))),
    (Alias::FreeBsdBoot, PartType::Guid(uuid!("83BD6B9D-7F41-11DC-BE0B-001560B84F0F"))),
    (Alias::FreeBsdNandfs, PartType::Guid(uuid!("74BA7DD9-A689-11E1-BD04-00E081286ACF"))),
    (Alias::FreeBsdSwap, PartType::Guid(uuid!("516E7CB5-6ECF-11D6-8FF8-00022D09712B"))),
    (Alias::FreeBsdUfs, PartType::Guid(uuid!("516E7CB6-6ECF-11D6-8FF8-00022D09712B"))),
    (Alias::FreeBsdVinum, PartType::Guid(uuid!("516E7CB8-6ECF-11D6-8FF8-00022D09712B"))),
    (Alias::FreeBsdZfs, PartType::Guid(uuid!("516E7CBA-6ECF-11D6-8FF8-00022D09712B"))),
    (Alias::PrepBoot, PartType::Guid(uuid!("9E1A2D38-C612-4316-AA26-8B49521E5A8B"))),
    (Alias::Linux, PartType::Guid(uuid!("0FC63DAF-8483-4772-8E79-3D69D8477DE4"))),
    (Alias::LinuxRootX86, PartType::Guid(uuid!("44479540-F297-41B2-9AF7-D131D5F0458A"))),
    (Alias::LinuxRootX86_64, PartType::Guid(uuid!("4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709"))),
    (Alias::LinuxRootArm32, PartType::Guid(uuid!("69DAD710-2CE4-4E3C-B16C-21A1D49ABED3"))),
    (Alias::LinuxRootArm64, PartType::Guid(uuid!("B921B045-1DF0-41C3-AF44-4C6F280D3FAE"))),
    (Alias::LinuxRootIa64, PartType::Guid(uuid!("993D8D3D-F80E-4225-855A-9DAF8ED7EA97"))),
    (Alias::LinuxReserved, PartType::Guid(uuid!("8DA63339-0007-60C0-C436-083AC8230908"))),
    (Alias::LinuxHome, PartType::Guid(uuid!("933AC7E1-2EB4-4F13-B844-0E14E2AEF915"))),
    (Alias::LinuxRaid, PartType::Guid(uuid!("A19D880F-05FC-4D3B-A006-743F0F84911E"))),
    (Alias::LinuxLvm, PartType::Guid(uuid!("E6D6D379-F507-44C2-A23C-238F2A3DF928"))),
    (Alias::LinuxExtBoot, PartType::Guid(uuid!("BC13C2FF-59E6-4262-A352-B275FD6F7172"))),
    (Alias::LinuxSwap, PartType::Guid(uuid!("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F"))),
    (Alias::LinuxData, PartType::Guid(uuid!("0FC63DAF-8483-4772-8E79-3D69D8477DE4"))),
    (Alias::LinuxServerData, PartType::Guid(uuid!("3B8F8425-20E0-4F3B-907F-1A25A76F98E8"))),
    (Alias::NetBsdFfs, PartType::Guid(uuid!("49F48D5A-B10E-11DC-B99B-0019D1879648"))),
    (Alias::NetBsdLfs, PartType::Guid(uuid!("49F48D82-B10E-11DC-B99B-0019D1879648"))),
    (Alias::NetBsdSwap, PartType::Guid(uuid!("49F48D32-B10E-11DC-B99B-0019D1879648"))),
    (Alias::NetBsdRaid, PartType::Guid(uuid!("49F48DAA-B10E-11DC-B99B-0019D1879648"))),
    (Alias::NetBsdCcd, PartType::Guid(uuid!("2DB519C4-B10F-11DC-B99B-0019D1879648"))),
    (Alias::NetBsdCgd, PartType::Guid(uuid!("2DB519EC-B10F-11DC-B99B-0019D1879648"))),
];

/// GUID Partition Table scheme.
pub struct Gpt;

impl Gpt {
    fn write_entries(
        &self,
        image: &mut Image,
        parts: &[Partition],
        entries_start_block: usize,
    ) -> u32 {
        image
            .get_blocks_mut(entries_start_block, ENTRY_BLOCKS)
            .fill(0);

        for (index, p) in parts.iter().take(GPT_ENTRIES).enumerate() {
            let mut entry = RawGptEntry::empty();

            if let Some(PartType::Guid(guid)) = p.part_type {
                entry.ptype = guid.to_bytes_le();
            }
            entry.ident = Uuid::new_v4().to_bytes_le();
            entry.starting_lba = p.first_lba;
            entry.ending_lba = p.last_lba;

            if let Some(label) = &p.label {
                for (i, unit) in label.encode_utf16().take(36).enumerate() {
                    entry.name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
                }
            }

            image.write(entries_start_block * BLOCK_SIZE + index * ENTRY_SIZE, entry);
        }

        compute_crc32(image.get_blocks(entries_start_block, ENTRY_BLOCKS))
    }

    #[allow(clippy::too_many_arguments)]
    fn write_table(
        &self,
        image: &mut Image,
        parts: &[Partition],
        disk_guid: Uuid,
        this_block: usize,
        alternative_block: usize,
        entries_start_block: usize,
        valid_range: (usize, usize),
    ) {
        let entries_checksum = self.write_entries(image, parts, entries_start_block);

        let mut hdr = RawGptHeader::new();

        hdr.this_header_lba = this_block as u64;
        hdr.other_header_lba = alternative_block as u64;
        hdr.first_usable_lba = valid_range.0 as u64;
        hdr.last_usable_lba = valid_range.1 as u64;
        hdr.disk_guid = disk_guid.to_bytes_le();
        hdr.partition_entries_lba = entries_start_block as u64;
        hdr.nr_partition_entries = GPT_ENTRIES as u32;
        hdr.partition_entries_checksum = entries_checksum;
        hdr.header_checksum = hdr.compute_checksum();

        image.write(this_block * BLOCK_SIZE, hdr);
    }
}

impl Scheme for Gpt {
    fn name(&self) -> &'static str {
        "gpt"
    }

    fn description(&self) -> &'static str {
        "GUID Partition Table"
    }

    fn label_len(&self) -> usize {
        36
    }

    fn nparts(&self) -> u32 {
        GPT_ENTRIES as u32
    }

    fn max_secsz(&self) -> u32 {
        4096
    }

    fn bootcode_size(&self) -> usize {
        0
    }

    fn aliases(&self) -> &'static [(Alias, PartType)] {
        GPT_ALIASES
    }

    fn metadata(&self, region: MetaRegion, start: Lba) -> Lba {
        // Protective MBR + header + entry array up front, entry array +
        // header at the back.
        match region {
            MetaRegion::ImgStart => start + 2 + ENTRY_BLOCKS as Lba,
            MetaRegion::ImgEnd => start + 1 + ENTRY_BLOCKS as Lba,
            _ => start,
        }
    }

    fn write(
        &self,
        image: &mut Image,
        parts: &[Partition],
        _end: Lba,
        _bootcode: Option<&[u8]>,
    ) -> Result<(), SchemeError> {
        let nr_blocks = image.len() / BLOCK_SIZE;
        let disk_guid = Uuid::new_v4();

        mbr::write_protective(image, nr_blocks);

        let primary_header_block = 1;
        let alt_header_block = nr_blocks - 1;

        let valid_range = (
            primary_header_block + ENTRY_BLOCKS + 1,
            alt_header_block - ENTRY_BLOCKS - 1,
        );

        self.write_table(
            image,
            parts,
            disk_guid,
            primary_header_block,
            alt_header_block,
            primary_header_block + 1,
            valid_range,
        );

        self.write_table(
            image,
            parts,
            disk_guid,
            alt_header_block,
            primary_header_block,
            alt_header_block - ENTRY_BLOCKS,
            valid_range,
        );

        Ok(())
    }
}
