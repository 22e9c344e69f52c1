use std::fs::File;
use std::path::{Path, PathBuf};

use humansize::{format_size, BINARY};
use nix::{
    fcntl::{FallocateFlags, OFlag},
    sys::stat::Mode,
};

use crate::image::{Image, ImageError, BLOCK_SIZE};
use crate::part::Partition;
use crate::scheme::{MetaRegion, SchemeContext, SchemeError, SchemeRegistry};

pub struct BuildActionArgs {
    pub scheme: String,
    pub bootcode: Option<PathBuf>,
    pub partitions: Vec<Partition>,
    pub overwrite: bool,
}

/// Error while building a disk image.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum BuildError {
    /// Unable to open output file.
    OpenError,
    /// Unable to allocate space for output file.
    AllocationFailedError,
    /// The image file already exists, and force overwrite was not specified.
    FileAlreadyExistsError,
    /// The scheme supports at most {0} partitions.
    TooManyPartitions(u32),
    /// The scheme supports sectors of at most {0} bytes.
    SectorSizeUnsupported(u32),
    /// Unable to read boot code file: {0}.
    Bootcode(std::io::Error),
    /// {0}
    Scheme(#[from] SchemeError),
    /// {0}
    Image(#[from] ImageError),
}

/// Select the scheme, validate and lay out the partitions, then create
/// the image file and hand it to the scheme for writing.
pub fn invoke(image_file: &str, mut ba: BuildActionArgs) -> Result<(), BuildError> {
    let p = Path::new(image_file);

    // Check for the existence of the image file
    if p.exists() {
        if ba.overwrite {
            println!("Image file already exists, but --overwrite was specified so re-creating!");
        } else {
            return Err(BuildError::FileAlreadyExistsError);
        }
    } else if ba.overwrite {
        println!("Warning: overwrite was specified, but the image file does not already exist!");
    }

    let mut ctx = SchemeContext::new(SchemeRegistry::builtin());
    ctx.select(&ba.scheme)?;

    if let Some(path) = &ba.bootcode {
        let mut file = File::open(path).map_err(BuildError::Bootcode)?;
        ctx.load_bootcode(&mut file)?;
    }

    if ba.partitions.len() as u32 > ctx.max_parts() {
        return Err(BuildError::TooManyPartitions(ctx.max_parts()));
    }
    if ctx.max_secsz() < BLOCK_SIZE as u32 {
        return Err(BuildError::SectorSizeUnsupported(ctx.max_secsz()));
    }

    for part in &mut ba.partitions {
        ctx.check_update_part(part)?;
    }

    // Lay out the partitions, letting the scheme claim its metadata
    // sectors around them.
    let mut lba = ctx.metadata(MetaRegion::ImgStart, 0);
    for part in &mut ba.partitions {
        lba = ctx.metadata(MetaRegion::PartBefore, lba);
        let sectors = (part.size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64;
        part.first_lba = lba;
        part.last_lba = lba + sectors.max(1) - 1;
        lba = ctx.metadata(MetaRegion::PartAfter, part.last_lba + 1);
    }
    let end = ctx.metadata(MetaRegion::ImgEnd, lba);
    let image_size = end * BLOCK_SIZE as u64;

    println!(
        "Creating a disk image of size {}",
        format_size(image_size, BINARY)
    );

    // We need to use the *nix APIs to create a sparse file.
    let fd = nix::fcntl::open(
        p,
        OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_RDWR,
        Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH,
    )
    .map_err(|_| BuildError::OpenError)?;

    nix::fcntl::fallocate(fd, FallocateFlags::empty(), 0, image_size as i64)
        .map_err(|_| BuildError::AllocationFailedError)?;

    let _ = nix::unistd::close(fd);

    let mut image = Image::open(p)?;
    ctx.write(&mut image, &ba.partitions, end)?;

    println!(
        "Built {}: {} scheme, {} partition(s)",
        image_file,
        ba.scheme,
        ba.partitions.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::parse_alias;

    fn part(alias: &str, label: Option<&str>, size: u64) -> Partition {
        Partition::new(
            parse_alias(alias).unwrap(),
            label.map(String::from),
            size,
        )
    }

    #[test]
    fn builds_a_gpt_image_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let path = path.to_str().unwrap();

        invoke(
            path,
            BuildActionArgs {
                scheme: "gpt".into(),
                bootcode: None,
                partitions: vec![
                    part("efi", Some("esp"), 1 << 20),
                    part("freebsd-ufs", Some("root"), 4 << 20),
                ],
                overwrite: false,
            },
        )
        .unwrap();

        let image = Image::open(path).unwrap();
        assert_eq!(&image.get_blocks(1, 1)[..8], b"EFI PART");
        // PMBR + primary table, two partitions, backup table.
        let expected_blocks = 34 + (1 << 11) + (4 << 11) + 33;
        assert_eq!(image.len(), expected_blocks * 512);
    }

    #[test]
    fn refuses_to_clobber_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        std::fs::write(&path, b"keep me").unwrap();

        let err = invoke(
            path.to_str().unwrap(),
            BuildActionArgs {
                scheme: "mbr".into(),
                bootcode: None,
                partitions: vec![],
                overwrite: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::FileAlreadyExistsError));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn rejects_too_many_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");

        let partitions = (0..5).map(|_| part("linux", None, 1 << 20)).collect();
        let err = invoke(
            path.to_str().unwrap(),
            BuildActionArgs {
                scheme: "mbr".into(),
                bootcode: None,
                partitions,
                overwrite: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::TooManyPartitions(4)));
    }

    #[test]
    fn mbr_build_places_bootcode() {
        let dir = tempfile::tempdir().unwrap();
        let boot = dir.path().join("boot.bin");
        std::fs::write(&boot, [0xfa, 0x31, 0xc0]).unwrap();
        let path = dir.path().join("disk.img");
        let path = path.to_str().unwrap();

        invoke(
            path,
            BuildActionArgs {
                scheme: "MBR".into(),
                bootcode: Some(boot),
                partitions: vec![part("freebsd", None, 1 << 20)],
                overwrite: false,
            },
        )
        .unwrap();

        let image = Image::open(path).unwrap();
        let sector = image.get_blocks(0, 1);
        assert_eq!(&sector[..3], &[0xfa, 0x31, 0xc0]);
        assert_eq!(&sector[510..], &[0x55, 0xaa]);
        assert_eq!(sector[446 + 4], 0xa5);
    }
}
