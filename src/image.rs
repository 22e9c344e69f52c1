use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use memmap::{Mmap, MmapMut};

pub const BLOCK_SIZE: usize = 512;

/// Error while opening or mapping a disk image.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum ImageError {
    /// Unable to open image file
    OpenError,
    /// Unable to map image file
    MapError,
}

pub struct Image {
    mem: MmapMut,
}

impl Image {
    pub fn from_file(file: File) -> Result<Self, ImageError> {
        let mem = unsafe { Mmap::map(&file).map_err(|_| ImageError::MapError)? }
            .make_mut()
            .map_err(|_| ImageError::MapError)?;

        Ok(Image { mem })
    }

    pub fn open<P>(path: P) -> Result<Self, ImageError>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(false)
            .truncate(false)
            .append(false)
            .open(path)
            .map_err(|_| ImageError::OpenError)?;

        Self::from_file(file)
    }

    pub fn get_blocks(&self, block_index: usize, block_count: usize) -> &[u8] {
        let block_start = block_index * BLOCK_SIZE;
        let block_end = block_start + (block_count * BLOCK_SIZE);

        &self.mem[block_start..block_end]
    }

    pub fn get_blocks_mut(&mut self, block_index: usize, block_count: usize) -> &mut [u8] {
        let block_start = block_index * BLOCK_SIZE;
        let block_end = block_start + (block_count * BLOCK_SIZE);

        &mut self.mem[block_start..block_end]
    }

    /// Copy a raw on-disk structure to a byte offset in the image.
    pub fn write<T: Copy>(&mut self, offset: usize, value: T) {
        let bytes = unsafe {
            ::std::slice::from_raw_parts(
                (&value as *const T) as *const u8,
                ::std::mem::size_of::<T>(),
            )
        };

        self.mem[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}
