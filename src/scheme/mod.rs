use std::fmt::Display;
use std::fs::File;
use std::io::Read;

use crate::image::Image;
use crate::part::Partition;

pub mod alias;
pub mod gpt;
pub mod mbr;

pub use alias::{parse_alias, Alias};

pub type Lba = u64;

/// Sector size reported by `SchemeContext::max_secsz` while no scheme is
/// selected: `INT_MAX + 1` as an unsigned quantity (2^31), i.e. effectively
/// unbounded.
pub const MAX_SECSZ_UNSELECTED: u32 = 1 << 31;

/// Scheme-specific on-disk partition type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartType {
    /// One-byte type codes (MBR and friends).
    Code(u8),
    /// Partition type GUIDs (GPT).
    Guid(uuid::Uuid),
}

/// Position in the image a scheme may claim metadata sectors for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetaRegion {
    ImgStart,
    PartBefore,
    PartAfter,
    ImgEnd,
}

/// Error during scheme selection and dispatch.
#[derive(Debug, displaydoc::Display, thiserror::Error)]
pub enum SchemeError {
    /// Unknown partitioning scheme "{0}".
    UnknownScheme(String),
    /// No partitioning scheme has been selected.
    NoSchemeSelected,
    /// Unknown partition type alias "{0}".
    UnknownAlias(String),
    /// Partition type "{0}" is not supported by the selected scheme.
    UnsupportedAlias(Alias),
    /// Partition label is longer than the scheme limit of {limit} characters.
    LabelTooLong { limit: usize },
    /// The selected scheme does not take boot code.
    BootcodeUnsupported,
    /// Boot code file ({size} bytes) exceeds the scheme capacity of {limit} bytes.
    BootcodeTooBig { size: u64, limit: usize },
    /// I/O error: {0}.
    Io(#[from] std::io::Error),
}

/// One partitioning scheme implementation. Implementations are unit-like
/// statics; the registry and the selection hold `&'static` references.
pub trait Scheme {
    /// Selection key, unique under case-insensitive comparison.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Maximum label length; 0 means the scheme has no labels.
    fn label_len(&self) -> usize;

    /// Maximum number of partitions.
    fn nparts(&self) -> u32;

    /// Maximum supported sector size in bytes.
    fn max_secsz(&self) -> u32;

    /// Size of the boot-code region in bytes; 0 means unsupported.
    fn bootcode_size(&self) -> usize;

    /// Aliases this scheme maps onto on-disk types.
    fn aliases(&self) -> &'static [(Alias, PartType)];

    /// Resolve an alias to this scheme's on-disk type.
    fn type_lookup(&self, alias: Alias) -> Option<PartType> {
        self.aliases()
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|&(_, t)| t)
    }

    /// Account for scheme metadata around `region`, returning the first
    /// LBA usable after it.
    fn metadata(&self, region: MetaRegion, start: Lba) -> Lba;

    /// Write the scheme's on-disk structures for the laid-out partitions.
    fn write(
        &self,
        image: &mut Image,
        parts: &[Partition],
        end: Lba,
        bootcode: Option<&[u8]>,
    ) -> Result<(), SchemeError>;
}

/// Append-only collection of scheme implementations. Populated once at
/// startup, read-only afterwards.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: Vec<&'static dyn Scheme>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        SchemeRegistry { schemes: Vec::new() }
    }

    /// All built-in schemes.
    pub fn builtin() -> Self {
        let mut r = Self::new();
        r.register(&mbr::Mbr);
        r.register(&gpt::Gpt);
        r
    }

    /// No duplicate-name check: a later registration of the same name
    /// shadows earlier ones in `find`, but both stay visible to `iter`.
    pub fn register(&mut self, scheme: &'static dyn Scheme) {
        self.schemes.push(scheme);
    }

    /// Most-recently-registered first.
    pub fn iter(&self) -> impl Iterator<Item = &'static dyn Scheme> + '_ {
        self.schemes.iter().rev().copied()
    }

    /// Case-insensitive name lookup, first match in iteration order.
    pub fn find(&self, name: &str) -> Option<&'static dyn Scheme> {
        self.iter().find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

/// Selection state and boot-code owner. Everything the builder asks of a
/// scheme goes through here; with no selection the dispatchers answer with
/// harmless defaults so layout code needs no special cases.
pub struct SchemeContext {
    registry: SchemeRegistry,
    selected: Option<&'static dyn Scheme>,
    bootcode: Option<Vec<u8>>,
}

impl SchemeContext {
    pub fn new(registry: SchemeRegistry) -> Self {
        SchemeContext {
            registry,
            selected: None,
            bootcode: None,
        }
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Select a scheme by name. On a miss the previous selection stays.
    pub fn select(&mut self, name: &str) -> Result<(), SchemeError> {
        match self.registry.find(name) {
            Some(s) => {
                self.selected = Some(s);
                Ok(())
            }
            None => Err(SchemeError::UnknownScheme(name.to_string())),
        }
    }

    pub fn selected(&self) -> Option<&'static dyn Scheme> {
        self.selected
    }

    pub fn max_parts(&self) -> u32 {
        self.selected.map_or(0, |s| s.nparts())
    }

    pub fn max_secsz(&self) -> u32 {
        self.selected.map_or(MAX_SECSZ_UNSELECTED, |s| s.max_secsz())
    }

    pub fn bootcode(&self) -> Option<&[u8]> {
        self.bootcode.as_deref()
    }

    /// Load a boot-code image. The buffer is sized to the scheme's full
    /// boot-code capacity and zero-padded past the file content. A
    /// successful load replaces any previous buffer; a failed one leaves
    /// it untouched.
    pub fn load_bootcode(&mut self, file: &mut File) -> Result<(), SchemeError> {
        let scheme = self.selected.ok_or(SchemeError::NoSchemeSelected)?;
        let limit = scheme.bootcode_size();
        if limit == 0 {
            return Err(SchemeError::BootcodeUnsupported);
        }

        let size = file.metadata()?.len();
        if size > limit as u64 {
            return Err(SchemeError::BootcodeTooBig { size, limit });
        }

        let mut buf = vec![0u8; limit];
        file.read_exact(&mut buf[..size as usize])?;
        self.bootcode = Some(buf);
        Ok(())
    }

    /// Resolve the partition's alias against the selected scheme and
    /// validate its label. On success `p.part_type` holds the scheme's
    /// on-disk type; on any failure `p` is untouched.
    pub fn check_update_part(&self, p: &mut Partition) -> Result<(), SchemeError> {
        let scheme = self.selected.ok_or(SchemeError::NoSchemeSelected)?;

        let ptype = scheme
            .type_lookup(p.alias)
            .ok_or(SchemeError::UnsupportedAlias(p.alias))?;

        if let Some(label) = &p.label {
            if label.len() > scheme.label_len() {
                return Err(SchemeError::LabelTooLong {
                    limit: scheme.label_len(),
                });
            }
        }

        p.part_type = Some(ptype);
        Ok(())
    }

    /// Identity when no scheme is selected, so layout passes can run
    /// before selection.
    pub fn metadata(&self, region: MetaRegion, start: Lba) -> Lba {
        match self.selected {
            Some(s) => s.metadata(region, start),
            None => start,
        }
    }

    /// No-op success when no scheme is selected.
    pub fn write(
        &self,
        image: &mut Image,
        parts: &[Partition],
        end: Lba,
    ) -> Result<(), SchemeError> {
        match self.selected {
            Some(s) => s.write(image, parts, end, self.bootcode()),
            None => Ok(()),
        }
    }

    /// Resolve an alias name against the selected scheme's alias list.
    pub fn get_alias(&self, name: &str) -> Result<(Alias, PartType), SchemeError> {
        let scheme = self.selected.ok_or(SchemeError::NoSchemeSelected)?;
        let alias =
            parse_alias(name).ok_or_else(|| SchemeError::UnknownAlias(name.to_string()))?;
        let ptype = scheme
            .type_lookup(alias)
            .ok_or_else(|| SchemeError::UnknownAlias(name.to_string()))?;
        Ok((alias, ptype))
    }

    /// Print one scheme's description, or every registered scheme's when
    /// no name is given.
    pub fn show_info(&self, name: Option<&str>) -> Result<(), SchemeError> {
        match name {
            Some(name) => {
                let s = self
                    .registry
                    .find(name)
                    .ok_or_else(|| SchemeError::UnknownScheme(name.to_string()))?;
                print!("{}", SchemeInfo(s));
            }
            None => {
                for s in self.registry.iter() {
                    print!("{}", SchemeInfo(s));
                }
            }
        }
        Ok(())
    }
}

/// Display wrapper for diagnostic output: scheme header plus one indented
/// line per supported alias.
pub struct SchemeInfo<'a>(pub &'a dyn Scheme);

impl Display for SchemeInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} - label size:{}, '{}':",
            self.0.name(),
            self.0.label_len(),
            self.0.description()
        )?;
        for (alias, _) in self.0.aliases() {
            writeln!(f, "\t{}", alias)?;
        }
        Ok(())
    }
}
