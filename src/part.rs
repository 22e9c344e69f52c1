use crate::scheme::{alias::Alias, PartType};

/// One requested partition. `first_lba`/`last_lba` are filled in by the
/// layout pass, `part_type` by scheme validation.
#[derive(Clone, Debug)]
pub struct Partition {
    pub alias: Alias,
    pub label: Option<String>,
    pub size: u64,
    pub first_lba: u64,
    pub last_lba: u64,
    pub part_type: Option<PartType>,
}

impl Partition {
    pub fn new(alias: Alias, label: Option<String>, size: u64) -> Self {
        Partition {
            alias,
            label,
            size,
            first_lba: 0,
            last_lba: 0,
            part_type: None,
        }
    }
}
