use crate::module::ObjectModule;

/// Number of addressable words in the target machine's memory.
pub const ADDRESS_SPACE_WORDS: usize = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulePlacement {
    pub module_index: usize,
    /// Absolute address of the module's first word.
    pub base: usize,
    pub len: usize,
}

impl ModulePlacement {
    /// One past the last word of the module.
    #[must_use]
    pub fn end(&self) -> usize {
        self.base + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub placements: Vec<ModulePlacement>,
    pub total_words: usize,
}

impl LayoutPlan {
    #[must_use]
    pub fn fits_address_space(&self) -> bool {
        self.total_words <= ADDRESS_SPACE_WORDS
    }
}

/// Places modules back to back in input order, starting at address 0.
#[must_use]
pub fn plan_layout(modules: &[ObjectModule]) -> LayoutPlan {
    let mut cursor = 0usize;
    let placements = modules
        .iter()
        .enumerate()
        .map(|(idx, module)| {
            let placement = ModulePlacement {
                module_index: idx,
                base: cursor,
                len: module.len(),
            };
            cursor += module.len();
            placement
        })
        .collect::<Vec<_>>();

    LayoutPlan {
        placements,
        total_words: cursor,
    }
}
