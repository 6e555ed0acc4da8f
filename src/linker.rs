use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::Args;
use crate::format::obj::parse_object;
use crate::layout::{plan_layout, LayoutPlan};
use crate::module::ObjectModule;
use crate::resolver::resolve_object;
use crate::writer::map::write_map;
use crate::writer::write_output;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("no modules to link")]
    EmptyInput,
    #[error("module #{module}: position {position:#06x} is outside code of {len} word(s)")]
    PositionOutOfRange {
        module: usize,
        position: u16,
        len: usize,
    },
    #[error("module #{module}: position {position:#06x} is both a local use and an import")]
    PositionConflict { module: usize, position: u16 },
    #[error("symbol '{name}' exported by module #{first} and module #{second}")]
    DuplicateSymbol {
        name: String,
        first: usize,
        second: usize,
    },
    #[error("module #{module}: undefined symbol '{name}' at position {position:#06x}")]
    UndefinedSymbol {
        name: String,
        module: usize,
        position: u16,
    },
    #[error("image of {words} word(s) does not fit the 16-bit address space")]
    ImageTooLarge { words: usize },
    #[error("module #{module}: symbol '{name}' lands at {address:#x}, past the address space")]
    SymbolOutOfAddressSpace {
        name: String,
        module: usize,
        address: usize,
    },
}

impl LinkError {
    /// Index of the module the error was found in, when there is one.
    #[must_use]
    pub fn module_index(&self) -> Option<usize> {
        match self {
            Self::PositionOutOfRange { module, .. }
            | Self::PositionConflict { module, .. }
            | Self::UndefinedSymbol { module, .. }
            | Self::SymbolOutOfAddressSpace { module, .. } => Some(*module),
            Self::DuplicateSymbol { second, .. } => Some(*second),
            Self::EmptyInput | Self::ImageTooLarge { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSymbol {
    pub address: u16,
    pub module_index: usize,
}

/// Flat machine code ready to load at address 0, plus what produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedImage {
    pub words: Vec<u16>,
    pub symbols: BTreeMap<String, GlobalSymbol>,
    pub layout: LayoutPlan,
}

impl LinkedImage {
    #[must_use]
    pub fn into_words(self) -> Vec<u16> {
        self.words
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Patch {
    /// Add the module base to a module-relative address.
    Relocate(u16),
    /// Replace the word with an absolute symbol address.
    Resolve(u16),
}

#[derive(Debug, Clone, Copy)]
struct PendingPatch {
    module: usize,
    position: usize,
    patch: Patch,
}

/// Links modules into one image, patching their code in place.
///
/// Every check runs before the first word is written, so on error the
/// modules are left as they were.
///
/// # Errors
/// Returns `LinkError` for empty input, bad positions, duplicate or
/// undefined symbols, and images larger than the address space.
pub fn link(modules: &mut [ObjectModule]) -> Result<LinkedImage, LinkError> {
    if modules.is_empty() {
        return Err(LinkError::EmptyInput);
    }

    let layout = plan_layout(modules);
    if !layout.fits_address_space() {
        return Err(LinkError::ImageTooLarge {
            words: layout.total_words,
        });
    }
    for placement in &layout.placements {
        debug!(
            module = placement.module_index,
            base = placement.base,
            len = placement.len,
            "placed module"
        );
    }

    let symbols = build_symbol_table(modules, &layout)?;
    let mut patches = plan_relocations(modules, &layout)?;
    patches.extend(plan_imports(modules, &symbols)?);

    for p in &patches {
        let word = &mut modules[p.module].object_code[p.position];
        *word = match p.patch {
            Patch::Relocate(base) => word.wrapping_add(base),
            Patch::Resolve(address) => address,
        };
    }

    let words = modules
        .iter()
        .flat_map(|module| module.object_code.iter().copied())
        .collect::<Vec<_>>();
    info!(
        modules = modules.len(),
        words = words.len(),
        symbols = symbols.len(),
        patches = patches.len(),
        "linked image"
    );

    Ok(LinkedImage {
        words,
        symbols,
        layout,
    })
}

/// Links copies of `modules`, leaving the originals untouched.
///
/// # Errors
/// Same as [`link`].
pub fn link_cloned(modules: &[ObjectModule]) -> Result<LinkedImage, LinkError> {
    let mut owned = modules.to_vec();
    link(&mut owned)
}

fn check_position(module: usize, position: u16, len: usize) -> Result<usize, LinkError> {
    let at = usize::from(position);
    if at >= len {
        return Err(LinkError::PositionOutOfRange {
            module,
            position,
            len,
        });
    }
    Ok(at)
}

fn build_symbol_table(
    modules: &[ObjectModule],
    layout: &LayoutPlan,
) -> Result<BTreeMap<String, GlobalSymbol>, LinkError> {
    let mut table = BTreeMap::<String, GlobalSymbol>::new();

    for (idx, module) in modules.iter().enumerate() {
        let base = layout.placements[idx].base;
        for (name, &position) in &module.exported_labels {
            // a label may sit just past the last word
            if usize::from(position) > module.len() {
                return Err(LinkError::PositionOutOfRange {
                    module: idx,
                    position,
                    len: module.len(),
                });
            }
            let absolute = base + usize::from(position);
            let address =
                u16::try_from(absolute).map_err(|_| LinkError::SymbolOutOfAddressSpace {
                    name: name.clone(),
                    module: idx,
                    address: absolute,
                })?;

            match table.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(GlobalSymbol {
                        address,
                        module_index: idx,
                    });
                }
                Entry::Occupied(slot) => {
                    return Err(LinkError::DuplicateSymbol {
                        name: name.clone(),
                        first: slot.get().module_index,
                        second: idx,
                    });
                }
            }
        }
    }

    Ok(table)
}

fn plan_relocations(
    modules: &[ObjectModule],
    layout: &LayoutPlan,
) -> Result<Vec<PendingPatch>, LinkError> {
    let mut patches = Vec::new();
    for (idx, module) in modules.iter().enumerate() {
        let base = layout.placements[idx].base;
        for &position in &module.used_labels {
            let at = check_position(idx, position, module.len())?;
            // an in-range position means the module starts below 0x10000
            let base = (base & 0xffff) as u16;
            if module.imported_labels.contains_key(&position) {
                return Err(LinkError::PositionConflict {
                    module: idx,
                    position,
                });
            }
            patches.push(PendingPatch {
                module: idx,
                position: at,
                patch: Patch::Relocate(base),
            });
        }
    }
    Ok(patches)
}

fn plan_imports(
    modules: &[ObjectModule],
    symbols: &BTreeMap<String, GlobalSymbol>,
) -> Result<Vec<PendingPatch>, LinkError> {
    let mut patches = Vec::new();
    for (idx, module) in modules.iter().enumerate() {
        for (&position, name) in &module.imported_labels {
            let at = check_position(idx, position, module.len())?;
            let Some(symbol) = symbols.get(name) else {
                return Err(LinkError::UndefinedSymbol {
                    name: name.clone(),
                    module: idx,
                    position,
                });
            };
            patches.push(PendingPatch {
                module: idx,
                position: at,
                patch: Patch::Resolve(symbol.address),
            });
        }
    }
    Ok(patches)
}

pub fn run(args: Args) -> anyhow::Result<()> {
    if args.inputs.is_empty() {
        anyhow::bail!("no input files")
    }

    let mut modules = load_modules(&args.inputs)?;
    let image = match link(&mut modules) {
        Ok(image) => image,
        Err(err) => {
            let context = match err.module_index() {
                Some(idx) => format!("link failed in {}", modules[idx].display_name(idx)),
                None => "link failed".to_string(),
            };
            return Err(anyhow::Error::new(err).context(context));
        }
    };

    let output = args.output_path();
    write_output(&output, &image, args.word_order())?;
    info!(output = %output.display(), words = image.words.len(), "wrote image");

    if let Some(map) = args.map_path() {
        write_map(&output, &map, &image, &modules)?;
        info!(map = %map.display(), "wrote map");
    }
    Ok(())
}

fn load_modules(inputs: &[String]) -> anyhow::Result<Vec<ObjectModule>> {
    let mut modules = Vec::with_capacity(inputs.len());

    for input in inputs {
        let path = Path::new(input);
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let object = parse_object(&bytes)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let mut module = resolve_object(&object)
            .with_context(|| format!("invalid object {}", path.display()))?;
        debug!(
            input = %path.display(),
            commands = object.commands.len(),
            words = module.len(),
            exports = module.exported_labels.len(),
            uses = module.used_labels.len(),
            imports = module.imported_labels.len(),
            "loaded object"
        );

        if module.name.is_none() {
            module.name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string());
        }
        modules.push(module);
    }

    Ok(modules)
}
