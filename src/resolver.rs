use std::collections::btree_map::Entry;

use thiserror::Error;

use crate::format::obj::{Command, ObjectFile};
use crate::module::ObjectModule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("object stream has no end command")]
    MissingEnd,
    #[error("empty label name at position {position:#06x}")]
    EmptyLabel { position: u16 },
    #[error("label '{name}' exported twice ({first:#06x} and {second:#06x})")]
    DuplicateExport { name: String, first: u16, second: u16 },
    #[error("position {position:#06x} listed twice as a local label use")]
    DuplicateUse { position: u16 },
    #[error("position {position:#06x} imports both '{first}' and '{second}'")]
    DuplicateImport {
        position: u16,
        first: String,
        second: String,
    },
}

/// Converts a parsed object stream into a typed module.
///
/// Range checks against the code length are left to the linker.
///
/// # Errors
/// Returns `ModuleError` when the stream describes an inconsistent module.
pub fn resolve_object(object: &ObjectFile) -> Result<ObjectModule, ModuleError> {
    let mut module = ObjectModule::default();
    let mut ended = false;

    for cmd in &object.commands {
        match cmd {
            Command::End => {
                ended = true;
                break;
            }
            Command::SourceFile { name } => module.name = Some(name.clone()),
            Command::Code(words) => module.object_code.extend_from_slice(words),
            Command::Export { position, name } => {
                if name.is_empty() {
                    return Err(ModuleError::EmptyLabel {
                        position: *position,
                    });
                }
                match module.exported_labels.entry(name.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(*position);
                    }
                    Entry::Occupied(slot) => {
                        return Err(ModuleError::DuplicateExport {
                            name: name.clone(),
                            first: *slot.get(),
                            second: *position,
                        });
                    }
                }
            }
            Command::Use { position } => {
                if !module.used_labels.insert(*position) {
                    return Err(ModuleError::DuplicateUse {
                        position: *position,
                    });
                }
            }
            Command::Import { position, name } => {
                if name.is_empty() {
                    return Err(ModuleError::EmptyLabel {
                        position: *position,
                    });
                }
                match module.imported_labels.entry(*position) {
                    Entry::Vacant(slot) => {
                        slot.insert(name.clone());
                    }
                    Entry::Occupied(slot) => {
                        return Err(ModuleError::DuplicateImport {
                            position: *position,
                            first: slot.get().clone(),
                            second: name.clone(),
                        });
                    }
                }
            }
        }
    }

    if !ended {
        return Err(ModuleError::MissingEnd);
    }
    Ok(module)
}
