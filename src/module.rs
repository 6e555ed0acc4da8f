use std::collections::{BTreeMap, BTreeSet};

/// One relocatable unit of machine code plus its symbol metadata.
///
/// Positions are word offsets relative to the first word of `object_code`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectModule {
    /// Source file name, only used for diagnostics and the link map.
    pub name: Option<String>,
    /// Labels this module makes visible, by local position.
    pub exported_labels: BTreeMap<String, u16>,
    /// Positions holding a module-relative address of a local label.
    pub used_labels: BTreeSet<u16>,
    /// Positions to overwrite with the absolute address of a label.
    pub imported_labels: BTreeMap<u16, String>,
    pub object_code: Vec<u16>,
}

impl ObjectModule {
    #[must_use]
    pub fn new(object_code: Vec<u16>) -> Self {
        Self {
            object_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn export(mut self, label: impl Into<String>, position: u16) -> Self {
        self.exported_labels.insert(label.into(), position);
        self
    }

    #[must_use]
    pub fn use_local(mut self, position: u16) -> Self {
        self.used_labels.insert(position);
        self
    }

    #[must_use]
    pub fn import(mut self, position: u16, label: impl Into<String>) -> Self {
        self.imported_labels.insert(position, label.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.object_code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_code.is_empty()
    }

    /// Name to show in messages: the source name, or `#index` when unnamed.
    #[must_use]
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}
