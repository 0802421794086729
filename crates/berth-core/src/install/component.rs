//! Installable components and the batch they are resolved from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Ordering tier of a component. Foundational tiers install first, most
/// fundamental first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Bootstrap,
    Core,
    Ordinary,
}

impl ComponentKind {
    /// Rank among foundational kinds, `None` for ordinary components.
    pub fn foundational_rank(self) -> Option<u8> {
        match self {
            ComponentKind::Bootstrap => Some(0),
            ComponentKind::Core => Some(1),
            ComponentKind::Ordinary => None,
        }
    }

    pub fn is_foundational(self) -> bool {
        self.foundational_rank().is_some()
    }

    /// Kind implied by a discovered module name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bootstrap" => ComponentKind::Bootstrap,
            "core" => ComponentKind::Core,
            _ => ComponentKind::Ordinary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Opaque to the resolver; handed to the installer as-is.
    pub source: PathBuf,
    /// Components that must be installed before this one.
    #[serde(default)]
    pub pins: Vec<String>,
    pub kind: ComponentKind,
}

impl Component {
    /// Component whose kind is derived from its name.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let kind = ComponentKind::from_name(&name);
        Self {
            name,
            source: source.into(),
            pins: Vec::new(),
            kind,
        }
    }

    pub fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn pinned_after<I, S>(mut self, pins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pins.extend(pins.into_iter().map(Into::into));
        self
    }
}

/// Discovered components plus the externally declared sub-order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallationBatch {
    /// In discovery order.
    pub components: Vec<Component>,
    pub declared_order: Vec<String>,
}

impl InstallationBatch {
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            components,
            declared_order: Vec::new(),
        }
    }

    pub fn with_declared_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Append pins for `name`, e.g. from the manifest. Unknown names are
    /// left for the resolver to reject.
    pub fn add_pins(&mut self, name: &str, pins: &[String]) -> bool {
        let mut found = false;
        for component in self.components.iter_mut().filter(|c| c.name == name) {
            component.pins.extend(pins.iter().cloned());
            found = true;
        }
        found
    }
}
