//! Which updates a handler receives.

use std::fmt;

use telebind_api::{Update, UpdateType};

/// Selects updates by variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateFilter {
    /// Every update, including ones of an unknown variant.
    #[default]
    Any,
    /// Only updates carrying this variant.
    Kind(UpdateType),
}

impl UpdateFilter {
    pub fn matches(&self, update: &Update) -> bool {
        match self {
            Self::Any => true,
            // Unknown payloads only ever reach unconditional handlers.
            Self::Kind(UpdateType::Unknown) => false,
            Self::Kind(ty) => update.is(*ty),
        }
    }

    /// The variant this filter is restricted to, if any.
    pub fn kind(&self) -> Option<UpdateType> {
        match self {
            Self::Any => None,
            Self::Kind(ty) => Some(*ty),
        }
    }
}

impl From<UpdateType> for UpdateFilter {
    fn from(ty: UpdateType) -> Self {
        Self::Kind(ty)
    }
}

impl fmt::Display for UpdateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Kind(ty) => write!(f, "{ty}"),
        }
    }
}
