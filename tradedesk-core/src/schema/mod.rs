//! Resource kinds and their configuration schemas.
//!
//! Each kind knows its REST paths, the wire name of its owner id, the
//! documented default record used when the backend has none, its validation
//! table, which fields free-text search looks at, and how its wire payload
//! maps onto the flat field map.

pub mod portfolio;
pub mod strategy;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::ConfigRecord;
use crate::validation::FieldRule;

/// Owning entity type of a configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Portfolio,
    Strategy,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Portfolio, ResourceKind::Strategy];

    /// Collection path, e.g. `/portfolio`.
    pub fn collection_path(self) -> &'static str {
        match self {
            ResourceKind::Portfolio => "/portfolio",
            ResourceKind::Strategy => "/strategies",
        }
    }

    /// Per-entity configuration path, e.g. `/portfolio/P1/config`.
    pub fn config_path(self, owner_id: &str) -> String {
        format!("{}/{owner_id}/config", self.collection_path())
    }

    /// Server-side dry-run validation path. Only strategies expose one.
    pub fn check_path(self, owner_id: &str) -> Option<String> {
        match self {
            ResourceKind::Portfolio => None,
            ResourceKind::Strategy => Some(format!(
                "{}/{owner_id}/validate-config",
                self.collection_path()
            )),
        }
    }

    /// Wire name of the owning entity id.
    pub fn owner_field(self) -> &'static str {
        match self {
            ResourceKind::Portfolio => "portfolioId",
            ResourceKind::Strategy => "strategyId",
        }
    }

    /// Server-assigned fields kept in the record but never sent back.
    pub fn read_only_fields(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Portfolio => &[],
            ResourceKind::Strategy => strategy::READ_ONLY_FIELDS,
        }
    }

    /// Record used when the backend has no configuration for `owner_id`.
    pub fn default_record(self, owner_id: &str) -> ConfigRecord {
        match self {
            ResourceKind::Portfolio => portfolio::default_record(owner_id),
            ResourceKind::Strategy => strategy::default_record(owner_id),
        }
    }

    pub fn rules(self) -> &'static [FieldRule] {
        match self {
            ResourceKind::Portfolio => portfolio::RULES,
            ResourceKind::Strategy => strategy::RULES,
        }
    }

    /// Fields matched by free-text search, besides the owner id.
    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Portfolio => portfolio::SEARCH_FIELDS,
            ResourceKind::Strategy => strategy::SEARCH_FIELDS,
        }
    }

    /// Reshape a decoded wire object into flat fields, in place.
    pub fn flatten_wire(self, map: &mut Map<String, Value>) {
        match self {
            ResourceKind::Portfolio => {}
            ResourceKind::Strategy => strategy::flatten(map),
        }
    }

    /// Reshape flat fields into the object the backend expects, in place.
    pub fn nest_wire(self, map: &mut Map<String, Value>) {
        match self {
            ResourceKind::Portfolio => {}
            ResourceKind::Strategy => strategy::nest(map),
        }
    }

    /// Capitalized name for user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ResourceKind::Portfolio => "Portfolio",
            ResourceKind::Strategy => "Strategy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Portfolio => write!(f, "portfolio"),
            ResourceKind::Strategy => write!(f, "strategy"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portfolio" | "portfolios" => Ok(ResourceKind::Portfolio),
            "strategy" | "strategies" => Ok(ResourceKind::Strategy),
            other => Err(format!("unknown resource kind '{other}' (expected portfolio or strategy)")),
        }
    }
}
