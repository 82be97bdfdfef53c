//! vSphere inventory folder paths.
//!
//! Every inventory object lives under a datacenter, inside one of the
//! datacenter's type-specific root folders:
//!
//! ```text
//! /dc1/vm/web/frontend-01
//! └┬─┘└┬┘└──────┬───────┘
//!  │   │        └─ relative path (what users configure)
//!  │   └─ root path particle (one per folder type)
//!  └─ datacenter path
//! ```
//!
//! This module translates between the absolute form vSphere needs and the
//! datacenter-independent relative form, without ever talking to vCenter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod lexical;
pub mod location;
pub mod particle;

// ---------------------------------------------------------------------------
// Folder types
// ---------------------------------------------------------------------------

/// The five kinds of vSphere folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Vm,
    Network,
    Host,
    Datastore,
    /// Folders that hold datacenters. There is no root path particle for
    /// this type: datacenter folders sit above the datacenter itself.
    Datacenter,
}

impl FolderType {
    pub const ALL: [FolderType; 5] = [
        FolderType::Vm,
        FolderType::Network,
        FolderType::Host,
        FolderType::Datastore,
        FolderType::Datacenter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FolderType::Vm => "vm",
            FolderType::Network => "network",
            FolderType::Host => "host",
            FolderType::Datastore => "datastore",
            FolderType::Datacenter => "datacenter",
        }
    }

    /// The root path particle for this folder type, if it has one.
    pub fn particle(self) -> Option<RootPathParticle> {
        RootPathParticle::try_from(self).ok()
    }

    /// Determine a folder's type from its `childType` property.
    ///
    /// vCenter reports folder capabilities as a list whose first entry is
    /// always `Folder`; the second names the kind of entity the folder holds.
    pub fn from_child_types<S: AsRef<str>>(child_types: &[S]) -> Result<Self, FolderTypeError> {
        let owned = || -> Vec<String> {
            child_types.iter().map(|s| s.as_ref().to_string()).collect()
        };

        match child_types.first().map(|s| s.as_ref()) {
            Some("Folder") => {}
            Some(other) => return Err(FolderTypeError::NotAFolder(other.to_string())),
            None => return Err(FolderTypeError::UnknownChildType(owned())),
        }

        match child_types.get(1).map(|s| s.as_ref()) {
            Some("Datacenter") => Ok(FolderType::Datacenter),
            Some("ComputeResource") => Ok(FolderType::Host),
            Some("VirtualMachine") => Ok(FolderType::Vm),
            Some("Datastore") => Ok(FolderType::Datastore),
            Some("Network") => Ok(FolderType::Network),
            _ => Err(FolderTypeError::UnknownChildType(owned())),
        }
    }
}

impl fmt::Display for FolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderType {
    type Err = FolderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FolderType::ALL
            .into_iter()
            .find(|ft| ft.as_str() == s)
            .ok_or_else(|| FolderTypeError::Unknown(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FolderTypeError {
    #[error("unknown folder type {0:?}")]
    Unknown(String),
    #[error("expected first childtype node to be Folder, got {0}")]
    NotAFolder(String),
    #[error("unknown folder type: {0:?}")]
    UnknownChildType(Vec<String>),
    #[error("folder type {0} has no root path particle")]
    NoParticle(FolderType),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The inventory path does not contain the particle delimiter.
    #[error("could not split path {path:?} on {delimiter:?}")]
    Malformed { path: String, delimiter: String },
    #[error("a datacenter is required for folders of type {0}")]
    MissingDatacenter(FolderType),
    #[error("import path {0:?} must start with a leading slash")]
    RelativeImportPath(String),
}

// ---------------------------------------------------------------------------
// Relative path normalization
// ---------------------------------------------------------------------------

/// Whether `path` names the root folder of its type (`""` or `"/"`).
pub fn path_is_empty(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Bring a user-supplied relative folder path into canonical form: cleaned,
/// without a leading slash, and `""` for the root.
pub fn normalize_folder_path(path: &str) -> String {
    if path_is_empty(path) {
        return String::new();
    }
    let cleaned = lexical::clean(path);
    cleaned.strip_prefix('/').unwrap_or(&cleaned).to_string()
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use location::{
    FolderLocation, FolderUpdatePlan, InventoryObject, import_path, parent_folder_path,
    plan_folder_update,
};
pub use particle::RootPathParticle;
