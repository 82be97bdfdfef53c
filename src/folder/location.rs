//! Folder locations: the path bookkeeping behind creating, reading, moving and
//! importing folders, plus deriving folder paths from other inventory objects.

use serde::{Deserialize, Serialize};

use super::particle::RootPathParticle;
use super::{FolderType, PathError, lexical, normalize_folder_path};

// ---------------------------------------------------------------------------
// Anchoring objects
// ---------------------------------------------------------------------------

/// An inventory object that can anchor a folder lookup in its datacenter.
///
/// Only datastores and host systems are supported so far; every variant knows
/// which root path particle its own inventory path lives under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "inventory_path", rename_all = "snake_case")]
pub enum InventoryObject {
    Datastore(String),
    HostSystem(String),
}

impl InventoryObject {
    pub fn particle(&self) -> RootPathParticle {
        match self {
            InventoryObject::Datastore(_) => RootPathParticle::DATASTORE,
            InventoryObject::HostSystem(_) => RootPathParticle::HOST,
        }
    }

    pub fn inventory_path(&self) -> &str {
        match self {
            InventoryObject::Datastore(path) | InventoryObject::HostSystem(path) => path,
        }
    }

    /// The datacenter section of the object's inventory path.
    pub fn datacenter_path(&self) -> Result<&str, PathError> {
        self.particle().split_datacenter(self.inventory_path())
    }

    /// The root datastore folder of the object's datacenter.
    pub fn datastore_root_path(&self) -> Result<String, PathError> {
        self.particle()
            .new_root_from_path(self.inventory_path(), RootPathParticle::DATASTORE)
    }

    /// Absolute path of a folder of type `folder_type` at `relative`, in the
    /// same datacenter as this object.
    pub fn folder_path(
        &self,
        folder_type: RootPathParticle,
        relative: &str,
    ) -> Result<String, PathError> {
        self.particle()
            .path_from_new_root(self.inventory_path(), folder_type, relative)
    }
}

// ---------------------------------------------------------------------------
// Folder locations
// ---------------------------------------------------------------------------

/// Where a folder lives, in the form users configure it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLocation {
    pub folder_type: FolderType,
    /// `None` for datacenter folders, which sit above any datacenter.
    pub datacenter_path: Option<String>,
    /// Normalized relative path (`""` for the type's root folder).
    pub path: String,
}

impl FolderLocation {
    /// Derive a location from a folder's absolute inventory path. The folder
    /// type is authoritative, so this also works for imported folders.
    pub fn from_inventory_path(
        folder_type: FolderType,
        inventory_path: &str,
    ) -> Result<Self, PathError> {
        let Some(particle) = folder_type.particle() else {
            return Ok(Self {
                folder_type,
                datacenter_path: None,
                path: normalize_folder_path(inventory_path),
            });
        };

        let datacenter = particle.split_datacenter(inventory_path)?;
        let relative = particle.split_relative(inventory_path)?;
        Ok(Self {
            folder_type,
            datacenter_path: Some(datacenter.to_string()),
            path: normalize_folder_path(relative),
        })
    }

    /// The absolute inventory path this location describes.
    pub fn inventory_path(&self) -> Result<String, PathError> {
        match (self.folder_type.particle(), &self.datacenter_path) {
            (None, _) => Ok(lexical::clean(&format!("/{}", self.path))),
            (Some(particle), Some(dc)) => {
                Ok(lexical::clean(&particle.path_from_datacenter(dc, &self.path)))
            }
            (Some(_), None) => Err(PathError::MissingDatacenter(self.folder_type)),
        }
    }
}

/// Absolute path of the folder that a folder at `relative` is created in.
///
/// Datacenter folders are rooted at `/`; every other type needs the path of
/// the datacenter it belongs to.
pub fn parent_folder_path(
    relative: &str,
    folder_type: FolderType,
    datacenter_path: Option<&str>,
) -> Result<String, PathError> {
    let full = match (folder_type.particle(), datacenter_path) {
        (None, _) => format!("/{relative}"),
        (Some(particle), Some(dc)) => particle.path_from_datacenter(dc, relative),
        (Some(_), None) => return Err(PathError::MissingDatacenter(folder_type)),
    };
    Ok(lexical::dir(&lexical::clean(&full)))
}

/// Validate a folder import ID. Imports are addressed by absolute inventory
/// path, returned cleaned.
pub fn import_path(id: &str) -> Result<String, PathError> {
    if !id.starts_with('/') {
        return Err(PathError::RelativeImportPath(id.to_string()));
    }
    Ok(lexical::clean(id))
}

// ---------------------------------------------------------------------------
// Path changes
// ---------------------------------------------------------------------------

/// What it takes to get a folder from one relative path to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderUpdatePlan {
    /// New base name, when it changed.
    pub rename: Option<String>,
    /// Absolute path of the new parent folder, when it changed.
    pub move_to: Option<String>,
}

impl FolderUpdatePlan {
    pub fn is_noop(&self) -> bool {
        self.rename.is_none() && self.move_to.is_none()
    }
}

/// Work out whether a path change renames the folder, moves it to another
/// parent, or both.
pub fn plan_folder_update(
    old: &str,
    new: &str,
    folder_type: FolderType,
    datacenter_path: Option<&str>,
) -> Result<FolderUpdatePlan, PathError> {
    let old_parent = parent_folder_path(old, folder_type, datacenter_path)?;
    let new_parent = parent_folder_path(new, folder_type, datacenter_path)?;
    let old_name = lexical::base(old);
    let new_name = lexical::base(new);

    Ok(FolderUpdatePlan {
        rename: (old_name != new_name).then_some(new_name),
        move_to: (old_parent != new_parent).then_some(new_parent),
    })
}
