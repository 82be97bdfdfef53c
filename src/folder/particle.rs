//! Root path particle algebra.
//!
//! A root path particle is the path segment that separates a datacenter's
//! inventory path from a type-specific subtree (`/dc1` + `/host` +
//! `/cluster1/esxi1`). All operations here are pure string manipulation.
//!
//! Splitting looks for the *first* occurrence of the particle delimiter as a
//! whole path segment, so `/dc1/hosts` is not split on `/host`. A folder
//! literally named after a particle (a `vm` folder under `/dc1/vm`, say)
//! still makes a path ambiguous; the first occurrence wins and callers must
//! avoid such names.

use std::fmt;

use super::{FolderType, FolderTypeError, PathError, lexical};

/// The section of an inventory path that denotes a specific kind of
/// inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootPathParticle(FolderType);

impl RootPathParticle {
    pub const VM: RootPathParticle = RootPathParticle(FolderType::Vm);
    pub const NETWORK: RootPathParticle = RootPathParticle(FolderType::Network);
    pub const HOST: RootPathParticle = RootPathParticle(FolderType::Host);
    pub const DATASTORE: RootPathParticle = RootPathParticle(FolderType::Datastore);

    pub fn folder_type(self) -> FolderType {
        self.0
    }

    pub fn name(self) -> &'static str {
        self.0.as_str()
    }

    /// The particle with a leading slash, e.g. `/host`.
    pub fn delimiter(self) -> String {
        format!("/{}", self.name())
    }

    /// The root folder path for this particle under a datacenter.
    pub fn root_from_datacenter(self, datacenter_path: &str) -> String {
        format!("{}/{}", datacenter_path, self.name())
    }

    /// [`Self::root_from_datacenter`] plus a relative path.
    pub fn path_from_datacenter(self, datacenter_path: &str, relative: &str) -> String {
        format!("{}/{}", self.root_from_datacenter(datacenter_path), relative)
    }

    /// Split on the first delimiter that ends at a segment boundary. The
    /// slash separating the particle from the relative part is dropped.
    fn split(self, inventory_path: &str) -> Result<(&str, &str), PathError> {
        let delimiter = self.delimiter();
        let boundary = inventory_path
            .match_indices(delimiter.as_str())
            .map(|(idx, _)| (idx, idx + delimiter.len()))
            .find(|&(_, end)| matches!(inventory_path[end..].chars().next(), None | Some('/')));

        match boundary {
            Some((idx, end)) => {
                let rest = &inventory_path[end..];
                Ok((&inventory_path[..idx], rest.strip_prefix('/').unwrap_or(rest)))
            }
            None => Err(PathError::Malformed {
                path: inventory_path.to_string(),
                delimiter,
            }),
        }
    }

    /// The datacenter section of `inventory_path`.
    pub fn split_datacenter(self, inventory_path: &str) -> Result<&str, PathError> {
        self.split(inventory_path).map(|(datacenter, _)| datacenter)
    }

    /// The path relative to the particle's root folder, without a leading
    /// slash. The root folder itself gives `""`.
    pub fn split_relative(self, inventory_path: &str) -> Result<&str, PathError> {
        self.split(inventory_path).map(|(_, relative)| relative)
    }

    /// The parent folder of [`Self::split_relative`]. Useful for getting the
    /// folder a managed entity lives in rather than its own path. An entity
    /// directly under the root folder gives `""`.
    pub fn split_relative_folder(self, inventory_path: &str) -> Result<String, PathError> {
        let relative = self.split_relative(inventory_path)?;
        match lexical::dir(relative) {
            parent if parent == "." => Ok(String::new()),
            parent => Ok(parent),
        }
    }

    /// Take the datacenter section of `inventory_path` and append
    /// `new_particle` to it.
    pub fn new_root_from_path(
        self,
        inventory_path: &str,
        new_particle: RootPathParticle,
    ) -> Result<String, PathError> {
        let datacenter = self.split_datacenter(inventory_path)?;
        Ok(format!("{}/{}", datacenter, new_particle.name()))
    }

    /// Rebase a relative path under another type's root in the same
    /// datacenter.
    ///
    /// For a host path `/dc1/host/cluster1/esxi1` and a datastore folder
    /// relative path `/foo/bar`, the datacenter section `/dc1` is combined
    /// with the datastore particle to give `/dc1/datastore/foo/bar`.
    pub fn path_from_new_root(
        self,
        inventory_path: &str,
        new_particle: RootPathParticle,
        relative: &str,
    ) -> Result<String, PathError> {
        let root = self.new_root_from_path(inventory_path, new_particle)?;
        Ok(lexical::clean(&format!("{root}/{relative}")))
    }
}

impl TryFrom<FolderType> for RootPathParticle {
    type Error = FolderTypeError;

    fn try_from(ft: FolderType) -> Result<Self, Self::Error> {
        match ft {
            FolderType::Datacenter => Err(FolderTypeError::NoParticle(ft)),
            other => Ok(RootPathParticle(other)),
        }
    }
}

impl fmt::Display for RootPathParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
