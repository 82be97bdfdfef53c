//! Inventory path algebra, exercised through the public API only.
//!
//! Tested in this file:
//! - splitting and rebuilding paths for every root path particle
//! - normalization of user-supplied relative folder paths
//! - moving between particle roots within one datacenter
//! - folder locations and update plans derived from inventory paths

use vsphere_inventory::folder::{
    FolderLocation, FolderType, InventoryObject, PathError, RootPathParticle,
    normalize_folder_path, path_is_empty, plan_folder_update,
};

const PARTICLES: [RootPathParticle; 4] = [
    RootPathParticle::VM,
    RootPathParticle::NETWORK,
    RootPathParticle::HOST,
    RootPathParticle::DATASTORE,
];

#[test]
fn split_then_rebuild_is_identity() {
    let cases = [
        ("/dc1", "web"),
        ("/dc1", "web/frontend/01"),
        ("/regions/east/dc-2", "team-a/prod"),
    ];
    for particle in PARTICLES {
        for (dc, rel) in cases {
            let path = particle.path_from_datacenter(dc, rel);
            let split_dc = particle.split_datacenter(&path).unwrap();
            let split_rel = particle.split_relative(&path).unwrap();
            assert_eq!(particle.path_from_datacenter(split_dc, split_rel), path);
        }
    }
}

#[test]
fn normalize_is_idempotent() {
    let inputs = ["", "/", "a", "/a/b/", "a//b", "./a/../b", "/x/./y/z/"];
    for input in inputs {
        let once = normalize_folder_path(input);
        assert_eq!(normalize_folder_path(&once), once, "input {input:?}");
        assert!(!once.starts_with('/'), "input {input:?} gave {once:?}");
    }
    assert_eq!(normalize_folder_path("/a/b/"), "a/b");
    assert!(path_is_empty("/"));
    assert!(!path_is_empty("a"));
}

#[test]
fn host_to_datastore_folder() {
    let path = RootPathParticle::HOST
        .path_from_new_root("/dc1/host/cluster1/esxi1", RootPathParticle::DATASTORE, "/foo/bar")
        .unwrap();
    assert_eq!(path, "/dc1/datastore/foo/bar");
}

#[test]
fn path_without_delimiter_errors() {
    for particle in PARTICLES {
        let err = particle.split_datacenter("/dc1").unwrap_err();
        assert!(matches!(err, PathError::Malformed { .. }));
        assert!(err.to_string().contains(&particle.delimiter()));
    }
}

#[test]
fn location_roundtrip_for_every_particle_type() {
    for ft in FolderType::ALL {
        let inventory_path = match ft.particle() {
            Some(particle) => particle.path_from_datacenter("/dc1", "team/app"),
            None => "/team/app".to_string(),
        };
        let loc = FolderLocation::from_inventory_path(ft, &inventory_path).unwrap();
        assert_eq!(loc.path, "team/app");
        assert_eq!(loc.inventory_path().unwrap(), inventory_path);
    }
}

#[test]
fn datastore_folder_from_host() {
    let host = InventoryObject::HostSystem("/dc1/host/cluster1/esxi1".to_string());
    assert_eq!(
        host.folder_path(RootPathParticle::DATASTORE, "iso").unwrap(),
        "/dc1/datastore/iso"
    );
}

#[test]
fn update_plan_moves_across_parents() {
    let plan = plan_folder_update("team/app", "other/app2", FolderType::Network, Some("/dc1"))
        .unwrap();
    assert_eq!(plan.rename.as_deref(), Some("app2"));
    assert_eq!(plan.move_to.as_deref(), Some("/dc1/network/other"));
}

#[test]
fn child_types_map_to_folder_types() {
    let cases = [
        (["Folder", "Datacenter"], FolderType::Datacenter),
        (["Folder", "ComputeResource"], FolderType::Host),
        (["Folder", "VirtualMachine"], FolderType::Vm),
        (["Folder", "Datastore"], FolderType::Datastore),
        (["Folder", "Network"], FolderType::Network),
    ];
    for (child_types, expected) in cases {
        assert_eq!(FolderType::from_child_types(&child_types).unwrap(), expected);
    }
    assert!(FolderType::from_child_types(&["Folder", "StoragePod"]).is_err());
    assert!(FolderType::from_child_types(&["Datacenter"]).is_err());
}
