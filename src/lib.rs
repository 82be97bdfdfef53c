//! vsphere-inventory: offline inventory path algebra and event-driven
//! completion waiting for vSphere.

pub mod config;
pub mod event;
pub mod folder;
pub mod logging;
pub mod paths;
pub mod version;
