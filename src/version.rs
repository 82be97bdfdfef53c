//! vSphere product versions, as reported in a connection's `AboutInfo`.
//!
//! Versions only compare between identical products: a vCenter Server
//! version is neither newer nor older than an ESXi one.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("could not parse {component} version {value:?} from {version:?}")]
    Component {
        component: &'static str,
        value: String,
        version: String,
    },
    #[error("could not parse build version {0:?}")]
    Build(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VSphereVersion {
    pub product: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl VSphereVersion {
    /// Parse a product name, a dotted `major.minor.patch` version and a build
    /// number.
    pub fn parse(product: &str, version: &str, build: &str) -> Result<Self, VersionError> {
        let mut parts = version.split('.');
        let mut component = |name: &'static str| {
            let value = parts.next().unwrap_or_default();
            value.parse::<u32>().map_err(|_| VersionError::Component {
                component: name,
                value: value.to_string(),
                version: version.to_string(),
            })
        };

        let major = component("major")?;
        let minor = component("minor")?;
        let patch = component("patch")?;
        let build = build
            .parse::<u32>()
            .map_err(|_| VersionError::Build(build.to_string()))?;

        Ok(Self {
            product: product.to_string(),
            major,
            minor,
            patch,
            build,
        })
    }

    /// Ordering against `other`, or `None` for a different product. The
    /// version number decides before the build number does.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.product != other.product {
            return None;
        }
        Some(
            (self.major, self.minor, self.patch, self.build)
                .cmp(&(other.major, other.minor, other.patch, other.build)),
        )
    }

    pub fn newer(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    pub fn older(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    pub fn equal(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for VSphereVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}.{} build-{}",
            self.product, self.major, self.minor, self.patch, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VCENTER: &str = "VMware vCenter Server";

    fn v(version: &str, build: &str) -> VSphereVersion {
        VSphereVersion::parse(VCENTER, version, build).unwrap()
    }

    #[test]
    fn parse_basic() {
        assert_eq!(
            v("6.2.1", "1000000"),
            VSphereVersion {
                product: VCENTER.to_string(),
                major: 6,
                minor: 2,
                patch: 1,
                build: 1000000,
            }
        );
    }

    #[test]
    fn parse_errors_name_the_component() {
        let cases = [
            ("6a.2.1", "1000000", "could not parse major version"),
            ("6.2a.1", "1000000", "could not parse minor version"),
            ("6.2.1a", "1000000", "could not parse patch version"),
            ("6.2", "1000000", "could not parse patch version"),
            ("6.2.1", "1000000a", "could not parse build version"),
        ];
        for (version, build, expected) in cases {
            let err = VSphereVersion::parse(VCENTER, version, build).unwrap_err();
            assert!(
                err.to_string().starts_with(expected),
                "{version}/{build}: {err}"
            );
        }
    }

    #[test]
    fn compare_table() {
        let cases = [
            ("6.2.1", "1000000", "6.2.1", "1000000", Some(Ordering::Equal)),
            ("6.2.1", "1000000", "5.2.1", "1000000", Some(Ordering::Greater)),
            ("6.2.1", "1000000", "6.1.1", "1000000", Some(Ordering::Greater)),
            ("6.2.1", "1000000", "6.2.0", "1000000", Some(Ordering::Greater)),
            ("6.2.1", "1000001", "6.2.1", "1000000", Some(Ordering::Greater)),
            ("6.2.2", "1000000", "6.2.1", "1000001", Some(Ordering::Greater)),
            ("5.2.1", "1000000", "6.2.1", "1000000", Some(Ordering::Less)),
            ("6.1.1", "1000000", "6.2.1", "1000000", Some(Ordering::Less)),
            ("6.2.0", "1000000", "6.2.1", "1000000", Some(Ordering::Less)),
            ("6.2.1", "1000000", "6.2.1", "1000001", Some(Ordering::Less)),
            ("6.2.1", "1000001", "6.2.2", "1000000", Some(Ordering::Less)),
        ];
        for (va, ba, vb, bb, expected) in cases {
            let a = v(va, ba);
            let b = v(vb, bb);
            assert_eq!(a.compare(&b), expected, "{a} vs {b}");
            assert_eq!(a.newer(&b), expected == Some(Ordering::Greater));
            assert_eq!(a.older(&b), expected == Some(Ordering::Less));
            assert_eq!(a.equal(&b), expected == Some(Ordering::Equal));
        }
    }

    #[test]
    fn different_products_do_not_compare() {
        let vc = v("6.2.1", "1000000");
        let esxi = VSphereVersion::parse("VMware ESXi", "6.2.1", "1000000").unwrap();
        assert_eq!(vc.compare(&esxi), None);
        assert!(!vc.newer(&esxi) && !vc.older(&esxi) && !vc.equal(&esxi));
    }
}
