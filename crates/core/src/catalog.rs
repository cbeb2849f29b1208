//! Package catalog reconstructed from artifact filenames.
//!
//! The catalog is rebuilt from a storage listing on every manifest request
//! and holds no state between requests. Packages, versions within a package
//! and architectures within a version are kept in lexicographic order so
//! that every serializer produces identical output for identical listings.

use crate::filename::{ArtifactName, parse_artifact_name};
use serde::Serialize;

/// A single version of a package and the architectures it was built for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Version {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Arch")]
    pub arch: Vec<String>,
}

impl Version {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arch: Vec::with_capacity(3),
        }
    }

    /// Whether the architecture tag is present.
    pub fn has_arch(&self, arch: &str) -> bool {
        self.arch.binary_search_by(|a| a.as_str().cmp(arch)).is_ok()
    }

    /// Insert an architecture tag, keeping tags sorted and unique.
    pub fn add_arch(&mut self, arch: &str) {
        if let Err(pos) = self.arch.binary_search_by(|a| a.as_str().cmp(arch)) {
            self.arch.insert(pos, arch.to_string());
        }
    }
}

/// A package and its known versions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Package {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Versions")]
    pub versions: Vec<Version>,
}

impl Package {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: Vec::with_capacity(3),
        }
    }

    /// Look up a version by exact name.
    pub fn version(&self, version: &str) -> Option<&Version> {
        self.versions
            .binary_search_by(|v| v.name.as_str().cmp(version))
            .ok()
            .map(|pos| &self.versions[pos])
    }

    fn version_entry(&mut self, version: &str) -> &mut Version {
        let pos = match self
            .versions
            .binary_search_by(|v| v.name.as_str().cmp(version))
        {
            Ok(pos) => pos,
            Err(pos) => {
                self.versions.insert(pos, Version::new(version));
                pos
            }
        };
        &mut self.versions[pos]
    }
}

/// Ordered tree of packages -> versions -> architectures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    packages: Vec<Package>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a storage listing, skipping unparsable names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::new();
        for name in names {
            if let Some(ArtifactName {
                package,
                version,
                arch,
            }) = parse_artifact_name(name.as_ref())
            {
                catalog.add(&package, &version, &arch);
            }
        }
        catalog
    }

    /// Record one (package, version, arch) triple. Idempotent.
    pub fn add(&mut self, package: &str, version: &str, arch: &str) {
        let pos = match self
            .packages
            .binary_search_by(|p| p.name.as_str().cmp(package))
        {
            Ok(pos) => pos,
            Err(pos) => {
                self.packages.insert(pos, Package::new(package));
                pos
            }
        };

        self.packages[pos].version_entry(version).add_arch(arch);
    }

    /// Look up a package by exact name.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|pos| &self.packages[pos])
    }

    /// Packages in lexicographic order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Flatten back into (package, version, arch) triples in catalog order.
    pub fn triples(&self) -> Vec<(String, String, String)> {
        self.packages
            .iter()
            .flat_map(|p| {
                p.versions.iter().flat_map(move |v| {
                    v.arch
                        .iter()
                        .map(move |a| (p.name.clone(), v.name.clone(), a.clone()))
                })
            })
            .collect()
    }
}
