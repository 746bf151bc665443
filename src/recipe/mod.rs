// src/recipe/mod.rs

//! Package recipes
//!
//! A recipe is the fixed metadata block that drives a staging run: package
//! identity, dependencies, where the upstream source lives and the digest it
//! must match. Recipes are loaded from JSON or taken from the built-in set,
//! and are validated once before any work is done.

pub mod checksum;

pub use checksum::Checksum;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Architecture sentinel for architecture-independent packages
pub const ARCH_ANY: &str = "any";

/// Root-relative directory that holds per-package license files
pub const LICENSE_DIR: &str = "usr/share/licenses";

/// Highest bytecode optimization level the delegate installer accepts
pub const MAX_OPTIMIZE: u8 = 2;

fn default_release() -> u32 {
    1
}

fn default_license_file() -> PathBuf {
    PathBuf::from("COPYING")
}

fn default_optimize() -> u8 {
    1
}

/// Package metadata that drives a staging run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    #[serde(default = "default_release")]
    pub release: u32,
    #[serde(default)]
    pub description: String,
    pub arch: BTreeSet<String>,
    /// Upstream homepage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub license: Vec<String>,
    #[serde(default)]
    pub depends: BTreeSet<String>,
    /// Source URL template; `$pkgver`, `$pkgname` and `$pkgrel` are expanded
    pub source: String,
    pub checksum: Checksum,
    /// License file path relative to the extracted source directory
    #[serde(default = "default_license_file")]
    pub license_file: PathBuf,
    /// Name of the extracted source directory, when it is not `<upstream>-<version>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcdir: Option<String>,
    #[serde(default = "default_optimize")]
    pub optimize: u8,
}

impl PackageMetadata {
    /// The python-dmenuwrap recipe
    pub fn dmenuwrap() -> Self {
        Self {
            name: "python-dmenuwrap".to_string(),
            version: "0.1.0".to_string(),
            release: 1,
            description: "Easily provide selection options to dmenu and handle them with python scripts."
                .to_string(),
            arch: [ARCH_ANY.to_string()].into_iter().collect(),
            url: Some("https://pypi.python.org/pypi/dmenuwrap".to_string()),
            license: vec!["GPL3".to_string()],
            depends: ["python".to_string(), "dmenu".to_string()]
                .into_iter()
                .collect(),
            source: "https://pypi.python.org/packages/source/d/dmenuwrap/dmenuwrap-${pkgver}.tar.gz"
                .to_string(),
            checksum: Checksum::Md5("4293d54254e563251728731daf93b73b".to_string()),
            license_file: default_license_file(),
            srcdir: None,
            optimize: default_optimize(),
        }
    }

    /// Parse and validate a recipe from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(content)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Load and validate a recipe file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!("Loading recipe from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check every field before the recipe is used
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        semver::Version::parse(&self.version).map_err(|e| {
            Error::InvalidRecipe(format!("Version '{}' is not semantic: {}", self.version, e))
        })?;

        if self.release == 0 {
            return Err(Error::InvalidRecipe("Release must be at least 1".to_string()));
        }

        if self.arch.is_empty() {
            return Err(Error::InvalidRecipe("At least one architecture is required".to_string()));
        }
        if self.arch.contains(ARCH_ANY) && self.arch.len() > 1 {
            return Err(Error::InvalidRecipe(format!(
                "Architecture '{}' cannot be combined with others",
                ARCH_ANY
            )));
        }

        if self.source.trim().is_empty() {
            return Err(Error::InvalidRecipe("Source URL is empty".to_string()));
        }

        self.checksum.validate()?;

        let relative = self.license_file.components().all(|c| matches!(c, Component::Normal(_)));
        if self.license_file.as_os_str().is_empty() || !relative {
            return Err(Error::InvalidRecipe(format!(
                "License file must be a plain relative path: {}",
                self.license_file.display()
            )));
        }

        if let Some(srcdir) = &self.srcdir
            && (srcdir.is_empty() || srcdir.contains('/') || srcdir == "." || srcdir == "..")
        {
            return Err(Error::InvalidRecipe(format!("Invalid source directory: {}", srcdir)));
        }

        if self.optimize > MAX_OPTIMIZE {
            return Err(Error::InvalidRecipe(format!(
                "Optimize level must be 0..={}, got {}",
                MAX_OPTIMIZE, self.optimize
            )));
        }

        Ok(())
    }

    /// Version and release, e.g. `0.1.0-1`
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }

    /// Source URL with the version variables substituted
    pub fn source_url(&self) -> String {
        let release = self.release.to_string();
        let vars = [
            ("pkgname", self.name.as_str()),
            ("pkgver", self.version.as_str()),
            ("pkgrel", release.as_str()),
        ];

        let mut url = self.source.clone();
        for (var, value) in vars {
            url = url
                .replace(&format!("${{{}}}", var), value)
                .replace(&format!("${}", var), value);
        }
        url
    }

    /// Directory the source archive unpacks to
    ///
    /// Python packages drop their `python-` prefix upstream, so the tarball
    /// for `python-dmenuwrap` unpacks to `dmenuwrap-0.1.0`.
    pub fn source_dir_name(&self) -> String {
        if let Some(srcdir) = &self.srcdir {
            return srcdir.clone();
        }
        let upstream = self.name.strip_prefix("python-").unwrap_or(&self.name);
        format!("{}-{}", upstream, self.version)
    }

    /// Destination of the license file relative to the staging root
    pub fn license_dest(&self) -> PathBuf {
        let file_name = self
            .license_file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(default_license_file);
        Path::new(LICENSE_DIR).join(&self.name).join(file_name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRecipe("Package name is empty".to_string()));
    }
    if name.starts_with('-') || name.starts_with('.') {
        return Err(Error::InvalidRecipe(format!(
            "Package name cannot start with '-' or '.': {}",
            name
        )));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "@._+-".contains(c);
    if !name.chars().all(allowed) {
        return Err(Error::InvalidRecipe(format!(
            "Package name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dmenuwrap_recipe_is_valid() {
        let recipe = PackageMetadata::dmenuwrap();
        recipe.validate().unwrap();

        assert_eq!(recipe.full_version(), "0.1.0-1");
        assert!(recipe.arch.contains(ARCH_ANY));
        assert!(recipe.depends.contains("dmenu"));
        assert_eq!(recipe.checksum.expected(), "4293d54254e563251728731daf93b73b");
    }

    #[test]
    fn test_source_url_expansion() {
        let recipe = PackageMetadata::dmenuwrap();
        assert_eq!(
            recipe.source_url(),
            "https://pypi.python.org/packages/source/d/dmenuwrap/dmenuwrap-0.1.0.tar.gz"
        );

        let mut recipe = PackageMetadata::dmenuwrap();
        recipe.source = "https://example.com/$pkgname/$pkgver-$pkgrel.tar.xz".to_string();
        assert_eq!(
            recipe.source_url(),
            "https://example.com/python-dmenuwrap/0.1.0-1.tar.xz"
        );
    }

    #[test]
    fn test_source_dir_name() {
        let mut recipe = PackageMetadata::dmenuwrap();
        assert_eq!(recipe.source_dir_name(), "dmenuwrap-0.1.0");

        recipe.name = "zlib".to_string();
        assert_eq!(recipe.source_dir_name(), "zlib-0.1.0");

        recipe.srcdir = Some("upstream".to_string());
        assert_eq!(recipe.source_dir_name(), "upstream");
    }

    #[test]
    fn test_license_dest() {
        let mut recipe = PackageMetadata::dmenuwrap();
        assert_eq!(
            recipe.license_dest(),
            PathBuf::from("usr/share/licenses/python-dmenuwrap/COPYING")
        );

        recipe.license_file = PathBuf::from("docs/LICENSE.txt");
        assert_eq!(
            recipe.license_dest(),
            PathBuf::from("usr/share/licenses/python-dmenuwrap/LICENSE.txt")
        );
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let cases: Vec<Box<dyn Fn(&mut PackageMetadata)>> = vec![
            Box::new(|r: &mut PackageMetadata| r.name = String::new()),
            Box::new(|r: &mut PackageMetadata| r.name = "-dmenuwrap".to_string()),
            Box::new(|r: &mut PackageMetadata| r.name = "Python-Dmenuwrap".to_string()),
            Box::new(|r: &mut PackageMetadata| r.version = "0.1".to_string()),
            Box::new(|r: &mut PackageMetadata| r.release = 0),
            Box::new(|r: &mut PackageMetadata| r.arch.clear()),
            Box::new(|r: &mut PackageMetadata| {
                r.arch.insert("x86_64".to_string());
            }),
            Box::new(|r: &mut PackageMetadata| r.source = " ".to_string()),
            Box::new(|r: &mut PackageMetadata| r.checksum = Checksum::Md5("1234".to_string())),
            Box::new(|r: &mut PackageMetadata| r.license_file = PathBuf::from("../COPYING")),
            Box::new(|r: &mut PackageMetadata| r.license_file = PathBuf::from("/etc/COPYING")),
            Box::new(|r: &mut PackageMetadata| r.srcdir = Some("a/b".to_string())),
            Box::new(|r: &mut PackageMetadata| r.optimize = 3),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut recipe = PackageMetadata::dmenuwrap();
            mutate(&mut recipe);
            assert!(
                matches!(recipe.validate(), Err(Error::InvalidRecipe(_))),
                "case {} should be rejected",
                i
            );
        }
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let json = r#"{
            "name": "python-dmenuwrap",
            "version": "0.1.0",
            "arch": ["any"],
            "depends": ["python", "dmenu"],
            "source": "https://example.com/dmenuwrap-${pkgver}.tar.gz",
            "checksum": {"md5": "4293d54254e563251728731daf93b73b"}
        }"#;

        let recipe = PackageMetadata::from_json_str(json).unwrap();
        assert_eq!(recipe.release, 1);
        assert_eq!(recipe.optimize, 1);
        assert_eq!(recipe.license_file, PathBuf::from("COPYING"));
        assert_eq!(recipe.source_url(), "https://example.com/dmenuwrap-0.1.0.tar.gz");
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{
            "name": "python-dmenuwrap",
            "version": "not-a-version",
            "arch": ["any"],
            "source": "https://example.com/x.tar.gz",
            "checksum": {"md5": "4293d54254e563251728731daf93b73b"}
        }"#;

        assert!(matches!(
            PackageMetadata::from_json_str(json),
            Err(Error::InvalidRecipe(_))
        ));
        assert!(matches!(
            PackageMetadata::from_json_str("{"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.json");
        let recipe = PackageMetadata::dmenuwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&recipe).unwrap()).unwrap();

        assert_eq!(PackageMetadata::from_json_file(&path).unwrap(), recipe);
    }
}
