//! Conan recipe and package references
//!
//! A recipe reference looks like `name/version[@user[/channel]][#revision][%timestamp]`,
//! a package reference appends `:package_id[#revision]` to it. Both know how
//! they are laid out inside an Artifactory Conan repository.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Placeholder used by the Artifactory layout for a missing user or channel
const EMPTY_FIELD: &str = "_";

/// A Conan recipe reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeReference {
    pub name: String,
    pub version: String,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
}

impl RecipeReference {
    /// Parse a recipe reference, ignoring any `%timestamp` suffix
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidReference {
            reference: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        let without_ts = trimmed.split('%').next().unwrap_or_default();

        let (body, revision) = match without_ts.split_once('#') {
            Some((_, rev)) if rev.is_empty() => return Err(invalid("empty revision")),
            Some((body, rev)) => (body, Some(rev.to_string())),
            None => (without_ts, None),
        };

        let (name_version, user, channel) = match body.split_once('@') {
            Some((nv, uc)) => {
                let (user, channel) = match uc.split_once('/') {
                    Some((u, c)) => (u, Some(c.to_string())),
                    None => (uc, None),
                };
                if user.is_empty() {
                    return Err(invalid("empty user after '@'"));
                }
                (nv, Some(user.to_string()), channel.filter(|c| !c.is_empty()))
            }
            None => (body, None, None),
        };

        let (name, version) = name_version
            .split_once('/')
            .ok_or_else(|| invalid("expected name/version"))?;
        if name.is_empty() || version.is_empty() || version.contains('/') {
            return Err(invalid("expected name/version"));
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            user,
            channel,
            revision,
        })
    }

    /// The `user/name/version/channel` prefix of every Artifactory path for this recipe
    fn base_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.user.as_deref().unwrap_or(EMPTY_FIELD),
            self.name,
            self.version,
            self.channel.as_deref().unwrap_or(EMPTY_FIELD),
        )
    }

    /// Repository-relative folder holding the recipe files (`.../<rrev>/export`)
    pub fn export_path(&self) -> Result<String> {
        let revision = self.require_revision()?;
        Ok(format!("{}/{}/export", self.base_path(), revision))
    }

    /// Repository-relative folder selecting this recipe for property operations
    ///
    /// Without a revision every revision of the recipe is selected.
    pub fn storage_path(&self) -> String {
        match &self.revision {
            Some(rrev) => format!("{}/{}", self.base_path(), rrev),
            None => format!(
                "{}/{}/{}",
                self.user.as_deref().unwrap_or(EMPTY_FIELD),
                self.name,
                self.version
            ),
        }
    }

    fn require_revision(&self) -> Result<&str> {
        self.revision
            .as_deref()
            .ok_or_else(|| CoreError::InvalidReference {
                reference: self.to_string(),
                reason: "a recipe revision is required".to_string(),
            })
    }
}

impl FromStr for RecipeReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RecipeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let Some(user) = &self.user {
            write!(f, "@{}", user)?;
            if let Some(channel) = &self.channel {
                write!(f, "/{}", channel)?;
            }
        }
        if let Some(rev) = &self.revision {
            write!(f, "#{}", rev)?;
        }
        Ok(())
    }
}

/// A Conan package reference: one binary of a recipe revision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageReference {
    pub recipe: RecipeReference,
    pub package_id: String,
    pub revision: Option<String>,
}

impl PackageReference {
    pub fn new(
        recipe: RecipeReference,
        package_id: impl Into<String>,
        revision: Option<String>,
    ) -> Self {
        Self {
            recipe,
            package_id: package_id.into(),
            revision,
        }
    }

    /// Parse `<recipe-ref>:<package_id>[#prev]`
    pub fn parse(text: &str) -> Result<Self> {
        let (recipe, package) =
            text.trim()
                .split_once(':')
                .ok_or_else(|| CoreError::InvalidReference {
                    reference: text.to_string(),
                    reason: "expected <recipe>:<package_id>".to_string(),
                })?;

        let recipe = RecipeReference::parse(recipe)?;
        let package = package.split('%').next().unwrap_or_default();
        let (package_id, revision) = match package.split_once('#') {
            Some((id, rev)) => (id, Some(rev.to_string()).filter(|r| !r.is_empty())),
            None => (package, None),
        };
        if package_id.is_empty() {
            return Err(CoreError::InvalidReference {
                reference: text.to_string(),
                reason: "empty package id".to_string(),
            });
        }

        Ok(Self::new(recipe, package_id, revision))
    }

    /// Repository-relative folder holding the package files
    /// (`.../<rrev>/package/<package_id>/<prev>`)
    pub fn package_path(&self) -> Result<String> {
        let rrev = self.recipe.require_revision()?;
        let prev = self
            .revision
            .as_deref()
            .ok_or_else(|| CoreError::InvalidReference {
                reference: self.to_string(),
                reason: "a package revision is required".to_string(),
            })?;
        Ok(format!(
            "{}/{}/package/{}/{}",
            self.recipe.base_path(),
            rrev,
            self.package_id,
            prev
        ))
    }

    /// Repository-relative folder selecting this package for property operations
    pub fn storage_path(&self) -> String {
        let mut path = format!("{}/package/{}", self.recipe.storage_path(), self.package_id);
        if let Some(prev) = &self.revision {
            path.push('/');
            path.push_str(prev);
        }
        path
    }
}

impl FromStr for PackageReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.recipe, self.package_id)?;
        if let Some(rev) = &self.revision {
            write!(f, "#{}", rev)?;
        }
        Ok(())
    }
}

/// Either kind of reference, as accepted by the property commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyReference {
    Recipe(RecipeReference),
    Package(PackageReference),
}

impl AnyReference {
    /// Parse a package reference when the text has a `:`, a recipe reference otherwise
    pub fn parse(text: &str) -> Result<Self> {
        if text.contains(':') {
            PackageReference::parse(text).map(AnyReference::Package)
        } else {
            RecipeReference::parse(text).map(AnyReference::Recipe)
        }
    }

    pub fn storage_path(&self) -> String {
        match self {
            AnyReference::Recipe(r) => r.storage_path(),
            AnyReference::Package(p) => p.storage_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_recipe_reference() {
        let r = RecipeReference::parse("zlib/1.3@conan/stable#abc123%1700000000.0").unwrap();
        assert_eq!(r.name, "zlib");
        assert_eq!(r.version, "1.3");
        assert_eq!(r.user.as_deref(), Some("conan"));
        assert_eq!(r.channel.as_deref(), Some("stable"));
        assert_eq!(r.revision.as_deref(), Some("abc123"));
        assert_eq!(r.to_string(), "zlib/1.3@conan/stable#abc123");
    }

    #[test]
    fn test_parse_minimal_recipe_reference() {
        let r: RecipeReference = "fmt/10.1.1".parse().unwrap();
        assert_eq!(r.user, None);
        assert_eq!(r.revision, None);
        assert_eq!(r.to_string(), "fmt/10.1.1");
    }

    #[test]
    fn test_parse_invalid_recipe_reference() {
        assert!(RecipeReference::parse("zlib").is_err());
        assert!(RecipeReference::parse("/1.0").is_err());
        assert!(RecipeReference::parse("zlib/").is_err());
        assert!(RecipeReference::parse("zlib/1.0#").is_err());
        assert!(RecipeReference::parse("zlib/1.0@").is_err());
    }

    #[test]
    fn test_export_path_uses_placeholders() {
        let r = RecipeReference::parse("libb/1.0#rev1").unwrap();
        assert_eq!(r.export_path().unwrap(), "_/libb/1.0/_/rev1/export");

        let r = RecipeReference::parse("libb/1.0@team/testing#rev1").unwrap();
        assert_eq!(r.export_path().unwrap(), "team/libb/1.0/testing/rev1/export");
    }

    #[test]
    fn test_export_path_requires_revision() {
        let r = RecipeReference::parse("libb/1.0").unwrap();
        assert!(r.export_path().is_err());
    }

    #[test]
    fn test_package_reference() {
        let p = PackageReference::parse("liba/1.0#rrev:pkgid123#prev9").unwrap();
        assert_eq!(p.package_id, "pkgid123");
        assert_eq!(p.revision.as_deref(), Some("prev9"));
        assert_eq!(
            p.package_path().unwrap(),
            "_/liba/1.0/_/rrev/package/pkgid123/prev9"
        );
        assert_eq!(p.to_string(), "liba/1.0#rrev:pkgid123#prev9");
    }

    #[test]
    fn test_package_path_requires_both_revisions() {
        let p = PackageReference::parse("liba/1.0:pkgid#prev").unwrap();
        assert!(p.package_path().is_err());
        let p = PackageReference::parse("liba/1.0#rrev:pkgid").unwrap();
        assert!(p.package_path().is_err());
    }

    #[test]
    fn test_storage_paths() {
        let any = AnyReference::parse("liba/1.0").unwrap();
        assert_eq!(any.storage_path(), "_/liba/1.0");

        let any = AnyReference::parse("liba/1.0#rrev").unwrap();
        assert_eq!(any.storage_path(), "_/liba/1.0/_/rrev");

        let any = AnyReference::parse("liba/1.0#rrev:pid").unwrap();
        assert_eq!(any.storage_path(), "_/liba/1.0/_/rrev/package/pid");

        let any = AnyReference::parse("liba/1.0#rrev:pid#prev").unwrap();
        assert_eq!(any.storage_path(), "_/liba/1.0/_/rrev/package/pid/prev");
    }
}
