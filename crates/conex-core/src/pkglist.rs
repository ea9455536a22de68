//! Conan package lists (`conan list --format json`)
//!
//! A list maps each origin (a remote name or `Local Cache`) to recipes, their
//! revisions, packages and package revisions. Promotion walks that tree and
//! turns it into Artifactory folder paths.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::reference::{PackageReference, RecipeReference};

/// Origin name Conan uses for the local cache
pub const LOCAL_CACHE: &str = "Local Cache";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeEntry {
    #[serde(default)]
    pub revisions: Option<IndexMap<String, RecipeRevision>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeRevision {
    #[serde(default)]
    pub packages: Option<IndexMap<String, PackageEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub revisions: Option<IndexMap<String, Value>>,
}

/// One step of a promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionItem {
    /// A folder to copy, relative to the repository root
    Path(String),
    /// Something in the list that was left out, for the user
    Note(String),
}

#[derive(Debug, Clone, Default)]
pub struct PackageList {
    origins: IndexMap<String, IndexMap<String, RecipeEntry>>,
}

impl PackageList {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: IndexMap<String, Value> = serde_json::from_str(content)?;
        let mut origins = IndexMap::new();
        for (origin, recipes) in raw {
            let Value::Object(map) = recipes else {
                return Err(CoreError::InvalidPackageList {
                    message: format!("origin '{}' is not an object", origin),
                });
            };
            let mut entries = IndexMap::new();
            for (name_version, entry) in map {
                // Conan records lookup failures as {"error": "..."} next to recipes
                if name_version == "error" {
                    continue;
                }
                entries.insert(name_version, serde_json::from_value(entry)?);
            }
            origins.insert(origin, entries);
        }
        Ok(Self { origins })
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.origins.keys().map(String::as_str)
    }

    /// Pick the origin the promotion reads from
    ///
    /// Several origins need `remote` to disambiguate, and the local cache is
    /// never a valid origin.
    pub fn select_origin(&self, remote: Option<&str>, repository: &str) -> Result<&str> {
        let origin = match remote {
            Some(remote) => self
                .origins
                .get_key_value(remote)
                .map(|(k, _)| k.as_str())
                .ok_or_else(|| CoreError::InvalidPackageList {
                    message: format!("Remote {} not found in the package list", remote),
                })?,
            None => {
                if self.origins.len() > 1 {
                    return Err(CoreError::InvalidPackageList {
                        message: format!(
                            "Expected every package to come from the same origin repository in {}, use --remote to disambiguate",
                            repository
                        ),
                    });
                }
                self.origins
                    .keys()
                    .next()
                    .map(String::as_str)
                    .ok_or_else(|| CoreError::InvalidPackageList {
                        message: "the package list is empty".to_string(),
                    })?
            }
        };

        if origin == LOCAL_CACHE {
            return Err(CoreError::InvalidPackageList {
                message: format!(
                    "Package list must come from the remote associated with {}, but found from local cache",
                    repository
                ),
            });
        }
        Ok(origin)
    }

    /// Folders to promote for `origin`, in list order
    ///
    /// Each recipe revision contributes its `export/` folder followed by its
    /// package folders; a package without listed revisions is promoted as a
    /// whole.
    pub fn promotion_plan(&self, origin: &str) -> Result<Vec<PromotionItem>> {
        let recipes = self
            .origins
            .get(origin)
            .ok_or_else(|| CoreError::InvalidPackageList {
                message: format!("Remote {} not found in the package list", origin),
            })?;

        let mut plan = Vec::new();
        for (name_version, recipe) in recipes {
            let Some(revisions) = &recipe.revisions else {
                plan.push(PromotionItem::Note(format!(
                    "Recipe {} does not have a revision, skipping",
                    name_version
                )));
                continue;
            };

            for (rrev, recipe_revision) in revisions {
                let reference = RecipeReference::parse(&format!("{}#{}", name_version, rrev))?;
                plan.push(PromotionItem::Path(format!("{}/", reference.export_path()?)));

                let Some(packages) = &recipe_revision.packages else {
                    plan.push(PromotionItem::Note(format!(
                        "Recipe {} does not have any package, skipping",
                        reference
                    )));
                    continue;
                };

                for (package_id, package) in packages {
                    match &package.revisions {
                        None => {
                            let pref = PackageReference::new(reference.clone(), package_id, None);
                            plan.push(PromotionItem::Path(pref.storage_path()));
                            plan.push(PromotionItem::Note(format!(
                                "Package {} does not have explicit revisions, promoting all of them",
                                pref
                            )));
                        }
                        Some(package_revisions) => {
                            for prev in package_revisions.keys() {
                                let pref = PackageReference::new(
                                    reference.clone(),
                                    package_id,
                                    Some(prev.clone()),
                                );
                                plan.push(PromotionItem::Path(pref.package_path()?));
                            }
                        }
                    }
                }
            }
        }
        Ok(plan)
    }
}
