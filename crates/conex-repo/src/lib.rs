//! Conex Repository Access
//!
//! This crate talks to the servers conex works with:
//!
//! - **Artifactory**: storage, properties, builds, copies and release bundles
//! - **Promotion**: server-side copy of Conan package lists between repositories
//! - **Status Page**: incidents and maintenance windows
//! - **Profiles**: saved servers and remotes with their credentials
//!
//! ## Example
//!
//! ```rust,no_run
//! use conex_repo::{ArtifactoryClient, ConnectionArgs};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let args = ConnectionArgs {
//!     server: Some("main".to_string()),
//!     ..Default::default()
//! };
//! let client = ArtifactoryClient::new(&args.resolve()?)?;
//! let version = client.system_version().await?;
//! println!("Artifactory {}", version.version);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are NEVER sent after cross-origin redirects
//! - Profile files are written with mode 0600 on Unix

pub mod artifactory;
pub mod config;
pub mod credentials;
pub mod error;
pub mod promotion;
pub mod statuspage;

// Re-exports for convenience
pub use artifactory::{ArtifactoryClient, BuildDeletion, BuildPromotion, SystemVersion};
pub use config::{Connection, ConnectionArgs, Profile, ProfileKind, ProfileStore};
pub use credentials::{Body, Credentials, SecureHttpClient};
pub use error::{RepoError, Result};
pub use promotion::{PromotionEvent, PromotionSummary, promote_package_list, promote_path};
pub use statuspage::StatusPageClient;
