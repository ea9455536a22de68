//! Saved Artifactory profiles and connection resolution
//!
//! Profiles live in `$CONEX_HOME` (default `~/.config/conex`): servers in
//! `.art-servers`, remotes in `art-remote.conf`. Each file holds the base64 of
//! a JSON object `{"servers": [...]}` / `{"remotes": [...]}`.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::Credentials;
use crate::error::{RepoError, Result};

/// Environment variable overriding the configuration home
pub const HOME_ENV: &str = "CONEX_HOME";

/// The two kinds of saved profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Server,
    Remote,
}

impl ProfileKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ProfileKind::Server => ".art-servers",
            ProfileKind::Remote => "art-remote.conf",
        }
    }

    fn json_key(self) -> &'static str {
        match self {
            ProfileKind::Server => "servers",
            ProfileKind::Remote => "remotes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProfileKind::Server => "Server",
            ProfileKind::Remote => "Remote",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            ProfileKind::Server => "server",
            ProfileKind::Remote => "remote",
        }
    }
}

/// A saved Artifactory endpoint and its credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub url: String,
    pub user: String,
    /// Encrypted password or access token
    pub password: String,
}

impl Profile {
    pub fn credentials(&self) -> Credentials {
        Credentials::basic(&self.user, &self.password)
    }
}

/// Get the configuration home
pub fn config_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
        message: "Could not determine config directory".to_string(),
    })?;
    Ok(config_dir.join("conex"))
}

/// Profiles of one kind, in the order they were added
#[derive(Debug, Clone)]
pub struct ProfileStore {
    kind: ProfileKind,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    pub fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            profiles: Vec::new(),
        }
    }

    /// Load profiles from the default location
    pub fn load(kind: ProfileKind) -> Result<Self> {
        let path = Self::default_path(kind)?;
        Self::load_from(kind, &path)
    }

    /// Load from a specific path; a missing file is an empty store
    pub fn load_from(kind: ProfileKind, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(kind));
        }
        let encoded = std::fs::read_to_string(path)?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        let mut document: Value = serde_json::from_slice(&decoded)?;
        let profiles = match document.get_mut(kind.json_key()) {
            Some(list) => serde_json::from_value(list.take())?,
            None => Vec::new(),
        };
        Ok(Self { kind, profiles })
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path(self.kind)?;
        self.save_to(&path)
    }

    /// Save to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut document = serde_json::Map::new();
        document.insert(
            self.kind.json_key().to_string(),
            serde_json::to_value(&self.profiles)?,
        );
        let content =
            base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&document)?);

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true).mode(0o600);
            std::io::Write::write_all(&mut options.open(path)?, content.as_bytes())?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            std::fs::write(path, content)?;
            Ok(())
        }
    }

    /// Get the default file of a profile kind
    pub fn default_path(kind: ProfileKind) -> Result<PathBuf> {
        Ok(config_home()?.join(kind.file_name()))
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Add a profile; names are unique
    pub fn add(&mut self, profile: Profile) -> Result<()> {
        self.ensure_absent(&profile.name)?;
        self.profiles.push(profile);
        Ok(())
    }

    /// Fail if a profile called `name` exists
    pub fn ensure_absent(&self, name: &str) -> Result<()> {
        match self.profiles.iter().find(|p| p.name == name) {
            Some(existing) => Err(RepoError::ProfileAlreadyExists {
                label: self.kind.label(),
                command: self.kind.command(),
                name: name.to_string(),
                url: existing.url.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Remove a profile by name
    pub fn remove(&mut self, name: &str) -> Result<Profile> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RepoError::ProfileNotFound {
                label: self.kind.label(),
                name: name.to_string(),
            })?;
        Ok(self.profiles.remove(idx))
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RepoError::ProfileNotConfigured {
                command: self.kind.command(),
                name: name.to_string(),
            })
    }
}

/// Connection flags shared by every command that talks to Artifactory
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub server: Option<String>,
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Artifactory base url, like `https://<address>/artifactory`
    pub url: String,
    /// `None` for anonymous reads
    pub credentials: Option<Credentials>,
}

fn invalid(message: &str) -> RepoError {
    RepoError::InvalidConnection {
        message: message.to_string(),
    }
}

impl ConnectionArgs {
    pub fn is_empty(&self) -> bool {
        self.server.is_none() && self.url.is_none()
    }

    /// Check the flag combination
    pub fn validate(&self) -> Result<()> {
        match (&self.server, &self.url) {
            (Some(_), Some(_)) => Err(invalid(
                "--server and --url (with --user & --password/--token)) flags cannot be used together.",
            )),
            (None, None) => Err(invalid(
                "Specify --server or --url (with --user & --password/--token) flags to contact Artifactory.",
            )),
            (None, Some(_)) => {
                if self.user.is_none() || (self.password.is_none() && self.token.is_none()) {
                    return Err(invalid(
                        "Specify --user and --password/--token to use with the --url flag to contact Artifactory.",
                    ));
                }
                if self.password.is_some() && self.token.is_some() {
                    return Err(invalid(
                        "--password and --token arguments cannot be used at the same time. Please specify either --password OR --token.",
                    ));
                }
                Ok(())
            }
            (Some(_), None) => Ok(()),
        }
    }

    /// Resolve against the saved servers
    pub fn resolve_with(&self, servers: &ProfileStore) -> Result<Connection> {
        self.validate()?;
        if let Some(name) = &self.server {
            let profile = servers.get(name.trim())?;
            return Ok(Connection {
                url: profile.url.trim_end_matches('/').to_string(),
                credentials: Some(profile.credentials()),
            });
        }

        let url = self.url.as_deref().unwrap_or_default();
        let user = self.user.as_deref().unwrap_or_default();
        let secret = self
            .password
            .as_deref()
            .or(self.token.as_deref())
            .unwrap_or_default();
        Ok(Connection {
            url: url.trim_end_matches('/').to_string(),
            credentials: Some(Credentials::basic(user, secret)),
        })
    }

    /// Like [`resolve_with`](Self::resolve_with), but a bare `--url` with no
    /// user, password or token reads anonymously
    pub fn resolve_anonymous_with(&self, servers: &ProfileStore) -> Result<Connection> {
        let bare_url = self.server.is_none()
            && self.user.is_none()
            && self.password.is_none()
            && self.token.is_none();
        match &self.url {
            Some(url) if bare_url => Ok(Connection {
                url: url.trim_end_matches('/').to_string(),
                credentials: None,
            }),
            _ => self.resolve_with(servers),
        }
    }

    /// Resolve, reading saved servers only when `--server` is used
    pub fn resolve(&self) -> Result<Connection> {
        self.resolve_with(&self.saved_servers()?)
    }

    /// Resolve for read-only commands, see [`resolve_anonymous_with`](Self::resolve_anonymous_with)
    pub fn resolve_anonymous(&self) -> Result<Connection> {
        self.resolve_anonymous_with(&self.saved_servers()?)
    }

    fn saved_servers(&self) -> Result<ProfileStore> {
        match &self.server {
            Some(_) => ProfileStore::load(ProfileKind::Server),
            None => Ok(ProfileStore::new(ProfileKind::Server)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            url: format!("https://{}.example.com/artifactory", name),
            user: "admin".to_string(),
            password: "AKCp8".to_string(),
        }
    }

    #[test]
    fn test_store_add_remove() {
        let mut store = ProfileStore::new(ProfileKind::Server);
        store.add(profile("main")).unwrap();

        let err = store.add(profile("main")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server 'main' (https://main.example.com/artifactory) already exist. You can remove it using `conex server remove main`"
        );

        assert_eq!(store.remove("main").unwrap().name, "main");
        assert_eq!(
            store.remove("main").unwrap_err().to_string(),
            "Server 'main' does not exist."
        );
        assert_eq!(
            store.get("main").unwrap_err().to_string(),
            "The server specified (main) is not configured. Use `conex server add main` to configure it."
        );
    }

    #[test]
    fn test_store_roundtrip_is_base64_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ProfileKind::Remote.file_name());

        let mut store = ProfileStore::new(ProfileKind::Remote);
        store.add(profile("mirror")).unwrap();
        store.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(raw).unwrap();
        let json: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["remotes"][0]["name"], "mirror");

        let loaded = ProfileStore::load_from(ProfileKind::Remote, &path).unwrap();
        assert_eq!(loaded.profiles(), store.profiles());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::load_from(ProfileKind::Server, &dir.path().join("none")).unwrap();
        assert!(store.profiles().is_empty());
    }

    #[test]
    fn test_connection_validation() {
        let both = ConnectionArgs {
            server: Some("s".into()),
            url: Some("u".into()),
            ..Default::default()
        };
        assert!(both.validate().unwrap_err().to_string().contains("cannot be used together"));

        assert!(ConnectionArgs::default()
            .validate()
            .unwrap_err()
            .to_string()
            .starts_with("Specify --server or --url"));

        let no_secret = ConnectionArgs {
            url: Some("u".into()),
            user: Some("me".into()),
            ..Default::default()
        };
        assert!(no_secret.validate().unwrap_err().to_string().starts_with("Specify --user"));

        let both_secrets = ConnectionArgs {
            url: Some("u".into()),
            user: Some("me".into()),
            password: Some("p".into()),
            token: Some("t".into()),
            ..Default::default()
        };
        assert!(both_secrets
            .validate()
            .unwrap_err()
            .to_string()
            .contains("cannot be used at the same time"));
    }

    #[test]
    fn test_connection_resolution() {
        let mut servers = ProfileStore::new(ProfileKind::Server);
        servers.add(profile("main")).unwrap();

        let by_name = ConnectionArgs {
            server: Some(" main ".into()),
            ..Default::default()
        };
        let conn = by_name.resolve_with(&servers).unwrap();
        assert_eq!(conn.url, "https://main.example.com/artifactory");
        assert_eq!(conn.credentials, Some(Credentials::basic("admin", "AKCp8")));

        let by_url = ConnectionArgs {
            url: Some("https://art.local/artifactory/".into()),
            user: Some("ci".into()),
            token: Some("tok".into()),
            ..Default::default()
        };
        let conn = by_url.resolve_with(&servers).unwrap();
        assert_eq!(conn.url, "https://art.local/artifactory");
        assert_eq!(conn.credentials, Some(Credentials::basic("ci", "tok")));
    }

    #[test]
    fn test_bare_url_reads_anonymously() {
        let servers = ProfileStore::new(ProfileKind::Server);
        let bare = ConnectionArgs {
            url: Some("https://art.local/artifactory/".into()),
            ..Default::default()
        };
        assert!(bare.resolve_with(&servers).unwrap_err().to_string().starts_with("Specify --user"));

        let conn = bare.resolve_anonymous_with(&servers).unwrap();
        assert_eq!(conn.url, "https://art.local/artifactory");
        assert_eq!(conn.credentials, None);

        // a partial set of credentials is still an error
        let partial = ConnectionArgs {
            url: Some("https://art.local/artifactory".into()),
            user: Some("ci".into()),
            ..Default::default()
        };
        assert!(partial.resolve_anonymous_with(&servers).is_err());

        let both = ConnectionArgs {
            server: Some("main".into()),
            url: Some("https://art.local/artifactory".into()),
            ..Default::default()
        };
        assert!(both
            .resolve_anonymous_with(&servers)
            .unwrap_err()
            .to_string()
            .contains("cannot be used together"));
    }
}
