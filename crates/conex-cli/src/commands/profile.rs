//! Server and remote commands - saved Artifactory profiles
//!
//! Servers are used by `--server`; remotes hold credentials for Conan
//! remotes backed by Artifactory. Only servers accept an access token and
//! are verified with a ping.

use conex_repo::{ArtifactoryClient, Credentials, Profile, ProfileKind, ProfileStore};
use serde::Serialize;

use super::OutputFormat;
use crate::error::Result;
use crate::output;

const MASK: &str = "*******";

/// Values given to `add`
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

fn plural(kind: ProfileKind) -> &'static str {
    match kind {
        ProfileKind::Server => "servers",
        ProfileKind::Remote => "remotes",
    }
}

/// Save a profile, storing an encrypted password unless a token is given
pub async fn add(kind: ProfileKind, new: NewProfile) -> Result<()> {
    let name = new.name.trim().to_string();
    let url = new.url.trim_end_matches('/').to_string();

    let mut store = ProfileStore::load(kind)?;
    store.ensure_absent(&name)?;

    let user = match new.user {
        Some(user) => user.trim().to_string(),
        None => output::prompt("User")?,
    };
    let token = new.token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let secret = match token {
        Some(token) => token,
        None => {
            let password = match new.password {
                Some(password) => password.trim().to_string(),
                None => output::prompt_password()?,
            };
            let client =
                ArtifactoryClient::with_credentials(&url, Some(Credentials::basic(&user, &password)))?;
            client.encrypted_password().await?
        }
    };

    if kind == ProfileKind::Server {
        let client =
            ArtifactoryClient::with_credentials(&url, Some(Credentials::basic(&user, &secret)))?;
        client.ping().await?;
    }

    store.add(Profile {
        name: name.clone(),
        url: url.clone(),
        user,
        password: secret,
    })?;
    store.save()?;
    output::success(format!("{} '{}' ({}) added successfully", kind.label(), name, url));
    Ok(())
}

pub fn remove(kind: ProfileKind, name: &str) -> Result<()> {
    let name = name.trim();
    let mut store = ProfileStore::load(kind)?;
    let removed = store.remove(name)?;
    store.save()?;
    output::success(format!(
        "{} '{}' ({}) removed successfully",
        kind.label(),
        name,
        removed.url
    ));
    Ok(())
}

#[derive(Serialize)]
struct ListedProfile<'a> {
    name: &'a str,
    url: &'a str,
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// Profiles as listed in JSON
///
/// Server passwords are left out and remote passwords masked.
fn listing(kind: ProfileKind, profiles: &[Profile]) -> serde_json::Value {
    let listed: Vec<ListedProfile<'_>> = profiles
        .iter()
        .map(|p| ListedProfile {
            name: &p.name,
            url: &p.url,
            user: &p.user,
            password: (kind == ProfileKind::Remote).then_some(MASK),
        })
        .collect();
    let mut document = serde_json::Map::new();
    document.insert(plural(kind).to_string(), serde_json::json!(listed));
    serde_json::Value::Object(document)
}

fn render_text(kind: ProfileKind, profiles: &[Profile]) -> String {
    if profiles.is_empty() {
        return format!(
            "No {} configured. Use `conex {} add` command to add one.",
            plural(kind),
            kind.command()
        );
    }
    profiles
        .iter()
        .map(|p| {
            format!(
                "{}:\n  url: {}\n  user: {}\n  password: {}",
                p.name, p.url, p.user, MASK
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn list(kind: ProfileKind, format: OutputFormat) -> Result<()> {
    let store = ProfileStore::load(kind)?;
    match format {
        OutputFormat::Text => println!("{}", render_text(kind, store.profiles())),
        OutputFormat::Json => output::print_json(&listing(kind, store.profiles()))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles() -> Vec<Profile> {
        vec![Profile {
            name: "prod".to_string(),
            url: "https://prod.example.com/artifactory".to_string(),
            user: "ci".to_string(),
            password: "secret".to_string(),
        }]
    }

    #[test]
    fn test_text_listing_masks_password() {
        insta::assert_snapshot!(render_text(ProfileKind::Server, &profiles()), @r"
        prod:
          url: https://prod.example.com/artifactory
          user: ci
          password: *******
        ");
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(
            render_text(ProfileKind::Remote, &[]),
            "No remotes configured. Use `conex remote add` command to add one."
        );
    }

    #[test]
    fn test_json_listing() {
        let servers = listing(ProfileKind::Server, &profiles());
        assert!(servers["servers"][0].get("password").is_none());

        let remotes = listing(ProfileKind::Remote, &profiles());
        assert_eq!(remotes["remotes"][0]["password"], "*******");
        assert_eq!(remotes["remotes"][0]["user"], "ci");
    }
}
