//! Server-side promotion of package lists
//!
//! Folders are copied between repositories with `api/copy`, so nothing is
//! downloaded. Existing destinations are skipped: copying onto an existing
//! folder would nest the source inside it.

use conex_core::pkglist::{PackageList, PromotionItem};

use crate::artifactory::ArtifactoryClient;
use crate::error::{RepoError, Result};

/// License string of the edition that lacks the copy API
pub const COMMUNITY_EDITION: &str = "Artifactory Community Edition for C/C++";

/// Progress of a package-list promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionEvent {
    Promoting(String),
    Promoted(String),
    AlreadyExists(String),
    Note(String),
}

/// Outcome of one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOutcome {
    Promoted,
    Skipped,
}

/// Totals of a package-list promotion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionSummary {
    pub promoted: usize,
    pub skipped: usize,
}

/// Copy `origin/path` to `destination/path` unless the destination exists
pub async fn promote_path(
    client: &ArtifactoryClient,
    origin: &str,
    destination: &str,
    path: &str,
) -> Result<PathOutcome> {
    if client.exists(&format!("{}/{}", destination, path)).await? {
        tracing::debug!("{}/{} already exists, skipping", destination, path);
        return Ok(PathOutcome::Skipped);
    }
    client.copy(origin, destination, path).await?;
    Ok(PathOutcome::Promoted)
}

/// Fail on servers without the copy API
pub async fn ensure_copy_supported(client: &ArtifactoryClient) -> Result<()> {
    let version = client.system_version().await?;
    if version.license == COMMUNITY_EDITION {
        return Err(RepoError::UnsupportedEdition {
            license: version.license,
        });
    }
    Ok(())
}

/// Promote every folder of a package list from `origin` to `destination`
///
/// `remote` picks the list origin when the list holds several.
pub async fn promote_package_list<F>(
    client: &ArtifactoryClient,
    list: &PackageList,
    remote: Option<&str>,
    origin: &str,
    destination: &str,
    mut on_event: F,
) -> Result<PromotionSummary>
where
    F: FnMut(&PromotionEvent),
{
    let list_origin = list.select_origin(remote, origin)?;
    let plan = list.promotion_plan(list_origin)?;

    ensure_copy_supported(client).await?;

    let mut summary = PromotionSummary::default();
    for item in plan {
        match item {
            PromotionItem::Note(note) => on_event(&PromotionEvent::Note(note)),
            PromotionItem::Path(path) => {
                on_event(&PromotionEvent::Promoting(path.clone()));
                match promote_path(client, origin, destination, &path).await? {
                    PathOutcome::Promoted => {
                        summary.promoted += 1;
                        on_event(&PromotionEvent::Promoted(path));
                    }
                    PathOutcome::Skipped => {
                        summary.skipped += 1;
                        on_event(&PromotionEvent::AlreadyExists(path));
                    }
                }
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIST: &str = r#"{"conan-dev": {"zlib/1.3": {"revisions": {"r1": {
        "packages": {"p1": {"revisions": {"v1": {}}}}
    }}}}}"#;

    fn client(server: &MockServer) -> ArtifactoryClient {
        ArtifactoryClient::with_credentials(&server.uri(), Some(Credentials::basic("u", "p")))
            .unwrap()
    }

    async fn mount_version(server: &MockServer, license: &str) {
        Mock::given(method("GET"))
            .and(path("/api/system/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": "7.77.3", "revision": "77703900", "license": license
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_promote_package_list() {
        let server = MockServer::start().await;
        mount_version(&server, "Enterprise").await;

        // the export folder is already there
        Mock::given(method("GET"))
            .and(path("/api/storage/conan-prod/_/zlib/1.3/_/r1/export/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/storage/conan-prod/_/zlib/1.3/_/r1/package/p1/v1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/copy/conan-dev/_/zlib/1.3/_/r1/package/p1/v1"))
            .and(query_param("to", "/conan-prod/_/zlib/1.3/_/r1/package/p1/v1"))
            .and(query_param("suppressLayouts", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let list = PackageList::from_json(LIST).unwrap();
        let mut events = Vec::new();
        let summary = promote_package_list(
            &client(&server),
            &list,
            None,
            "conan-dev",
            "conan-prod",
            |e| events.push(e.clone()),
        )
        .await
        .unwrap();

        assert_eq!(summary, PromotionSummary { promoted: 1, skipped: 1 });
        assert!(events.contains(&PromotionEvent::AlreadyExists(
            "_/zlib/1.3/_/r1/export/".to_string()
        )));
    }

    #[tokio::test]
    async fn test_community_edition_is_refused() {
        let server = MockServer::start().await;
        mount_version(&server, COMMUNITY_EDITION).await;

        let list = PackageList::from_json(LIST).unwrap();
        let err = promote_package_list(&client(&server), &list, None, "a", "b", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UnsupportedEdition { .. }));
    }

    #[tokio::test]
    async fn test_only_not_found_means_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = promote_path(&client(&server), "a", "b", "x/y").await.unwrap_err();
        assert!(matches!(err, RepoError::UnexpectedResponse { status: 500, .. }));
    }
}
