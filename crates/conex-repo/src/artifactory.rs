//! Artifactory REST client
//!
//! Thin wrapper over the endpoints the commands use. Every call goes through
//! [`SecureHttpClient`], so status mapping and redirect rules are shared.

use async_trait::async_trait;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use conex_core::assembler::ChecksumSource;
use conex_core::build_info::{BuildInfo, BundleManifest};
use conex_core::properties::{self, Properties};
use conex_core::{Checksums, CoreError};

use crate::config::Connection;
use crate::credentials::{Body, Credentials, SecureHttpClient};
use crate::error::{RepoError, Result};

/// Characters escaped in a single url path segment or query value
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

fn project_query(project: Option<&str>) -> String {
    project
        .map(|p| format!("?project={}", segment(p)))
        .unwrap_or_default()
}

fn flag(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// One entry of a `?list` storage response
#[derive(Debug, Clone, Deserialize)]
pub struct StorageFile {
    pub uri: String,
    #[serde(default)]
    pub folder: bool,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<StorageFile>,
}

#[derive(Debug, Deserialize)]
struct FolderInfo {
    #[serde(default)]
    children: Vec<StorageFile>,
}

#[derive(Debug, Deserialize)]
struct ItemInfo {
    checksums: Checksums,
}

#[derive(Debug, Default, Deserialize)]
struct ItemProperties {
    #[serde(default)]
    properties: Properties,
}

/// `api/system/version` response
#[derive(Debug, Clone, Deserialize)]
pub struct SystemVersion {
    pub version: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub license: String,
}

/// Body of `api/build/promote`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPromotion {
    pub source_repo: String,
    pub target_repo: String,
    /// Always `"true"`: a move could delete recipes other packages still use
    pub copy: String,
    pub dependencies: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl BuildPromotion {
    pub fn new(source: &str, target: &str, dependencies: bool, comment: Option<String>) -> Self {
        Self {
            source_repo: source.to_string(),
            target_repo: target.to_string(),
            copy: flag(true),
            dependencies: flag(dependencies),
            comment,
        }
    }
}

/// Body of `api/build/delete`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDeletion {
    pub build_name: String,
    pub build_numbers: Vec<String>,
    pub delete_artifacts: String,
    pub delete_all: String,
}

impl BuildDeletion {
    pub fn new(name: &str, numbers: Vec<String>, delete_artifacts: bool, delete_all: bool) -> Self {
        Self {
            build_name: name.to_string(),
            build_numbers: numbers,
            delete_artifacts: flag(delete_artifacts),
            delete_all: flag(delete_all),
        }
    }
}

#[derive(Serialize)]
struct PropsPatch<'a, T: Serialize> {
    props: &'a T,
}

/// Client for one Artifactory instance
pub struct ArtifactoryClient {
    base_url: String,
    http: SecureHttpClient,
}

impl ArtifactoryClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Self::with_credentials(&connection.url, connection.credentials.clone())
    }

    pub fn with_credentials(url: &str, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            http: SecureHttpClient::new(credentials)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str, body: Body) -> Result<String> {
        self.http.send(method, &self.endpoint(path), body, &[]).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let text = self.request(Method::GET, path, Body::Empty).await?;
        Ok(serde_json::from_str(&text)?)
    }

    // ============ Storage ============

    /// Checksums of a stored file, `None` when it does not exist
    pub async fn checksums(&self, path: &str) -> Result<Option<Checksums>> {
        match self.get_json::<ItemInfo>(&format!("api/storage/{}", path)).await {
            Ok(info) => Ok(Some(info.checksums)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a file or folder exists; only a 404 means absent
    pub async fn exists(&self, path: &str) -> Result<bool> {
        match self
            .request(Method::GET, &format!("api/storage/{}", path), Body::Empty)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Properties of an item; lookup failures read as no properties
    pub async fn properties(&self, path: &str) -> Properties {
        match self
            .get_json::<ItemProperties>(&format!("api/storage/{}?properties", path))
            .await
        {
            Ok(item) => item.properties,
            Err(e) => {
                tracing::debug!("no properties for {}: {}", path, e);
                Properties::new()
            }
        }
    }

    /// Replace the given keys of an item's properties
    ///
    /// `recursive` adds `recursiveProperties=0|1`; without it the server
    /// default applies.
    pub async fn patch_properties<T: Serialize>(
        &self,
        path: &str,
        props: &T,
        recursive: Option<bool>,
    ) -> Result<()> {
        let query = match recursive {
            Some(recursive) => format!("?&recursiveProperties={}", u8::from(recursive)),
            None => String::new(),
        };
        self.request(
            Method::PATCH,
            &format!("api/metadata/{}{}", path, query),
            Body::json(&PropsPatch { props })?,
        )
        .await?;
        Ok(())
    }

    /// Every file and folder below `path`, uris relative to it
    pub async fn list_files(&self, path: &str) -> Result<Vec<StorageFile>> {
        let list: FileList = self
            .get_json(&format!("api/storage/{}?list&deep=1&listFolders=1", path))
            .await?;
        Ok(list.files)
    }

    /// Names of the direct sub-folders of `repository/path`
    pub async fn list_folders(&self, repository: &str, path: &str) -> Result<Vec<String>> {
        let info: FolderInfo = self
            .get_json(&format!("api/storage/{}/{}", repository, path))
            .await?;
        Ok(info
            .children
            .into_iter()
            .filter(|c| c.folder)
            .map(|c| c.uri.trim_start_matches('/').to_string())
            .collect())
    }

    /// Server-side copy of `origin/path` to `destination/path`
    pub async fn copy(&self, origin: &str, destination: &str, path: &str) -> Result<String> {
        self.request(
            Method::POST,
            &format!(
                "api/copy/{}/{}?to=/{}/{}&suppressLayouts=0",
                origin, path, destination, path
            ),
            Body::Empty,
        )
        .await
    }

    // ============ Generic files ============

    /// Deploy `content` to `repository/path`
    pub async fn upload(&self, repository: &str, path: &str, content: Vec<u8>) -> Result<String> {
        self.request(
            Method::PUT,
            &format!("{}/{}", repository, path.trim_start_matches('/')),
            Body::Bytes(content),
        )
        .await
    }

    pub async fn read(&self, repository: &str, path: &str) -> Result<String> {
        self.request(
            Method::GET,
            &format!("{}/{}", repository, path.trim_start_matches('/')),
            Body::Empty,
        )
        .await
    }

    // ============ System ============

    pub async fn system_version(&self) -> Result<SystemVersion> {
        self.get_json("api/system/version").await
    }

    /// Exchange the current password for an encrypted one
    pub async fn encrypted_password(&self) -> Result<String> {
        self.request(Method::GET, "api/security/encryptedPassword", Body::Empty)
            .await
    }

    pub async fn ping(&self) -> Result<String> {
        self.request(Method::GET, "api/v1/system/ping", Body::Empty)
            .await
    }

    // ============ Builds ============

    pub async fn put_build(&self, build_info: &BuildInfo, project: Option<&str>) -> Result<String> {
        self.request(
            Method::PUT,
            &format!("api/build{}", project_query(project)),
            Body::json(build_info)?,
        )
        .await
    }

    /// Raw `api/build/<name>/<number>` response (`{"buildInfo": ..., "uri": ...}`)
    pub async fn get_build(&self, name: &str, number: &str, project: Option<&str>) -> Result<Value> {
        self.get_json(&format!(
            "api/build/{}/{}{}",
            segment(name),
            segment(number),
            project_query(project)
        ))
        .await
    }

    pub async fn get_build_info(
        &self,
        name: &str,
        number: &str,
        project: Option<&str>,
    ) -> Result<BuildInfo> {
        let mut response = self.get_build(name, number, project).await?;
        let build_info = response
            .get_mut("buildInfo")
            .map(Value::take)
            .ok_or_else(|| RepoError::BuildNotFound {
                name: name.to_string(),
                number: number.to_string(),
            })?;
        Ok(serde_json::from_value(build_info)?)
    }

    pub async fn promote_build(
        &self,
        name: &str,
        number: &str,
        promotion: &BuildPromotion,
        project: Option<&str>,
    ) -> Result<String> {
        self.request(
            Method::POST,
            &format!(
                "api/build/promote/{}/{}{}",
                segment(name),
                segment(number),
                project_query(project)
            ),
            Body::json(promotion)?,
        )
        .await
    }

    pub async fn delete_builds(&self, deletion: &BuildDeletion, project: Option<&str>) -> Result<String> {
        self.request(
            Method::POST,
            &format!("api/build/delete{}", project_query(project)),
            Body::json(deletion)?,
        )
        .await
    }

    /// Create a signed release bundle from an explicit file list
    pub async fn release_bundle(
        &self,
        name: &str,
        version: &str,
        sign_key: &str,
        manifest: &BundleManifest,
    ) -> Result<String> {
        let url = self.endpoint(&format!(
            "api/release_bundles/from_files/{}/{}",
            segment(name),
            segment(version)
        ));
        let body = Body::json(&serde_json::json!({ "payload": manifest }))?;
        self.http
            .send(
                Method::POST,
                &url,
                body,
                &[("X-JFrog-Crypto-Key-Name", sign_key.to_string())],
            )
            .await
    }

    // ============ Properties ============

    /// Append properties to every file and folder below `repository/root`
    ///
    /// Returns how many items were updated.
    pub async fn append_properties_recursive(
        &self,
        repository: &str,
        root: &str,
        additions: &[(String, String)],
    ) -> Result<usize> {
        let base = format!("{}/{}", repository, root.trim_end_matches('/'));
        let files = self.list_files(&base).await?;
        for file in &files {
            let path = format!("{}{}", base, file.uri);
            let mut props = self.properties(&path).await;
            properties::append_properties(
                &mut props,
                additions.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            );
            self.patch_properties(&path, &props, Some(false)).await?;
        }
        Ok(files.len())
    }

    /// Set properties on `repository/root`, one value per key
    pub async fn set_properties(
        &self,
        repository: &str,
        root: &str,
        values: &[(String, String)],
        recursive: bool,
    ) -> Result<()> {
        let props: IndexMap<&str, &str> =
            values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.patch_properties(&format!("{}/{}", repository, root), &props, Some(recursive))
            .await
    }

    /// Add `build.name`, `build.number` and `extra` to every module artifact
    ///
    /// Existing values are kept. Returns how many artifacts were tagged.
    pub async fn tag_build_artifacts(
        &self,
        build_info: &BuildInfo,
        extra: &[(String, String)],
    ) -> Result<usize> {
        let mut tagged = 0;
        for path in build_info.artifact_paths() {
            let mut props = self.properties(path).await;
            properties::tag_with_build(&mut props, &build_info.name, &build_info.number, extra);
            self.patch_properties(path, &props, None).await?;
            tagged += 1;
        }
        Ok(tagged)
    }
}

#[async_trait]
impl ChecksumSource for ArtifactoryClient {
    async fn checksums(&self, path: &str) -> conex_core::Result<Option<Checksums>> {
        ArtifactoryClient::checksums(self, path)
            .await
            .map_err(|e| CoreError::ChecksumLookup {
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ArtifactoryClient {
        ArtifactoryClient::with_credentials(
            &format!("{}/artifactory/", server.uri()),
            Some(Credentials::basic("admin", "secret")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_checksums() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/conan/_/zlib/1.3/_/r1/export/conanfile.py"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "repo": "conan",
                "checksums": {"sha1": "a", "md5": "b", "sha256": "c"}
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let sums = client
            .checksums("conan/_/zlib/1.3/_/r1/export/conanfile.py")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sums.sha256, "c");
        assert_eq!(sums.md5, "b");

        let missing = client
            .checksums("conan/_/zlib/1.3/_/r1/export/conan_sources.tgz")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_tag_build_artifacts_appends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/conan/zlib/conanfile.py"))
            .and(query_param("properties", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"build.name": ["old"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/metadata/conan/zlib/conanfile.py"))
            .and(body_json(serde_json::json!({
                "props": {"build.name": ["old", "ci"], "build.number": ["7"]}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let bi = BuildInfo::from_json(
            r#"{"version": "1.0.1", "name": "ci", "number": "7", "agent": {}, "started": "",
                "buildAgent": {"name": "conan", "version": "2"},
                "modules": [{"type": "conan", "id": "zlib/1.3", "artifacts": [
                    {"type": "py", "sha256": "s", "sha1": "s", "md5": "m",
                     "name": "conanfile.py", "path": "conan/zlib/conanfile.py"}]}]}"#,
        )
        .unwrap();

        let tagged = client(&server).tag_build_artifacts(&bi, &[]).await.unwrap();
        assert_eq!(tagged, 1);
    }

    #[tokio::test]
    async fn test_build_endpoints_carry_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/build/promote/my%20build/3"))
            .and(query_param("project", "proj"))
            .and(body_json(serde_json::json!({
                "sourceRepo": "dev", "targetRepo": "prod", "copy": "true",
                "dependencies": "false", "comment": "ok"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"messages\": []}"))
            .expect(1)
            .mount(&server)
            .await;

        let promotion = BuildPromotion::new("dev", "prod", false, Some("ok".to_string()));
        client(&server)
            .promote_build("my build", "3", &promotion, Some("proj"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_bundle_sends_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/release_bundles/from_files/bundle/1.0"))
            .and(header("X-JFrog-Crypto-Key-Name", "key"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .release_bundle("bundle", "1.0", "key", &BundleManifest::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_folders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/reports/12/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "children": [
                    {"uri": "/zlib", "folder": true},
                    {"uri": "/summary.json", "folder": false}
                ]
            })))
            .mount(&server)
            .await;

        let folders = client(&server).list_folders("reports", "12/3").await.unwrap();
        assert_eq!(folders, ["zlib"]);
    }

    #[tokio::test]
    async fn test_append_properties_recursive_merges_existing_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/conan/_/zlib/1.3"))
            .and(query_param("list", ""))
            .and(query_param("deep", "1"))
            .and(query_param("listFolders", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [
                    {"uri": "/_/r1", "folder": true},
                    {"uri": "/_/r1/export/conanfile.py", "folder": false, "size": 120}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/conan/_/zlib/1.3/_/r1/export/conanfile.py"))
            .and(query_param("properties", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {"team": ["core"]}
            })))
            .mount(&server)
            .await;
        // the folder has no properties yet: its lookup 404s
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/metadata/conan/_/zlib/1.3/_/r1/export/conanfile.py"))
            .and(query_param("recursiveProperties", "0"))
            .and(body_json(serde_json::json!({
                "props": {"team": ["core", "infra"], "stage": ["qa"]}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/metadata/conan/_/zlib/1.3/_/r1"))
            .and(query_param("recursiveProperties", "0"))
            .and(body_json(serde_json::json!({
                "props": {"team": ["infra"], "stage": ["qa"]}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let additions = vec![
            ("team".to_string(), "infra".to_string()),
            ("stage".to_string(), "qa".to_string()),
        ];
        let updated = client(&server)
            .append_properties_recursive("conan", "_/zlib/1.3/", &additions)
            .await
            .unwrap();
        assert_eq!(updated, 2);
    }

    #[tokio::test]
    async fn test_append_properties_recursive_fails_on_missing_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/conan/_/absent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client(&server)
            .append_properties_recursive("conan", "_/absent", &[("a".to_string(), "1".to_string())])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_properties_recursive_flag() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/metadata/conan/_/zlib/1.3"))
            .and(query_param("recursiveProperties", "1"))
            .and(body_json(serde_json::json!({"props": {"stage": "prod", "team": "core"}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/artifactory/api/metadata/conan/_/zlib/1.3"))
            .and(query_param("recursiveProperties", "0"))
            .and(body_json(serde_json::json!({"props": {"stage": "qa"}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client
            .set_properties(
                "conan",
                "_/zlib/1.3",
                &[
                    ("stage".to_string(), "prod".to_string()),
                    ("team".to_string(), "core".to_string()),
                ],
                true,
            )
            .await
            .unwrap();
        client
            .set_properties("conan", "_/zlib/1.3", &[("stage".to_string(), "qa".to_string())], false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_build_info_unwraps_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/build/app/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uri": "http://localhost/artifactory/api/build/app/4",
                "buildInfo": {
                    "version": "1.0.1", "name": "app", "number": "4",
                    "started": "2024-01-01T00:00:00.000+0000",
                    "buildAgent": {"name": "conan", "version": "2"},
                    "modules": [{"type": "conan", "id": "zlib/1.3", "artifacts": []}]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/build/app/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"uri": "x"})))
            .mount(&server)
            .await;

        let client = client(&server);
        let bi = client.get_build_info("app", "4", None).await.unwrap();
        assert_eq!(bi.name, "app");
        assert_eq!(bi.modules.len(), 1);
        assert_eq!(bi.agent, serde_json::json!({}));

        let err = client.get_build_info("app", "5", None).await.unwrap_err();
        assert!(matches!(err, RepoError::BuildNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_builds_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/build/delete"))
            .and(body_json(serde_json::json!({
                "buildName": "app", "buildNumbers": ["1", "2"],
                "deleteArtifacts": "true", "deleteAll": "false"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
            .expect(1)
            .mount(&server)
            .await;

        let deletion = BuildDeletion::new("app", vec!["1".to_string(), "2".to_string()], true, false);
        let response = client(&server).delete_builds(&deletion, None).await.unwrap();
        assert_eq!(response, "deleted");
    }

    #[tokio::test]
    async fn test_upload_and_read_generic_file() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/generic/reports/out.txt"))
            .and(wiremock::matchers::body_bytes(b"hello".to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_string("{\"size\": \"5\"}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/generic/reports/out.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = client(&server);
        client.upload("generic", "/reports/out.txt", b"hello".to_vec()).await.unwrap();
        assert_eq!(client.read("generic", "reports/out.txt").await.unwrap(), "hello");
    }
}
