use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::models::AccessToken;
use crate::config::GitHubConfig;
use crate::error::AppError;
use crate::http_client::{build_client, is_rate_limited, status_error, transport_error};
use crate::store::{ChangeSet, ContentLayout, ContentStore, Contents, Entry, Listing};

const HEAD_QUERY: &str = "query BranchHead($owner: String!, $name: String!, $qualifiedName: String!) {
  repository(owner: $owner, name: $name) {
    ref(qualifiedName: $qualifiedName) { target { oid } }
  }
}";

const COMMIT_MUTATION: &str = "mutation CommitChanges($input: CreateCommitOnBranchInput!) {
  createCommitOnBranch(input: $input) { commit { oid } }
}";

/// Content store backed by a GitHub repository through the GraphQL API.
///
/// Every change set becomes exactly one commit on the configured branch.
#[derive(Clone)]
pub struct GitHubStore {
    http: reqwest::Client,
    endpoint: String,
    owner: String,
    repo: String,
    branch: String,
    token: Option<AccessToken>,
    layout: ContentLayout,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<R> {
    repository: Option<R>,
}

/// Answer to a directory query: the branch head, the tree, and one
/// `f{i}` alias per file whose text was asked for.
#[derive(Debug, Deserialize)]
struct DirectoryRepository {
    #[serde(rename = "ref")]
    git_ref: Option<RefTarget>,
    object: Option<TreeObject>,
    #[serde(flatten)]
    blobs: HashMap<String, Option<BlobText>>,
}

#[derive(Debug, Deserialize)]
struct TreeObject {
    entries: Option<Vec<TreeEntry>>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    object: Option<BlobText>,
}

#[derive(Debug, Deserialize)]
struct BlobText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefRepository {
    #[serde(rename = "ref")]
    git_ref: Option<RefTarget>,
}

#[derive(Debug, Deserialize)]
struct RefTarget {
    target: Oid,
}

#[derive(Debug, Deserialize)]
struct Oid {
    oid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitData {
    create_commit_on_branch: Option<CommitPayload>,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    commit: Option<Oid>,
}

impl GitHubStore {
    pub fn new(config: &GitHubConfig, layout: ContentLayout) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            endpoint: config.graphql_url.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.as_deref().map(AccessToken::new),
            layout,
        })
    }

    fn token(&self) -> Result<&AccessToken, AppError> {
        self.token
            .as_ref()
            .ok_or_else(|| AppError::Auth("No GitHub token available for this request".into()))
    }

    fn expression(&self, path: &str) -> String {
        format!("{}:{path}", self.branch)
    }

    fn qualified_branch(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    /// Run one GraphQL request. HTTP-level failures are classified here;
    /// GraphQL `errors` are left to the caller.
    async fn graphql<T: DeserializeOwned>(
        &self,
        context: &str,
        query: &str,
        variables: Value,
    ) -> Result<GraphQlResponse<T>, AppError> {
        let token = self.token()?;
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.secret())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(context, status, is_rate_limited(response.headers())));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("{context}: malformed response: {e}")))
    }

    /// Data of a read query. A missing repository or path reads as `None`.
    fn read_data<T>(context: &str, response: GraphQlResponse<T>) -> Result<Option<T>, AppError> {
        if response.errors.is_empty() || response.errors.iter().all(is_not_found) {
            return Ok(response.data);
        }
        Err(classify(context, &response.errors))
    }

    async fn head_oid(&self) -> Result<String, AppError> {
        let context = "Reading branch head";
        let response: GraphQlResponse<RepositoryData<RefRepository>> = self
            .graphql(
                context,
                HEAD_QUERY,
                json!({
                    "owner": self.owner,
                    "name": self.repo,
                    "qualifiedName": self.qualified_branch(),
                }),
            )
            .await?;

        let repository = Self::read_data(context, response)?
            .and_then(|d| d.repository)
            .ok_or_else(|| AppError::NotFound(format!("Repository {}/{}", self.owner, self.repo)))?;
        repository
            .git_ref
            .map(|r| r.target.oid)
            .ok_or_else(|| AppError::NotFound(format!("Branch '{}'", self.branch)))
    }
}

fn is_not_found(error: &GraphQlError) -> bool {
    error.kind.as_deref() == Some("NOT_FOUND")
}

/// Map GraphQL `errors` onto the error taxonomy. Only the first error decides.
fn classify(context: &str, errors: &[GraphQlError]) -> AppError {
    let Some(error) = errors.first() else {
        return AppError::Upstream(format!("{context}: empty error response"));
    };
    let message = format!("{context}: {}", error.message);
    match error.kind.as_deref() {
        Some("FORBIDDEN") => AppError::Permission(message),
        Some("NOT_FOUND") => AppError::NotFound(message),
        Some("RATE_LIMITED") => AppError::Transient(message),
        _ if error.message.contains("Expected branch to point to") => AppError::Transient(format!(
            "{context}: the branch moved since it was read, try saving again"
        )),
        _ => AppError::Upstream(message),
    }
}

#[async_trait]
impl ContentStore for GitHubStore {
    fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    fn with_credentials(&self, token: &AccessToken) -> Arc<dyn ContentStore> {
        Arc::new(Self {
            token: Some(token.clone()),
            ..self.clone()
        })
    }

    /// The tree, the requested blobs and the branch head come back from a
    /// single query, one alias per named file.
    async fn list_entries(
        &self,
        dir: &str,
        contents: Contents<'_>,
    ) -> Result<Option<Listing>, AppError> {
        let context = "Listing repository directory";

        let mut variables = serde_json::Map::new();
        variables.insert("owner".into(), json!(self.owner));
        variables.insert("name".into(), json!(self.repo));
        variables.insert("expression".into(), json!(self.expression(dir)));
        variables.insert("qualifiedName".into(), json!(self.qualified_branch()));

        let mut params = String::new();
        let mut fields = String::new();
        let named: &[String] = match contents {
            Contents::Only(names) => names,
            Contents::Names | Contents::All => &[],
        };
        for (i, name) in named.iter().enumerate() {
            params.push_str(&format!(", $e{i}: String!"));
            fields.push_str(&format!(
                "    f{i}: object(expression: $e{i}) {{ ... on Blob {{ text }} }}\n"
            ));
            variables.insert(
                format!("e{i}"),
                json!(self.expression(&format!("{dir}/{name}"))),
            );
        }
        let entry_fields = match contents {
            Contents::All => "name type object { ... on Blob { text } }",
            Contents::Names | Contents::Only(_) => "name type",
        };
        let query = format!(
            "query Directory($owner: String!, $name: String!, $expression: String!, $qualifiedName: String!{params}) {{\n  repository(owner: $owner, name: $name) {{\n    ref(qualifiedName: $qualifiedName) {{ target {{ oid }} }}\n    object(expression: $expression) {{ ... on Tree {{ entries {{ {entry_fields} }} }} }}\n{fields}  }}\n}}"
        );

        let response: GraphQlResponse<RepositoryData<DirectoryRepository>> = self
            .graphql(context, &query, Value::Object(variables))
            .await?;
        let Some(mut repository) = Self::read_data(context, response)?.and_then(|d| d.repository)
        else {
            return Ok(None);
        };
        let Some(tree) = repository.object.and_then(|o| o.entries) else {
            return Ok(None);
        };

        let mut texts: HashMap<&str, String> = named
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                let text = repository.blobs.remove(&format!("f{i}")).flatten()?.text?;
                Some((name.as_str(), text))
            })
            .collect();

        let entries = tree
            .into_iter()
            .filter_map(|e| match e.kind.as_str() {
                "tree" => Some(Entry::dir(e.name)),
                "blob" => {
                    let text = match contents {
                        Contents::All => e.object.and_then(|o| o.text),
                        Contents::Only(_) => texts.remove(e.name.as_str()),
                        Contents::Names => None,
                    };
                    Some(Entry::file(e.name, text))
                }
                // Submodules.
                _ => None,
            })
            .collect();

        Ok(Some(Listing {
            entries,
            revision: repository.git_ref.map(|r| r.target.oid),
        }))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError> {
        if changes.is_empty() {
            return Ok(());
        }
        let context = "Committing changes";
        let head = match &changes.revision {
            Some(revision) => revision.clone(),
            None => self.head_oid().await?,
        };

        let additions: Vec<Value> = changes
            .additions
            .iter()
            .map(|a| json!({ "path": a.path, "contents": BASE64.encode(&a.contents) }))
            .collect();
        let deletions: Vec<Value> = changes
            .deletions
            .iter()
            .map(|path| json!({ "path": path }))
            .collect();

        let input = json!({
            "branch": {
                "repositoryNameWithOwner": format!("{}/{}", self.owner, self.repo),
                "branchName": self.branch,
            },
            "message": { "headline": changes.message },
            "expectedHeadOid": head,
            "fileChanges": { "additions": additions, "deletions": deletions },
        });

        let response: GraphQlResponse<CommitData> = self
            .graphql(context, COMMIT_MUTATION, json!({ "input": input }))
            .await?;
        if !response.errors.is_empty() {
            return Err(classify(context, &response.errors));
        }

        let oid = response
            .data
            .and_then(|d| d.create_commit_on_branch)
            .and_then(|p| p.commit)
            .map(|c| c.oid)
            .ok_or_else(|| AppError::Upstream(format!("{context}: no commit returned")))?;
        tracing::info!(
            commit = %oid,
            branch = %self.branch,
            message = %changes.message,
            files = changes.additions.len() + changes.deletions.len(),
            "Committed change set"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::models::FrontMatter;
    use crate::resolver::ContentResolver;
    use crate::store::document_file_names;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

    fn config(server: &MockServer, token: Option<&str>) -> GitHubConfig {
        GitHubConfig {
            client_id: "client-123".into(),
            client_secret: "secret-456".into(),
            redirect_uri: None,
            owner: "acme".into(),
            repo: "site".into(),
            branch: "main".into(),
            token: token.map(str::to_string),
            oauth_url: server.uri(),
            api_url: server.uri(),
            graphql_url: format!("{}/graphql", server.uri()),
        }
    }

    fn store(server: &MockServer) -> GitHubStore {
        GitHubStore::new(
            &config(server, Some("service-token")),
            ContentLayout::new("outstatic/content", "public/images", "/images"),
        )
        .unwrap()
    }

    fn graphql_mock(marker: &str) -> MockBuilder {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains(marker))
    }

    fn ok(body: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn directory(entries: Value, extra: Value) -> Value {
        let mut repository = json!({
            "ref": { "target": { "oid": "head-oid-1" } },
            "object": { "entries": entries }
        });
        if let (Some(repo), Some(extra)) = (repository.as_object_mut(), extra.as_object()) {
            repo.extend(extra.clone());
        }
        json!({ "data": { "repository": repository } })
    }

    #[tokio::test]
    async fn test_list_read_is_one_request_with_schema_and_texts() {
        let server = MockServer::start().await;
        graphql_mock("query Directory")
            .and(header("authorization", "Bearer service-token"))
            .and(body_string_contains("object { ... on Blob { text } }"))
            .respond_with(ok(directory(
                json!([
                    { "name": "schema.json", "type": "blob",
                      "object": { "text": "{\"name\": \"posts\", \"sort\": \"titleAsc\"}" } },
                    { "name": "b.md", "type": "blob",
                      "object": { "text": "---\ntitle: Beta\nstatus: published\n---\n\nHi" } },
                    { "name": "a.MDX", "type": "blob",
                      "object": { "text": "---\ntitle: Alpha\nstatus: published\n---\n" } },
                    { "name": "cover.png", "type": "blob", "object": { "text": null } },
                    { "name": "drafts", "type": "tree", "object": {} }
                ]),
                json!({}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = ContentResolver::new(Arc::new(store(&server)));
        let docs = resolver.get_documents("posts").await.unwrap();
        let slugs: Vec<_> = docs.iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);
        assert_eq!(docs[0].front_matter.title, "Alpha");
    }

    #[tokio::test]
    async fn test_document_read_is_one_request() {
        let server = MockServer::start().await;
        graphql_mock("query Directory")
            .and(body_string_contains("f0: object"))
            .and(body_string_contains("main:outstatic/content/pages/schema.json"))
            .and(body_string_contains("main:outstatic/content/pages/intro.mDx"))
            .respond_with(ok(directory(
                json!([
                    { "name": "intro.mDx", "type": "blob" },
                    { "name": "other.md", "type": "blob" }
                ]),
                json!({ "f0": null, "f7": { "text": "---\ntitle: Intro\nstatus: published\n---\n\n<Hero />" } }),
            )))
            .expect(1)
            .mount(&server)
            .await;

        // f0 is schema.json, f1.. follow document_file_names order.
        assert_eq!(document_file_names("intro")[6], "intro.mDx");

        let resolver = ContentResolver::new(Arc::new(store(&server)));
        let doc = resolver.get_document("pages", "intro").await.unwrap().unwrap();
        assert_eq!(doc.format.extension(), "mdx");
        assert_eq!(doc.body, "<Hero />");
    }

    #[tokio::test]
    async fn test_missing_repository_reads_as_absent() {
        let server = MockServer::start().await;
        graphql_mock("query Directory")
            .respond_with(ok(json!({
                "data": { "repository": null },
                "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a Repository" }]
            })))
            .mount(&server)
            .await;

        let snapshot = store(&server)
            .open_collection("posts", Contents::All)
            .await
            .unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_write_document_commits_against_listed_head() {
        let server = MockServer::start().await;
        graphql_mock("query Directory")
            .respond_with(ok(directory(json!([]), json!({ "f0": null }))))
            .expect(1)
            .mount(&server)
            .await;
        graphql_mock("query BranchHead")
            .respond_with(ok(json!({ "data": { "repository": { "ref": { "target": { "oid": "other" } } } } })))
            .expect(0)
            .mount(&server)
            .await;
        graphql_mock("createCommitOnBranch")
            .and(body_string_contains(r#""expectedHeadOid":"head-oid-1""#))
            .and(body_string_contains("outstatic/content/posts/hello-world.md"))
            .and(body_string_contains(r#""repositoryNameWithOwner":"acme/site""#))
            .respond_with(ok(json!({ "data": { "createCommitOnBranch": { "commit": { "oid": "new-oid" } } } })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server);
        let snapshot = store
            .open_collection("posts", Contents::Names)
            .await
            .unwrap()
            .unwrap();
        let doc = store
            .write_document(&snapshot, "hello-world", FrontMatter::titled("Hello"), "body text", None)
            .await
            .unwrap();
        assert!(doc.is_valid());
    }

    #[tokio::test]
    async fn test_commit_without_revision_reads_head() {
        let server = MockServer::start().await;
        graphql_mock("query BranchHead")
            .respond_with(ok(json!({ "data": { "repository": { "ref": { "target": { "oid": "head-2" } } } } })))
            .expect(1)
            .mount(&server)
            .await;
        graphql_mock("createCommitOnBranch")
            .and(body_string_contains(r#""expectedHeadOid":"head-2""#))
            .respond_with(ok(json!({ "data": { "createCommitOnBranch": { "commit": { "oid": "c" } } } })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .commit(ChangeSet::new("Upload").add("public/images/a.png", vec![1, 2, 3]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_head_is_transient() {
        let server = MockServer::start().await;
        graphql_mock("createCommitOnBranch")
            .respond_with(ok(json!({
                "data": null,
                "errors": [{ "message": "Expected branch to point to \"old\" but it did not." }]
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .commit(ChangeSet::new("x").add("a.md", "a").at(Some("old".into())))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_collection_delete_walks_nested_directories() {
        let server = MockServer::start().await;
        graphql_mock("main:outstatic/content/posts/assets\"")
            .respond_with(ok(directory(
                json!([{ "name": "cover.png", "type": "blob" }]),
                json!({}),
            )))
            .expect(1)
            .mount(&server)
            .await;
        graphql_mock("main:outstatic/content/posts\"")
            .respond_with(ok(directory(
                json!([
                    { "name": "schema.json", "type": "blob" },
                    { "name": "hello.md", "type": "blob" },
                    { "name": "assets", "type": "tree" }
                ]),
                json!({}),
            )))
            .expect(1)
            .mount(&server)
            .await;
        graphql_mock("createCommitOnBranch")
            .and(body_string_contains("outstatic/content/posts/hello.md"))
            .and(body_string_contains("outstatic/content/posts/schema.json"))
            .and(body_string_contains("outstatic/content/posts/assets/cover.png"))
            .respond_with(ok(json!({ "data": { "createCommitOnBranch": { "commit": { "oid": "c" } } } })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(store(&server).delete_collection("posts").await.unwrap());
    }

    #[tokio::test]
    async fn test_forbidden_is_permission_error() {
        let server = MockServer::start().await;
        graphql_mock("query Directory")
            .respond_with(ok(json!({
                "data": { "repository": null },
                "errors": [{ "type": "FORBIDDEN", "message": "Resource not accessible by integration" }]
            })))
            .mount(&server)
            .await;

        let result = store(&server).list_entries("outstatic/content", Contents::Names).await;
        assert!(matches!(result, Err(AppError::Permission(_))));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer revoked"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer service-token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let base = store(&server);
        let user_store = base.with_credentials(&AccessToken::new("revoked"));
        let result = user_store.list_entries("outstatic/content", Contents::Names).await;
        assert!(matches!(result, Err(AppError::Auth(_))));

        let err = base
            .list_entries("outstatic/content", Contents::Names)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_no_token_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = GitHubStore::new(
            &config(&server, None),
            ContentLayout::new("outstatic/content", "public/images", "/images"),
        )
        .unwrap();
        let result = store.list_collections().await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
