use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use serde_json::Value;
use storedesk_client::{Body, MultipartBody};
use tracing::instrument;

use super::{Console, report};

/// Fetch a resource
#[derive(Bpaf, Clone, Debug)]
pub struct Get {
    /// Path below the API url, e.g. `/categories/3`
    #[bpaf(positional("PATH"))]
    pub path: String,
}

impl Get {
    #[instrument(name = "get", skip_all)]
    pub async fn handle(self, console: Console) -> Result<()> {
        let session = console.session()?;
        report(session.get(&self.path, &console.cancel).await)
    }
}

/// Create or update a resource
#[derive(Bpaf, Clone, Debug)]
pub struct Post {
    /// Update the resource instead of creating one
    ///
    /// The request is still sent as POST with `_method=put` appended.
    #[bpaf(long, short)]
    pub update: bool,

    /// Send a JSON body
    #[bpaf(long, argument("JSON"))]
    pub json: Option<String>,

    /// Add a multipart text field, e.g. `-F 'categories[0][name]=Shoes'`
    #[bpaf(long("field"), short('F'), argument("NAME=VALUE"), many)]
    pub fields: Vec<String>,

    /// Add a multipart file field, e.g. `--file image=./shoes.png`
    #[bpaf(long("file"), argument("NAME=PATH"), many)]
    pub files: Vec<String>,

    /// Path below the API url, e.g. `/categories`
    #[bpaf(positional("PATH"))]
    pub path: String,
}

impl Post {
    #[instrument(name = "post", skip_all, fields(update = self.update))]
    pub async fn handle(self, console: Console) -> Result<()> {
        let body = self.body().await?;
        let session = console.session()?;
        let outcome = if self.update {
            session.update(&self.path, body, &console.cancel).await
        } else {
            session.post(&self.path, body, &console.cancel).await
        };
        report(outcome)
    }

    async fn body(&self) -> Result<Body> {
        if let Some(json) = &self.json {
            if !self.fields.is_empty() || !self.files.is_empty() {
                bail!("'--json' cannot be combined with '--field' or '--file'");
            }
            let value: Value = serde_json::from_str(json).context("Invalid JSON body")?;
            return Ok(value.into());
        }

        let mut multipart = MultipartBody::new();
        for field in &self.fields {
            let (name, value) = parse_pair(field)?;
            multipart = multipart.text(name, value);
        }
        for file in &self.files {
            let (name, path) = parse_pair(file)?;
            let path = PathBuf::from(path);
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Could not read '{}'", path.display()))?;
            multipart = multipart.file(name, file_name(&path), None, bytes);
        }
        Ok(multipart.into())
    }
}

/// Delete a resource
#[derive(Bpaf, Clone, Debug)]
pub struct Delete {
    /// Path below the API url, e.g. `/categories/3`
    #[bpaf(positional("PATH"))]
    pub path: String,
}

impl Delete {
    #[instrument(name = "delete", skip_all)]
    pub async fn handle(self, console: Console) -> Result<()> {
        let session = console.session()?;
        report(session.delete(&self.path, &console.cancel).await)
    }
}

/// Split `name=value`, the value may contain further `=`.
fn parse_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("Expected NAME=VALUE, got '{pair}'"),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use storedesk_client::{FormPart, SessionScope};

    use super::*;
    use crate::commands::EXIT_FAILURE;
    use crate::commands::test_helpers::{console, console_in, exit_status};

    fn post(json: Option<&str>, fields: &[&str], files: &[&str]) -> Post {
        Post {
            update: false,
            json: json.map(String::from),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            files: files.iter().map(|s| s.to_string()).collect(),
            path: "/categories".to_string(),
        }
    }

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(parse_pair("a=b=c").unwrap(), ("a", "b=c"));
        assert_eq!(parse_pair("name=").unwrap(), ("name", ""));
        assert!(parse_pair("=value").is_err());
        assert!(parse_pair("novalue").is_err());
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let body = post(Some(r#"{"name":"Shoes"}"#), &[], &[])
            .body()
            .await
            .unwrap();
        assert_eq!(body, Body::Json(json!({"name": "Shoes"})));
    }

    #[tokio::test]
    async fn json_cannot_mix_with_fields() {
        let err = post(Some("{}"), &["name=Shoes"], &[]).body().await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn fields_and_files_become_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shoes.png");
        std::fs::write(&image, b"png").unwrap();
        let file_arg = format!("image={}", image.display());

        let body = post(None, &["categories[0][name]=Shoes"], &[&file_arg])
            .body()
            .await
            .unwrap();

        let Body::Multipart(multipart) = body else {
            panic!("expected a multipart body");
        };
        assert_eq!(multipart.parts(), &[
            FormPart::Text {
                name: "categories[0][name]".into(),
                value: "Shoes".into(),
            },
            FormPart::File {
                name: "image".into(),
                file_name: "shoes.png".into(),
                mime: None,
                bytes: b"png".to_vec(),
            },
        ]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = post(None, &[], &["image=/does/not/exist.png"]).body().await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn get_sends_the_stored_token() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/brands/3")
                .header("authorization", "Bearer stored");
            then.status(200).json_body(json!({"id": 3}));
        });
        let (console, _dir) = console(&server.base_url());
        console
            .credentials
            .set_token(SessionScope::User, Some("stored".into()))
            .unwrap();

        let result = Get {
            path: "/brands/3".to_string(),
        }
        .handle(console)
        .await;

        assert!(result.is_ok(), "{result:?}");
        mock.assert();
    }

    #[tokio::test]
    async fn update_posts_with_method_override() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/categories/3")
                .query_param("_method", "put")
                .json_body(json!({"name": "Shoes"}));
            then.status(200).json_body(json!({"message": "Updated"}));
        });
        let (console, _dir) = console(&server.base_url());

        let mut args = post(Some(r#"{"name":"Shoes"}"#), &[], &[]);
        args.update = true;
        args.path = "/categories/3".to_string();
        let result = args.handle(console).await;

        assert!(result.is_ok(), "{result:?}");
        mock.assert();
    }

    #[tokio::test]
    async fn unauthorized_delete_fails_and_logs_out() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/brands/3");
            then.status(401);
        });
        let (console, dir) = console(&server.base_url());
        console
            .credentials
            .set_token(SessionScope::User, Some("expired".into()))
            .unwrap();
        let api_url = console.config.api_url.clone();

        let result = Delete {
            path: "/brands/3".to_string(),
        }
        .handle(console)
        .await;

        assert_eq!(exit_status(result), Some(EXIT_FAILURE));
        mock.assert();
        let console = console_in(&api_url, &dir);
        assert_eq!(console.credentials.credentials().user_token, None);
    }
}
