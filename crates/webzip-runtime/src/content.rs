//! Serves pages and resources from a content directory
//!
//! Layout under the content root:
//! - `pages/` maps request paths to files (`/` serves the index page)
//! - `resources/` holds files addressed through the resource endpoint's
//!   query parameter, e.g. `/WebResource.axd?d=site.js`

use http::header::CONTENT_TYPE;
use http::{Request, Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use webzip_config::ContentConfig;
use webzip_core::{Body, Error, Result};

const PAGES_DIR: &str = "pages";
const RESOURCES_DIR: &str = "resources";

/// Final handler of the request pipeline
#[derive(Debug, Clone)]
pub struct ContentHandler {
    content: ContentConfig,
    endpoint: String,
}

impl ContentHandler {
    /// Create a handler for `content`, treating paths containing `endpoint`
    /// as resource requests
    pub fn new(content: ContentConfig, endpoint: impl Into<String>) -> Self {
        Self {
            content,
            endpoint: endpoint.into(),
        }
    }

    /// Serve a request. Missing files and rejected paths become error responses.
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>> {
        match self.locate(&req) {
            Ok(path) => match self.read(&path).await {
                Ok(response) => Ok(response),
                Err(e @ Error::NotFound(_)) => error_response(&e),
                Err(e) => Err(e),
            },
            Err(e @ (Error::NotFound(_) | Error::InvalidRequest(_))) => error_response(&e),
            Err(e) => Err(e),
        }
    }

    fn locate(&self, req: &Request<Body>) -> Result<PathBuf> {
        let path = req.uri().path();

        if !self.endpoint.is_empty() && path.contains(self.endpoint.as_str()) {
            let name = req
                .uri()
                .query()
                .and_then(|query| query_param(query, &self.content.resource_param))
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "resource request without '{}' parameter",
                        self.content.resource_param
                    ))
                })?;
            return resolve(&self.content.root.join(RESOURCES_DIR), &name);
        }

        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() {
            self.content.index.as_str()
        } else {
            relative
        };
        resolve(&self.content.root.join(PAGES_DIR), relative)
    }

    async fn read(&self, path: &Path) -> Result<Response<Body>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), size = bytes.len(), "Serving content");

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type_for(path))
            .body(Body::from(bytes))?)
    }
}

/// Join `relative` onto `base`, rejecting anything but plain path segments
fn resolve(base: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(Error::InvalidRequest(format!(
            "rejected path '{}'",
            relative.display()
        )));
    }
    Ok(base.join(relative))
}

/// Percent-decoded value of the first `name` pair in a query string
fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn content_type_for(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

fn error_response(error: &Error) -> Result<Response<Body>> {
    debug!(error = %error, "Content request failed");
    Ok(Response::builder()
        .status(error.to_status_code())
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(error.to_string()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages/docs")).unwrap();
        fs::create_dir_all(dir.path().join("resources")).unwrap();
        fs::write(dir.path().join("pages/index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("pages/docs/intro.html"), "<h1>intro</h1>").unwrap();
        fs::write(dir.path().join("resources/site.js"), "var x = 1;").unwrap();
        dir
    }

    fn handler(dir: &tempfile::TempDir) -> ContentHandler {
        ContentHandler::new(ContentConfig::new(dir.path()), "WebResource.axd")
    }

    async fn get(handler: &ContentHandler, uri: &str) -> Response<Body> {
        let req = Request::builder().uri(uri).body(Body::default()).unwrap();
        handler.handle(req).await.unwrap()
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("d=site.js&t=1", "d").as_deref(), Some("site.js"));
        assert_eq!(query_param("t=1&d=site.js", "d").as_deref(), Some("site.js"));
        assert_eq!(query_param("d=my%20file.js", "d").as_deref(), Some("my file.js"));
        assert_eq!(query_param("d=a+b.js", "d").as_deref(), Some("a b.js"));
        assert_eq!(query_param("dd=x", "d"), None);
        assert_eq!(query_param("d=", "d"), None);
        assert_eq!(query_param("", "d"), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(
            content_type_for(Path::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(content_type_for(Path::new("site.css")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("pic.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("font.woff2")), "font/woff2");
        assert_eq!(content_type_for(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(
            content_type_for(Path::new("blob.unknownext")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let base = Path::new("/srv/site/pages");
        assert!(resolve(base, "a/b.html").is_ok());
        assert!(resolve(base, "../secret").is_err());
        assert!(resolve(base, "/etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_serves_index_and_pages() {
        let dir = site();
        let handler = handler(&dir);

        let response = get(&handler, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(text(response).await, "<h1>home</h1>");

        let response = get(&handler, "/docs/intro.html").await;
        assert_eq!(text(response).await, "<h1>intro</h1>");
    }

    #[tokio::test]
    async fn test_serves_resources_by_query() {
        let dir = site();
        let handler = handler(&dir);

        let response = get(&handler, "/WebResource.axd?d=site.js&t=42").await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.contains("javascript"), "{content_type}");
        assert_eq!(text(response).await, "var x = 1;");
    }

    #[tokio::test]
    async fn test_serves_percent_encoded_resource_name() {
        let dir = site();
        fs::write(dir.path().join("resources/my file.js"), "var y = 2;").unwrap();
        let handler = handler(&dir);

        let response = get(&handler, "/WebResource.axd?d=my%20file.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "var y = 2;");

        // Traversal is checked after decoding
        assert_eq!(
            get(&handler, "/WebResource.axd?d=..%2Fpages%2Findex.html")
                .await
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_missing_and_rejected() {
        let dir = site();
        let handler = handler(&dir);

        assert_eq!(get(&handler, "/nope.html").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            get(&handler, "/WebResource.axd?t=1").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get(&handler, "/WebResource.axd?d=../pages/index.html")
                .await
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
