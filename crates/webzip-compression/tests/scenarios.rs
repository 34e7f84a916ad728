//! End-to-end behaviour of the resource and page middlewares on one pipeline

use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use http::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, ETAG, EXPIRES, IF_NONE_MATCH,
    LAST_MODIFIED, USER_AGENT, VARY,
};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use webzip_compression::{
    etag_for, CacheKey, CompressionConfig, ContentEncoding, PageCompression, ResourceCache,
    ResourceCompression,
};
use webzip_core::{handler_fn, Body, Middleware, Next};

const SCRIPT: &str = "function WebForm_DoPostBackWithOptions(options) { return options; }\n";
const PAGE: &str = "<html><head><script src=\"/WebResource.axd?d=1\"></script></head></html>";
const IE6: &str = "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; SV1)";

struct Pipeline {
    cache: Arc<ResourceCache>,
    fetches: Arc<AtomicUsize>,
    stack: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    fn new() -> Self {
        let config = Arc::new(CompressionConfig::default());
        let cache = Arc::new(ResourceCache::default());
        let stack: Arc<[Arc<dyn Middleware>]> = Arc::new([
            Arc::new(PageCompression::new(Arc::clone(&config))) as Arc<dyn Middleware>,
            Arc::new(ResourceCompression::new(config, Arc::clone(&cache))) as Arc<dyn Middleware>,
        ]);
        Self {
            cache,
            fetches: Arc::new(AtomicUsize::new(0)),
            stack,
        }
    }

    fn next(&self) -> Next {
        let fetches = Arc::clone(&self.fetches);
        Next::with_handler(
            Arc::clone(&self.stack),
            handler_fn(move |req: Request<Body>| {
                let fetches = Arc::clone(&fetches);
                async move {
                    let (content_type, body) = if req.uri().path().contains("WebResource.axd") {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        ("application/x-javascript", SCRIPT.repeat(20))
                    } else {
                        ("text/html", PAGE.to_string())
                    };
                    Ok(Response::builder()
                        .header(CONTENT_TYPE, content_type)
                        .body(Body::from(body))
                        .unwrap())
                }
            }),
        )
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.next().run(req).await.unwrap()
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

fn resource_request(query: &str, accept: &str) -> http::request::Builder {
    Request::builder()
        .uri(format!("/WebResource.axd?{query}"))
        .header(ACCEPT_ENCODING, accept)
}

async fn body_of(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn inflate(bytes: &[u8]) -> String {
    let mut out = String::new();
    ZlibDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

#[tokio::test]
async fn test_first_requester_fixes_encoding_for_later_requests() {
    let pipeline = Pipeline::new();

    let a = pipeline
        .send(
            resource_request("v=1", "gzip, deflate")
                .body(Body::default())
                .unwrap(),
        )
        .await;
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(a.headers()[CONTENT_ENCODING], "deflate");
    let a_body = body_of(a).await;

    let b = pipeline
        .send(resource_request("v=1", "gzip").body(Body::default()).unwrap())
        .await;
    assert_eq!(b.headers()[CONTENT_ENCODING], "deflate");
    let b_body = body_of(b).await;

    assert_eq!(a_body, b_body);
    assert_eq!(inflate(&b_body), SCRIPT.repeat(20));
    assert_eq!(pipeline.fetch_count(), 1);

    let entry = pipeline.cache.get(&CacheKey::from("v=1")).unwrap();
    assert_eq!(entry.encoding(), ContentEncoding::Deflate);
}

#[tokio::test]
async fn test_gzip_population_is_tagged_gzip() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .send(resource_request("v=2", "gzip").body(Body::default()).unwrap())
        .await;
    assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    assert_eq!(gunzip(&body_of(response).await), SCRIPT.repeat(20));

    let entry = pipeline.cache.get(&CacheKey::from("v=2")).unwrap();
    assert_eq!(entry.encoding(), ContentEncoding::Gzip);
}

#[tokio::test]
async fn test_distinct_queries_get_distinct_entries() {
    let pipeline = Pipeline::new();

    for query in ["d=a&t=1", "t=1&d=a", "d=b"] {
        pipeline
            .send(resource_request(query, "deflate").body(Body::default()).unwrap())
            .await;
    }
    assert_eq!(pipeline.cache.len(), 3);
    assert_eq!(pipeline.fetch_count(), 3);
}

#[tokio::test]
async fn test_matching_etag_short_circuits() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .send(
            resource_request("v=1", "gzip, deflate")
                .header(IF_NONE_MATCH, etag_for("v=1"))
                .body(Body::default())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(!response.headers().contains_key(CONTENT_ENCODING));
    assert_eq!(response.headers()[ETAG].to_str().unwrap(), etag_for("v=1"));
    assert!(body_of(response).await.is_empty());
    assert_eq!(pipeline.fetch_count(), 0);
    assert!(pipeline.cache.is_empty());
}

#[tokio::test]
async fn test_mismatched_etag_is_served() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .send(
            resource_request("v=1", "gzip")
                .header(IF_NONE_MATCH, etag_for("v=2"))
                .body(Body::default())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(pipeline.fetch_count(), 1);
}

#[tokio::test]
async fn test_ie6_receives_uncompressed_resource() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .send(
            resource_request("v=1", "gzip")
                .header(USER_AGENT, IE6)
                .body(Body::default())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(CONTENT_ENCODING));
    assert_eq!(response.headers()[CACHE_CONTROL], "public");
    assert_eq!(body_of(response).await, SCRIPT.repeat(20));
    assert!(pipeline.cache.is_empty());
}

#[tokio::test]
async fn test_no_accepted_encoding_still_gets_caching_headers() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .send(resource_request("v=1", "br").body(Body::default()).unwrap())
        .await;

    assert!(!response.headers().contains_key(CONTENT_ENCODING));
    for header in [CACHE_CONTROL, VARY, EXPIRES, LAST_MODIFIED, ETAG] {
        assert!(response.headers().contains_key(&header), "{header}");
    }
    assert!(pipeline.cache.is_empty());
}

#[tokio::test]
async fn test_pages_and_resources_share_a_pipeline() {
    let pipeline = Pipeline::new();

    let page = pipeline
        .send(
            Request::builder()
                .uri("/default.aspx")
                .header(ACCEPT_ENCODING, "gzip")
                .body(Body::default())
                .unwrap(),
        )
        .await;
    assert_eq!(page.headers()[CONTENT_ENCODING], "gzip");
    assert_eq!(gunzip(&body_of(page).await), PAGE);

    // The cached resource is served as-is, not compressed a second time
    let resource = pipeline
        .send(resource_request("v=9", "gzip").body(Body::default()).unwrap())
        .await;
    assert_eq!(
        resource.headers().get_all(CONTENT_ENCODING).iter().count(),
        1
    );
    assert_eq!(resource.headers()[CONTENT_TYPE], "text/javascript");
    assert_eq!(gunzip(&body_of(resource).await), SCRIPT.repeat(20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_fetch_once() {
    let pipeline = Arc::new(Pipeline::new());

    let responses = futures::future::join_all((0..8).map(|i| {
        let pipeline = Arc::clone(&pipeline);
        let accept = if i % 2 == 0 { "gzip" } else { "deflate" };
        async move {
            let response = pipeline
                .send(resource_request("v=race", accept).body(Body::default()).unwrap())
                .await;
            let encoding = response.headers()[CONTENT_ENCODING].clone();
            (encoding, body_of(response).await)
        }
    }))
    .await;

    assert_eq!(pipeline.fetch_count(), 1);
    assert!(responses.windows(2).all(|pair| pair[0] == pair[1]));
}
