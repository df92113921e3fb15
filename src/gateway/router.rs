use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue},
    response::Response,
    routing::any,
    Router,
};
use futures_util::StreamExt;
use http_body_util::LengthLimitError;
use log::{info, warn};
use reqwest::Client;
use tower_http::{cors::CorsLayer, services::ServeDir};

use super::route::RouteRule;
use crate::error::GatewayError;

pub const PROXY_BODY_LIMIT: usize = 50 * 1024 * 1024; // 50MB

#[derive(Clone)]
struct RouterState {
    client: Client,
    rule: Arc<RouteRule>,
    upstream_origin: Option<HeaderValue>,
}

/// Static assets from `static_root`, everything under the rule's prefix
/// forwarded upstream.
pub fn build_router(rule: RouteRule, static_root: &Path, client: Client) -> Router {
    let prefix = rule.prefix().to_string();
    let state = RouterState {
        client,
        upstream_origin: HeaderValue::from_str(rule.origin()).ok(),
        rule: Arc::new(rule),
    };

    // `{*rest}` does not match an empty tail, so the bare and slash forms
    // are registered separately.
    Router::new()
        .route(&prefix, any(proxy_to_upstream))
        .route(&format!("{prefix}/"), any(proxy_to_upstream))
        .route(&format!("{prefix}/{{*rest}}"), any(proxy_to_upstream))
        .fallback_service(ServeDir::new(static_root))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn proxy_to_upstream(
    State(state): State<RouterState>,
    req: Request,
) -> Result<Response, GatewayError> {
    let rule = state.rule.as_ref();
    let origin_path = req.uri().path().to_string();
    let rewritten_path = rule
        .rewrite(&origin_path)
        .unwrap_or_else(|| origin_path.clone());
    let target = rule.upstream_url(&rewritten_path, req.uri().query());

    let (parts, body) = req.into_parts();
    info!("[gateway:proxy] {} {}", parts.method, rewritten_path);

    // Host is derived from the target URL by the client.
    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    if headers.contains_key(header::ORIGIN) {
        match &state.upstream_origin {
            Some(origin) => {
                headers.insert(header::ORIGIN, origin.clone());
            }
            None => {
                headers.remove(header::ORIGIN);
            }
        }
    }

    let body_bytes = read_body(body, PROXY_BODY_LIMIT).await?;

    let mut builder = state.client.request(parts.method, &target).headers(headers);
    if !body_bytes.is_empty() {
        builder = builder.body(body_bytes);
    }

    let response = builder.send().await.map_err(|err| {
        warn!("[gateway:proxy] upstream {target} unavailable: {err}");
        GatewayError::UpstreamUnavailable(err)
    })?;

    let status = response.status();
    let mut resp_builder = Response::builder().status(status);
    for (key, value) in response.headers() {
        if key == header::CONNECTION || key == header::TRANSFER_ENCODING {
            continue;
        }
        resp_builder = resp_builder.header(key, value);
    }

    let stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    resp_builder
        .body(Body::from_stream(stream))
        .map_err(|err| GatewayError::Response(err.to_string()))
}

/// Buffers a request body. Only the length limit maps to 413; a body that
/// breaks off for any other reason is the client's fault.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    to_bytes(body, limit).await.map_err(|err| {
        let inner = err.into_inner();
        let mut source: Option<&(dyn StdError + 'static)> = Some(&*inner);
        while let Some(current) = source {
            if current.is::<LengthLimitError>() {
                return GatewayError::PayloadTooLarge(limit);
            }
            source = current.source();
        }
        warn!("[gateway:proxy] failed to read request body: {inner}");
        GatewayError::RequestBody(inner.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let err = read_body(Body::from(vec![0u8; 64]), 16).await.unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge(16)), "{err:?}");

        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn aborted_body_is_bad_request() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"model\":")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        let err = read_body(body, PROXY_BODY_LIMIT).await.unwrap_err();
        assert!(matches!(err, GatewayError::RequestBody(_)), "{err:?}");

        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_within_limit_is_buffered() {
        let bytes = read_body(Body::from("hello"), 16).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let assets = TempDir::new().unwrap();
        // Grab a free port, then release it so nothing is listening there.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_origin = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);

        let rule = RouteRule::new("/ollama", &dead_origin).unwrap();
        let addr = serve(build_router(rule, assets.path(), Client::new())).await;

        let response = reqwest::get(format!("http://{addr}/ollama/api/tags"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.text().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prefix_lookalikes_are_served_statically() {
        let assets = TempDir::new().unwrap();
        std::fs::create_dir(assets.path().join("ollamax")).unwrap();
        std::fs::write(assets.path().join("ollamax").join("a.txt"), "static").unwrap();

        let addr = serve(build_router(
            RouteRule::ollama(),
            assets.path(),
            Client::new(),
        ))
        .await;

        let response = reqwest::get(format!("http://{addr}/ollamax/a.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "static");
    }
}
