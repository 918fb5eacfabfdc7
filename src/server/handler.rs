// src/server/handler.rs
use crate::metrics::MetricsRegistry;
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

/// Serves the metrics registry on one path; everything else is 404.
#[derive(Clone)]
pub struct MetricsHandler {
    registry: MetricsRegistry,
    path: Arc<str>,
}

impl MetricsHandler {
    pub fn new(registry: MetricsRegistry, path: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            path: path.into(),
        }
    }

    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        if req.uri().path() != &*self.path {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }

        match *req.method() {
            Method::GET | Method::HEAD => {}
            _ => {
                let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                response
                    .headers_mut()
                    .insert(ALLOW, hyper::header::HeaderValue::from_static("GET, HEAD"));
                return response;
            }
        }

        match self.registry.gather() {
            Ok(metrics) => {
                let mut response = Response::new(Body::from(metrics));
                if let Ok(value) = self.registry.content_type().parse() {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => {
                tracing::error!(%e, "failed to encode metrics");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

impl Service<Request<Body>> for MetricsHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        futures::future::ready(Ok(self.handle(&req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;

    fn handler() -> (MetricsHandler, crate::health::HealthGauge) {
        let registry = MetricsRegistry::new().unwrap();
        let gauge = registry.register_liveness().unwrap();
        (MetricsHandler::new(registry, "/metrics"), gauge)
    }

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_path_renders_gauge() {
        let (mut handler, gauge) = handler();
        gauge.set(HealthState::Healthy);

        let response = handler.call(request(Method::GET, "/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body_string(response).await.contains("\ncsi_liveness 1\n"));
    }

    #[tokio::test]
    async fn test_other_paths_not_served() {
        let (handler, _gauge) = handler();

        for path in ["/", "/metrics/", "/healthz"] {
            let response = handler.handle(&request(Method::GET, path));
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_non_get_rejected() {
        let (handler, _gauge) = handler();

        let response = handler.handle(&request(Method::POST, "/metrics"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");

        let response = handler.handle(&request(Method::HEAD, "/metrics"));
        assert_eq!(response.status(), StatusCode::OK);
    }
}
