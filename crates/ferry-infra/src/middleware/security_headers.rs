use axum::extract::State;
use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};

const DOCS_PREFIX: &str = "/docs";

/// Which optional headers to send.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityPolicy {
    /// Send HSTS; only meaningful behind HTTPS in production
    pub hsts: bool,
}

impl SecurityPolicy {
    pub fn for_environment(production: bool) -> Self {
        Self { hsts: production }
    }
}

/// Adds security headers to all HTTP responses
pub async fn security_headers_middleware(
    State(policy): State<SecurityPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let docs = request.uri().path().starts_with(DOCS_PREFIX);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("no-referrer"),
    );

    if policy.hsts {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    // The docs page loads its viewer script from a CDN.
    if !docs {
        headers.insert(
            "Content-Security-Policy",
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        );
    }

    response
}
