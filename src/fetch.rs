use std::time::Duration;

use crate::error::FetchError;

/// Build the HTTP client shared by all upstream fetchers.
pub fn build_client(
    user_agent: &str,
    timeout: Option<Duration>,
) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Send the request and return the body of a 2xx response.
pub async fn fetch_text(request: reqwest::RequestBuilder, url: &str) -> Result<String, FetchError> {
    let response = request.send().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    response.text().await.map_err(|source| FetchError::Body {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::{http::StatusCode, routing::get, Router};
    use rstest::rstest;
    use tokio::net::TcpListener;

    use super::{build_client, fetch_text};
    use crate::error::FetchError;

    /// Local upstream answering `/parks.csv` with a body and `/broken` with a server error.
    async fn serve_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let router = Router::new()
            .route("/parks.csv", get(|| async { "reference,active\nK-0001,1\n" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
            );
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        address
    }

    fn client() -> reqwest::Client {
        build_client("pota_map_cache-test", Some(Duration::from_secs(5))).unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_successful_fetch_returns_body() {
        let url = format!("http://{}/parks.csv", serve_upstream().await);
        let body = fetch_text(client().get(&url), &url).await.unwrap();
        assert_eq!(body, "reference,active\nK-0001,1\n");
    }

    #[rstest]
    #[case("/broken", 500)]
    #[case("/missing", 404)]
    #[tokio::test]
    async fn test_error_status_is_rejected(#[case] path: &str, #[case] expected_status: u16) {
        let url = format!("http://{}{}", serve_upstream().await, path);
        let err = fetch_text(client().get(&url), &url).await.unwrap_err();
        assert!(
            matches!(&err, FetchError::Status { status, .. } if status.as_u16() == expected_status),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_refused_connection_is_a_request_error() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let url = format!("http://{}/parks.csv", address);
        let err = fetch_text(client().get(&url), &url).await.unwrap_err();
        assert!(
            matches!(&err, FetchError::Request { url: failed_url, .. } if *failed_url == url),
            "unexpected error: {err:?}"
        );
    }
}
