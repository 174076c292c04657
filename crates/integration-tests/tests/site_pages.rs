//! Public pages and response headers.

use quill_integration_tests::{base_url, client, first_poem_slug};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_health_endpoints() {
    let client = client();
    for path in ["/health", "/health/ready"] {
        let resp = client
            .get(format!("{}{path}", base_url()))
            .send()
            .await
            .expect("Failed to reach health endpoint");
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_home_sets_security_headers() {
    let resp = client()
        .get(base_url())
        .send()
        .await
        .expect("Failed to load home page");

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    let csp = headers["content-security-policy"]
        .to_str()
        .expect("CSP should be ASCII");
    assert!(csp.contains("'nonce-"));
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_listing_sorts_and_out_of_range_page() {
    let client = client();
    for sort in ["newest", "oldest", "alphabetical"] {
        let resp = client
            .get(format!("{}/poem?sort={sort}", base_url()))
            .send()
            .await
            .expect("Failed to load listing");
        assert_eq!(resp.status(), StatusCode::OK, "sort={sort}");
    }

    let resp = client
        .get(format!("{}/poem?page=9999", base_url()))
        .send()
        .await
        .expect("Failed to load listing");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running site and seeded poems"]
async fn test_poem_page_counts_views() {
    let client = client();
    let slug = first_poem_slug(&client).await;

    let resp = client
        .get(format!("{}/poem/{slug}", base_url()))
        .send()
        .await
        .expect("Failed to load poem");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read poem");
    assert!(body.contains("views"));
    assert!(body.contains(&format!("/poem/{slug}")), "share link should point at the poem");
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_unknown_poem_is_404() {
    let resp = client()
        .get(format!("{}/poem/no-such-poem-here", base_url()))
        .send()
        .await
        .expect("Failed to request poem");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_content_pages_render() {
    let client = client();
    for path in ["/about", "/everything-about-project", "/contact"] {
        let resp = client
            .get(format!("{}{path}", base_url()))
            .send()
            .await
            .expect("Failed to load page");
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_search_page_and_suggestions() {
    let client = client();
    let resp = client
        .get(format!("{}/search?q=night", base_url()))
        .send()
        .await
        .expect("Failed to search");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/search/suggest?q=ni", base_url()))
        .send()
        .await
        .expect("Failed to fetch suggestions");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running site"]
async fn test_unsubscribe_without_email_is_handled() {
    let resp = client()
        .get(format!("{}/unsubscribe", base_url()))
        .send()
        .await
        .expect("Failed to load unsubscribe");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("missing a valid email"));
}
