use bytes::Bytes;
use migrator_core::CampaignId;
use migrator_engine::{
    BrevoSource, CampaignSource, CdnError, CdnStore, CloudinaryCredentials, CloudinaryStore,
    FailureKind, FetchSettings, HttpDraftPublisher, ImageFetcher, PublishError, Publisher,
    ReqwestImageFetcher, Retryable, SessionCookies, SourceError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn campaign(id: u64, subject: &str, name: &str, sent: &str) -> serde_json::Value {
    json!({ "id": id, "subject": subject, "name": name, "sentDate": sent, "status": "sent" })
}

#[tokio::test]
async fn brevo_lists_every_page_oldest_first() {
    let server = MockServer::start().await;
    let first_page: Vec<_> = (0..100)
        .map(|i| campaign(1000 + i, &format!("Issue {i}"), "", "2024-03-01T08:00:00Z"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/emailCampaigns"))
        .and(header("api-key", "secret"))
        .and(query_param("status", "sent"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": first_page,
            "count": 102
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emailCampaigns"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [
                campaign(7, "", "Internal name", "2023-01-10T08:00:00Z"),
                campaign(8, "Later", "x", "2025-01-10T08:00:00Z")
            ],
            "count": 102
        })))
        .mount(&server)
        .await;

    let source = BrevoSource::new("secret", &FetchSettings::default())
        .unwrap()
        .with_base_url(server.uri());
    let campaigns = source.list_sent_campaigns().await.expect("listing");

    assert_eq!(campaigns.len(), 102);
    assert_eq!(campaigns[0].id, CampaignId::new("7"));
    assert_eq!(campaigns[0].subject, "Internal name");
    assert_eq!(campaigns[101].id, CampaignId::new("8"));
}

#[tokio::test]
async fn brevo_returns_campaign_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/emailCampaigns/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "htmlContent": "<p>Hello</p>"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emailCampaigns/43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 43 })))
        .mount(&server)
        .await;

    let source = BrevoSource::new("k", &FetchSettings::default())
        .unwrap()
        .with_base_url(server.uri());

    let html = source.fetch_html(&CampaignId::new("42")).await.unwrap();
    assert_eq!(html, "<p>Hello</p>");

    let missing = source.fetch_html(&CampaignId::new("43")).await.unwrap_err();
    assert!(matches!(missing, SourceError::MissingContent(_)));
    assert!(!missing.is_transient());
}

#[tokio::test]
async fn brevo_rate_limits_are_transient_and_auth_errors_are_not() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/emailCampaigns/1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emailCampaigns/2"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let source = BrevoSource::new("k", &FetchSettings::default())
        .unwrap()
        .with_base_url(server.uri());

    let throttled = source.fetch_html(&CampaignId::new("1")).await.unwrap_err();
    assert!(throttled.is_transient());
    assert!(!throttled.is_setup_failure());

    let unauthorized = source.fetch_html(&CampaignId::new("2")).await.unwrap_err();
    assert!(!unauthorized.is_transient());
    assert!(unauthorized.is_setup_failure());
}

#[tokio::test]
async fn image_fetcher_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "image/png"))
        .mount(&server)
        .await;

    let fetcher = ReqwestImageFetcher::new(FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    })
    .unwrap();

    let image = fetcher
        .fetch_image(&format!("{}/ok.png", server.uri()))
        .await
        .expect("image");
    assert_eq!(image.bytes, Bytes::from_static(&[1, 2, 3]));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));

    let gone = fetcher
        .fetch_image(&format!("{}/gone.png", server.uri()))
        .await
        .unwrap_err();
    assert!(gone.kind.is_not_found());

    let page = fetcher
        .fetch_image(&format!("{}/page.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(page.kind, FailureKind::UnsupportedContentType { .. }));

    let huge = fetcher
        .fetch_image(&format!("{}/huge.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(huge.kind, FailureKind::TooLarge { .. }));
}

fn credentials() -> CloudinaryCredentials {
    CloudinaryCredentials {
        cloud_name: "demo".to_string(),
        api_key: "key123".to_string(),
        api_secret: "abcd".to_string(),
    }
}

#[tokio::test]
async fn cloudinary_upload_is_signed_and_returns_secure_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/demo/image/upload"))
        .and(body_string_contains("Hello_x_png"))
        .and(body_string_contains("1c621e5a542cac1c14ffa5ba33ab786167f38fb6"))
        .and(body_string_contains("key123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "public_id": "newsletter_migrator/Hello_x_png",
            "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/newsletter_migrator/Hello_x_png.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = CloudinaryStore::new(credentials(), &FetchSettings::default())
        .unwrap()
        .with_base_url(server.uri())
        .with_clock(|| 1_700_000_000);

    let url = store
        .upload(Bytes::from_static(b"png"), "Hello_x_png", "newsletter_migrator")
        .await
        .expect("upload");
    assert!(url.starts_with("https://res.cloudinary.com/demo/"));
}

#[tokio::test]
async fn cloudinary_rejections_are_permanent_and_outages_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bad/image/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid Signature" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/down/image/upload"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let rejected = CloudinaryStore::new(
        CloudinaryCredentials {
            cloud_name: "bad".to_string(),
            ..credentials()
        },
        &FetchSettings::default(),
    )
    .unwrap()
    .with_base_url(server.uri())
    .upload(Bytes::from_static(b"x"), "id", "folder")
    .await
    .unwrap_err();
    assert!(matches!(&rejected, CdnError::Rejected(msg) if msg == "Invalid Signature"));
    assert!(!rejected.is_transient());

    let outage = CloudinaryStore::new(
        CloudinaryCredentials {
            cloud_name: "down".to_string(),
            ..credentials()
        },
        &FetchSettings::default(),
    )
    .unwrap()
    .with_base_url(server.uri())
    .upload(Bytes::from_static(b"x"), "id", "folder")
    .await
    .unwrap_err();
    assert!(outage.is_transient());
}

#[tokio::test]
async fn draft_publisher_posts_json_with_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/drafts"))
        .and(header("cookie", "sid=abc; csrf=x1"))
        .and(body_json(json!({
            "title": "Town Hall Update",
            "body_markdown": "Hello",
            "draft": true
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/expired"))
        .respond_with(ResponseTemplate::new(403).set_body_string("login required"))
        .mount(&server)
        .await;

    let cookies = SessionCookies::parse(
        r#"[{"name":"sid","value":"abc"},{"name":"csrf","value":"x1"}]"#,
    )
    .unwrap();

    let publisher = HttpDraftPublisher::new(
        format!("{}/api/drafts", server.uri()),
        cookies.clone(),
        &FetchSettings::default(),
    )
    .unwrap();
    publisher
        .publish("Town Hall Update", "Hello")
        .await
        .expect("draft created");

    let expired = HttpDraftPublisher::new(
        format!("{}/api/expired", server.uri()),
        cookies,
        &FetchSettings::default(),
    )
    .unwrap();
    let err = expired.publish("t", "b").await.unwrap_err();
    assert!(matches!(&err, PublishError::Rejected(msg) if msg.contains("login required")));
    assert!(!err.is_transient());
}
