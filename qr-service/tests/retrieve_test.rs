mod common;

use common::{new_media_root, TestApp};
use reqwest::StatusCode;
use uuid::Uuid;

#[tokio::test]
async fn retrieve_without_registration_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.retrieve("E1", "U1").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "QR code not found");

    app.cleanup().await;
}

#[tokio::test]
async fn generate_then_retrieve_returns_same_url() {
    let app = TestApp::spawn().await;

    let url = app.generate_url("E1", "U1", "Alice").await;
    let response = app.retrieve("E1", "U1").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["qrCodeUrl"], url);

    app.cleanup().await;
}

#[tokio::test]
async fn retrieve_works_without_trailing_slash() {
    let app = TestApp::spawn().await;

    let url = app.generate_url("E1", "U1", "Alice").await;
    let response = app
        .client
        .get(format!("{}/api/qr/E1/U1", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["qrCodeUrl"], url);

    app.cleanup().await;
}

#[tokio::test]
async fn retrieve_does_not_mix_pairs() {
    let app = TestApp::spawn().await;

    app.generate_url("E1", "U1", "Alice").await;
    let url = app.generate_url("E1", "U2", "Bob").await;

    let response = app.retrieve("E1", "U2").await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["qrCodeUrl"], url);

    assert_eq!(app.retrieve("E2", "U1").await.status(), StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
async fn retrieve_with_several_registrations_returns_one_of_them() {
    let app = TestApp::spawn().await;

    let mut urls = Vec::new();
    for _ in 0..3 {
        urls.push(app.generate_url("E1", "U1", "Alice").await);
    }

    let response = app.retrieve("E1", "U1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    let url = body["qrCodeUrl"].as_str().unwrap().to_string();

    assert!(urls.contains(&url), "{} is not a generated url", url);

    app.cleanup().await;
}

#[tokio::test]
async fn images_present_at_startup_are_found() {
    let media_root = new_media_root();
    let qr_dir = media_root.join("qrcodes");
    tokio::fs::create_dir_all(&qr_dir).await.unwrap();
    let file_name = format!("E7_U7_{}.png", Uuid::new_v4());
    tokio::fs::write(qr_dir.join(&file_name), b"png").await.unwrap();

    let app = TestApp::spawn_with_root(media_root).await;

    let response = app.retrieve("E7", "U7").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["qrCodeUrl"], format!("/media/qrcodes/{}", file_name));

    app.cleanup().await;
}

#[tokio::test]
async fn images_added_while_running_are_found() {
    let app = TestApp::spawn().await;

    let file_name = format!("E8_U8_{}.png", Uuid::new_v4());
    tokio::fs::write(app.qr_dir().join(&file_name), b"png")
        .await
        .unwrap();

    let response = app.retrieve("E8", "U8").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["qrCodeUrl"], format!("/media/qrcodes/{}", file_name));

    app.cleanup().await;
}

#[tokio::test]
async fn encoded_separator_in_path_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.retrieve("..%2F..", "U1").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}
