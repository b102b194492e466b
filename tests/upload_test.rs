//! Integration tests for uploads into local storage

mod common;

use actix_web::dev::Service;
use actix_web::{http::StatusCode, test, web, App, HttpMessage};
use carmarket_admin::storage::{LocalStorage, StorageBackend};
use carmarket_admin::upload::{upload_file, UploadError, UploadPolicy};
use common::fixtures::admin;
use std::sync::Arc;

const BOUNDARY: &str = "----carmarket-test-boundary";

fn local(dir: &tempfile::TempDir) -> LocalStorage {
    LocalStorage::new(
        dir.path().to_path_buf(),
        "http://localhost:8080/uploads",
        "http://localhost:8080",
        "upload-test",
    )
    .expect("storage dir")
}

fn policy() -> UploadPolicy {
    UploadPolicy {
        max_size_mb: 1,
        allowed_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
    }
}

fn multipart(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {t}\r\n\r\n",
        b = BOUNDARY,
        f = filename,
        t = content_type
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[actix_rt::test]
async fn test_upload_lands_under_folder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = local(&dir);

    let stored = upload_file(
        &storage,
        &policy(),
        "damage-reports/17",
        "Rear Bumper.jpg",
        "image/jpeg",
        vec![0xFF, 0xD8, 0xFF],
    )
    .await
    .expect("upload succeeds");

    assert!(stored.path.starts_with("damage-reports/17/rear-bumper-"));
    assert_eq!(
        stored.url,
        format!("http://localhost:8080/uploads/{}", stored.path)
    );
    let on_disk = std::fs::read(dir.path().join(&stored.path)).expect("file written");
    assert_eq!(on_disk, vec![0xFF, 0xD8, 0xFF]);
}

#[actix_rt::test]
async fn test_rejected_files_never_reach_storage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = local(&dir);
    let policy = policy();

    let too_big = vec![0u8; policy.max_bytes() + 1];
    assert!(matches!(
        upload_file(&storage, &policy, "listings", "a.jpg", "image/jpeg", too_big).await,
        Err(UploadError::TooLarge { .. })
    ));
    assert!(matches!(
        upload_file(&storage, &policy, "listings", "a.gif", "image/gif", vec![1]).await,
        Err(UploadError::TypeNotAllowed(_))
    ));
    assert!(matches!(
        upload_file(&storage, &policy, "../etc", "a.jpg", "image/jpeg", vec![1]).await,
        Err(UploadError::InvalidFolder(_))
    ));

    assert!(storage.list("listings").await.expect("list").is_empty());
}

#[actix_rt::test]
async fn test_replacing_keeps_the_old_object() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = local(&dir);

    let first = upload_file(&storage, &policy(), "corporate/5", "id.png", "image/png", vec![1])
        .await
        .expect("first upload");
    let second = upload_file(&storage, &policy(), "corporate/5", "id.png", "image/png", vec![2])
        .await
        .expect("second upload");

    assert_ne!(first.path, second.path);
    assert_eq!(storage.list("corporate/5").await.expect("list").len(), 2);
}

#[actix_rt::test]
async fn test_upload_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage: Arc<dyn StorageBackend> = Arc::new(local(&dir));
    let acting = admin();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(policy()))
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(acting.clone());
                srv.call(req)
            })
            .configure(carmarket_admin::web::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/admin/api/uploads/listings/3")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart("side.jpg", "image/jpeg", b"jpeg-bytes"))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let files = body["files"].as_array().expect("files array");
    assert_eq!(files.len(), 1);
    let path = files[0]["path"].as_str().expect("path");
    assert!(path.starts_with("listings/3/side-"));
    assert_eq!(body["notices"][0]["level"], "success");
    assert!(dir.path().join(path).exists());

    let req = test::TestRequest::post()
        .uri("/admin/api/uploads/listings/3")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart("movie.mp4", "video/mp4", b"mp4"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["files"].as_array().map(Vec::is_empty).unwrap_or(false));
    assert_eq!(body["notices"][0]["level"], "error");
    assert_eq!(storage.list("listings/3").await.expect("list").len(), 1);
}

#[actix_rt::test]
async fn test_upload_requires_admin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage: Arc<dyn StorageBackend> = Arc::new(local(&dir));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(storage))
            .app_data(web::Data::new(policy()))
            .configure(carmarket_admin::web::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/admin/api/uploads/listings/3")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart("side.jpg", "image/jpeg", b"jpeg-bytes"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_malformed_multipart_is_a_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage: Arc<dyn StorageBackend> = Arc::new(local(&dir));
    let acting = admin();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(policy()))
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(acting.clone());
                srv.call(req)
            })
            .configure(carmarket_admin::web::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/admin/api/uploads/listings/3")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload("this body never opens with the declared boundary line\r\n")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = test::read_body(resp).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("Error interpreting user input."));
    assert!(!body.contains("No file was attached."));
    assert!(storage.list("listings/3").await.expect("list").is_empty());
}
