#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App, HttpResponse};
use anonboard::repo::inmem::InMemRepo;
use anonboard::{config, AppState, SecurityHeaders, Settings};
use std::sync::Arc;

macro_rules! app_with {
    ($sec:expr) => {
        test::init_service(
            App::new()
                .wrap($sec)
                .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::ephemeral()))))
                .configure(config),
        )
        .await
    };
}

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    let settings = Settings::from_env();
    let app = app_with!(SecurityHeaders::default().with_hsts(settings.enable_hsts));
    let req = test::TestRequest::get().uri("/api/threads/general").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(headers.get("x-dns-prefetch-control").unwrap(), "off");
    assert_eq!(headers.get("referrer-policy").unwrap(), "same-origin");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
async fn test_headers_on_error_responses() {
    let app = app_with!(SecurityHeaders::default());
    let req = test::TestRequest::put()
        .uri("/api/threads/general")
        .set_json(serde_json::json!({ "report_id": "no-such-thread" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(test::read_body(resp).await, "Invalid Thread Id provided");
}

#[actix_web::test]
async fn test_hsts_enabled_via_builder() {
    let app = app_with!(SecurityHeaders::default().with_hsts(true));
    let req = test::TestRequest::get().uri("/api/threads/general").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_some(), "HSTS header missing");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts() {
    std::env::set_var("ENABLE_HSTS", "1");
    let settings = Settings::from_env();
    let app = app_with!(SecurityHeaders::default().with_hsts(settings.enable_hsts));
    let req = test::TestRequest::get().uri("/api/threads/general").to_request();
    let resp = test::call_service(&app, req).await;
    std::env::remove_var("ENABLE_HSTS");
    assert!(resp.headers().get("strict-transport-security").is_some());
}

#[actix_web::test]
async fn test_settings_lookup_controls_hsts() {
    let off = Settings::from_lookup(|k: &str| (k == "ENABLE_HSTS").then(|| "no".to_string()));
    let app = app_with!(SecurityHeaders::default().with_hsts(off.enable_hsts));
    let req = test::TestRequest::get().uri("/api/threads/general").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_none());

    let on = Settings::from_lookup(|k: &str| (k == "ENABLE_HSTS").then(|| "true".to_string()));
    let app = app_with!(SecurityHeaders::default().with_hsts(on.enable_hsts));
    let req = test::TestRequest::get().uri("/api/threads/general").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get("strict-transport-security").unwrap(),
        "max-age=63072000; includeSubDomains"
    );
}

#[actix_web::test]
async fn test_existing_header_preserved() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .route("/embeddable", web::get().to(|| async {
                HttpResponse::Ok()
                    .insert_header((actix_web::http::header::X_FRAME_OPTIONS, "DENY"))
                    .finish()
            })),
    )
    .await;
    let req = test::TestRequest::get().uri("/embeddable").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(resp.headers().get("referrer-policy").unwrap(), "same-origin");
}
