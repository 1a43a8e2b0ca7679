use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use crawler::CatalogClient;
use search_core::ports::Source;
use search_core::Error;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

async fn comic(Path(id): Path<u32>) -> Result<Json<Value>, StatusCode> {
    match id {
        1 => Ok(Json(json!({
            "num": 1,
            "img": "https://imgs.xkcd.com/comics/barrel_cropped_(1).jpg",
            "title": "Barrel - Part 1",
            "safe_title": "Barrel - Part 1",
            "alt": "Don't we all.",
            "transcript": "[[A boy sits in a barrel which is floating in an ocean.]]"
        }))),
        2 => Err(StatusCode::INTERNAL_SERVER_ERROR),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_catalog() -> String {
    let app = Router::new()
        .route("/info.0.json", get(|| async { Json(json!({ "num": 3, "title": "Latest" })) }))
        .route("/:id/info.0.json", get(comic));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test]
async fn reads_frontier_and_comics() {
    let base = serve_catalog().await;
    let client = CatalogClient::new(&base, Duration::from_secs(5)).unwrap();

    assert_eq!(client.frontier().await.unwrap(), 3);

    let doc = client.fetch(1).await.unwrap();
    assert_eq!(doc.id, 1);
    assert_eq!(doc.title, "Barrel - Part 1");
    assert!(doc.url.ends_with(".jpg"));
    assert!(doc.description.contains("barrel"));
    assert!(doc.description.contains("Don't we all."));
}

#[tokio::test]
async fn maps_missing_and_failing_comics() {
    let base = serve_catalog().await;
    let client = CatalogClient::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();

    assert!(matches!(client.fetch(3).await, Err(Error::NotFound(3))));
    let err = client.fetch(2).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert!(err.to_string().contains("500"));
}

#[test]
fn rejects_invalid_base_url() {
    assert!(CatalogClient::new("not a url", Duration::from_secs(1)).is_err());
}
