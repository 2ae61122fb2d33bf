use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{bookings, items, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(users::router())
        .merge(items::router())
        .merge(bookings::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use time::macros::datetime;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    use super::*;
    use crate::actor::USER_ID_HEADER;
    use crate::clock::FixedClock;

    const NOW: OffsetDateTime = datetime!(2026-10-01 12:00 UTC);

    fn app() -> Router {
        build_app(AppState::fake(Arc::new(FixedClock(NOW))))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        actor: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(id) = actor {
            req = req.header(USER_ID_HEADER, id.to_string());
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_user(app: &Router, name: &str) -> i64 {
        let (status, body) = call(
            app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": name, "email": format!("{name}@example.com")})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, _) = call(&app(), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn booking_flow_over_http() {
        let app = app();
        let owner = create_user(&app, "owner").await;
        let booker = create_user(&app, "booker").await;
        let stranger = create_user(&app, "stranger").await;

        let (status, item) = call(
            &app,
            Method::POST,
            "/items",
            Some(owner),
            Some(json!({"name": "Drill", "description": "Cordless", "available": true})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let item_id = item["id"].as_i64().unwrap();

        let (status, booking) = call(
            &app,
            Method::POST,
            "/bookings",
            Some(booker),
            Some(json!({
                "itemId": item_id,
                "start": "2026-10-02T10:00:00Z",
                "end": "2026-10-03T10:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(booking["status"], "WAITING");
        assert_eq!(booking["booker"]["id"], booker);
        let booking_id = booking["id"].as_i64().unwrap();

        let uri = format!("/bookings/{booking_id}?approved=true");
        let (status, body) = call(&app, Method::PATCH, &uri, Some(booker), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let (status, body) = call(&app, Method::PATCH, &uri, Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "APPROVED");

        let (status, _) = call(&app, Method::PATCH, &uri, Some(owner), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let get = format!("/bookings/{booking_id}");
        let (status, _) = call(&app, Method::GET, &get, Some(stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, list) =
            call(&app, Method::GET, "/bookings/owner?state=future", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, item) =
            call(&app, Method::GET, &format!("/items/{item_id}"), Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["nextBooking"]["id"], booking_id);
        assert_eq!(item["lastBooking"], Value::Null);

        let item_uri = format!("/items/{item_id}");
        let comment_uri = format!("{item_uri}/comment");
        let (status, _) = call(
            &app,
            Method::POST,
            &comment_uri,
            Some(booker),
            Some(json!({"text": "Great drill"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            Method::POST,
            "/bookings",
            Some(booker),
            Some(json!({
                "itemId": item_id,
                "start": "2026-09-20T10:00:00Z",
                "end": "2026-09-21T10:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, comment) = call(
            &app,
            Method::POST,
            &comment_uri,
            Some(booker),
            Some(json!({"text": "Great drill"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["text"], "Great drill");
        assert_eq!(comment["authorName"], "booker");

        let (status, _) = call(
            &app,
            Method::PUT,
            &item_uri,
            Some(stranger),
            Some(json!({"name": "Mine now"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, updated) = call(
            &app,
            Method::PATCH,
            &item_uri,
            Some(owner),
            Some(json!({"description": "Hammer drill"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], "Hammer drill");
        assert_eq!(updated["name"], "Drill");

        let (status, updated) = call(
            &app,
            Method::PUT,
            &item_uri,
            Some(owner),
            Some(json!({"name": "Drill v2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Drill v2");
        assert_eq!(updated["description"], "Hammer drill");

        let (status, owned) = call(&app, Method::GET, "/items", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let owned = owned.as_array().unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0]["nextBooking"]["id"], booking_id);
        assert_eq!(owned[0]["comments"][0]["text"], "Great drill");

        let (status, owned) = call(&app, Method::GET, "/items", Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(owned, json!([]));
    }

    #[tokio::test]
    async fn rejects_bad_requests() {
        let app = app();
        let user = create_user(&app, "someone").await;

        let (status, _) = call(&app, Method::GET, "/bookings", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            call(&app, Method::GET, "/bookings?state=SOMETIMES", Some(user), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unknown state: SOMETIMES");

        let (status, _) = call(&app, Method::GET, "/bookings", Some(9999), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&app, Method::PATCH, "/bookings?approved=true", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::GET, "/items/search?text=", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "dup", "email": "SOMEONE@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
