use super::*;
use axum::{body, body::Body, http::Request};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage, i64, i64, i64) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let organiser = storage.create_user("alice").await.expect("user");
    let helper = storage.create_user("bob").await.expect("user");
    let type_id = storage.create_event_type("Discussion").await.expect("type");

    let app = build_router(Arc::new(AppState {
        api: ApiContext {
            storage: storage.clone(),
        },
    }));
    (app, storage, organiser.0, helper.0, type_id.0)
}

fn event_body(type_id: i64) -> String {
    serde_json::json!({
        "name": "Board Games",
        "description": "An evening of board games.",
        "start": "2024-05-01 18:00",
        "end": "2024-05-01 20:00",
        "type_id": type_id,
    })
    .to_string()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _storage, _organiser, _helper, _type_id) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn login_upserts_and_returns_the_same_user_id() {
    let (app, _storage, _organiser, _helper, _type_id) = test_app().await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let request = Request::post("/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "display_name": "route-user" }).to_string(),
            ))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let dto: LoginResponse = serde_json::from_slice(&bytes).expect("json");
        ids.push(dto.user_id);
    }
    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
async fn create_join_and_list_flow_works_end_to_end() {
    let (app, _storage, organiser, helper, type_id) = test_app().await;

    let create_request = Request::post(format!("/events?user_id={organiser}"))
        .header("content-type", "application/json")
        .body(Body::from(event_body(type_id)))
        .expect("request");
    let create_response = app.clone().oneshot(create_request).await.expect("response");
    assert_eq!(create_response.status(), StatusCode::CREATED);
    let created: CreatedResponse =
        serde_json::from_value(json_body(create_response).await).expect("dto");

    let list_request = Request::get("/events").body(Body::empty()).expect("request");
    let list_response = app.clone().oneshot(list_request).await.expect("response");
    assert_eq!(list_response.status(), StatusCode::OK);
    let listed = json_body(list_response).await;
    assert_eq!(listed[0]["organiser_name"], "alice");
    assert_eq!(listed[0]["start"], "2024-05-01 18:00");

    let join_request = Request::post(format!(
        "/events/{}/join?user_id={helper}",
        created.event_id
    ))
    .body(Body::empty())
    .expect("request");
    let join_response = app.clone().oneshot(join_request).await.expect("response");
    assert_eq!(join_response.status(), StatusCode::NO_CONTENT);

    let joined_request = Request::get(format!("/events/joined?user_id={helper}"))
        .body(Body::empty())
        .expect("request");
    let joined_response = app.clone().oneshot(joined_request).await.expect("response");
    let joined = json_body(joined_response).await;
    assert_eq!(joined.as_array().expect("array").len(), 1);

    let leave_request = Request::post(format!(
        "/events/{}/leave?user_id={helper}",
        created.event_id
    ))
    .body(Body::empty())
    .expect("request");
    let leave_response = app.clone().oneshot(leave_request).await.expect("response");
    assert_eq!(leave_response.status(), StatusCode::NO_CONTENT);

    let releave_request = Request::post(format!(
        "/events/{}/leave?user_id={helper}",
        created.event_id
    ))
    .body(Body::empty())
    .expect("request");
    let releave_response = app.oneshot(releave_request).await.expect("response");
    assert_eq!(releave_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_create_echoes_the_form_with_field_errors() {
    let (app, _storage, organiser, _helper, type_id) = test_app().await;

    let body = serde_json::json!({
        "name": "Chat",
        "description": "An evening of board games.",
        "start": "2024-5-01 18:00",
        "end": "2024-05-01 20:00",
        "type_id": type_id,
    })
    .to_string();
    let request = Request::post(format!("/events?user_id={organiser}"))
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = json_body(response).await;
    let fields: Vec<_> = payload["error"]["field_errors"]
        .as_array()
        .expect("errors")
        .iter()
        .map(|e| e["field"].as_str().expect("field"))
        .collect();
    assert_eq!(fields, vec!["name", "start"]);
    assert_eq!(payload["form"]["name"], "Chat");
    assert!(payload["form"]["available_types"].as_array().is_some());
}

#[tokio::test]
async fn edit_by_non_organiser_is_forbidden() {
    let (app, _storage, organiser, helper, type_id) = test_app().await;

    let create_request = Request::post(format!("/events?user_id={organiser}"))
        .header("content-type", "application/json")
        .body(Body::from(event_body(type_id)))
        .expect("request");
    let create_response = app.clone().oneshot(create_request).await.expect("response");
    let created: CreatedResponse =
        serde_json::from_value(json_body(create_response).await).expect("dto");

    let edit_request = Request::put(format!(
        "/events/{}?user_id={helper}",
        created.event_id
    ))
    .header("content-type", "application/json")
    .body(Body::from(event_body(type_id)))
    .expect("request");
    let edit_response = app.oneshot(edit_request).await.expect("response");
    assert_eq!(edit_response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn details_of_unknown_event_is_not_found() {
    let (app, _storage, _organiser, _helper, _type_id) = test_app().await;
    let request = Request::get("/events/4040")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
