//! HTTP tests for the grid routes, using in-memory sessions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use datagrid::GridSet;
use datagrid_server::{AppState, app, session};
use datagrid_test_utils::{assert, filters};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const GRIDS: &str = r#"
routes:
  person: /people/view
grids:
  - name: people
    default_sort: "id asc"
    source:
      type: array
      rows:
        - { id: 1, first_name: Ada, last_name: Lovelace, city: London }
        - { id: 2, first_name: Grace, last_name: Hopper, city: New York }
        - { id: 3, first_name: Alan, last_name: Turing, city: London }
        - { id: 4, first_name: Edsger, last_name: Dijkstra, city: Rotterdam }
        - { id: 5, first_name: Barbara, last_name: Liskov, city: Boston }
        - { id: 6, first_name: Donald, last_name: Knuth, city: Milwaukee }
        - { id: 7, first_name: John, last_name: Backus, city: Philadelphia }
        - { id: 8, first_name: Niklaus, last_name: Wirth, city: Winterthur }
        - { id: 9, first_name: Frances, last_name: Allen, city: Peru }
        - { id: 10, first_name: Ken, last_name: Thompson, city: New Orleans }
        - { id: 11, first_name: Dennis, last_name: Ritchie, city: Bronxville }
    columns:
      - name: id
        hidden: true
      - name: name
        label: Name
        format: concat
        identifiers: [first_name, last_name]
        priority: 10
      - name: city
      - name: view
        format: buttons
        buttons:
          - type: route
            label: View
            route: person
            params: { id: "%id%" }
  - name: empty
    source: { type: array }
    columns: [{ name: id }]
"#;

fn test_app() -> Router {
    let set = GridSet::from_yaml(GRIDS).unwrap();
    app(AppState::from_parts(set, None), session::memory_session_layer())
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(response: &Response) -> String {
    let value = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    value.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn health_without_database() {
    let response = test_app().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert::json_eq(
        &body,
        &json!({"status": "healthy", "postgres": null, "grids": 2}),
    );
}

#[tokio::test]
async fn grids_are_listed_with_column_model() {
    let response = test_app().oneshot(get("/grids", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body[0]["name"], "empty");
    assert_eq!(body[1]["name"], "people");
    assert_eq!(body[1]["rows"], 20);
    assert_eq!(body[1]["row_list"], json!([10, 20, 50, 100]));

    let columns = &body[1]["columns"];
    assert_eq!(columns[0]["name"], "name");
    assert_eq!(columns[0]["label"], "Name");
    assert_eq!(columns[0]["format"], "concat");
    assert_eq!(columns[1]["name"], "id");
    assert_eq!(columns[1]["hidden"], true);
    assert_eq!(columns[1]["sortable"], false);
    assert_eq!(columns[3]["searchable"], false);
}

#[tokio::test]
async fn grid_page_payload() {
    let response = test_app()
        .oneshot(get("/grid/people?rows=10&page=2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert::json_eq(
        &body,
        &json!({
            "page": 2,
            "total": 2,
            "records": 11,
            "rows": [{
                "id": 11,
                "cell": [
                    "Dennis Ritchie",
                    11,
                    "Bronxville",
                    "<a href=\"/people/view?id=11\">View</a>"
                ]
            }]
        }),
    );
}

#[tokio::test]
async fn grid_filters_from_query_string() {
    let encoded = urlencoding::encode(&filters("OR", &[("city", "bw", "new")])).into_owned();
    let response = test_app()
        .oneshot(get(
            &format!("/grid/people?_search=true&filters={encoded}&sidx=name&sord=desc"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["records"], 2);
    assert_eq!(
        assert::column(&body, 0),
        vec![json!("Ken Thompson"), json!("Grace Hopper")]
    );
}

#[tokio::test]
async fn unknown_grid_is_not_found() {
    let response = test_app()
        .oneshot(get("/grid/nope", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_filters_are_a_bad_request() {
    let response = test_app()
        .oneshot(get("/grid/people?filters=%7Bnot-json", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("malformed filters payload"));
}

#[tokio::test]
async fn unknown_operator_is_a_bad_request() {
    let encoded = urlencoding::encode(&filters("AND", &[("city", "zz", "x")])).into_owned();
    let response = test_app()
        .oneshot(get(&format!("/grid/people?filters={encoded}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn parameters_persist_in_the_session() {
    let app = test_app();

    let first = app
        .clone()
        .oneshot(get("/grid/people?rows=10&page=2", None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = session_cookie(&first);

    // Same session, no parameters: page 2 again.
    let resumed = app
        .clone()
        .oneshot(get("/grid/people", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(resumed).await;
    assert_eq!(body["page"], 2);
    assert_eq!(assert::ids(&body), vec![json!(11)]);

    // A fresh session starts from the defaults.
    let fresh = app
        .clone()
        .oneshot(get("/grid/people", None))
        .await
        .unwrap();
    let body = body_json(fresh).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["rows"].as_array().unwrap().len(), 11);

    // Reset forgets the stored parameters.
    let reset = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/grid/people/reset")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::NO_CONTENT);

    let after = app
        .oneshot(get("/grid/people", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(after).await;
    assert_eq!(body["page"], 1);
}
