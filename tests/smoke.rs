// ABOUTME: End-to-end smoke test for the full docshare lifecycle over real SQLite and disk stores.
// ABOUTME: Covers share CRUD, password check, module tree, export, download, and stop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use docshare_core::testing::sample_definition;
use docshare_core::{ApiModule, ModuleNode};
use docshare_server::{AppState, DocshareConfig, create_router};
use docshare_store::{CatalogSeed, PluginScript, ProjectMember, SqliteCatalog};
use http::{Request, StatusCode};
use tower::ServiceExt;

fn test_config(home: std::path::PathBuf) -> DocshareConfig {
    DocshareConfig {
        home,
        bind: "127.0.0.1:0".parse().unwrap(),
        allow_remote: false,
        auth_token: None,
        default_protocol: "HTTP".to_string(),
        max_page_size: 500,
        export_retention: Duration::from_secs(3600),
    }
}

fn module(id: &str, protocol: &str, sort_order: i64) -> ApiModule {
    ApiModule {
        id: id.to_string(),
        project_id: "project-1".to_string(),
        name: format!("Module {}", id),
        parent_id: None,
        protocol: protocol.to_string(),
        sort_order,
    }
}

fn seed_catalog(config: &DocshareConfig) {
    std::fs::create_dir_all(&config.home).unwrap();
    let catalog = SqliteCatalog::open(&config.db_path(), "HTTP").unwrap();
    catalog
        .import(&CatalogSeed {
            modules: vec![module("a", "HTTP", 0), module("b", "TCP", 1)],
            definitions: vec![
                sample_definition("pets", Some("a"), "HTTP"),
                sample_definition("orders", Some("a"), "HTTP"),
                sample_definition("socket", Some("b"), "TCP"),
            ],
            scripts: vec![PluginScript {
                protocol: "TCP".to_string(),
                org_id: "org-1".to_string(),
                script: serde_json::json!({ "form": "tcp" }),
            }],
            members: vec![ProjectMember {
                project_id: "project-1".to_string(),
                user_id: "alice".to_string(),
            }],
        })
        .unwrap();
}

/// Helper to extract JSON body from a response.
async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

fn post(uri: &str, actor: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, actor: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path().join("home"));
    seed_catalog(&config);

    let state = Arc::new(AppState::open(&config).unwrap());
    let app = create_router(state, None);

    // Create a private, exportable share over modules a and b.
    let resp = send(
        &app,
        post(
            "/api/doc/share/add",
            Some("alice"),
            serde_json::json!({
                "project_id": "project-1",
                "name": "Public pets",
                "scope": { "range": "MODULES", "module_ids": ["a", "b"] },
                "password": "hunter2",
                "invalid_time": 2,
                "invalid_unit": "DAY",
                "allow_export": true
            }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let share = json_body(resp).await;
    let share_id = share["id"].as_str().unwrap().to_string();
    assert_eq!(share["is_private"], true);
    assert_eq!(share["invalid"], false);

    // It shows up in the project's page.
    let resp = send(
        &app,
        post(
            "/api/doc/share/page",
            Some("alice"),
            serde_json::json!({ "project_id": "project-1", "keyword": "pets" }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["list"][0]["id"], share_id.as_str());

    // Password gate.
    for (password, expected) in [("nope", false), ("hunter2", true)] {
        let resp = send(
            &app,
            post(
                "/api/doc/share/check",
                None,
                serde_json::json!({ "doc_share_id": share_id, "password": password }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, serde_json::json!(expected));
    }

    let resp = send(&app, get(&format!("/api/doc/share/detail/{}", share_id), None)).await;
    let detail = json_body(resp).await;
    assert_eq!(detail["allow_export"], true);
    assert!(!detail.to_string().contains("sha256"));

    // org-1 has the TCP plugin, org-2 only sees HTTP.
    let tree_body = |org_id: &str| {
        serde_json::json!({ "share_id": share_id, "project_id": "project-1", "org_id": org_id })
    };
    let resp = send(&app, post("/api/doc/share/module/tree", None, tree_body("org-1"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tree: Vec<ModuleNode> = serde_json::from_value(json_body(resp).await).unwrap();
    let ids: Vec<_> = tree.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let resp = send(&app, post("/api/doc/share/module/count", None, tree_body("org-2"))).await;
    let counts = json_body(resp).await;
    assert_eq!(counts, serde_json::json!({ "a": 2 }));

    // Export as markdown and wait for the worker.
    let resp = send(
        &app,
        post("/api/doc/share/export/markdown", Some("bob"), tree_body("org-1")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let task_id = json_body(resp).await.as_str().unwrap().to_string();

    let mut task = serde_json::Value::Null;
    for _ in 0..500 {
        let resp = send(
            &app,
            get(&format!("/api/doc/share/export/status/{}", task_id), Some("bob")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        task = json_body(resp).await;
        if task["status"] != "RUNNING" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(task["status"], "COMPLETED");
    assert_eq!(task["processed"], 3);

    // Another user cannot see the task or its file.
    let resp = send(
        &app,
        get(&format!("/api/doc/share/export/status/{}", task_id), Some("mallory")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(
        &app,
        get(
            &format!("/api/doc/share/download/file/project-1/{}", task_id),
            Some("mallory"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(
        &app,
        get(
            &format!("/api/doc/share/download/file/project-1/{}", task_id),
            Some("bob"),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"],
        "text/markdown; charset=utf-8"
    );
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# Public pets"));
    assert!(text.contains("/socket"));

    // Stopping a finished task is a no-op.
    let resp = send(&app, get(&format!("/api/doc/share/stop/{}", task_id), Some("bob"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["outcome"], "already_finished");

    // Viewer lookups.
    let resp = send(&app, get("/api/doc/share/get-detail/socket", None)).await;
    assert_eq!(json_body(resp).await["protocol"], "TCP");
    let resp = send(&app, get("/api/doc/share/plugin/script/socket/org-1", None)).await;
    assert_eq!(json_body(resp).await, serde_json::json!({ "form": "tcp" }));

    // Delete, then delete again.
    let uri = format!("/api/doc/share/delete/{}", share_id);
    let resp = send(&app, get(&uri, Some("bob"))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&app, get(&uri, Some("alice"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, get(&uri, Some("alice"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
