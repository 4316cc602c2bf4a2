//! Tests of APIs assembled from a YAML configuration file

use axum::http::StatusCode;
use axum_test::TestServer;
use resource::prelude::*;

const API_YAML: &str = r#"
pagination:
  items: 2
  max_items: 3
default_policy: public
resources:
  - handler: ProjectApiController
    allowed_filters:
      - name: status
        kind: exact
    allowed_sorts: [title]
    default_sorts: [title]
    authorize_abilities: [viewAny, view, store, update, destroy]
    policies:
      destroy: deny
    validation_rules:
      title: required|string|max:20
      status: sometimes|in:open,closed
      update:
        title: sometimes|required|string|max:20
  - handler: TaskApiController
    endpoint: todo-items
    model_name: todo
    allowed_filters:
      - name: project
        field: project_id
        kind: exact
    validation_rules:
      title: required|string
      project_id: required|integer
"#;

fn load_config() -> ApiConfig {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("api.yaml");
    std::fs::write(&path, API_YAML).expect("Failed to write config");
    ApiConfig::from_yaml_file(&path).expect("Failed to load config")
}

fn create_test_server() -> TestServer {
    let config = load_config();
    let serializers = SerializerRegistry::new().with_fallback(FieldSerializer::new().hidden(["updated_at"]));

    let app = ServerBuilder::new()
        .register_config(
            &config,
            Arc::new(InMemoryEntityStore::new().with_timestamps()),
            Arc::new(config.policy_authorizer()),
            &serializers,
        )
        .expect("Failed to register resources")
        .build()
        .expect("Failed to build app");

    TestServer::try_new(app).expect("Failed to create test server")
}

// =============================================================================
// Registration Tests
// =============================================================================

mod registration_tests {
    use super::*;

    #[test]
    fn test_every_resource_is_registered() {
        let config = load_config();
        let builder = ServerBuilder::new()
            .register_config(
                &config,
                Arc::new(InMemoryEntityStore::new()),
                Arc::new(AllowAll),
                &SerializerRegistry::new(),
            )
            .unwrap();

        assert_eq!(builder.registry().endpoints(), vec!["projects", "todo-items"]);
    }

    #[test]
    fn test_empty_config_cannot_build() {
        let builder = ServerBuilder::new()
            .register_config(
                &ApiConfig::default(),
                Arc::new(InMemoryEntityStore::new()),
                Arc::new(AllowAll),
                &SerializerRegistry::new(),
            )
            .unwrap();
        assert!(builder.build().is_err());
    }

    #[tokio::test]
    async fn test_overridden_endpoint_and_model_name() {
        let server = create_test_server();

        let response = server
            .post("/todo-items")
            .json(&json!({"title": "Write", "project_id": 1}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["_model"], json!({"endpoint": "todo-items", "name": "todo"}));
        assert!(body.get("updated_at").is_none());
        assert!(body.get("created_at").is_some());
    }
}

// =============================================================================
// Configured Behavior Tests
// =============================================================================

mod configured_behavior_tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_page_size_and_cap() {
        let server = create_test_server();
        for title in ["D", "B", "A", "C"] {
            server
                .post("/projects")
                .json(&json!({"title": title}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let body: Value = server.get("/projects").await.json();
        assert_eq!(body["meta"]["per_page"], 2);
        assert_eq!(body["data"][0]["title"], "A");
        assert_eq!(body["data"][1]["title"], "B");

        let body: Value = server
            .get("/projects")
            .add_query_param("per_page", "50")
            .await
            .json();
        assert_eq!(body["meta"]["per_page"], 3);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_filter_on_mapped_field() {
        let server = create_test_server();
        for project_id in [1, 2, 1] {
            server
                .post("/todo-items")
                .json(&json!({"title": "T", "project_id": project_id}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let body: Value = server
            .get("/todo-items")
            .add_query_param("filter[project]", "1")
            .await
            .json();
        assert_eq!(body["meta"]["total"], 2);
    }

    #[tokio::test]
    async fn test_configured_policy_denies_destroy() {
        let server = create_test_server();
        let response = server.post("/projects").json(&json!({"title": "Keep"})).await;
        let id = response.json::<Value>()["id"].as_u64().unwrap();

        server
            .delete(&format!("/projects/{}", id))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get(&format!("/projects/{}", id))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_configured_rules() {
        let server = create_test_server();

        let response = server
            .post("/projects")
            .json(&json!({"title": "a title that is far too long"}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.json::<Value>()["message"]["title"].is_array());
    }
}

// =============================================================================
// Conformance Suite Tests
// =============================================================================

mod conformance_suite_tests {
    use super::*;

    #[tokio::test]
    async fn test_project_resource_conforms() {
        let config = load_config();
        let app = ServerBuilder::new()
            .register_config(
                &config,
                Arc::new(InMemoryEntityStore::new()),
                Arc::new(AllowAll),
                &SerializerRegistry::new(),
            )
            .unwrap()
            .build()
            .unwrap();

        ResourceTestSuite::new(app, "projects")
            .run(&json!({"title": "A", "status": "open"}), &json!({"title": "C"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_suite_reports_a_failing_destroy() {
        // the configured policy forbids destroy, so the suite must not pass
        let suite = ResourceTestSuite::new(create_test_server_router(), "projects");
        let result = suite
            .run(&json!({"title": "A"}), &json!({"title": "C"}))
            .await;

        let error = result.unwrap_err().to_string();
        assert!(error.contains("destroy"), "{}", error);
    }

    #[tokio::test]
    async fn test_suite_reports_a_failing_store() {
        let suite = ResourceTestSuite::new(create_test_server_router(), "projects");
        let error = suite.assert_store(&json!({})).await.unwrap_err().to_string();
        assert!(error.contains("422"), "{}", error);
    }

    fn create_test_server_router() -> Router {
        let config = load_config();
        ServerBuilder::new()
            .register_config(
                &config,
                Arc::new(InMemoryEntityStore::new()),
                Arc::new(config.policy_authorizer()),
                &SerializerRegistry::new(),
            )
            .unwrap()
            .build()
            .unwrap()
    }
}
