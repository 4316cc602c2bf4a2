//! Simple API exposing projects and tasks declared in `api.yaml`
//!
//! ```text
//! cargo run --example simple_api
//! curl -X POST localhost:3000/projects -H 'content-type: application/json' \
//!      -d '{"title": "Launch", "description": "Ship it"}'
//! curl 'localhost:3000/projects?include=tasks&append=summary'
//! ```

use resource::prelude::*;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = include_str!("api.yaml");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,resource=debug")),
        )
        .init();

    let config = ApiConfig::from_yaml_str(CONFIG)?;

    let project = EntityType::new("app::models::Project");
    let task = EntityType::new("app::models::Task");
    let store = InMemoryEntityStore::new()
        .with_timestamps()
        .has_many(&project, "tasks", task.clone(), "project_id")
        .belongs_to(&task, "project", project.clone(), "project_id");

    let store = store.appender(&project, "summary", |entity| {
        let description = entity
            .field("description")
            .and_then(|d| d.as_str().map(String::from))
            .unwrap_or_default();
        json!(description.chars().take(24).collect::<String>())
    });

    let seeded = store
        .create(
            &project,
            json!({"title": "Launch", "description": "Ship the first release", "status": "open"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
        .await?;
    store
        .create(
            &task,
            json!({"title": "Write changelog", "project_id": seeded.id, "done": false})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
        .await?;

    let authorizer = Arc::new(config.policy_authorizer());
    let mut serializers = SerializerRegistry::new();
    serializers.register(
        "app::resources::Task",
        FieldSerializer::new().hidden(["updated_at"]),
    );

    ServerBuilder::new()
        .with_principal_resolver(HeaderPrincipalResolver)
        .register_config(&config, Arc::new(store), authorizer, &serializers)?
        .serve("127.0.0.1:3000")
        .await
}
