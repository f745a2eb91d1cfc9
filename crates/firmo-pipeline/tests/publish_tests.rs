//! Artifact publishing tests over a temporary dbt target directory

#![allow(clippy::unwrap_used, clippy::expect_used)]

use firmo_pipeline::error::PipelineError;
use firmo_pipeline::publish::{ArtifactPublisher, PublishConfig};
use firmo_pipeline::storage::MemoryStore;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const INVOCATION_ID: &str = "3f1f6a2c-8f9d-4b8e-a6a4-0c5b2d7e9a10";

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn target_dir(run_results: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "run_results.json", run_results);
    write(dir.path(), "manifest.json", r#"{"nodes":{}}"#);
    write(dir.path(), "catalog.json", r#"{"nodes":{}}"#);
    write(dir.path(), "index.html", "<html><body>docs</body></html>");
    write(dir.path(), "assets/site.css", "body { margin: 0 }");
    write(dir.path(), "assets/app.js", "console.log('docs')");
    write(dir.path(), "graph.gpickle", "binary");
    write(dir.path(), "compiled/firmographics/models/core/dim_company.sql", "select 1");
    write(dir.path(), "partial_parse.msgpack", "binary");
    dir
}

fn publisher(store: &MemoryStore) -> ArtifactPublisher {
    ArtifactPublisher::new(Arc::new(store.clone()), PublishConfig::default())
}

#[tokio::test]
async fn test_publish_uploads_artifacts_and_docs() {
    let dir = target_dir(&format!(
        r#"{{"metadata":{{"invocation_id":"{}"}},"results":[]}}"#,
        INVOCATION_ID
    ));
    let store = MemoryStore::new("landing");

    let report = publisher(&store).publish(dir.path()).await.unwrap();

    assert_eq!(report.invocation_id.as_str(), INVOCATION_ID);
    assert_eq!(report.artifacts.len(), 2);

    let keys = store.keys();
    for expected in [
        format!("dbt_artifacts/{}/manifest.json", INVOCATION_ID),
        format!("dbt_artifacts/{}/run_results.json", INVOCATION_ID),
        format!("dbt_docs/{}/index.html", INVOCATION_ID),
        format!("dbt_docs/{}/assets/site.css", INVOCATION_ID),
        format!("dbt_docs/{}/assets/app.js", INVOCATION_ID),
        format!("dbt_docs/{}/catalog.json", INVOCATION_ID),
    ] {
        assert!(keys.contains(&expected), "missing {}", expected);
    }

    let docs: Vec<&String> = keys.iter().filter(|k| k.starts_with("dbt_docs/")).collect();
    assert_eq!(docs.len(), report.docs.len());
    assert!(docs.iter().all(|k| !k.ends_with(".gpickle")
        && !k.ends_with(".sql")
        && !k.ends_with(".msgpack")));

    let page = store
        .object(&format!("dbt_docs/{}/index.html", INVOCATION_ID))
        .unwrap();
    assert_eq!(page.data, b"<html><body>docs</body></html>");
    assert_eq!(page.content_type.as_deref(), Some("text/html"));
}

#[tokio::test]
async fn test_missing_invocation_id_uploads_nothing() {
    let dir = target_dir(r#"{"metadata":{"dbt_version":"1.9.0"},"results":[]}"#);
    let store = MemoryStore::new("landing");

    let err = publisher(&store).publish(dir.path()).await.unwrap_err();

    assert!(matches!(err, PipelineError::MissingInvocationId { .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_non_string_invocation_id_uploads_nothing() {
    let dir = target_dir(r#"{"metadata":{"invocation_id":42}}"#);
    let store = MemoryStore::new("landing");

    let err = publisher(&store).publish(dir.path()).await.unwrap_err();

    assert!(matches!(err, PipelineError::MissingInvocationId { .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_missing_run_results_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new("landing");

    let err = publisher(&store).publish(dir.path()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Io(_)));
    assert!(store.is_empty());
}
