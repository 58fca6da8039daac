//! HTTP routes end to end, against an in-memory catalog and the baseline
//! engine.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use automl_core::{
    AutoMlEngine, BaselineEngine, Features, FitRequest, FittedModel, Metrics, PipelineDescription,
    Prediction, ReplacePolicy, Table, TaskKind,
};
use automl_state::{Catalog, Dataset, MemoryCatalog, MlModel, PredictTask};
use automld::settings::StorageSettings;
use automld::{router, AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct TestApp {
    app: Router,
    catalog: Arc<MemoryCatalog>,
    root: TempDir,
}

fn write_iris(datasets_root: &Path) {
    let dir = datasets_root.join("iris");
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(
        dir.join("config.yaml"),
        "task: classification\ntrain_dataset: data/train.csv\ntarget_columns: [species]\nindex_col: id\n",
    )
    .unwrap();
    let mut csv = String::from("id,petal,sepal,species\n");
    for i in 0..60 {
        let (base, label) = if i % 2 == 0 { (1.0, "setosa") } else { (5.0, "virginica") };
        let wobble = (i % 5) as f64 * 0.1;
        csv.push_str(&format!("{i},{},{},{label}\n", base + wobble, base * 2.0 - wobble));
    }
    fs::write(dir.join("data").join("train.csv"), csv).unwrap();
}

async fn test_app() -> TestApp {
    test_app_with(ReplacePolicy::Best, Arc::new(BaselineEngine::new())).await
}

async fn test_app_with(policy: ReplacePolicy, engine: Arc<dyn AutoMlEngine>) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let storage = StorageSettings {
        datasets_root: root.path().join("datasets"),
        weights_root: root.path().join("weights"),
        replace_policy: policy,
    };
    write_iris(&storage.datasets_root);

    let catalog = Arc::new(MemoryCatalog::new());
    for name in ["classification", "regression"] {
        catalog
            .predict_tasks()
            .create(PredictTask {
                id: 0,
                name: name.into(),
            })
            .await
            .unwrap();
    }
    catalog
        .datasets()
        .create(Dataset {
            id: 0,
            name: "iris".into(),
            title: Some("Iris flowers".into()),
            task_id: 1,
            target_column: "species".into(),
            index_column: Some("id".into()),
        })
        .await
        .unwrap();

    let state = Arc::new(AppState::new(&storage, catalog.clone(), engine));
    TestApp {
        app: router(state, "/api"),
        catalog,
        root,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_csv(uri: &str, csv: &'static str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv))
        .unwrap()
}

/// Counters shared between [`SlowEngine`] and the test body.
#[derive(Default)]
struct FitGauge {
    active: AtomicUsize,
    max_active: AtomicUsize,
    saving: AtomicBool,
}

/// Baseline engine that stalls inside `fit` and `save`.
struct SlowEngine {
    inner: BaselineEngine,
    fit_delay: Duration,
    save_delay: Duration,
    gauge: Arc<FitGauge>,
}

impl SlowEngine {
    fn new(fit_delay: Duration, save_delay: Duration) -> Self {
        Self {
            inner: BaselineEngine::new(),
            fit_delay,
            save_delay,
            gauge: Arc::default(),
        }
    }
}

impl AutoMlEngine for SlowEngine {
    fn fit(&self, request: &FitRequest<'_>) -> automl_core::Result<Box<dyn FittedModel>> {
        let now = self.gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.fit_delay);
        let fitted = self.inner.fit(request);
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Box::new(SlowModel {
            inner: fitted?,
            save_delay: self.save_delay,
            gauge: self.gauge.clone(),
        }))
    }

    fn load(&self, task: TaskKind, dir: &Path) -> automl_core::Result<Box<dyn FittedModel>> {
        self.inner.load(task, dir)
    }
}

struct SlowModel {
    inner: Box<dyn FittedModel>,
    save_delay: Duration,
    gauge: Arc<FitGauge>,
}

impl FittedModel for SlowModel {
    fn describe(&self) -> PipelineDescription {
        self.inner.describe()
    }

    fn get_metrics(&self, names: &[&str]) -> automl_core::Result<Metrics> {
        self.inner.get_metrics(names)
    }

    fn prepare(&self, data: &Table) -> automl_core::Result<Features> {
        self.inner.prepare(data)
    }

    fn predict(&self, features: &Features) -> automl_core::Result<Vec<Prediction>> {
        self.inner.predict(features)
    }

    /// Leaves the swapped-in directory empty for `save_delay` first.
    fn save(&self, dir: &Path) -> automl_core::Result<()> {
        self.gauge.saving.store(true, Ordering::SeqCst);
        std::thread::sleep(self.save_delay);
        let result = self.inner.save(dir);
        self.gauge.saving.store(false, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// Health and catalog
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_answers_get_and_head() {
    let t = test_app().await;

    let (status, body) = send(&t.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["info"]["catalog"], "ok");
    assert_eq!(body["info"]["artifacts"], 0);
    assert!(body["info"]["version"].is_string());

    let head = Request::builder()
        .method(Method::HEAD)
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&t.app, head).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn catalog_listings_and_lookups() {
    let t = test_app().await;

    let (status, body) = send(&t.app, get("/api/datasets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "iris");

    let (status, body) = send(&t.app, get("/api/tasks/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "regression");

    let (status, body) = send(&t.app, get("/api/datasets/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("99"));

    let (status, body) = send(&t.app, get("/api/mlmodels")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// ---------------------------------------------------------------------------
// Train, inspect, predict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn train_records_model_then_predicts() {
    let t = test_app().await;

    let (status, outcome) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["saved"], true);
    assert!(outcome["metrics"]["roc_auc"].is_number());
    assert!(t.root.path().join("weights/iris/metrics.yaml").is_file());

    let models = t.catalog.mlmodels().get_all(&[]).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "iris");
    assert_eq!(models[0].dataset_id, 1);
    let model_id = models[0].id;

    let (status, metrics) = send(&t.app, get(&format!("/api/mlmodels/{model_id}/metrics"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics, outcome["metrics"]);

    let (status, body) = send(
        &t.app,
        post_csv(
            &format!("/api/mlmodels/{model_id}/predict"),
            "id,petal,sepal\n1000,1.1,1.9\n1001,5.2,9.8\n",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["mlmodel"], model_id);
    assert_eq!(body["predictions"], json!(["setosa", "virginica"]));
    assert!(body["predicted_at"].is_string());

    // Same data, same seed: nothing better to save, record untouched.
    let (status, again) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["saved"], false);
    assert_eq!(t.catalog.mlmodels().get_all(&[]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn train_rejects_bad_budget_and_unknown_dataset() {
    let t = test_app().await;

    let (status, body) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": -1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("time budget"));
    assert!(!t.root.path().join("weights/iris").exists());

    let (status, _) = send(&t.app, post_json("/api/datasets/7/train", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn predict_error_statuses() {
    let t = test_app().await;

    let (status, _) = send(&t.app, post_csv("/api/mlmodels/5/predict", "a\n1\n")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A record whose weights were never written.
    t.catalog
        .mlmodels()
        .create(MlModel {
            id: 0,
            name: "ghost".into(),
            title: None,
            description: None,
            dataset_id: 1,
            trained_at: Utc::now(),
        })
        .await
        .unwrap();
    let (status, _) = send(&t.app, post_csv("/api/mlmodels/1/predict", "petal\n1\n")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&t.app, get("/api/mlmodels/1/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let iris = t.catalog.mlmodels().get_all(&[]).await.unwrap();
    let iris_id = iris.iter().find(|m| m.name == "iris").unwrap().id;

    let (status, body) = send(&t.app, post_csv(&format!("/api/mlmodels/{iris_id}/predict"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = send(
        &t.app,
        post_csv(&format!("/api/mlmodels/{iris_id}/predict"), "id,petal,sepal\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        post_csv(&format!("/api/mlmodels/{iris_id}/predict"), "colour\nred\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Per-dataset locking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_train_request_keeps_dataset_locked() {
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(400), Duration::ZERO));
    let gauge = engine.gauge.clone();
    let t = test_app_with(ReplacePolicy::Best, engine).await;

    // Client gives up long before the cycle ends; the handler future is dropped.
    let first = tokio::time::timeout(
        Duration::from_millis(100),
        send(
            &t.app,
            post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
        ),
    )
    .await;
    assert!(first.is_err());

    let (status, body) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(gauge.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn predict_waits_for_running_swap() {
    let engine = Arc::new(SlowEngine::new(Duration::ZERO, Duration::from_millis(300)));
    let gauge = engine.gauge.clone();
    let t = test_app_with(ReplacePolicy::Last, engine).await;

    let (status, _) = send(
        &t.app,
        post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let model_id = t.catalog.mlmodels().get_all(&[]).await.unwrap()[0].id;

    // Retrain under `last`: the swap always runs and stalls with an empty directory.
    let app = t.app.clone();
    let retrain = tokio::spawn(async move {
        send(
            &app,
            post_json("/api/datasets/1/train", json!({"time_limit": 0.02})),
        )
        .await
    });
    for _ in 0..400 {
        if gauge.saving.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(gauge.saving.load(Ordering::SeqCst), "swap never started");

    let (status, body) = send(
        &t.app,
        post_csv(
            &format!("/api/mlmodels/{model_id}/predict"),
            "id,petal,sepal\n1000,1.1,1.9\n1001,5.2,9.8\n",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["predictions"], json!(["setosa", "virginica"]));
    assert!(!gauge.saving.load(Ordering::SeqCst));

    let (status, metrics) = send(&t.app, get(&format!("/api/mlmodels/{model_id}/metrics"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics["roc_auc"].is_number());

    let (status, outcome) = retrain.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["saved"], true);
}
