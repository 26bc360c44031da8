use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use prediction_service::{router, AppState, HealthResponse, PredictionResponse};
use tower::ServiceExt;
use wine_core::artifacts::save_artifact;
use wine_core::{preprocess_records, AppConfig, LinearRegression, StandardScaler, WineRecord};

fn training_records() -> Vec<WineRecord> {
    (0..40)
        .map(|i| {
            let f = i as f64;
            WineRecord {
                wine_type: if i % 3 == 0 { "red".into() } else { "white".into() },
                fixed_acidity: 6.0 + (f * 0.3) % 3.0,
                volatile_acidity: 0.2 + (f * 0.37) % 0.5,
                citric_acid: 0.1 + (f * 0.11) % 0.4,
                residual_sugar: 1.0 + (f * f) % 17.0,
                chlorides: 0.03 + (f * 0.013) % 0.05,
                free_sulfur_dioxide: 10.0 + (f * 7.0) % 40.0,
                total_sulfur_dioxide: 80.0 + (f * 13.0) % 120.0,
                density: 0.99 + (f * 0.0007) % 0.01,
                ph: 3.0 + (f * 0.07) % 0.4,
                sulphates: 0.4 + (f * 0.05) % 0.3,
                alcohol: 9.0 + (f * 0.61) % 4.0,
            }
        })
        .collect()
}

fn expected_quality(record: &WineRecord) -> f64 { 1.0 + 0.5 * record.alcohol }

fn config_in(dir: &std::path::Path, cache: bool) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.paths.model_dir = dir.join("models");
    cfg.serving.model_version = "9.9.9".into();
    cfg.serving.cache_artifacts = cache;
    cfg
}

fn write_artifacts(cfg: &AppConfig) {
    let records = training_records();
    let targets: Vec<f64> = records.iter().map(expected_quality).collect();
    let (scaler, x) = StandardScaler::fit_transform(&preprocess_records(&records).unwrap()).unwrap();
    let model = LinearRegression::fit(&x, &targets).unwrap();
    save_artifact(&scaler, &cfg.scaler_path()).unwrap();
    save_artifact(&model, &cfg.model_path()).unwrap();
}

fn app(cfg: AppConfig) -> Router { router(AppState::new(cfg).unwrap()) }

async fn send(app: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
        req = req.header("content-type", "application/json");
    }
    let req = req.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn example_body() -> String { serde_json::to_string(&WineRecord::example()).unwrap() }

#[tokio::test]
async fn health_works_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(config_in(dir.path(), false));
    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.health_check, "OK");
    assert_eq!(health.model_version, "9.9.9");
}

#[tokio::test]
async fn predict_returns_created_with_score() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), false);
    write_artifacts(&cfg);
    let app = app(cfg);

    let (status, body) = send(&app, "POST", "/predict", Some(example_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let prediction: PredictionResponse = serde_json::from_slice(&body).unwrap();
    let expected = expected_quality(&WineRecord::example());
    assert!((prediction.quality_prediction - expected).abs() < 1e-6, "{} vs {expected}", prediction.quality_prediction);
}

#[tokio::test]
async fn request_body_uses_wire_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), false);
    write_artifacts(&cfg);
    let app = app(cfg);
    let body = r#"{"type":"red","fixed_acidity":7.4,"volatile_acidity":0.7,"citric_acid":0.0,"residual_sugar":1.9,
        "chlorides":0.076,"free_sulfur_dioxide":11.0,"total_sulfur_dioxide":34.0,"density":0.9978,"pH":3.51,
        "sulphates":0.56,"alcohol":9.4}"#;
    let (status, body) = send(&app, "POST", "/predict", Some(body.to_string())).await;
    assert_eq!(status, StatusCode::CREATED);
    let prediction: PredictionResponse = serde_json::from_slice(&body).unwrap();
    assert!((prediction.quality_prediction - 5.7).abs() < 1e-6);
}

#[tokio::test]
async fn missing_field_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(config_in(dir.path(), false));
    let mut value = serde_json::to_value(WineRecord::example()).unwrap();
    value.as_object_mut().unwrap().remove("alcohol");
    let (status, _) = send(&app, "POST", "/predict", Some(value.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "POST", "/predict", Some(r#"{"type": "red", "alcohol": "lots"}"#.into())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_artifacts_are_server_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(config_in(dir.path(), false));
    let (status, body) = send(&app, "POST", "/predict", Some(example_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(err["error"].as_str().unwrap().contains("artifact not found"));

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    let text = String::from_utf8(metrics).unwrap();
    assert!(text.contains("wine_predictions_total{outcome=\"error\"} 1"), "{text}");
}

#[tokio::test]
async fn artifacts_reload_per_request_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), false);
    write_artifacts(&cfg);
    let app = app(cfg.clone());

    assert_eq!(send(&app, "POST", "/predict", Some(example_body())).await.0, StatusCode::CREATED);
    std::fs::remove_file(cfg.model_path()).unwrap();
    assert_eq!(send(&app, "POST", "/predict", Some(example_body())).await.0, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cached_artifacts_survive_until_reload() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), true);
    write_artifacts(&cfg);
    let app = app(cfg.clone());

    assert_eq!(send(&app, "POST", "/predict", Some(example_body())).await.0, StatusCode::CREATED);
    std::fs::remove_file(cfg.model_path()).unwrap();
    assert_eq!(send(&app, "POST", "/predict", Some(example_body())).await.0, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap()["reloaded"], true);
    assert_eq!(send(&app, "POST", "/predict", Some(example_body())).await.0, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    let text = String::from_utf8(metrics).unwrap();
    assert!(text.contains("wine_artifact_loads_total 1"), "{text}");
}
