//! HttpGateway and ServerProvider against a local fake provider API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use parking_lot::Mutex;
use rk::credential::{Credential, StaticPrompt};
use rk::gateway::{HttpGateway, SessionGateway};
use rk::server::{ServerId, Tier};
use rk::{CredentialStore, ProviderConfig, ProviderError, ServerProvider};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

#[derive(Default)]
struct Fake {
	start_status: Mutex<Option<StatusCode>>,
	start_body: Mutex<Option<Value>>,
	start_delay: Mutex<Duration>,
	end_status: Mutex<Option<StatusCode>>,
	start_calls: AtomicUsize,
	end_calls: AtomicUsize,
	last_auth: Mutex<Option<String>>,
	last_body: Mutex<Option<Value>>,
}

impl Fake {
	fn respond_start(&self, status: StatusCode, body: Value) {
		*self.start_status.lock() = Some(status);
		*self.start_body.lock() = Some(body);
	}
}

async fn start(State(fake): State<Arc<Fake>>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
	fake.start_calls.fetch_add(1, Ordering::SeqCst);
	*fake.last_auth.lock() = headers.get("authorization").and_then(|v| v.to_str().ok()).map(String::from);
	*fake.last_body.lock() = Some(body);

	let delay = *fake.start_delay.lock();
	if !delay.is_zero() {
		tokio::time::sleep(delay).await;
	}

	let status = fake.start_status.lock().unwrap_or(StatusCode::OK);
	let body = fake
		.start_body
		.lock()
		.clone()
		.unwrap_or_else(|| json!({ "instance_ip": "10.1.2.3", "port": 8888, "token": "jupyter-token" }));
	(status, Json(body))
}

async fn end(State(fake): State<Arc<Fake>>, headers: HeaderMap) -> StatusCode {
	fake.end_calls.fetch_add(1, Ordering::SeqCst);
	*fake.last_auth.lock() = headers.get("authorization").and_then(|v| v.to_str().ok()).map(String::from);
	fake.end_status.lock().unwrap_or(StatusCode::OK)
}

async fn serve() -> (Arc<Fake>, String) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let fake = Arc::new(Fake::default());
	let app = Router::new()
		.route("/jupyter/start", post(start))
		.route("/jupyter/end", post(end))
		.with_state(fake.clone());

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(fake, format!("http://{addr}"))
}

fn gateway(endpoint: &str) -> HttpGateway {
	HttpGateway::new(&ProviderConfig::default().with_endpoint(endpoint)).unwrap()
}

fn credential() -> Credential {
	Credential::new("secret").unwrap()
}

fn t4() -> Tier {
	Tier::new("thunder-compute-t4", "T4", "t4")
}

#[tokio::test]
async fn start_sends_bearer_and_gpu_type() {
	let (fake, endpoint) = serve().await;
	let data = gateway(&endpoint).start_session(&credential(), &t4()).await.unwrap();

	assert_eq!(data.base_url.as_str(), "http://10.1.2.3:8888");
	assert_eq!(data.token, "jupyter-token");
	assert_eq!(fake.last_auth.lock().as_deref(), Some("Bearer secret"));
	assert_eq!(*fake.last_body.lock(), Some(json!({ "gpuType": "t4" })));
}

#[tokio::test]
async fn start_accepts_base_url() {
	let (fake, endpoint) = serve().await;
	fake.respond_start(StatusCode::OK, json!({ "baseUrl": "https://gpu.example.com/", "token": "t" }));

	let data = gateway(&endpoint).start_session(&credential(), &t4()).await.unwrap();
	assert_eq!(data.base_url.as_str(), "https://gpu.example.com");
}

#[tokio::test]
async fn start_status_codes_map_to_errors() {
	let cases = [
		(StatusCode::UNAUTHORIZED, ProviderError::Unauthorized),
		(StatusCode::PAYMENT_REQUIRED, ProviderError::BillingRequired),
		(StatusCode::BAD_REQUEST, ProviderError::BadRequest),
		(StatusCode::SERVICE_UNAVAILABLE, ProviderError::ResourceUnavailable),
		(StatusCode::INTERNAL_SERVER_ERROR, ProviderError::InternalProviderError),
		(StatusCode::IM_A_TEAPOT, ProviderError::UnknownProviderError { status: 418 }),
	];

	let (fake, endpoint) = serve().await;
	let gateway = gateway(&endpoint);
	for (status, expected) in cases {
		fake.respond_start(status, json!({ "error": "nope" }));
		let err = gateway.start_session(&credential(), &t4()).await.unwrap_err();
		assert_eq!(err, expected, "status {status}");
	}
}

#[tokio::test]
async fn start_without_location_is_malformed() {
	let (fake, endpoint) = serve().await;
	fake.respond_start(StatusCode::OK, json!({ "token": "t" }));

	let err = gateway(&endpoint).start_session(&credential(), &t4()).await.unwrap_err();
	assert!(matches!(err, ProviderError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn start_without_token_is_malformed() {
	let (fake, endpoint) = serve().await;
	fake.respond_start(StatusCode::OK, json!({ "baseUrl": "http://h:1" }));

	let err = gateway(&endpoint).start_session(&credential(), &t4()).await.unwrap_err();
	assert!(matches!(err, ProviderError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn slow_start_times_out() {
	let (fake, endpoint) = serve().await;
	*fake.start_delay.lock() = Duration::from_secs(5);
	let limit = Duration::from_millis(100);
	let gateway = HttpGateway::new(&ProviderConfig::default().with_endpoint(&endpoint).with_start_timeout(limit)).unwrap();

	let err = gateway.start_session(&credential(), &t4()).await.unwrap_err();
	assert_eq!(err, ProviderError::Timeout(limit));
}

#[tokio::test]
async fn end_status_codes_map_to_errors() {
	let (fake, endpoint) = serve().await;
	let gateway = gateway(&endpoint);

	gateway.end_session(&credential()).await.unwrap();
	assert_eq!(fake.last_auth.lock().as_deref(), Some("Bearer secret"));

	*fake.end_status.lock() = Some(StatusCode::NOT_FOUND);
	assert_eq!(gateway.end_session(&credential()).await.unwrap_err(), ProviderError::NoActiveSession);

	*fake.end_status.lock() = Some(StatusCode::UNAUTHORIZED);
	assert_eq!(gateway.end_session(&credential()).await.unwrap_err(), ProviderError::Unauthorized);

	*fake.end_status.lock() = Some(StatusCode::BAD_GATEWAY);
	assert_eq!(gateway.end_session(&credential()).await.unwrap_err(), ProviderError::InternalProviderError);
	assert_eq!(fake.end_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let err = gateway(&format!("http://{addr}")).end_session(&credential()).await.unwrap_err();
	assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn provider_resolves_once_and_cleans_up() {
	let (fake, endpoint) = serve().await;
	let dir = TempDir::new().unwrap();
	let config = ProviderConfig::default()
		.with_endpoint(&endpoint)
		.with_startup_grace(Duration::ZERO)
		.with_credential_path(dir.path().join("token"))
		.with_config_dir(dir.path());
	let prompt = Arc::new(StaticPrompt::answering("secret"));
	let credentials = Arc::new(CredentialStore::new(config.credential_path.clone(), prompt.clone()));
	let gateway = Arc::new(HttpGateway::new(&config).unwrap());
	let provider = ServerProvider::new(config, credentials, gateway).unwrap();

	let listed = provider.list_servers();
	assert_eq!(fake.start_calls.load(Ordering::SeqCst), 0);

	let server = listed.into_iter().next().unwrap();
	let (a, b) = tokio::join!(provider.resolve_server(server.clone()), provider.resolve_server(server));
	let (a, b) = (a.unwrap(), b.unwrap());
	assert_eq!(a, b);
	assert_eq!(a.id, ServerId::from("thunder-compute-t4"));
	assert_eq!(a.connection_info.unwrap().base_url().as_str(), "http://10.1.2.3:8888");
	assert_eq!(fake.start_calls.load(Ordering::SeqCst), 1);
	assert_eq!(prompt.asked(), 1);
	assert_eq!(std::fs::read_to_string(dir.path().join("token")).unwrap().trim(), "secret");

	provider.dispose().await;
	assert_eq!(fake.end_calls.load(Ordering::SeqCst), 1);
	assert!(provider.tracker().is_empty());
}
