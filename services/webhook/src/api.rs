use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use coinhouse_execution::{narrative, AdminSet, CommandRouter, LedgerStore, RngSampler};
use coinhouse_types::{Interaction, InteractionKind, InteractionResponse};
use ed25519_dalek::VerifyingKey;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::ValidatedConfig;
use crate::signature;

/// Where each request's samples come from.
enum Sampling {
    Entropy,
    /// Per-request seeds drawn from one master stream.
    Seeded(Mutex<StdRng>),
}

impl Sampling {
    fn sampler(&self) -> RngSampler<StdRng> {
        match self {
            Sampling::Entropy => RngSampler::from_entropy(),
            Sampling::Seeded(master) => {
                let seed = master.lock().unwrap_or_else(|e| e.into_inner()).gen::<u64>();
                RngSampler::seeded(seed)
            }
        }
    }
}

pub struct AppState<S> {
    router: CommandRouter<S, AdminSet>,
    public_key: VerifyingKey,
    sampling: Sampling,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(store: S, config: &ValidatedConfig) -> Self {
        let sampling = match config.deterministic_seed {
            Some(seed) => Sampling::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
            None => Sampling::Entropy,
        };
        Self {
            router: CommandRouter::with_config(
                store,
                config.admins.clone(),
                config.engine.clone(),
            ),
            public_key: config.public_key,
            sampling,
        }
    }

    pub fn store(&self) -> &S {
        self.router.store()
    }
}

pub fn app<S: LedgerStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/interactions", post(interactions::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

async fn interactions<S: LedgerStore + 'static>(
    AxumState(state): AxumState<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = signature::verify_request(&state.public_key, &headers, &body) {
        debug!(%err, "rejected interaction signature");
        return error_response(StatusCode::UNAUTHORIZED, "invalid request signature");
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(err) => {
            debug!(%err, "malformed interaction");
            return error_response(StatusCode::BAD_REQUEST, "malformed interaction");
        }
    };

    match interaction.kind() {
        InteractionKind::Ping => Json(InteractionResponse::pong()).into_response(),
        InteractionKind::ApplicationCommand => {
            let invocation = match interaction.invocation() {
                Ok(invocation) => invocation,
                Err(err) => {
                    debug!(%err, "undecodable command");
                    return error_response(StatusCode::BAD_REQUEST, err.to_string());
                }
            };
            let mut rng = state.sampling.sampler();
            match state.router.resolve(&invocation, &mut rng).await {
                Ok(outcome) => Json(InteractionResponse::message(outcome.message)).into_response(),
                Err(err) => {
                    error!(?err, command = %invocation.name, "command failed");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, narrative::STORE_FAILURE)
                }
            }
        }
        InteractionKind::Unsupported(kind) => {
            debug!(kind, "unsupported interaction type");
            error_response(StatusCode::BAD_REQUEST, "unsupported interaction type")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use coinhouse_execution::mocks::FlakyLedger;
    use coinhouse_execution::{EngineConfig, Memory, RetryPolicy};
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TIMESTAMP: &str = "1700000000";

    fn signer() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn config() -> ValidatedConfig {
        ValidatedConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            ledger_path: None,
            log_level: tracing::Level::INFO,
            public_key: signer().verifying_key(),
            admins: AdminSet::new(["100"]),
            engine: EngineConfig {
                retry: RetryPolicy::none(),
                ..EngineConfig::default()
            },
            deterministic_seed: Some(7),
        }
    }

    fn signed(body: &Value) -> Request<Body> {
        let body = serde_json::to_vec(body).unwrap();
        let mut message = TIMESTAMP.as_bytes().to_vec();
        message.extend_from_slice(&body);
        let signature = hex::encode(signer().sign(&message).to_bytes());
        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header(signature::SIGNATURE_HEADER, signature)
            .header(signature::TIMESTAMP_HEADER, TIMESTAMP)
            .body(Body::from(body))
            .unwrap()
    }

    async fn send<S: LedgerStore + 'static>(
        state: &Arc<AppState<S>>,
        request: Request<Body>,
    ) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn memory_state() -> Arc<AppState<Memory>> {
        Arc::new(AppState::new(Memory::new(), &config()))
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let (status, body) = send(&memory_state(), signed(&json!({"type": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_command_returns_channel_message() {
        let state = memory_state();
        let (status, body) = send(
            &state,
            signed(&json!({
                "type": 2,
                "data": {"name": "balance"},
                "member": {"user": {"id": "42"}}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"type": 4, "data": {"content": "💰 <@42> has 1,000 coins."}})
        );
        assert_eq!(state.store().balance("42"), Some(1_000));
    }

    #[tokio::test]
    async fn test_rejections_are_still_messages() {
        let state = memory_state();
        let (status, body) = send(
            &state,
            signed(&json!({
                "type": 2,
                "data": {"name": "dance"},
                "user": {"id": "42"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], narrative::UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn test_bad_signature_never_reaches_router() {
        let state = memory_state();
        let mut request = signed(&json!({
            "type": 2,
            "data": {"name": "balance"},
            "user": {"id": "42"}
        }));
        request.headers_mut().insert(
            signature::TIMESTAMP_HEADER,
            "1700000001".parse().unwrap(),
        );
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.store().accounts(), 0);

        let unsigned = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();
        let (status, _) = send(&state, unsigned).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_types_are_bad_requests() {
        let state = memory_state();
        let (status, _) = send(&state, signed(&json!({"kind": "ping"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, signed(&json!({"type": 9}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, signed(&json!({"type": 2, "data": {"name": "balance"}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_fault_is_server_error() {
        let state = Arc::new(AppState::new(FlakyLedger::new(Memory::new()), &config()));
        state.store().fail_next(1);
        let (status, body) = send(
            &state,
            signed(&json!({
                "type": 2,
                "data": {"name": "balance"},
                "user": {"id": "42"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": narrative::STORE_FAILURE}));
    }

    #[tokio::test]
    async fn test_healthz() {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&memory_state(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_seeded_runs_are_reproducible() {
        let wager = json!({
            "type": 2,
            "data": {"name": "coinflip", "options": [{"name": "amount", "value": 10}]},
            "user": {"id": "42"}
        });
        let mut transcripts = Vec::new();
        for _ in 0..2 {
            let state = memory_state();
            let mut transcript = Vec::new();
            for _ in 0..5 {
                let (_, body) = send(&state, signed(&wager)).await;
                transcript.push(body);
            }
            transcripts.push(transcript);
        }
        assert_eq!(transcripts[0], transcripts[1]);
    }
}
