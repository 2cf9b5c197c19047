//! JSON-lines RPC surface
//!
//! One request per line, `{"id": .., "method": .., "params": ..}`, answered by one response line
//! carrying the same id. Settlements of queued requests arrive later as `settled` or `rejected`
//! notifications, interleaved with the `popup` and `icon` notifications of the orchestrator.
//!
//! Methods: `add`, `complete`, `reset`, `counts` and `snapshot`. Every reply of a `complete`
//! call is handled on its own; the ones that could not be applied are listed under `failed`
//! with the id they carried.

use confirm_engine::{
    AccountSigning, AuthorizeKind, CompletionReport, ConfirmationKind, ConfirmationReply, Error,
    Family, FamilyName, PresentationOptions, RequestOrchestrator, Route, SessionKind, SigningKind,
    SiteAuthorization, TransactionBroadcast, TransactionKind, WalletSession,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Type tag of any family
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum AnyKind {
    Signing(SigningKind),
    Transaction(TransactionKind),
    Authorize(AuthorizeKind),
    Session(SessionKind),
}

#[derive(Debug, Deserialize)]
struct AddParams {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "type")]
    kind: AnyKind,
    payload: Value,
    #[serde(default)]
    options: PresentationOptions,
}

#[derive(Debug, Deserialize)]
struct SnapshotParams {
    family: FamilyName,
}

#[derive(Debug, Serialize)]
struct FailedReply {
    id: Value,
    code: &'static str,
    message: String,
}

#[derive(Debug, Default, Serialize)]
struct CompleteOutcome {
    resolved: usize,
    rejected: usize,
    failed: Vec<FailedReply>,
}

impl CompleteOutcome {
    fn fail(&mut self, reply: &Value, err: &Error) {
        let id = reply.get("id").cloned().unwrap_or_default();
        tracing::debug!("Reply {} not applied: {}", id, err);
        self.failed.push(FailedReply {
            id,
            code: error_code(err),
            message: err.to_string(),
        });
    }

    fn add(&mut self, report: CompletionReport) {
        self.resolved += report.resolved;
        self.rejected += report.rejected;
    }
}

/// Stable code of an error, for hosts that branch on the failure
pub fn error_code(err: &Error) -> &'static str {
    match err {
        Error::DuplicateRequest { .. } => "duplicate_request",
        Error::DuplicateId(_) => "duplicate_id",
        Error::NotFound(_) => "not_found",
        Error::ValidationFailed(_) => "validation_failed",
        Error::WalletReset => "wallet_reset",
        Error::UserRejected => "user_rejected",
        Error::MissingPayload(_) | Error::Decoration(_) => "decoration_failed",
        Error::Serde(_) => "invalid_params",
        _ => "internal",
    }
}

fn error_response(id: Value, err: &Error) -> Value {
    json!({
        "id": id,
        "error": { "code": error_code(err), "message": err.to_string() },
    })
}

/// Serves RPC lines against an orchestrator
#[derive(Debug)]
pub struct Daemon {
    orchestrator: RequestOrchestrator,
    output: mpsc::UnboundedSender<Value>,
}

impl Daemon {
    /// Notifications are written to `output`
    pub fn new(orchestrator: RequestOrchestrator, output: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            orchestrator,
            output,
        }
    }

    /// Orchestrator served by this daemon
    pub fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }

    /// Handle one request line and build its response
    pub async fn handle_line(&self, line: &str) -> Value {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => return error_response(Value::Null, &Error::from(err)),
        };

        match self.dispatch(&request.method, request.params).await {
            Ok(result) => json!({ "id": request.id, "result": result }),
            Err(err) => {
                tracing::debug!("{} failed: {}", request.method, err);
                error_response(request.id, &err)
            }
        }
    }

    #[tracing::instrument(skip(self, params))]
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, Error> {
        match method {
            "add" => self.add(serde_json::from_value(params)?).await,
            "complete" => self.complete(serde_json::from_value(params)?).await,
            "reset" => Ok(json!({ "rejected": self.orchestrator.reset_wallet().await })),
            "counts" => Ok(json!({
                "total": self.orchestrator.num_all_requests(),
                "by_family": self.orchestrator.num_requests_by_family(),
            })),
            "snapshot" => self.snapshot(serde_json::from_value(params)?),
            other => Err(Error::Custom(format!("Unknown method: {other}"))),
        }
    }

    async fn add(&self, params: AddParams) -> Result<Value, Error> {
        match params.kind {
            AnyKind::Signing(kind) => self.add_typed(kind, params).await,
            AnyKind::Transaction(kind) => self.add_typed(kind, params).await,
            AnyKind::Authorize(kind) => self.add_typed(kind, params).await,
            AnyKind::Session(kind) => self.add_typed(kind, params).await,
        }
    }

    async fn add_typed<K>(&self, kind: K, params: AddParams) -> Result<Value, Error>
    where
        K: ConfirmationKind,
        RequestOrchestrator: Route<K::Family>,
    {
        let family = self.orchestrator.engine::<K::Family>().family().name();
        let payload = serde_json::from_value(params.payload)?;

        let pending = self
            .orchestrator
            .add_confirmation(params.id, params.url, kind, payload, params.options, None)
            .await?;

        let request = pending.id().to_owned();
        let response = json!({ "queued": request });
        let output = self.output.clone();

        tokio::spawn(async move {
            let notification = match pending.await {
                Ok(result) => json!({
                    "event": "settled",
                    "family": family,
                    "request": result.id,
                    "payload": result.payload,
                }),
                Err(err) => json!({
                    "event": "rejected",
                    "family": family,
                    "request": request,
                    "code": error_code(&err),
                    "reason": err.to_string(),
                }),
            };

            if output.send(notification).is_err() {
                tracing::warn!("Output closed before request {} settled", request);
            }
        });

        Ok(response)
    }

    /// `params` maps a type tag to one reply or to a list of replies
    async fn complete(&self, params: Map<String, Value>) -> Result<Value, Error> {
        let mut outcome = CompleteOutcome::default();

        for (tag, replies) in params {
            let replies = match replies {
                Value::Array(replies) => replies,
                reply => vec![reply],
            };

            let kind: AnyKind = match serde_json::from_value(Value::String(tag)) {
                Ok(kind) => kind,
                Err(err) => {
                    let err = Error::from(err);
                    for reply in &replies {
                        outcome.fail(reply, &err);
                    }
                    continue;
                }
            };

            for reply in replies {
                let completed = match kind {
                    AnyKind::Signing(kind) => self.complete_typed(kind, &reply).await,
                    AnyKind::Transaction(kind) => self.complete_typed(kind, &reply).await,
                    AnyKind::Authorize(kind) => self.complete_typed(kind, &reply).await,
                    AnyKind::Session(kind) => self.complete_typed(kind, &reply).await,
                };

                match completed {
                    Ok(report) => outcome.add(report),
                    Err(err) => outcome.fail(&reply, &err),
                }
            }
        }

        Ok(serde_json::to_value(outcome)?)
    }

    async fn complete_typed<K>(&self, kind: K, reply: &Value) -> Result<CompletionReport, Error>
    where
        K: ConfirmationKind,
        RequestOrchestrator: Route<K::Family>,
    {
        let reply = ConfirmationReply::<<K::Family as Family>::Output>::deserialize(reply)?;
        self.orchestrator.complete_confirmation([(kind, reply)]).await
    }

    fn snapshot(&self, params: SnapshotParams) -> Result<Value, Error> {
        let snapshot = match params.family {
            FamilyName::Signing => serde_json::to_value(self.orchestrator.snapshot::<AccountSigning>()),
            FamilyName::Transaction => {
                serde_json::to_value(self.orchestrator.snapshot::<TransactionBroadcast>())
            }
            FamilyName::Authorize => {
                serde_json::to_value(self.orchestrator.snapshot::<SiteAuthorization>())
            }
            FamilyName::Session => serde_json::to_value(self.orchestrator.snapshot::<WalletSession>()),
        }?;

        Ok(snapshot)
    }
}
