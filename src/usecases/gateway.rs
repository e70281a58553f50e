use std::{future::Future, sync::Arc, time::Duration};

use crates::domain::{
    repositories::{
        equation_ocr::EquationOcrProvider, llm_gateway::LlmGateway, vision::VisionProvider,
    },
    value_objects::{
        chat::{ChatCompletionRequest, ChatStream, ModelSummary},
        credits::DebitRequest,
        enums::request_types::RequestType,
        ocr::{DocumentText, EquationAppToken, EquationText, LabelAnnotation, OcrImage},
        pricing::RequestPrice,
    },
};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::usecases::entitlements::{DebitReceipt, EntitlementEngine, EntitlementError};

const VISION: &str = "google_vision";
const MATHPIX: &str = "mathpix";
const OPEN_ROUTER: &str = "openrouter";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("insufficient balance")]
    PaymentRequired,
    #[error("{provider} request failed")]
    Upstream {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Entitlement(EntitlementError),
}

impl GatewayError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            GatewayError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Entitlement(err) => err.status_code(),
        }
    }
}

impl From<EntitlementError> for GatewayError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::PaymentRequired => GatewayError::PaymentRequired,
            other => GatewayError::Entitlement(other),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Longest wait for the next upstream chunk.
    pub idle_timeout: Duration,
    pub cost_lookup_attempts: u32,
    pub cost_lookup_backoff: Duration,
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            cost_lookup_attempts: 3,
            cost_lookup_backoff: Duration::from_secs(1),
            channel_capacity: 32,
        }
    }
}

/// What the client's event stream carries.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    Delta(String),
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Disconnected,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayReport {
    pub outcome: StreamOutcome,
    pub generation_id: Option<String>,
    pub chunks: usize,
}

/// Wraps provider calls with the funds check before and the debit after.
pub struct RequestGateway {
    entitlements: Arc<EntitlementEngine>,
    vision: Arc<dyn VisionProvider + Send + Sync>,
    equation_ocr: Arc<dyn EquationOcrProvider + Send + Sync>,
    llm: Arc<dyn LlmGateway + Send + Sync>,
    stream_settings: StreamSettings,
}

impl RequestGateway {
    pub fn new(
        entitlements: Arc<EntitlementEngine>,
        vision: Arc<dyn VisionProvider + Send + Sync>,
        equation_ocr: Arc<dyn EquationOcrProvider + Send + Sync>,
        llm: Arc<dyn LlmGateway + Send + Sync>,
        stream_settings: StreamSettings,
    ) -> Self {
        Self {
            entitlements,
            vision,
            equation_ocr,
            llm,
            stream_settings,
        }
    }

    pub async fn detect_text(&self, user_id: &str, image: OcrImage) -> UseCaseResult<Vec<String>> {
        let vision = Arc::clone(&self.vision);
        self.gated_call(user_id, RequestType::Text, VISION, |_| None, || async move {
            vision.detect_text(image).await
        })
        .await
    }

    pub async fn detect_document_text(
        &self,
        user_id: &str,
        image: OcrImage,
    ) -> UseCaseResult<Option<DocumentText>> {
        let vision = Arc::clone(&self.vision);
        self.gated_call(user_id, RequestType::Document, VISION, |_| None, || async move {
            vision.detect_document_text(image).await
        })
        .await
    }

    pub async fn detect_labels(
        &self,
        user_id: &str,
        image: OcrImage,
    ) -> UseCaseResult<Vec<LabelAnnotation>> {
        let vision = Arc::clone(&self.vision);
        self.gated_call(user_id, RequestType::Label, VISION, |_| None, || async move {
            vision.detect_labels(image).await
        })
        .await
    }

    pub async fn recognize_equation(
        &self,
        user_id: &str,
        image: OcrImage,
    ) -> UseCaseResult<EquationText> {
        let equation_ocr = Arc::clone(&self.equation_ocr);
        self.gated_call(
            user_id,
            RequestType::Equation,
            MATHPIX,
            |text: &EquationText| text.request_id.clone(),
            || async move { equation_ocr.recognize(image).await },
        )
        .await
    }

    /// Client-side recognition token. Requires funds for one equation
    /// request but charges nothing.
    pub async fn issue_equation_token(&self, user_id: &str) -> UseCaseResult<EquationAppToken> {
        self.ensure_funds(user_id, RequestType::Equation).await?;

        let token = self.equation_ocr.issue_app_token().await.map_err(|err| {
            error!(%user_id, provider = MATHPIX, error = ?err, "gateway: app token request failed");
            GatewayError::Upstream {
                provider: MATHPIX,
                source: err,
            }
        })?;

        info!(%user_id, "gateway: equation app token issued");
        Ok(token)
    }

    pub async fn list_models(&self) -> UseCaseResult<Vec<ModelSummary>> {
        self.llm.list_models().await.map_err(|err| {
            error!(provider = OPEN_ROUTER, error = ?err, "gateway: failed to list models");
            GatewayError::Upstream {
                provider: OPEN_ROUTER,
                source: err,
            }
        })
    }

    /// Opens the upstream completion and hands back the client side of the
    /// relay. The debit happens in the relay task once the stream ends.
    pub async fn stream_chat(
        &self,
        user_id: &str,
        request: ChatCompletionRequest,
    ) -> UseCaseResult<ReceiverStream<RelayFrame>> {
        request.validate().map_err(GatewayError::Validation)?;
        self.ensure_funds(user_id, RequestType::Chat).await?;

        let model = request.model.clone();
        let upstream = self
            .llm
            .stream_chat_completion(request)
            .await
            .map_err(|err| {
                error!(%user_id, %model, provider = OPEN_ROUTER, error = ?err, "gateway: failed to open completion stream");
                GatewayError::Upstream {
                    provider: OPEN_ROUTER,
                    source: err,
                }
            })?;

        info!(%user_id, %model, "gateway: completion stream opened");

        let (tx, rx) = mpsc::channel(self.stream_settings.channel_capacity.max(1));
        let entitlements = Arc::clone(&self.entitlements);
        let llm = Arc::clone(&self.llm);
        let settings = self.stream_settings.clone();
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            let report = relay_stream(upstream, tx, settings.idle_timeout).await;
            info!(
                %user_id,
                outcome = ?report.outcome,
                chunks = report.chunks,
                generation_id = report.generation_id.as_deref().unwrap_or_default(),
                "gateway: completion stream finished"
            );
            settle_stream(&entitlements, llm.as_ref(), &settings, &user_id, &report).await;
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn ensure_funds(
        &self,
        user_id: &str,
        request_type: RequestType,
    ) -> UseCaseResult<RequestPrice> {
        let price = self.entitlements.price_for(request_type);
        let allowed = self
            .entitlements
            .check_and_reserve(user_id, price.ledger, price.reserve_cost())
            .await?;

        if !allowed {
            let err = GatewayError::PaymentRequired;
            warn!(
                %user_id,
                request_type = %request_type,
                ledger = %price.ledger,
                cost = price.reserve_cost(),
                status = err.status_code().as_u16(),
                "gateway: insufficient balance"
            );
            return Err(err);
        }

        Ok(price)
    }

    async fn gated_call<T, C, F, Fut>(
        &self,
        user_id: &str,
        request_type: RequestType,
        provider: &'static str,
        correlation: C,
        invoke: F,
    ) -> UseCaseResult<T>
    where
        C: FnOnce(&T) -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let price = self.ensure_funds(user_id, request_type).await?;

        let result = invoke().await.map_err(|err| {
            error!(
                %user_id,
                request_type = %request_type,
                provider,
                error = ?err,
                "gateway: provider call failed"
            );
            GatewayError::Upstream {
                provider,
                source: err,
            }
        })?;

        let provider_request_id = correlation(&result);
        self.entitlements
            .debit(DebitRequest {
                user_id: user_id.to_string(),
                ledger: price.ledger,
                amount: price.cost_for_usage(None),
                request_type,
                provider_request_id,
            })
            .await?;

        Ok(result)
    }
}

/// Forwards upstream chunks until the stream ends, the client goes away, or
/// the idle deadline passes. Remembers the last generation id seen.
pub async fn relay_stream(
    mut upstream: ChatStream,
    tx: mpsc::Sender<RelayFrame>,
    idle_timeout: Duration,
) -> RelayReport {
    let mut generation_id = None;
    let mut chunks = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => break StreamOutcome::Disconnected,
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        match next {
            Err(_) => {
                warn!(
                    idle_secs = idle_timeout.as_secs_f64(),
                    "gateway: upstream stream idle, giving up"
                );
                let _ = tx.send(RelayFrame::Failed).await;
                break StreamOutcome::Failed;
            }
            Ok(None) => {
                if tx.send(RelayFrame::Done).await.is_err() {
                    break StreamOutcome::Disconnected;
                }
                break StreamOutcome::Completed;
            }
            Ok(Some(Err(err))) => {
                error!(provider = OPEN_ROUTER, error = ?err, "gateway: upstream stream failed");
                let _ = tx.send(RelayFrame::Failed).await;
                break StreamOutcome::Failed;
            }
            Ok(Some(Ok(chunk))) => {
                if chunk.generation_id.is_some() {
                    generation_id = chunk.generation_id;
                }
                if chunk.content.is_empty() {
                    continue;
                }
                chunks += 1;
                if tx.send(RelayFrame::Delta(chunk.content)).await.is_err() {
                    break StreamOutcome::Disconnected;
                }
            }
        }
    };

    RelayReport {
        outcome,
        generation_id,
        chunks,
    }
}

/// Charges a finished stream exactly once. Failures are logged, never raised.
pub async fn settle_stream(
    entitlements: &EntitlementEngine,
    llm: &(dyn LlmGateway + Send + Sync),
    settings: &StreamSettings,
    user_id: &str,
    report: &RelayReport,
) -> Option<DebitReceipt> {
    if report.generation_id.is_none() && report.chunks == 0 {
        debug!(%user_id, "gateway: nothing generated, no charge");
        return None;
    }

    let price = entitlements.price_for(RequestType::Chat);
    let reported_cost = match report.generation_id.as_deref() {
        Some(generation_id) => lookup_cost(llm, settings, generation_id).await,
        None => None,
    };
    let amount = price.cost_for_usage(reported_cost);

    match entitlements
        .debit(DebitRequest {
            user_id: user_id.to_string(),
            ledger: price.ledger,
            amount,
            request_type: RequestType::Chat,
            provider_request_id: report.generation_id.clone(),
        })
        .await
    {
        Ok(receipt) => Some(receipt),
        Err(err) => {
            error!(
                %user_id,
                generation_id = report.generation_id.as_deref().unwrap_or_default(),
                amount,
                error = ?err,
                "gateway: failed to charge completion"
            );
            None
        }
    }
}

async fn lookup_cost(
    llm: &(dyn LlmGateway + Send + Sync),
    settings: &StreamSettings,
    generation_id: &str,
) -> Option<f64> {
    let attempts = settings.cost_lookup_attempts.max(1);

    for attempt in 1..=attempts {
        match llm.generation_cost(generation_id).await {
            Ok(Some(cost)) => return Some(cost),
            Ok(None) => {
                debug!(%generation_id, attempt, "gateway: generation usage not ready");
            }
            Err(err) => {
                warn!(
                    %generation_id,
                    attempt,
                    provider = OPEN_ROUTER,
                    error = ?err,
                    "gateway: generation usage lookup failed"
                );
            }
        }

        if attempt < attempts {
            tokio::time::sleep(settings.cost_lookup_backoff).await;
        }
    }

    warn!(%generation_id, "gateway: no usage reported, charging the floor");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use crates::domain::{
        entities::{credit_usage_history::UsageHistoryEntity, user_credits::UserCreditsEntity},
        repositories::{
            entitlements::MockEntitlementRepository, equation_ocr::MockEquationOcrProvider,
            identity::MockIdentityProvider, llm_gateway::MockLlmGateway,
            notifications::MockNotificationSender, vision::MockVisionProvider,
        },
        value_objects::{
            catalog::StorePackageCatalog,
            chat::{ChatChunk, ChatMessage},
            credits::{CreditBalances, DebitOutcome},
            enums::{ledger_keys::LedgerKey, plan_models::PlanModel},
            pricing::{PriceSettings, PricingTable},
        },
    };
    use futures::stream;
    use mockall::predicate::eq;
    use uuid::Uuid;

    const USER: &str = "firebase-uid-3";

    fn image() -> OcrImage {
        OcrImage {
            bytes: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".to_string(),
            file_name: Some("snap.png".to_string()),
        }
    }

    fn with_balance(repo: &mut MockEntitlementRepository, credit: f64) {
        repo.expect_find_by_user_id().returning(move |user_id| {
            let now = Utc::now();
            Ok(Some(UserCreditsEntity {
                user_id: user_id.to_string(),
                balances: CreditBalances::new().with(LedgerKey::Credit, credit),
                purchased_at: None,
                expired_at: None,
                created_at: now,
                updated_at: now,
            }))
        });
    }

    fn applied(request: DebitRequest, remaining: f64) -> DebitOutcome {
        DebitOutcome::Applied {
            entry: UsageHistoryEntity {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                ledger: request.ledger.to_string(),
                amount: request.amount,
                request_type: request.request_type.to_string(),
                provider_request_id: request.provider_request_id,
                created_at: Utc::now(),
            },
            remaining,
        }
    }

    fn engine(repo: MockEntitlementRepository) -> Arc<EntitlementEngine> {
        Arc::new(EntitlementEngine::new(
            Arc::new(repo),
            Arc::new(MockIdentityProvider::new()),
            Arc::new(MockNotificationSender::new()),
            Arc::new(StorePackageCatalog::new()),
            Arc::new(PricingTable::new(PlanModel::Credit, &PriceSettings::default())),
        ))
    }

    fn gateway(
        repo: MockEntitlementRepository,
        vision: MockVisionProvider,
        equation_ocr: MockEquationOcrProvider,
        llm: MockLlmGateway,
    ) -> RequestGateway {
        RequestGateway::new(
            engine(repo),
            Arc::new(vision),
            Arc::new(equation_ocr),
            Arc::new(llm),
            StreamSettings {
                cost_lookup_backoff: Duration::from_millis(1),
                ..StreamSettings::default()
            },
        )
    }

    fn chunk(generation_id: &str, content: &str) -> anyhow::Result<ChatChunk> {
        Ok(ChatChunk {
            generation_id: Some(generation_id.to_string()),
            content: content.to_string(),
        })
    }

    #[tokio::test]
    async fn text_detection_debits_flat_price() {
        let mut repo = MockEntitlementRepository::new();
        with_balance(&mut repo, 0.05);
        repo.expect_debit()
            .withf(|request| {
                request.amount == 0.01
                    && request.ledger == LedgerKey::Credit
                    && request.request_type == RequestType::Text
            })
            .times(1)
            .returning(|request| Ok(applied(request, 0.04)));

        let mut vision = MockVisionProvider::new();
        vision
            .expect_detect_text()
            .times(1)
            .returning(|_| Ok(vec!["E = mc^2".to_string()]));

        let gateway = gateway(
            repo,
            vision,
            MockEquationOcrProvider::new(),
            MockLlmGateway::new(),
        );

        let texts = gateway.detect_text(USER, image()).await.unwrap();
        assert_eq!(texts, vec!["E = mc^2".to_string()]);
    }

    #[tokio::test]
    async fn short_balance_skips_the_provider() {
        let mut repo = MockEntitlementRepository::new();
        with_balance(&mut repo, 0.005);
        repo.expect_debit().never();

        let mut equation_ocr = MockEquationOcrProvider::new();
        equation_ocr.expect_recognize().never();
        equation_ocr.expect_issue_app_token().never();

        let gateway = gateway(
            repo,
            MockVisionProvider::new(),
            equation_ocr,
            MockLlmGateway::new(),
        );

        let err = gateway.recognize_equation(USER, image()).await.unwrap_err();
        assert!(matches!(err, GatewayError::PaymentRequired));
        assert_eq!(err.status_code().as_u16(), 402);

        let err = gateway.issue_equation_token(USER).await.unwrap_err();
        assert!(matches!(err, GatewayError::PaymentRequired));
    }

    #[tokio::test]
    async fn provider_failure_is_not_charged() {
        let mut repo = MockEntitlementRepository::new();
        with_balance(&mut repo, 1.0);
        repo.expect_debit().never();

        let mut vision = MockVisionProvider::new();
        vision
            .expect_detect_labels()
            .returning(|_| Err(anyhow::anyhow!("vision 503")));

        let gateway = gateway(
            repo,
            vision,
            MockEquationOcrProvider::new(),
            MockLlmGateway::new(),
        );

        let err = gateway.detect_labels(USER, image()).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Upstream {
                provider: VISION,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn equation_debit_carries_request_id() {
        let mut repo = MockEntitlementRepository::new();
        with_balance(&mut repo, 0.05);
        repo.expect_debit()
            .withf(|request| {
                request.amount == 0.02 && request.provider_request_id.as_deref() == Some("mpx_1")
            })
            .times(1)
            .returning(|request| Ok(applied(request, 0.03)));

        let mut equation_ocr = MockEquationOcrProvider::new();
        equation_ocr.expect_recognize().returning(|_| {
            Ok(EquationText {
                request_id: Some("mpx_1".to_string()),
                text: Some("$x^2$".to_string()),
                latex_styled: None,
                confidence: Some(0.99),
                confidence_rate: None,
                is_printed: Some(true),
                is_handwritten: Some(false),
            })
        });

        let gateway = gateway(
            repo,
            MockVisionProvider::new(),
            equation_ocr,
            MockLlmGateway::new(),
        );

        let text = gateway.recognize_equation(USER, image()).await.unwrap();
        assert_eq!(text.text.as_deref(), Some("$x^2$"));
    }

    #[tokio::test]
    async fn relay_forwards_chunks_then_done() {
        let upstream: ChatStream = Box::pin(stream::iter(vec![
            chunk("gen_1", "Hel"),
            chunk("gen_1", ""),
            chunk("gen_1", "lo"),
        ]));
        let (tx, rx) = mpsc::channel(8);

        let report = relay_stream(upstream, tx, Duration::from_secs(5)).await;
        let frames: Vec<RelayFrame> = ReceiverStream::new(rx).collect().await;

        assert_eq!(report.outcome, StreamOutcome::Completed);
        assert_eq!(report.generation_id.as_deref(), Some("gen_1"));
        assert_eq!(report.chunks, 2);
        assert_eq!(
            frames,
            vec![
                RelayFrame::Delta("Hel".to_string()),
                RelayFrame::Delta("lo".to_string()),
                RelayFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn relay_stops_when_client_disconnects() {
        let upstream: ChatStream = Box::pin(stream::iter(vec![
            chunk("gen_123", "a"),
            chunk("gen_123", "b"),
            chunk("gen_123", "c"),
            chunk("gen_123", "d"),
        ]));
        let (tx, mut rx) = mpsc::channel(1);

        let relay = tokio::spawn(relay_stream(upstream, tx, Duration::from_secs(5)));
        assert_eq!(rx.recv().await, Some(RelayFrame::Delta("a".to_string())));
        drop(rx);

        let report = relay.await.unwrap();
        assert_eq!(report.outcome, StreamOutcome::Disconnected);
        assert_eq!(report.generation_id.as_deref(), Some("gen_123"));
    }

    #[tokio::test]
    async fn idle_upstream_fails_the_stream() {
        let upstream: ChatStream = Box::pin(stream::iter(vec![chunk("gen_9", "x")]).chain(stream::pending()));
        let (tx, mut rx) = mpsc::channel(8);

        let report = relay_stream(upstream, tx, Duration::from_millis(20)).await;

        assert_eq!(report.outcome, StreamOutcome::Failed);
        assert_eq!(report.generation_id.as_deref(), Some("gen_9"));
        assert_eq!(rx.recv().await, Some(RelayFrame::Delta("x".to_string())));
        assert_eq!(rx.recv().await, Some(RelayFrame::Failed));
    }

    #[tokio::test]
    async fn zero_usage_charges_the_floor() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_debit()
            .withf(|request| {
                request.amount == 0.0001
                    && request.request_type == RequestType::Chat
                    && request.provider_request_id.as_deref() == Some("gen_123")
            })
            .times(1)
            .returning(|request| Ok(applied(request, 0.9999)));

        let mut llm = MockLlmGateway::new();
        llm.expect_generation_cost()
            .with(eq("gen_123"))
            .times(1)
            .returning(|_| Ok(Some(0.0)));

        let report = RelayReport {
            outcome: StreamOutcome::Disconnected,
            generation_id: Some("gen_123".to_string()),
            chunks: 1,
        };
        let settings = StreamSettings::default();

        let receipt = settle_stream(&engine(repo), &llm, &settings, USER, &report).await;
        assert_eq!(receipt.unwrap().entry.amount, 0.0001);
    }

    #[tokio::test]
    async fn usage_lookup_retries_until_reported() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_debit()
            .withf(|request| (request.amount - 0.012).abs() < 1e-12)
            .times(1)
            .returning(|request| Ok(applied(request, 0.5)));

        let mut llm = MockLlmGateway::new();
        let mut calls = 0;
        llm.expect_generation_cost().times(3).returning(move |_| {
            calls += 1;
            match calls {
                1 => Ok(None),
                2 => Err(anyhow::anyhow!("502 from usage endpoint")),
                _ => Ok(Some(0.01)),
            }
        });

        let report = RelayReport {
            outcome: StreamOutcome::Completed,
            generation_id: Some("gen_77".to_string()),
            chunks: 12,
        };
        let settings = StreamSettings {
            cost_lookup_backoff: Duration::from_millis(1),
            ..StreamSettings::default()
        };

        assert!(settle_stream(&engine(repo), &llm, &settings, USER, &report)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn empty_stream_is_free() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_debit().never();
        let mut llm = MockLlmGateway::new();
        llm.expect_generation_cost().never();

        let report = RelayReport {
            outcome: StreamOutcome::Failed,
            generation_id: None,
            chunks: 0,
        };

        assert!(settle_stream(&engine(repo), &llm, &StreamSettings::default(), USER, &report)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn invalid_chat_request_is_rejected_up_front() {
        let mut llm = MockLlmGateway::new();
        llm.expect_stream_chat_completion().never();

        let gateway = gateway(
            MockEntitlementRepository::new(),
            MockVisionProvider::new(),
            MockEquationOcrProvider::new(),
            llm,
        );

        let err = gateway
            .stream_chat(
                USER,
                ChatCompletionRequest {
                    model: "openai/gpt-4o-mini".to_string(),
                    messages: vec![ChatMessage {
                        role: "tool".to_string(),
                        content: "{}".to_string(),
                    }],
                    temperature: None,
                    top_p: None,
                    max_tokens: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 400);
    }
}
