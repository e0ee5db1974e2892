//! Shared wiring for integration tests: a full service stack on the
//! in-process store with a scripted oracle.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal_macros::dec;

use rampline::config::{QuorumConfig, QuoteConfig, RiskConfig};
use rampline::domain::{Order, SolverId, TokenAmount, ValidationTask, WalletAddress};
use rampline::notify::NotificationHub;
use rampline::repository::{HistoryRepository, OrderRepository, ValidatorRepository};
use rampline::service::lifecycle::{CreateOrderRequest, OrderLifecycle};
use rampline::service::quorum::ValidationQuorum;
use rampline::service::rate::RateLockService;
use rampline::service::risk::FraudRiskEngine;
use rampline::store::MemoryStore;
use rampline::testkit::ScriptedOracle;

pub struct Stack {
    pub orders: Arc<OrderRepository>,
    pub validators: Arc<ValidatorRepository>,
    pub history: Arc<HistoryRepository>,
    pub hub: Arc<NotificationHub>,
    pub risk: Arc<FraudRiskEngine>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub quorum: Arc<ValidationQuorum>,
}

pub fn stack() -> Stack {
    stack_with(QuorumConfig::default(), RiskConfig::default())
}

pub fn stack_with(quorum_config: QuorumConfig, risk_config: RiskConfig) -> Stack {
    let store = Arc::new(MemoryStore::new());
    let orders = Arc::new(OrderRepository::new(store.clone()));
    let validators = Arc::new(ValidatorRepository::new(store.clone()));
    let history = Arc::new(HistoryRepository::new(store));

    let hub = Arc::new(NotificationHub::new(16));
    let risk = Arc::new(FraudRiskEngine::new(risk_config));
    let quote_config = QuoteConfig::default();
    let rates = Arc::new(RateLockService::new(
        Arc::new(ScriptedOracle::healthy(dec!(17.00))),
        quote_config.clone(),
    ));

    let lifecycle = Arc::new(OrderLifecycle::new(
        Arc::clone(&orders),
        Arc::clone(&history),
        Arc::clone(&risk),
        rates,
        Arc::clone(&hub),
        quote_config,
        &quorum_config,
    ));
    let quorum = Arc::new(ValidationQuorum::new(
        Arc::clone(&validators),
        Arc::clone(&lifecycle),
        quorum_config,
    ));

    Stack {
        orders,
        validators,
        history,
        hub,
        risk,
        lifecycle,
        quorum,
    }
}

pub fn create_request(wallet: &str, tokens: u64) -> CreateOrderRequest {
    CreateOrderRequest {
        direction: rampline::domain::Direction::Sell,
        requester_id: format!("user-{wallet}"),
        requester_wallet: WalletAddress::new(wallet),
        token_amount: TokenAmount::from_tokens(tokens),
        payment_method: "spei".into(),
        payment_instructions: Some("CLABE 000000000000000000".into()),
        signals: None,
    }
}

/// Drive a fresh order through match, payment, and proof, then open its
/// validation task.
pub async fn order_in_verifying(stack: &Stack, wallet: &str) -> (Order, ValidationTask) {
    let (order, _) = stack
        .lifecycle
        .create_order(create_request(wallet, 100))
        .await
        .expect("create");
    stack
        .lifecycle
        .match_order(
            &order.id,
            SolverId::from("solver-1"),
            WalletAddress::new("0xsolver"),
        )
        .await
        .expect("match");
    stack.lifecycle.begin_payment(&order.id).await.expect("payment");
    stack
        .lifecycle
        .record_payment_sent(&order.id)
        .await
        .expect("payment sent");
    let order = stack
        .lifecycle
        .submit_proof(&order.id, "SPEI-REF-123")
        .await
        .expect("proof");
    let task = stack.quorum.open_task(&order).await.expect("task");
    (order, task)
}

/// Register `count` validators with enough stake to vote.
pub async fn register_validators(stack: &Stack, count: usize) -> Vec<WalletAddress> {
    let mut addrs = Vec::with_capacity(count);
    for i in 0..count {
        let addr = WalletAddress::new(&format!("0xval{i}"));
        stack
            .quorum
            .register_validator(addr.clone(), TokenAmount::from_tokens(100))
            .await
            .expect("register");
        addrs.push(addr);
    }
    addrs
}
