//! Validation quorum coverage: threshold resolution, stake accounting,
//! eligibility rules, deadline escalation, and arbitration slashing.

mod support;

use chrono::Duration;

use rampline::config::{QuorumConfig, RiskConfig};
use rampline::domain::{
    OrderStatus, TaskStatus, TokenAmount, VoteDecision, WalletAddress,
};
use rampline::error::{Error, QuorumError};

use support::{order_in_verifying, register_validators, stack, stack_with};

#[tokio::test]
async fn quorum_of_approvals_settles_the_order() {
    let stack = stack();
    let validators = register_validators(&stack, 4).await;
    let (order, task) = order_in_verifying(&stack, "0xalice").await;

    // Two approvals and one flag: no decision has three votes yet.
    for addr in &validators[..2] {
        let task = stack
            .quorum
            .cast_vote(&task.id, addr, VoteDecision::Approve, None)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }
    let pending = stack
        .quorum
        .cast_vote(&task.id, &validators[2], VoteDecision::Flag, Some("blurry receipt".into()))
        .await
        .unwrap();
    assert_eq!(pending.status, TaskStatus::Pending);

    // Votes in flight hold stake.
    let profile = stack
        .validators
        .get_profile(&validators[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.locked_amount, TokenAmount::from_tokens(10));

    // The third approval resolves.
    let resolved = stack
        .quorum
        .cast_vote(&task.id, &validators[3], VoteDecision::Approve, None)
        .await
        .unwrap();
    assert_eq!(resolved.status, TaskStatus::Approved);
    assert_eq!(resolved.resolved_by.as_deref(), Some("quorum"));

    let settled = stack.lifecycle.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(settled.status, OrderStatus::Settled);

    // Every voter got their stake back; only agreeing voters gained
    // accuracy.
    for addr in &validators {
        let profile = stack.validators.get_profile(addr).await.unwrap().unwrap();
        assert_eq!(profile.locked_amount, TokenAmount::ZERO);
        assert!(profile.locked_tasks.is_empty());
    }
    let dissenter = stack
        .validators
        .get_profile(&validators[2])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dissenter.total_reviews, 1);
    assert_eq!(dissenter.accurate_reviews, 0);
}

#[tokio::test]
async fn duplicate_votes_are_rejected() {
    let stack = stack();
    let validators = register_validators(&stack, 1).await;
    let (_, task) = order_in_verifying(&stack, "0xalice").await;

    stack
        .quorum
        .cast_vote(&task.id, &validators[0], VoteDecision::Approve, None)
        .await
        .unwrap();
    let err = stack
        .quorum
        .cast_vote(&task.id, &validators[0], VoteDecision::Flag, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Quorum(QuorumError::DuplicateVote { .. })
    ));

    // The rejected vote locked nothing extra.
    let profile = stack
        .validators
        .get_profile(&validators[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.locked_amount, TokenAmount::from_tokens(10));
    assert_eq!(profile.locked_tasks.len(), 1);
}

#[tokio::test]
async fn principals_and_strangers_cannot_vote() {
    let stack = stack();
    let (_, task) = order_in_verifying(&stack, "0xalice").await;

    // The solver on the order is a principal.
    stack
        .quorum
        .register_validator(WalletAddress::new("0xsolver"), TokenAmount::from_tokens(100))
        .await
        .unwrap();
    let err = stack
        .quorum
        .cast_vote(
            &task.id,
            &WalletAddress::new("0xsolver"),
            VoteDecision::Approve,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Quorum(QuorumError::NotEligible { .. })));

    // Unregistered addresses are turned away before anything mutates.
    let err = stack
        .quorum
        .cast_vote(
            &task.id,
            &WalletAddress::new("0xnobody"),
            VoteDecision::Approve,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Quorum(QuorumError::NotEligible { .. })));
}

#[tokio::test]
async fn insufficient_free_stake_blocks_the_vote() {
    let stack = stack();
    let (_, task) = order_in_verifying(&stack, "0xalice").await;

    // Staked below the 10-token per-vote lock.
    let addr = WalletAddress::new("0xpoor");
    stack
        .quorum
        .register_validator(addr.clone(), TokenAmount::from_tokens(5))
        .await
        .unwrap();

    let err = stack
        .quorum
        .cast_vote(&task.id, &addr, VoteDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Quorum(QuorumError::InsufficientStake { .. })
    ));
}

#[tokio::test]
async fn second_task_for_the_same_order_is_rejected() {
    let stack = stack();
    let (order, _) = order_in_verifying(&stack, "0xalice").await;

    let err = stack.quorum.open_task(&order).await.unwrap_err();
    assert!(matches!(err, Error::Quorum(QuorumError::AlreadyOpen { .. })));
}

#[tokio::test]
async fn deadline_escalates_and_arbitration_slashes_fraud_approvers() {
    let stack = stack();
    let validators = register_validators(&stack, 2).await;
    let (order, task) = order_in_verifying(&stack, "0xalice").await;

    stack
        .quorum
        .cast_vote(&task.id, &validators[0], VoteDecision::Approve, None)
        .await
        .unwrap();
    stack
        .quorum
        .cast_vote(&task.id, &validators[1], VoteDecision::Flag, None)
        .await
        .unwrap();

    // Deadline passes without a quorum.
    let later = task.deadline + Duration::seconds(1);
    assert_eq!(stack.quorum.sweep_deadlines(later).await.unwrap(), 1);
    let escalated = stack.validators.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(escalated.status, TaskStatus::Escalated);

    // Stakes stay locked until arbitration.
    for addr in &validators {
        let profile = stack.validators.get_profile(addr).await.unwrap().unwrap();
        assert_eq!(profile.locked_amount, TokenAmount::from_tokens(10));
    }

    // Votes against a closed task bounce.
    let err = stack
        .quorum
        .cast_vote(&task.id, &validators[0], VoteDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Quorum(QuorumError::TaskClosed { .. })));

    // Arbitration rules the proof fraudulent: the approver is slashed,
    // the flagger is made whole and credited.
    let ruled = stack
        .quorum
        .apply_arbitration(&task.id, VoteDecision::Flag, "arbiter-1")
        .await
        .unwrap();
    assert_eq!(ruled.status, TaskStatus::Flagged);

    let slashed = stack
        .validators
        .get_profile(&validators[0])
        .await
        .unwrap()
        .unwrap();
    assert!(slashed.slashed);
    assert!(!slashed.active);
    assert_eq!(slashed.staked, TokenAmount::from_tokens(90));
    assert_eq!(slashed.locked_amount, TokenAmount::ZERO);

    let flagger = stack
        .validators
        .get_profile(&validators[1])
        .await
        .unwrap()
        .unwrap();
    assert!(!flagger.slashed);
    assert_eq!(flagger.staked, TokenAmount::from_tokens(100));
    assert_eq!(flagger.locked_amount, TokenAmount::ZERO);
    assert_eq!(flagger.accurate_reviews, 1);

    let disputed = stack.lifecycle.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(disputed.status, OrderStatus::Disputed);
}

#[tokio::test]
async fn abandoned_stake_locks_are_force_released() {
    let stack = stack();
    let validators = register_validators(&stack, 2).await;
    let (_, task) = order_in_verifying(&stack, "0xalice").await;

    for addr in &validators {
        stack
            .quorum
            .cast_vote(&task.id, addr, VoteDecision::Approve, None)
            .await
            .unwrap();
    }
    // Escalation leaves the stakes locked with no ruling in sight.
    stack
        .quorum
        .sweep_deadlines(task.deadline + Duration::seconds(1))
        .await
        .unwrap();

    // Inside the lock horizon nothing is touched.
    assert_eq!(
        stack
            .quorum
            .release_expired_locks(task.deadline + Duration::seconds(2))
            .await
            .unwrap(),
        0
    );

    // Past the 72h horizon every orphaned lock is reclaimed.
    let past_horizon = chrono::Utc::now() + Duration::hours(73);
    assert_eq!(
        stack.quorum.release_expired_locks(past_horizon).await.unwrap(),
        2
    );
    for addr in &validators {
        let profile = stack.validators.get_profile(addr).await.unwrap().unwrap();
        assert_eq!(profile.locked_amount, TokenAmount::ZERO);
        assert!(profile.locked_tasks.is_empty());
        assert_eq!(profile.staked, TokenAmount::from_tokens(100));
    }

    // Running again finds nothing left to release.
    assert_eq!(
        stack.quorum.release_expired_locks(past_horizon).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn zero_threshold_auto_approves_at_the_deadline() {
    let quorum_config = QuorumConfig {
        threshold: 0,
        ..QuorumConfig::default()
    };
    let stack = stack_with(quorum_config, RiskConfig::default());
    let (order, task) = order_in_verifying(&stack, "0xalice").await;

    let later = task.deadline + Duration::seconds(1);
    assert_eq!(stack.quorum.sweep_deadlines(later).await.unwrap(), 1);

    let resolved = stack.validators.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(resolved.status, TaskStatus::AutoApproved);
    let settled = stack.lifecycle.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(settled.status, OrderStatus::Settled);
}
