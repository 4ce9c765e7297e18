use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::{
    DispatcherConfig, EventHandlerRegistry, EventPublisher, HandlerRegistry,
    TransactionalEventDispatcher, TypedEventHandler,
};
use monolith_application::transaction::{
    InMemoryDatabase, Mutation, ReadCapability, ReadWriteTransactionScope, RetryPolicy,
    WriteCapability, execute,
    read_capability_from_context, read_write_tx_from_context,
};
use monolith_domain::domain_event::SharedEvent;
use monolith_macros::domain_event;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[domain_event(event_type = "ledger.EntryPosted")]
struct EntryPosted {
    amount: i64,
}

/// 在同一事务内累加余额
struct BalanceProjector {
    fail_above: Option<i64>,
}

#[async_trait]
impl TypedEventHandler<EntryPosted> for BalanceProjector {
    fn handler_name(&self) -> &str {
        "ledger.balance_projector"
    }

    async fn handle(&self, ctx: &AppContext, event: &EntryPosted) -> Result<(), AppError> {
        if self.fail_above.is_some_and(|limit| event.amount > limit) {
            return Err(AppError::Validation(format!("amount {} too large", event.amount)));
        }

        let reader = read_capability_from_context(ctx).ok_or(AppError::Validation(
            "handler must run inside a transaction".into(),
        ))?;
        let current = reader
            .read_row("balances", "acc-1")
            .await?
            .and_then(|r| r.value["total"].as_i64())
            .unwrap_or(0);

        let tx = read_write_tx_from_context(ctx).ok_or(AppError::NestedTransaction)?;
        tx.buffer_write(vec![Mutation::insert_or_update(
            "balances",
            "acc-1",
            &json!({ "total": current + event.amount }),
        )?])
    }
}

fn registry(fail_above: Option<i64>) -> Arc<dyn HandlerRegistry> {
    let reg = EventHandlerRegistry::new();
    reg.subscribe_typed::<EntryPosted, _>(Arc::new(BalanceProjector { fail_above }))
        .unwrap();
    Arc::new(reg)
}

async fn balance(db: &InMemoryDatabase) -> Option<i64> {
    db.snapshot()
        .read_row("balances", "acc-1")
        .await
        .unwrap()
        .and_then(|r| r.value["total"].as_i64())
}

async fn post(
    scope: &ReadWriteTransactionScope<InMemoryDatabase>,
    registry: &Arc<dyn HandlerRegistry>,
    amounts: &[i64],
) -> Result<(), AppError> {
    execute(scope, &AppContext::default(), |ctx| {
        let registry = registry.clone();
        let amounts = amounts.to_vec();
        async move {
            let dispatcher =
                TransactionalEventDispatcher::new(registry, DispatcherConfig::default());
            let events: Vec<SharedEvent> = amounts
                .into_iter()
                .map(|a| Arc::new(EntryPosted::new("acc-1", a)) as SharedEvent)
                .collect();
            dispatcher.publish_all(events);
            dispatcher.flush(&ctx).await
        }
    })
    .await
}

#[tokio::test]
async fn handlers_participate_in_the_transaction() {
    let db = Arc::new(InMemoryDatabase::new());
    let scope = ReadWriteTransactionScope::new(db.clone());

    post(&scope, &registry(None), &[10, 5]).await.unwrap();
    assert_eq!(balance(&db).await, Some(15));
}

#[tokio::test]
async fn handler_failure_rolls_back_everything() {
    let db = Arc::new(InMemoryDatabase::new());
    let scope = ReadWriteTransactionScope::new(db.clone());

    let err = post(&scope, &registry(Some(100)), &[10, 500])
        .await
        .unwrap_err();

    match &err {
        AppError::HandlerFailed {
            event_type,
            handler,
            ..
        } => {
            assert_eq!(event_type.as_str(), "ledger.EntryPosted");
            assert_eq!(handler, "ledger.balance_projector");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.to_string().starts_with("handler failed for event ledger.EntryPosted"));
    // 第一条事件的写入同样被回滚
    assert_eq!(balance(&db).await, None);
}

#[tokio::test]
async fn retried_attempt_starts_with_an_empty_queue() {
    let db = Arc::new(InMemoryDatabase::new());
    db.apply(vec![
        Mutation::insert_or_update("balances", "acc-1", &json!({ "total": 1 })).unwrap(),
    ])
    .unwrap();
    let scope = ReadWriteTransactionScope::with_policy(
        db.clone(),
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        },
    );
    let registry = registry(None);
    let attempts = Arc::new(AtomicUsize::new(0));
    let queued_at_start = Arc::new(AtomicUsize::new(usize::MAX));

    execute(&scope, &AppContext::default(), |ctx| {
        let registry = registry.clone();
        let db = db.clone();
        let attempts = attempts.clone();
        let queued_at_start = queued_at_start.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let dispatcher =
                TransactionalEventDispatcher::new(registry, DispatcherConfig::default());
            queued_at_start.store(dispatcher.pending_count(), Ordering::SeqCst);

            dispatcher.publish(Arc::new(EntryPosted::new("acc-1", 2)));
            dispatcher.flush(&ctx).await?;

            if n == 1 {
                // 模拟并发提交，使本次尝试在提交时冲突
                db.apply(vec![Mutation::insert_or_update(
                    "balances",
                    "acc-1",
                    &json!({ "total": 40 }),
                )?])?;
            }
            Ok::<(), AppError>(())
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(queued_at_start.load(Ordering::SeqCst), 0);
    // 只应用了第二次尝试的结果
    assert_eq!(balance(&db).await, Some(42));
}
