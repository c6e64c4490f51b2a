//! End-to-end scenarios exercising the tree walk, retry loop, dynamic graft,
//! parallel fanout, and mirror-order undo together.

use std::sync::Arc;
use std::time::Duration;

use async_std::sync::Mutex;

use revop::{kind, Error, Handle, HookArgs, Hooks, ImmediateClock, Template};

#[derive(Clone)]
struct AddParams {
    amount: i64,
    ledger: Arc<Mutex<i64>>,
}

fn add_template() -> Template<AddParams, i64, String> {
    Template::builder()
        .exec(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value += args.params.amount;
                Ok(*value)
            })
        })
        .undo(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value -= args.params.amount;
                Ok(*value)
            })
        })
        .build()
}

fn add(template: &Template<AddParams, i64, String>, amount: i64, ledger: &Arc<Mutex<i64>>) -> Handle<AddParams, i64, String> {
    template.create(AddParams {
        amount,
        ledger: ledger.clone(),
    })
}

#[async_std::test]
async fn sequential_chain_advances_in_order() {
    let ledger = Arc::new(Mutex::new(0i64));
    let template = add_template();

    let root = add(&template, 1, &ledger);
    let second = add(&template, 1, &ledger);
    let third = add(&template, 1, &ledger);
    root.add_child(second, false, false).await.unwrap();
    root.add_child(third, false, false).await.unwrap();

    let results = root.exec(None, None).await.unwrap();
    assert_eq!(*ledger.lock().await, 3);
    assert_eq!(results.len(), 3);
}

#[async_std::test]
async fn before_rotation_runs_newest_first() {
    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let make = |label: &'static str, order: Arc<Mutex<Vec<&'static str>>>| {
        Template::<(), (), String>::builder()
            .exec(move |_args: HookArgs<(), (), String>| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().await.push(label);
                    Ok(())
                })
            })
            .build()
    };

    let root_template = make("root", order.clone());
    let a_template = make("A", order.clone());
    let b_template = make("B", order.clone());

    let root = root_template.create(());
    let a = a_template.create(());
    let b = b_template.create(());

    root.add_child(a, true, false).await.unwrap();
    root.add_child(b, true, false).await.unwrap();

    root.exec(None, None).await.unwrap();

    // `root.before_child = B`, `B.before_child = A` (the left-rotation): A is
    // nested deepest, so its before-phase (and so its own action) completes
    // first, then B's, then root's own.
    assert_eq!(*order.lock().await, vec!["A", "B", "root"]);
}

#[async_std::test]
async fn retry_succeeds_on_second_attempt() {
    let attempts = Arc::new(Mutex::new(0u32));
    let clock = Arc::new(ImmediateClock::default());

    let template: Template<(), i64, String> = Template::builder()
        .exec({
            let attempts = attempts.clone();
            move |_args: HookArgs<(), i64, String>| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    let mut count = attempts.lock().await;
                    *count += 1;
                    if *count == 1 {
                        Err("not yet".to_string())
                    } else {
                        Ok(42)
                    }
                })
            }
        })
        .clock(clock.clone())
        .build();

    let root = template.create(());
    let results = root
        .exec(Some(2), Some(Duration::from_millis(10)))
        .await
        .unwrap();

    assert_eq!(*attempts.lock().await, 2);
    assert_eq!(clock.delays.lock().await.len(), 1);
    assert_eq!(results.len(), 2);
}

#[async_std::test]
async fn dynamic_graft_runs_before_user_action_completes() {
    let ledger = Arc::new(Mutex::new(0i64));

    let mut hooks = Hooks::new();
    hooks.set(kind::PRE_DURING_EXEC_ONLY, {
        move |args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let grafted = add_template().create(AddParams {
                    amount: 5,
                    ledger: args.params.ledger.clone(),
                });
                args.handle.add_child(grafted, false, false).await.ok();
                Ok(None)
            })
        }
    });

    let template = Template::builder()
        .exec(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value += args.params.amount;
                Ok(*value)
            })
        })
        .undo(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value -= args.params.amount;
                Ok(*value)
            })
        })
        .hooks(hooks)
        .build();

    let root = add(&template, 1, &ledger);
    root.exec(None, None).await.unwrap();
    assert_eq!(*ledger.lock().await, 6);

    root.undo(None, None).await.unwrap();
    assert_eq!(*ledger.lock().await, 0);
}

#[async_std::test]
async fn parallel_composite_runs_every_child_even_on_failure() {
    let ledger = Arc::new(Mutex::new(0i64));

    let ok_template: Template<AddParams, i64, String> = Template::builder()
        .exec(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value += args.params.amount;
                Ok(*value)
            })
        })
        .build();
    let failing_template: Template<AddParams, i64, String> = Template::builder()
        .exec(|_args: HookArgs<AddParams, i64, String>| Box::pin(async move { Err("boom".to_string()) }))
        .build();

    let c1 = ok_template.create(AddParams { amount: 1, ledger: ledger.clone() });
    let c2 = failing_template.create(AddParams { amount: 2, ledger: ledger.clone() });
    let c3 = ok_template.create(AddParams { amount: 3, ledger: ledger.clone() });

    let root_template: Template<AddParams, i64, String> = Template::builder().build();
    let root = root_template.create(AddParams { amount: 0, ledger: ledger.clone() });
    root.add_child(vec![c1, c2, c3], false, false).await.unwrap();

    let err = root.exec(None, None).await.unwrap_err();
    match err {
        Error::Failed(outcomes) => assert_eq!(outcomes.len(), 3),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(*ledger.lock().await, 4);
}

#[async_std::test]
async fn undo_after_failure_restores_only_what_succeeded() {
    let ledger = Arc::new(Mutex::new(0i64));

    let limit_template: Template<AddParams, i64, String> = Template::builder()
        .exec(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let value = *args.params.ledger.lock().await;
                if value >= 2 {
                    Err("limit reached".to_string())
                } else {
                    let mut guard = args.params.ledger.lock().await;
                    *guard += args.params.amount;
                    Ok(*guard)
                }
            })
        })
        .undo(|args: HookArgs<AddParams, i64, String>| {
            Box::pin(async move {
                let mut value = args.params.ledger.lock().await;
                *value -= args.params.amount;
                Ok(*value)
            })
        })
        .build();

    let root = add(&limit_template, 1, &ledger);
    let second = add(&limit_template, 1, &ledger);
    let third = add(&limit_template, 1, &ledger);
    root.add_child(second, false, false).await.unwrap();
    root.add_child(third, false, false).await.unwrap();

    let err = root.exec(None, None).await.unwrap_err();
    assert!(matches!(err, Error::Failed(_)));
    assert_eq!(*ledger.lock().await, 2);

    root.undo(None, None).await.unwrap();
    assert_eq!(*ledger.lock().await, 0);
}
