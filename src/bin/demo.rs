//! A small runnable illustration: a sequential chain of in-memory ledger
//! additions, executed then undone.

use std::sync::Arc;

use async_std::sync::Mutex;
use async_std::task;

use revop::{HookArgs, Template};

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

fn main() {
    task::block_on(async {
        let _guard = revop::init_logging();

        let ledger = Arc::new(Mutex::new(0i64));
        let template = add_template();

        let root = template.create(AddParams {
            amount: 1,
            ledger: ledger.clone(),
        });
        let second = template.create(AddParams {
            amount: 1,
            ledger: ledger.clone(),
        });
        let third = template.create(AddParams {
            amount: 1,
            ledger: ledger.clone(),
        });

        root.add_child(second, false, false)
            .await
            .expect("link second after-child");
        root.add_child(third, false, false)
            .await
            .expect("link third after-child");

        match root.exec(None, None).await {
            Ok(results) => {
                println!("chain succeeded with {} recorded outcome(s)", results.len());
                println!("ledger now at {}", *ledger.lock().await);
            }
            Err(err) => {
                eprintln!("chain failed: {err}");
                return;
            }
        }

        let results = root.undo(None, None).await.expect("undo should succeed");
        println!("undo recorded {} outcome(s)", results.len());
        println!("ledger restored to {}", *ledger.lock().await);
    });
}
