mod common;

use std::cell::RefCell;

use planledger_engine::{Agent, EngineConfig, GeneratorError, PlanRunner, RunStatus};
use planledger_store::StoreHandle;

use common::{generated, stock, sunglasses_store};

/// Stands in for a model: answers from a fixed script and records what it saw.
struct ScriptedGenerator {
    seen: RefCell<Vec<String>>,
}

impl planledger_engine::PlanGenerator for ScriptedGenerator {
    fn generate(&self, schema: &str, request: &str) -> Result<String, GeneratorError> {
        self.seen.borrow_mut().push(schema.to_string());
        if request.contains("return") {
            Ok(generated(
                r#"{"intent": "mutate", "steps": [
                    {"op": "find", "bind": "items", "where": "named_in_request"},
                    {"op": "require", "check": {"matched": "items"},
                     "otherwise": {"status": "no_match", "text": "Which style?"}},
                    {"op": "for_each", "bind": "items", "as": "item", "steps": [
                        {"op": "adjust_stock", "item": {"first": "item"}, "delta": 1},
                        {"op": "append_entry", "customer": "Walk-in customer",
                         "summary": "Return of {item.name}",
                         "amount": {"line_total": {"item": {"first": "item"}, "quantity": 1}},
                         "prefix": "RET"}
                    ]},
                    {"op": "answer", "status": "success", "text": "Returned {items.names}."}
                ]}"#,
            ))
        } else {
            Err(GeneratorError::Failed("model refused".into()))
        }
    }
}

#[test]
fn schema_is_rebuilt_for_each_request() {
    let generator = ScriptedGenerator {
        seen: RefCell::new(Vec::new()),
    };
    let agent = Agent::with_config(generator, EngineConfig::default().with_schema_sample_size(6));
    let mut store = sunglasses_store();

    let reply = agent
        .handle(&mut store, "I'd like to return one Moon and one Sport, please")
        .unwrap();
    assert_eq!(reply.result.status(), RunStatus::Success);
    assert_eq!(reply.result.user_message(), "Returned Sport, Moon.");
    assert_eq!(stock(&store, "SG004"), 9);
    assert_eq!(stock(&store, "SG006"), 5);

    let ids: Vec<&str> = store
        .entries()
        .iter()
        .map(|e| e.transaction_id.as_str())
        .collect();
    assert_eq!(ids, vec!["TXN001", "RET001", "RET002"]);

    agent.handle(&mut store, "return the Aviator").unwrap();
    assert_eq!(stock(&store, "SG001"), 24);

    let seen = agent.generator().seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].contains("collection `ledger` (1 rows)"));
    assert!(seen[1].contains("collection `ledger` (3 rows)"));
    assert!(seen[1].contains("\"item_id\":\"SG006\""));
}

#[test]
fn generator_failure_is_reported_not_raised() {
    let agent = Agent::new(ScriptedGenerator {
        seen: RefCell::new(Vec::new()),
    });
    let mut store = sunglasses_store();
    let before = store.snapshot();

    let reply = agent.handle(&mut store, "what's the meaning of life?").unwrap();
    assert_eq!(
        reply.generator_error,
        Some(GeneratorError::Failed("model refused".into()))
    );
    assert_eq!(reply.result.status(), RunStatus::Faulted);
    assert!(!reply.result.user_message().is_empty());
    assert_eq!(store.snapshot(), before);
}

#[test]
fn shared_store_serializes_runs_across_threads() {
    let handle = StoreHandle::new(sunglasses_store());
    let plan = generated(
        r#"{"steps": [
            {"op": "adjust_stock", "item": {"id": "SG002"}, "delta": -1},
            {"op": "append_entry", "customer": "Online", "summary": "Sale of Wayfarer", "amount": "-95.00"},
            {"op": "answer", "status": "success", "text": "ok"}
        ]}"#,
    );

    let threads: Vec<_> = (0..5)
        .map(|_| {
            let handle = handle.clone();
            let plan = plan.clone();
            std::thread::spawn(move || {
                PlanRunner::default()
                    .run_shared(&plan, &handle, "buy a wayfarer")
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for t in threads {
        assert_eq!(t.join().unwrap(), RunStatus::Success);
    }

    let snapshot = handle.snapshot().unwrap();
    let wayfarer = snapshot
        .items
        .iter()
        .find(|i| i.item_id.as_str() == "SG002")
        .unwrap();
    assert_eq!(wayfarer.quantity_in_stock, 10);
    assert_eq!(snapshot.entries.len(), 6);
    assert_eq!(snapshot.entries[5].transaction_id.as_str(), "TXN006");
    assert_eq!(snapshot.entries[5].balance_after.cents(), 50_000 - 5 * 9_500);
}
