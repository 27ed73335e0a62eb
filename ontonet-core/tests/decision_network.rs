//! End-to-end behavior of the event-condition-action loop

use ontonet_core::{
    Action, AttributeCondition, AttributeValue, DecisionRule, EffectError, Engine, Notice,
    OntologyObject, Operator, RuleEffect,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

fn requirement(engine: &Engine) {
    engine.register_object(
        OntologyObject::new("req_1", "requirement")
            .with_attribute("security_level", "B")
            .with_attribute("status", "open"),
    );
}

/// Action that appends its `tag` parameter to a shared log
fn recording_action(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Action {
    let log = Arc::clone(log);
    Action::from_fn(name, move |_, params| {
        let tag = params
            .get("tag")
            .and_then(AttributeValue::as_str)
            .unwrap_or("?")
            .to_string();
        log.lock().push(tag);
        Ok(())
    })
}

fn tagged_rule(id: &str, priority: i32) -> DecisionRule {
    DecisionRule::new(id, id)
        .with_priority(priority)
        .with_condition(AttributeCondition::new().on_attribute("security_level"))
        .then(RuleEffect::new("record", "$source").with_param("tag", id))
}

#[test]
fn test_rules_fire_in_descending_priority_with_stable_ties() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_action(recording_action("record", &log)).unwrap();

    for (id, priority) in [("p5", 5), ("p10a", 10), ("p10b", 10), ("p1", 1)] {
        engine.register_rule(tagged_rule(id, priority)).unwrap();
    }

    engine.update_attribute("req_1", "security_level", "A").unwrap();

    insta::assert_snapshot!(log.lock().join(" > "), @"p10a > p10b > p5 > p1");
}

#[test]
fn test_firing_order_is_deterministic_across_engines() {
    let run = || {
        let engine = Engine::with_defaults();
        requirement(&engine);
        let log = Arc::new(Mutex::new(Vec::new()));
        engine.register_action(recording_action("record", &log)).unwrap();
        for (id, priority) in [("a", 3), ("b", 3), ("c", 7), ("d", 3), ("e", -1)] {
            engine.register_rule(tagged_rule(id, priority)).unwrap();
        }
        engine.update_attribute("req_1", "security_level", "A").unwrap();
        let order = log.lock().clone();
        order
    };
    assert_eq!(run(), run());
    assert_eq!(run(), vec!["c", "a", "b", "d", "e"]);
}

proptest! {
    #[test]
    fn prop_firing_order_sorts_by_priority_then_registration(
        priorities in prop::collection::vec(-5i32..5, 1..12)
    ) {
        let engine = Engine::with_defaults();
        requirement(&engine);
        let log = Arc::new(Mutex::new(Vec::new()));
        engine.register_action(recording_action("record", &log)).unwrap();
        for (i, priority) in priorities.iter().enumerate() {
            engine.register_rule(tagged_rule(&format!("r{}", i), *priority)).unwrap();
        }

        engine.update_attribute("req_1", "security_level", "A").unwrap();

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&i| std::cmp::Reverse(priorities[i]));
        let expected: Vec<String> = expected.into_iter().map(|i| format!("r{}", i)).collect();
        prop_assert_eq!(log.lock().clone(), expected);
    }
}

#[test]
fn test_cascade_of_a_thousand_updates_stays_flat() {
    let engine = Engine::with_defaults();
    engine.register_object(OntologyObject::new("counter", "counter").with_attribute("n", 0));
    engine
        .register_action(Action::from_fn("increment", |ctx, _| {
            let n = ctx
                .target()
                .attribute("n")
                .and_then(AttributeValue::as_f64)
                .unwrap_or_default();
            ctx.set_attribute("n", n + 1.0)?;
            Ok(())
        }))
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("chain", "chain")
                .with_condition(
                    AttributeCondition::new()
                        .on_attribute("n")
                        .compare(Operator::LessThan, 1000),
                )
                .then(RuleEffect::new("increment", "$source")),
        )
        .unwrap();

    engine.update_attribute("counter", "n", 1).unwrap();

    let counter = engine.object("counter").unwrap();
    assert_eq!(counter.attribute("n"), Some(&AttributeValue::from(1000)));
    let stats = engine.stats();
    assert_eq!(stats.events_processed, 1000);
    assert_eq!(stats.rules_fired, 999);
    assert_eq!(stats.max_dispatch_depth, 1);
    assert!(!engine.is_draining());
}

#[test]
fn test_cascaded_event_is_processed_before_outer_call_returns() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    engine
        .register_rule(
            DecisionRule::new("escalate", "escalate")
                .with_condition(
                    AttributeCondition::new()
                        .on_attribute("security_level")
                        .compare(Operator::Equals, "A"),
                )
                .then(
                    RuleEffect::new("set_attribute", "$source")
                        .with_param("attribute", "status")
                        .with_param("value", "review"),
                ),
        )
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("on_review", "on review")
                .with_condition(
                    AttributeCondition::new()
                        .on_attribute("status")
                        .compare(Operator::Equals, "review"),
                )
                .then(RuleEffect::new("enable_review", "$source")),
        )
        .unwrap();

    engine.update_attribute("req_1", "security_level", "A").unwrap();

    let req = engine.object("req_1").unwrap();
    assert_eq!(req.attribute("status"), Some(&AttributeValue::from("review")));
    assert_eq!(req.attribute("review_required"), Some(&AttributeValue::Bool(true)));
}

#[test]
fn test_disabled_rule_never_fires() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_action(recording_action("record", &log)).unwrap();
    engine.register_rule(tagged_rule("off", 10)).unwrap();
    engine.register_rule(tagged_rule("on", 1)).unwrap();

    engine.set_rule_enabled("off", false).unwrap();
    engine.update_attribute("req_1", "security_level", "A").unwrap();

    assert_eq!(*log.lock(), vec!["on"]);
    assert!(!engine
        .notices()
        .iter()
        .any(|n| matches!(n, Notice::RuleFired { rule, .. } if rule.as_str() == "off")));
}

#[test]
fn test_rule_disabled_by_earlier_rule_is_skipped_for_same_event() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_action(recording_action("record", &log)).unwrap();
    engine
        .register_action(Action::from_fn("disable_low", |ctx, _| {
            ctx.engine().set_rule_enabled("low", false)?;
            Ok(())
        }))
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("high", "high")
                .with_priority(10)
                .when(|e| e.attribute() == "security_level")
                .then(RuleEffect::new("disable_low", "$source")),
        )
        .unwrap();
    engine.register_rule(tagged_rule("low", 1)).unwrap();

    engine.update_attribute("req_1", "security_level", "A").unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn test_unknown_target_is_skipped_and_rest_still_runs() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    engine
        .register_rule(
            DecisionRule::new("mixed", "mixed")
                .with_priority(5)
                .with_condition(AttributeCondition::new().on_attribute("security_level"))
                .then(RuleEffect::new("power_on", "rig_missing"))
                .then(RuleEffect::new("warp_drive", "$source"))
                .then(RuleEffect::new("code_review", "$source")),
        )
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("later", "later")
                .with_condition(AttributeCondition::new().on_attribute("security_level"))
                .then(RuleEffect::new("static_analysis", "$source")),
        )
        .unwrap();

    engine.update_attribute("req_1", "security_level", "A").unwrap();

    let req = engine.object("req_1").unwrap();
    assert_eq!(
        req.attribute("code_review_status"),
        Some(&AttributeValue::from("in_progress"))
    );
    assert_eq!(
        req.attribute("static_analysis_status"),
        Some(&AttributeValue::from("running"))
    );
    let notices = engine.notices();
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::TargetNotFound { object, .. } if object.as_str() == "rig_missing")));
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::ActionNotFound { action, .. } if action == "warp_drive")));
    assert_eq!(engine.stats().effects_skipped, 2);
}

#[test]
fn test_faulting_effects_are_isolated() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    engine
        .register_action(Action::from_fn("panics", |_, _| panic!("effect blew up")))
        .unwrap();
    engine
        .register_action(Action::from_fn("fails", |_, _| {
            Err(EffectError::Failed("bad input".to_string()))
        }))
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("faulty", "faulty")
                .with_priority(1)
                .with_condition(AttributeCondition::new().on_attribute("security_level"))
                .then(RuleEffect::new("panics", "$source"))
                .then(RuleEffect::new("fails", "$source"))
                .then(RuleEffect::new("power_on", "$source")),
        )
        .unwrap();

    engine.update_attribute("req_1", "security_level", "A").unwrap();

    assert_eq!(
        engine.object("req_1").unwrap().attribute("power_status"),
        Some(&AttributeValue::from("on"))
    );
    let stats = engine.stats();
    assert_eq!(stats.effects_failed, 2);
    assert!(engine.notices().iter().any(
        |n| matches!(n, Notice::EffectFault { reason, .. } if reason.contains("effect blew up"))
    ));

    // the engine keeps working after the faults
    engine.update_attribute("req_1", "status", "closed").unwrap();
    assert!(!engine.is_draining());
}

#[test]
fn test_reregistered_object_is_replaced_not_merged() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    engine.register_object(OntologyObject::new("req_1", "requirement").with_attribute("owner", "kim"));

    engine.update_attribute("req_1", "status", "done").unwrap();

    let req = engine.object("req_1").unwrap();
    assert_eq!(req.attributes.len(), 2);
    assert_eq!(req.attribute("owner"), Some(&AttributeValue::from("kim")));
    assert_eq!(req.attribute("security_level"), None);
}

#[test]
fn test_literal_target_receives_effect() {
    let engine = Engine::with_defaults();
    requirement(&engine);
    engine.register_object(OntologyObject::new("rig_1", "test_platform"));
    engine
        .register_rule(
            DecisionRule::new("reserve", "reserve")
                .with_condition(
                    AttributeCondition::new()
                        .on_type("requirement")
                        .on_attribute("security_level")
                        .compare(Operator::Equals, "A"),
                )
                .then(RuleEffect::new("reserve_platform", "rig_1").with_param("platform", "hil"))
                .then(
                    RuleEffect::new("load_firmware", "rig_1").with_param("firmware_version", "2.1"),
                ),
        )
        .unwrap();

    engine.update_attribute("req_1", "security_level", "A").unwrap();

    let rig = engine.object("rig_1").unwrap();
    assert_eq!(rig.attribute("reserved_platform"), Some(&AttributeValue::from("hil")));
    assert_eq!(rig.attribute("firmware"), Some(&AttributeValue::from("2.1")));
}

#[test]
fn test_concurrent_updates_all_processed() {
    let engine = Arc::new(Engine::with_defaults());
    for i in 0..4 {
        engine.register_object(OntologyObject::new(format!("obj_{}", i), "widget"));
    }
    engine
        .register_rule(
            DecisionRule::new("count", "count")
                .with_condition(AttributeCondition::new().on_attribute("tick"))
                .then(RuleEffect::new("notify", "$source").with_param("message", "tick")),
        )
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for n in 0..25 {
                    engine
                        .update_attribute(&format!("obj_{}", i), "tick", n)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = engine.stats();
    assert_eq!(stats.events_processed, 100);
    assert_eq!(stats.rules_fired, 100);
    assert!(!engine.is_draining());
}

#[test]
fn test_update_during_foreign_drain_waits_for_its_rules() {
    let engine = Arc::new(Engine::with_defaults());
    engine.register_object(OntologyObject::new("panel", "widget"));

    let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    engine
        .register_action(Action::from_fn("hold", move |_, _| {
            entered_tx.lock().send(()).unwrap();
            release_rx.lock().recv().unwrap();
            Ok(())
        }))
        .unwrap();
    let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    engine
        .register_action(Action::from_fn("count", move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("ra", "ra")
                .when(|e| e.attribute() == "a")
                .then(RuleEffect::new("hold", "$source")),
        )
        .unwrap();
    engine
        .register_rule(
            DecisionRule::new("rb", "rb")
                .when(|e| e.attribute() == "b")
                .then(RuleEffect::new("count", "$source")),
        )
        .unwrap();

    let drainer = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.update_attribute("panel", "a", 1).unwrap())
    };
    entered_rx.recv().unwrap();
    assert!(engine.is_draining());

    let waiter = {
        let engine = Arc::clone(&engine);
        let fired = Arc::clone(&fired);
        std::thread::spawn(move || {
            engine.update_attribute("panel", "b", 1).unwrap();
            fired.load(std::sync::atomic::Ordering::SeqCst)
        })
    };
    std::thread::sleep(std::time::Duration::from_millis(50));
    release_tx.send(()).unwrap();

    drainer.join().unwrap();
    assert_eq!(waiter.join().unwrap(), 1);
    assert_eq!(engine.stats().max_dispatch_depth, 1);
}
