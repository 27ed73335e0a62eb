//! Resource arbitration through the engine, including rule-driven requests

use ontonet_core::{
    AttributeValue, Catalog, DecisionRule, Denial, Engine, Notice, OntologyObject, Project,
    ProjectId, ProjectStatus, ResourceId, RuleEffect,
};
use std::sync::Arc;

fn engine_with_projects() -> Engine {
    let engine = Engine::with_defaults();
    engine.add_resource("rig", "HIL test rig").unwrap();
    engine.register_project(Project::new("p1", 5)).unwrap();
    engine.register_project(Project::new("p2", 10)).unwrap();
    engine.register_project(Project::new("p3", 10)).unwrap();
    engine
}

#[test]
fn test_strictly_higher_priority_preempts_equal_is_denied() {
    let engine = engine_with_projects();
    assert!(engine.request_resource("rig", "p1").is_granted());

    let allocation = engine.request_resource("rig", "p2");
    assert!(allocation.is_granted());
    assert_eq!(allocation.preempted(), Some(&ProjectId::new("p1")));

    let p1 = engine.project("p1").unwrap();
    assert_eq!(p1.status, ProjectStatus::Suspended);
    assert!(!p1.holds("rig"));
    assert_eq!(engine.resource("rig").unwrap().owner, Some(ProjectId::new("p2")));

    let denied = engine.request_resource("rig", "p3");
    assert!(!denied.is_granted());
    assert!(matches!(
        denied.denial(),
        Some(Denial::Contended { owner, owner_priority: 10, .. }) if owner.as_str() == "p2"
    ));
    assert_eq!(engine.project("p2").unwrap().status, ProjectStatus::Active);

    let kinds: Vec<&str> = engine
        .notices()
        .iter()
        .map(|n| match n {
            Notice::ResourceGranted { .. } => "granted",
            Notice::ResourcePreempted { .. } => "preempted",
            Notice::ResourceDenied { .. } => "denied",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["granted", "preempted", "granted", "denied"]);
}

#[test]
fn test_release_then_any_priority_succeeds() {
    let engine = engine_with_projects();
    engine.request_resource("rig", "p2");

    assert_eq!(engine.release_resource("rig").unwrap(), Some(ProjectId::new("p2")));
    let rig = engine.resource("rig").unwrap();
    assert!(rig.is_available());
    assert_eq!(rig.owner, None);

    assert!(engine.request_resource("rig", "p1").is_granted());
    assert_eq!(
        engine.allocations(),
        vec![(ResourceId::new("rig"), ProjectId::new("p1"))]
    );
}

#[test]
fn test_preemption_scoped_to_contended_resource() {
    let engine = engine_with_projects();
    engine.add_resource("bench", "Lab bench").unwrap();
    engine.request_resource("rig", "p1");
    engine.request_resource("bench", "p1");

    engine.request_resource("rig", "p2");

    let p1 = engine.project("p1").unwrap();
    assert_eq!(p1.status, ProjectStatus::Suspended);
    assert!(p1.holds("bench"));
    assert_eq!(engine.resource("bench").unwrap().owner, Some(ProjectId::new("p1")));
}

#[test]
fn test_rule_driven_acquisition_and_denial() {
    let engine = engine_with_projects();
    engine.register_object(OntologyObject::new("build_1", "build"));
    engine.register_object(OntologyObject::new("build_2", "build"));
    for (id, project) in [("acquire_p2", "p2"), ("acquire_p3", "p3")] {
        let object = if project == "p2" { "build_1" } else { "build_2" };
        engine
            .register_rule(
                DecisionRule::new(id, id)
                    .when(move |e| {
                        e.object_id().as_str() == object
                            && e.attribute() == "stage"
                            && e.new_value() == &AttributeValue::from("hil")
                    })
                    .then(
                        RuleEffect::new("acquire_resource", "$source")
                            .with_param("resource", "rig")
                            .with_param("project", project),
                    ),
            )
            .unwrap();
    }

    engine.update_attribute("build_1", "stage", "hil").unwrap();
    engine.update_attribute("build_2", "stage", "hil").unwrap();

    assert_eq!(
        engine.object("build_1").unwrap().attribute("held_resource"),
        Some(&AttributeValue::from("rig"))
    );
    assert_eq!(engine.object("build_2").unwrap().attribute("held_resource"), None);
    assert!(engine.notices().iter().any(|n| matches!(
        n,
        Notice::Notification { object, message } if object.as_str() == "build_2" && message.contains("not granted")
    )));
}

#[test]
fn test_project_removal_releases_holdings() {
    let engine = engine_with_projects();
    engine.request_resource("rig", "p3");

    engine.remove_project("p3").unwrap();
    assert!(engine.resource("rig").unwrap().is_available());
    assert!(engine.request_resource("rig", "p1").is_granted());
}

#[test]
fn test_unregistered_project_is_denied() {
    let engine = engine_with_projects();
    let allocation = engine.request_resource("rig", "nobody");
    assert!(matches!(allocation.denial(), Some(Denial::UnknownProject { .. })));
    assert!(engine.resource("rig").unwrap().is_available());
}

#[test]
fn test_racing_requests_grant_exactly_one() {
    let engine = Arc::new(Engine::with_defaults());
    engine.add_resource("rig", "rig").unwrap();
    for i in 0..16 {
        engine
            .register_project(Project::new(format!("team_{}", i), 3))
            .unwrap();
    }

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.request_resource("rig", &format!("team_{}", i)))
        })
        .collect();
    let granted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|a| a.is_granted())
        .count();

    assert_eq!(granted, 1);
    assert_eq!(engine.allocations().len(), 1);
}

#[test]
fn test_catalog_defined_projects_and_resources() {
    let engine = Engine::with_defaults();
    let catalog = Catalog::from_yaml_str(
        r#"
resources:
  - id: rig
    name: HIL rig
projects:
  - id: safety
    priority: 10
  - id: infotainment
    priority: 2
"#,
    )
    .unwrap();
    catalog.apply(&engine).unwrap();

    assert!(engine.request_resource("rig", "infotainment").is_granted());
    assert!(engine.request_resource("rig", "safety").is_granted());
    assert_eq!(
        engine.project("infotainment").unwrap().status,
        ProjectStatus::Suspended
    );
}
