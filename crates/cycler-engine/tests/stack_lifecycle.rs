//! Composite stack controller tests.
//!
//! Drives stacks through teardown, rebuild, scale down and scale up against
//! the simulated cloud and an in-memory state store.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use cycler_core::resource_types;
use cycler_engine::*;
use cycler_provider::sim::{SimGroup, SimStack};
use cycler_provider::*;
use cycler_state::*;

const TEMPLATE: &str = r#"{"Parameters": {"DBSnapshot": {"Type": "String"}}, "Resources": {}}"#;

fn evening() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 2, 19, 0, 0).unwrap()
}

fn settings() -> TaskSettings {
    let mut settings = TaskSettings::new("stacks");
    settings.rds_snapshot_parameter = Some("DBSnapshot".to_string());
    settings.grace_period = Duration::ZERO;
    settings
}

fn ctx<'a>(cloud: &'a SimulatedCloud, store: &'a StateStore) -> RunContext<'a> {
    RunContext::new(Clients::from_cloud(cloud), store, store, evening())
        .with_bucket_prefix("cycler")
        .with_settings(settings())
}

fn group(min: u32, max: u32, desired: u32) -> SimGroup {
    SimGroup {
        bounds: ScalingBounds::new(min, max, desired),
        ..SimGroup::default()
    }
}

fn stack(resources: Vec<StackResource>) -> SimStack {
    SimStack {
        status: "CREATE_COMPLETE".to_string(),
        template: TEMPLATE.to_string(),
        parameters: BTreeMap::from([("Env".to_string(), "staging".to_string())]),
        outputs: BTreeMap::from([("Url".to_string(), "http://app.internal".to_string())]),
        tags: BTreeMap::new(),
        resources,
    }
}

fn asg(id: &str) -> StackResource {
    StackResource::new("Asg", resource_types::SCALING_GROUP, id)
}

fn db(id: &str) -> StackResource {
    StackResource::new("Db", resource_types::DATABASE, id)
}

fn deleted(cloud: &SimulatedCloud, name: &str) -> bool {
    cloud
        .calls()
        .contains(&ProviderCall::DeleteStack(name.to_string()))
}

#[test]
fn stack_without_databases_is_saved_then_deleted() {
    let cloud = SimulatedCloud::new()
        .with_group("web-asg", group(1, 4, 2))
        .with_stack(
            "web",
            stack(vec![
                asg("web-asg"),
                StackResource::new("Sg", "AWS::EC2::SecurityGroup", "sg-1"),
            ]),
        );
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    Stack::new(&ctx, "web").stop(StackAction::Default).unwrap();

    assert!(deleted(&cloud, "web"));
    assert!(cloud.describe_stack("web").unwrap().is_none());

    let saved = ctx.snapshots().load("web").unwrap().unwrap();
    assert_eq!(saved.template, TEMPLATE);
    assert_eq!(saved.parameters["Env"], "staging");
    assert_eq!(saved.outputs["Url"], "http://app.internal");
    assert_eq!(saved.resources.scaling_groups["web-asg"], ScalingBounds::new(1, 4, 2));
    assert_eq!(saved.resources.resources["AWS::EC2::SecurityGroup"], vec!["sg-1"]);
}

#[test]
fn deleted_stack_is_rebuilt_from_saved_state() {
    let cloud = SimulatedCloud::new().with_stack("web", stack(Vec::new()));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let web = Stack::new(&ctx, "web");

    web.stop(StackAction::Default).unwrap();
    cloud.clear_calls();
    web.start(StackAction::Default).unwrap();

    let calls = cloud.calls();
    assert_eq!(calls.len(), 1);
    let ProviderCall::CreateStack(request) = &calls[0] else {
        panic!("expected a create call, got {calls:?}");
    };
    assert_eq!(request.template, TEMPLATE);
    assert_eq!(request.parameters["Env"], "staging");
    assert_eq!(request.tags["created-by"], "cloud-cycler");

    // Already present: a second start scales up, which has nothing to do.
    web.start(StackAction::Default).unwrap();
    assert_eq!(cloud.calls().len(), 1);
}

#[test]
fn single_database_is_snapshotted_and_restored() {
    let cloud = SimulatedCloud::new()
        .with_stack("app", stack(vec![db("app-db")]))
        .with_snapshot("app-db", "app-db-old", Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let app = Stack::new(&ctx, "app");

    app.stop(StackAction::Default).unwrap();
    assert_eq!(
        cloud.calls()[0],
        ProviderCall::CreateSnapshot {
            db_instance: "app-db".to_string(),
            snapshot: "app-db-cc-20260302190000".to_string(),
        }
    );
    assert!(deleted(&cloud, "app"));

    app.start(StackAction::Default).unwrap();
    let created = cloud.describe_stack("app").unwrap().unwrap();
    assert_eq!(created.parameters["DBSnapshot"], "app-db-cc-20260302190000");
}

#[test]
fn rebuild_picks_the_latest_database_snapshot() {
    let cloud = SimulatedCloud::new()
        .with_snapshot("app-db", "older", Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap())
        .with_snapshot("app-db", "newest", Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        .with_snapshot("other-db", "unrelated", Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    let mut resources = ResourceInventory::default();
    resources.add_resource(resource_types::DATABASE, "app-db");
    ctx.snapshots()
        .save(
            "app",
            &StackSnapshot {
                template: TEMPLATE.to_string(),
                parameters: BTreeMap::from([("DBSnapshot".to_string(), String::new())]),
                resources,
                outputs: BTreeMap::new(),
            },
        )
        .unwrap();

    Stack::new(&ctx, "app").rebuild().unwrap();
    let created = cloud.describe_stack("app").unwrap().unwrap();
    assert_eq!(created.parameters["DBSnapshot"], "newest");
}

#[test]
fn rebuild_with_two_recorded_databases_is_refused() {
    let cloud = SimulatedCloud::new();
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    let mut resources = ResourceInventory::default();
    resources.add_resource(resource_types::DATABASE, "db-a");
    resources.add_resource(resource_types::DATABASE, "db-b");
    ctx.snapshots()
        .save(
            "twin",
            &StackSnapshot {
                template: TEMPLATE.to_string(),
                resources,
                ..StackSnapshot::default()
            },
        )
        .unwrap();

    let err = Stack::new(&ctx, "twin").start(StackAction::Default).unwrap_err();
    assert!(matches!(err, CycleError::UnsafeRebuild { stack, .. } if stack == "twin"));
    assert!(cloud.calls().is_empty());
}

#[test]
fn starting_a_missing_stack_without_saved_state_does_nothing() {
    let cloud = SimulatedCloud::new();
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    Stack::new(&ctx, "ghost").start(StackAction::Default).unwrap();
    assert!(cloud.calls().is_empty());
}

#[test]
fn two_databases_fall_back_to_scale_down() {
    let cloud = SimulatedCloud::new()
        .with_group("multi-asg", group(2, 6, 3))
        .with_stack("multi", stack(vec![db("db-a"), db("db-b"), asg("multi-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let multi = Stack::new(&ctx, "multi");

    assert!(!multi.rebuild_safe().unwrap());
    multi.stop(StackAction::Default).unwrap();

    assert!(!deleted(&cloud, "multi"));
    assert_eq!(
        cloud.calls(),
        vec![ProviderCall::UpdateBounds("multi-asg".into(), ScalingBounds::ZERO)]
    );
    assert_eq!(
        ctx.snapshots().load_group_bounds("multi", "multi-asg").unwrap(),
        Some(ScalingBounds::new(2, 6, 3))
    );

    // Stopping again must not overwrite the saved sizes with zeros.
    multi.stop(StackAction::Default).unwrap();
    assert_eq!(
        ctx.snapshots().load_group_bounds("multi", "multi-asg").unwrap(),
        Some(ScalingBounds::new(2, 6, 3))
    );

    cloud.clear_calls();
    multi.start(StackAction::Default).unwrap();
    assert_eq!(
        cloud.calls(),
        vec![ProviderCall::UpdateBounds("multi-asg".into(), ScalingBounds::new(2, 6, 3))]
    );
}

#[test]
fn missing_scaling_group_is_left_out_of_the_inventory() {
    let cloud = SimulatedCloud::new()
        .with_group("live-asg", group(1, 2, 1))
        .with_stack("half", stack(vec![asg("ghost-asg"), asg("live-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let half = Stack::new(&ctx, "half");

    let inventory = half.resources_of("half").unwrap();
    assert_eq!(
        inventory.scaling_groups.keys().collect::<Vec<_>>(),
        vec!["live-asg"]
    );

    half.scale_down().unwrap();
    assert_eq!(
        cloud.calls(),
        vec![ProviderCall::UpdateBounds("live-asg".into(), ScalingBounds::ZERO)]
    );
}

#[test]
fn scale_up_without_saved_bounds_leaves_group_at_zero() {
    let cloud = SimulatedCloud::new()
        .with_group("cold-asg", group(0, 0, 0))
        .with_stack("cold", stack(vec![asg("cold-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    Stack::new(&ctx, "cold").scale_up().unwrap();
    assert!(cloud.calls().is_empty());
}

#[test]
fn database_without_declared_parameter_is_not_rebuild_safe() {
    let mut app = stack(vec![db("app-db")]);
    app.template = r#"{"Parameters": {"Other": {}}}"#.to_string();
    let cloud = SimulatedCloud::new().with_stack("app", app);
    let store = StateStore::open_in_memory().unwrap();

    let ctx = ctx(&cloud, &store);
    assert!(!Stack::new(&ctx, "app").rebuild_safe().unwrap());

    let unconfigured = RunContext::new(Clients::from_cloud(&cloud), &store, &store, evening());
    assert!(!Stack::new(&unconfigured, "app").rebuild_safe().unwrap());
}

#[test]
fn static_instances_are_never_torn_down() {
    let cloud = SimulatedCloud::new().with_stack(
        "legacy",
        stack(vec![StackResource::new("Box", resource_types::INSTANCE, "i-static")]),
    );
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    Stack::new(&ctx, "legacy").stop(StackAction::Default).unwrap();
    assert!(!deleted(&cloud, "legacy"));
}

#[test]
fn linked_stacks_are_scaled_down_instead_of_deleted() {
    let mut network = stack(vec![asg("net-asg")]);
    network.outputs = BTreeMap::from([("VpcId".to_string(), "vpc-123".to_string())]);
    let mut app = stack(vec![asg("app-asg")]);
    app.parameters = BTreeMap::from([("Vpc".to_string(), "vpc-123".to_string())]);

    let cloud = SimulatedCloud::new()
        .with_group("net-asg", group(1, 1, 1))
        .with_group("app-asg", group(1, 2, 1))
        .with_stack("network", network)
        .with_stack("app", app);
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    Stack::new(&ctx, "network").stop(StackAction::Default).unwrap();
    Stack::new(&ctx, "app").stop(StackAction::Default).unwrap();

    assert!(!deleted(&cloud, "network"));
    assert!(!deleted(&cloud, "app"));
    assert_eq!(cloud.fleet().groups["net-asg"].bounds, ScalingBounds::ZERO);
    assert_eq!(cloud.fleet().groups["app-asg"].bounds, ScalingBounds::ZERO);
}

#[test]
fn nested_stacks_are_recorded_recursively() {
    let cloud = SimulatedCloud::new()
        .with_group("inner-asg", group(1, 3, 2))
        .with_stack(
            "outer",
            stack(vec![StackResource::new("Inner", resource_types::STACK, "outer-inner")]),
        )
        .with_stack("outer-inner", stack(vec![asg("inner-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);

    // The child is nested, so it only scales down.
    Stack::new(&ctx, "outer-inner").stop(StackAction::Default).unwrap();
    assert!(!deleted(&cloud, "outer-inner"));
    Stack::new(&ctx, "outer-inner").start(StackAction::Default).unwrap();

    Stack::new(&ctx, "outer").stop(StackAction::Default).unwrap();
    assert!(deleted(&cloud, "outer"));
    let saved = ctx.snapshots().load("outer").unwrap().unwrap();
    assert_eq!(
        saved.resources.stacks["outer-inner"].scaling_groups["inner-asg"],
        ScalingBounds::new(1, 3, 2)
    );
}

#[test]
fn scale_down_action_never_deletes() {
    let cloud = SimulatedCloud::new()
        .with_group("web-asg", group(1, 2, 1))
        .with_stack("web", stack(vec![asg("web-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let web = Stack::new(&ctx, "web");

    web.stop(StackAction::ScaleDown).unwrap();
    assert!(!deleted(&cloud, "web"));
    assert_eq!(cloud.fleet().groups["web-asg"].bounds, ScalingBounds::ZERO);

    web.start(StackAction::ScaleDown).unwrap();
    assert_eq!(cloud.fleet().groups["web-asg"].bounds, ScalingBounds::new(1, 2, 1));
}

#[test]
fn failed_stacks_are_left_alone() {
    let mut broken = stack(Vec::new());
    broken.status = "ROLLBACK_FAILED".to_string();
    let cloud = SimulatedCloud::new().with_stack("broken", broken);
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store);
    let stack = Stack::new(&ctx, "broken");

    assert!(matches!(stack.state().unwrap(), StackState::Failed(status) if status == "ROLLBACK_FAILED"));
    stack.stop(StackAction::Default).unwrap();
    stack.start(StackAction::Default).unwrap();
    assert!(cloud.calls().is_empty());
}

/// Object store whose writes always fail.
struct ReadOnlyObjects(StateStore);

impl ObjectStore for ReadOnlyObjects {
    fn get_object(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        self.0.get_object(key)
    }

    fn put_object(&self, key: &str, _body: &[u8]) -> StateResult<()> {
        Err(StateError::storage("write", format!("bucket is read-only: {key}")))
    }

    fn list_objects(&self, prefix: &str) -> StateResult<Vec<String>> {
        self.0.list_objects(prefix)
    }

    fn delete_object(&self, key: &str) -> StateResult<bool> {
        self.0.delete_object(key)
    }
}

#[test]
fn persistence_failure_prevents_deletion() {
    let cloud = SimulatedCloud::new().with_stack("web", stack(Vec::new()));
    let store = StateStore::open_in_memory().unwrap();
    let objects = ReadOnlyObjects(store.clone());
    let ctx = RunContext::new(Clients::from_cloud(&cloud), &objects, &store, evening())
        .with_settings(settings());

    let err = Stack::new(&ctx, "web").stop(StackAction::Default).unwrap_err();
    assert!(matches!(err, CycleError::State(StateError::Storage { op: "write", .. })));
    assert!(!deleted(&cloud, "web"));
    assert!(cloud.describe_stack("web").unwrap().is_some());
}

#[test]
fn dryrun_touches_nothing() {
    let cloud = SimulatedCloud::new()
        .with_group("web-asg", group(1, 2, 1))
        .with_stack("web", stack(vec![asg("web-asg")]));
    let store = StateStore::open_in_memory().unwrap();
    let ctx = ctx(&cloud, &store).with_dryrun(true);

    Stack::new(&ctx, "web").stop(StackAction::Default).unwrap();
    Stack::new(&ctx, "web").stop(StackAction::ScaleDown).unwrap();
    assert!(cloud.calls().is_empty());
    assert!(ctx.snapshots().saved_stacks().unwrap().is_empty());
}
