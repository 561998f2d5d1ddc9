//! Spawn admission: idempotency, budgets, and stage ordering.

use zonesim_core::{
    command::{SpawnOrder, SpawnRejection},
    types::Vec2,
    zone::ZoneRuntime,
};

fn order(order_id: &str, template_id: &str, count: u32) -> SpawnOrder {
    SpawnOrder {
        order_id: order_id.into(),
        zone_id: "meadow".into(),
        template_id: template_id.into(),
        position: Vec2::new(50.0, 50.0),
        count,
    }
}

#[test]
fn scenario_a_threat_budget_binds_before_population() {
    // meadow: max_population=5, max_threat=10; wolf threat=3
    let mut zone = ZoneRuntime::build_test("meadow", 42).unwrap();

    let receipt = zone.submit_spawn_order(order("a-1", "wolf", 2)).unwrap();
    assert_eq!(receipt.agent_ids.len(), 2);
    let stats = zone.stats();
    assert_eq!(stats.population, 2);
    assert_eq!(stats.threat, 6);

    let err = zone.submit_spawn_order(order("a-2", "wolf", 2)).unwrap_err();
    assert_eq!(err, SpawnRejection::ThreatBudgetExceeded);
    assert_eq!(err.to_string(), "threat budget exceeded");

    let stats = zone.stats();
    assert_eq!(stats.population, 2, "rejected order must not create agents");
    assert_eq!(stats.threat, 6);
}

#[test]
fn same_order_id_is_always_a_duplicate() {
    let mut zone = ZoneRuntime::build_test("meadow", 1).unwrap();
    zone.submit_spawn_order(order("dup", "wolf", 1)).unwrap();

    // Same id, different payload: still a duplicate.
    let err = zone.submit_spawn_order(order("dup", "sentinel", 1)).unwrap_err();
    assert_eq!(err, SpawnRejection::DuplicateOrder);
    assert!(err.is_duplicate());

    // The record never expires.
    zone.run_ticks(100);
    let err = zone.submit_spawn_order(order("dup", "wolf", 1)).unwrap_err();
    assert_eq!(err, SpawnRejection::DuplicateOrder);
    assert_eq!(zone.population(), 1);
}

#[test]
fn rejected_order_id_is_remembered() {
    let mut zone = ZoneRuntime::build_test("meadow", 1).unwrap();

    let err = zone.submit_spawn_order(order("r-1", "wolf", 0)).unwrap_err();
    assert_eq!(err, SpawnRejection::InvalidCount);
    assert!(zone.is_processed("r-1"));

    // A corrected resubmission under the same id is turned away.
    let err = zone.submit_spawn_order(order("r-1", "wolf", 1)).unwrap_err();
    assert_eq!(err, SpawnRejection::DuplicateOrder);
    assert_eq!(zone.population(), 0);
}

#[test]
fn population_budget_rejects_whole_order() {
    let mut zone = ZoneRuntime::build_test("meadow", 1).unwrap();
    // wisp: threat 1, so only population can bind (max 5).
    zone.submit_spawn_order(order("p-1", "wisp", 4)).unwrap();

    let err = zone.submit_spawn_order(order("p-2", "wisp", 2)).unwrap_err();
    assert_eq!(err, SpawnRejection::PopulationBudgetExceeded);
    assert_eq!(err.to_string(), "population budget exceeded");
    assert_eq!(zone.population(), 4, "no partial spawn");

    zone.submit_spawn_order(order("p-3", "wisp", 1)).unwrap();
    assert_eq!(zone.population(), 5);
}

#[test]
fn count_must_be_between_one_and_ten() {
    let mut zone = ZoneRuntime::build_test("caves", 1).unwrap();
    for (id, count) in [("c-0", 0), ("c-11", 11)] {
        let mut o = order(id, "wisp", count);
        o.zone_id = "caves".into();
        o.position = Vec2::new(0.5, 0.5);
        let err = zone.submit_spawn_order(o).unwrap_err();
        assert_eq!(err.to_string(), "count must be 1-10");
    }

    let mut o = order("c-10", "wisp", 10);
    o.zone_id = "caves".into();
    o.position = Vec2::new(0.5, 0.5);
    assert_eq!(zone.submit_spawn_order(o).unwrap().agent_ids.len(), 10);
}

#[test]
fn stages_short_circuit_in_order() {
    let mut zone = ZoneRuntime::build_test("meadow", 1).unwrap();

    // Wrong zone AND unknown template AND bad count: zone mismatch wins.
    let mut o = order("s-1", "dragon", 0);
    o.zone_id = "caves".into();
    assert_eq!(zone.submit_spawn_order(o).unwrap_err(), SpawnRejection::ZoneMismatch);

    // Unknown template AND bad count AND out of bounds: template wins.
    let mut o = order("s-2", "dragon", 0);
    o.position = Vec2::new(-1.0, -1.0);
    assert_eq!(zone.submit_spawn_order(o).unwrap_err(), SpawnRejection::UnknownTemplate);

    // Bad count AND out of bounds: count wins.
    let mut o = order("s-3", "wolf", 11);
    o.position = Vec2::new(-1.0, -1.0);
    assert_eq!(zone.submit_spawn_order(o).unwrap_err(), SpawnRejection::InvalidCount);

    let mut o = order("s-4", "wolf", 1);
    o.position = Vec2::new(100.5, 50.0);
    let err = zone.submit_spawn_order(o).unwrap_err();
    assert_eq!(err.to_string(), "position out of bounds");
}

#[test]
fn bounds_are_inclusive() {
    let mut zone = ZoneRuntime::build_test("meadow", 1).unwrap();
    let mut o = order("edge", "sentinel", 1);
    o.position = Vec2::new(100.0, 0.0);
    assert!(zone.submit_spawn_order(o).is_ok());
}

#[test]
fn unwalkable_position_rejected() {
    let mut zone = ZoneRuntime::build_test("caves", 1).unwrap();
    // caves row 5 starts with water.
    let o = SpawnOrder {
        order_id: "w-1".into(),
        zone_id: "caves".into(),
        template_id: "wolf".into(),
        position: Vec2::new(0.5, 5.5),
        count: 1,
    };
    let err = zone.submit_spawn_order(o).unwrap_err();
    assert_eq!(err, SpawnRejection::NotWalkable);
    assert_eq!(err.to_string(), "position not walkable");
}

#[test]
fn accepted_order_gets_fresh_unique_ids() {
    let mut zone = ZoneRuntime::build_test("meadow", 9).unwrap();
    let a = zone.submit_spawn_order(order("u-1", "wisp", 3)).unwrap();
    let b = zone.submit_spawn_order(order("u-2", "wisp", 2)).unwrap();

    let mut all: Vec<_> = a.agent_ids.iter().chain(b.agent_ids.iter()).copied().collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 5);
    for id in &a.agent_ids {
        assert!(zone.agent(*id).is_some());
    }
    assert_eq!(a.accepted_at, 0);
}

#[test]
fn budget_frees_up_after_agents_expire() {
    let mut zone = ZoneRuntime::build_test("meadow", 3).unwrap();
    zone.submit_spawn_order(order("e-1", "wisp", 5)).unwrap();
    assert_eq!(
        zone.submit_spawn_order(order("e-2", "wisp", 1)).unwrap_err(),
        SpawnRejection::PopulationBudgetExceeded
    );

    // wisp ttl is 3 ticks.
    zone.run_ticks(3);
    assert_eq!(zone.population(), 0);
    assert!(zone.submit_spawn_order(order("e-3", "wisp", 5)).is_ok());
}
