mod common;

use common::{THREE_REGIONS, TestWorld};
use tokio_util::sync::CancellationToken;
use vpcflow_cloud::memory::Operation;
use vpcflow_cloud::{PeeringStatus, StackState};
use vpcflow_config::Topology;
use vpcflow_core::{LifecycleError, Pipeline, RouteStatus, StackAction};

#[tokio::test]
async fn test_up_deploys_peers_and_routes() {
    let world = TestWorld::new(THREE_REGIONS);

    let report = world
        .orchestrator()
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.stacks.len(), 3);
    assert!(report.stacks.iter().all(|s| matches!(
        s.result,
        Ok(ref deployed) if deployed.action == StackAction::Created
    )));

    let pairs: Vec<_> = report
        .connections
        .iter()
        .map(|c| (c.requester.stack_name.as_str(), c.accepter.stack_name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("us-east-1-a", "us-west-2-b"),
            ("us-east-1-a", "eu-west-1-c"),
            ("us-west-2-b", "eu-west-1-c"),
        ]
    );

    assert_eq!(report.routes.len(), 3);
    assert_eq!(report.route_summary().routed, 3);
    for identity in report.identities() {
        let routes = world.provider.routes(&world.table_of(&identity.vpc_id));
        assert_eq!(routes.len(), 2, "{identity} should reach both peers");
    }
}

#[tokio::test]
async fn test_rerun_converges_without_new_resources() {
    let world = TestWorld::new(THREE_REGIONS);
    let orchestrator = world.orchestrator();

    orchestrator
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;
    let routes_before: Vec<_> = world
        .provider
        .peerings()
        .iter()
        .map(|p| world.provider.routes(&world.table_of(&p.requester.vpc_id)))
        .collect();

    let second = orchestrator
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;
    let routes_after: Vec<_> = world
        .provider
        .peerings()
        .iter()
        .map(|p| world.provider.routes(&world.table_of(&p.requester.vpc_id)))
        .collect();

    assert!(second.is_success());
    assert_eq!(world.provider.count(Operation::CreateStack), 3);
    assert_eq!(world.provider.count(Operation::CreatePeering), 3);
    assert_eq!(second.stack_summary().unchanged, 3);
    assert_eq!(second.peering_summary().reused, 3);
    assert_eq!(routes_before, routes_after);
}

#[tokio::test]
async fn test_failed_stack_is_left_out_of_the_mesh() {
    let world = TestWorld::new(THREE_REGIONS);
    world.provider.insert_stack(
        "us-west-2",
        "us-west-2-b",
        StackState::UpdateInProgress,
        "10.1.0.0/16",
    );

    let report = world
        .orchestrator()
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;

    assert!(!report.is_success());
    assert!(matches!(
        report.stacks[1].result,
        Err(LifecycleError::StackNotUpdatable { .. })
    ));
    assert_eq!(report.connections.len(), 1);
    assert_eq!(report.connections[0].requester.stack_name, "us-east-1-a");
    assert_eq!(report.connections[0].accepter.stack_name, "eu-west-1-c");
    assert_eq!(world.provider.count(Operation::UpdateStack), 0);
}

#[tokio::test]
async fn test_peer_leaves_out_incomplete_stacks() {
    let world = TestWorld::new(THREE_REGIONS);
    world
        .provider
        .insert_stack("us-east-1", "us-east-1-a", StackState::CreateComplete, "10.0.0.0/16");
    world.provider.insert_stack(
        "us-west-2",
        "us-west-2-b",
        StackState::RollbackComplete,
        "10.1.0.0/16",
    );
    world
        .provider
        .insert_stack("eu-west-1", "eu-west-1-c", StackState::UpdateComplete, "10.2.0.0/16");

    let report = world
        .orchestrator()
        .run(Pipeline::Peer, &world.specs, &world.templates)
        .await;

    assert!(!report.is_success());
    assert_eq!(
        report.stacks[1].result,
        Err(LifecycleError::NotReady {
            stack: "us-west-2-b".to_string(),
            status: StackState::RollbackComplete,
        })
    );
    assert_eq!(report.stack_summary().resolved, 2);
    assert_eq!(report.connections.len(), 1);
    assert_eq!(report.connections[0].pair(), "us-east-1-a <-> eu-west-1-c");
    assert!(report.connections[0].is_active());
    assert_eq!(world.provider.mutation_count(), 2);
}

#[tokio::test]
async fn test_standalone_phases_match_up() {
    let world = TestWorld::new(THREE_REGIONS);
    let orchestrator = world.orchestrator();

    let deployed = orchestrator
        .run(Pipeline::Deploy, &world.specs, &world.templates)
        .await;
    assert!(deployed.is_success());
    assert!(deployed.connections.is_empty());
    assert_eq!(world.provider.count(Operation::CreatePeering), 0);

    let peered = orchestrator
        .run(Pipeline::Peer, &world.specs, &world.templates)
        .await;
    assert!(peered.is_success());
    assert_eq!(peered.stack_summary().resolved, 3);
    assert_eq!(peered.connections.len(), 3);
    assert!(peered.routes.is_empty());

    let routed = orchestrator
        .run(Pipeline::Route, &world.specs, &world.templates)
        .await;
    assert!(routed.is_success(), "{routed:?}");
    assert_eq!(routed.routes.len(), 3);
    assert!(routed.routes.iter().all(|r| r.is_routed()));
    // the route phase never touches stacks or peerings
    assert_eq!(world.provider.count(Operation::CreateStack), 3);
    assert_eq!(world.provider.count(Operation::UpdateStack), 0);
    assert_eq!(world.provider.count(Operation::CreatePeering), 3);
}

#[tokio::test]
async fn test_route_reports_connections_awaiting_acceptance() {
    let world = TestWorld::new(THREE_REGIONS);
    let orchestrator = world.orchestrator();
    let deployed = orchestrator
        .run(Pipeline::Deploy, &world.specs, &world.templates)
        .await;
    let ids = deployed.identities();
    world.provider.insert_peering(
        (ids[0].region.as_str(), ids[0].vpc_id.as_str()),
        (ids[1].region.as_str(), ids[1].vpc_id.as_str()),
        PeeringStatus::PendingAcceptance,
    );

    let routed = orchestrator
        .run(Pipeline::Route, &world.specs, &world.templates)
        .await;

    assert_eq!(routed.routes.len(), 1);
    assert_eq!(
        routed.routes[0].status,
        RouteStatus::SkippedInactiveConnection(PeeringStatus::PendingAcceptance)
    );
    assert_eq!(world.provider.count(Operation::PutRoute), 0);
}

#[tokio::test]
async fn test_hub_topology() {
    let world = TestWorld::new(THREE_REGIONS);
    let mut settings = TestWorld::settings();
    settings.mesh.topology = Topology::Hub;

    let report = world
        .orchestrator_with(settings, CancellationToken::new())
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;

    assert!(report.is_success());
    assert_eq!(report.connections.len(), 2);
    assert!(
        report
            .connections
            .iter()
            .all(|c| c.requester.stack_name == "us-east-1-a")
    );
}

#[tokio::test]
async fn test_cancelled_run_reports_every_item() {
    let world = TestWorld::new(THREE_REGIONS);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = world
        .orchestrator_with(TestWorld::settings(), cancel)
        .run(Pipeline::Up, &world.specs, &world.templates)
        .await;

    assert!(!report.is_success());
    assert!(
        report
            .stacks
            .iter()
            .all(|s| s.result == Err(LifecycleError::Cancelled))
    );
    assert!(report.connections.is_empty());
    assert!(world.provider.calls().is_empty());
}
