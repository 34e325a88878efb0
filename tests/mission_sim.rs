//! Full missions flown against the simulated Kerbin orbiter on a paused clock.

use std::time::Duration;

use ascent_guidance::events::{AscentEnd, EventKind};
use ascent_guidance::orbital::PlannerPhase;
use ascent_guidance::sim::{SimConfig, SimVehicle};
use ascent_guidance::{GuidanceError, MissionConfig, MissionRunner, StageId};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn reaches_orbit_on_defaults() {
    let mut vehicle = SimVehicle::kerbin(SimConfig::default());
    let mut runner = MissionRunner::new(MissionConfig::default()).unwrap();
    let cancel = CancellationToken::new();

    let summary = runner.run(&mut vehicle, &cancel).await.unwrap();

    assert_eq!(summary.ascent_end, AscentEnd::GuardTrip);
    assert_eq!(summary.separations.first(), Some(&StageId(9)));
    assert!(summary.final_periapsis > 70_000.0, "periapsis {}", summary.final_periapsis);
    assert!(summary.final_apoapsis < 200_000.0, "apoapsis {}", summary.final_apoapsis);
    assert!(summary.circularization_dv > 0.0);
    assert!(summary.total_dv > summary.ascent_dv);
    assert_eq!(runner.planner_phase(), PlannerPhase::Done);
    assert_eq!(vehicle.throttle(), 0.0);
    assert_eq!(vehicle.live_maneuvers(), 0);

    let kinds: Vec<_> = runner.events().kinds().collect();
    assert!(matches!(kinds.first(), Some(EventKind::Liftoff)));
    assert!(matches!(kinds.last(), Some(EventKind::MissionComplete { .. })));
    assert!(kinds.iter().any(|k| matches!(k, EventKind::GuardTripped { .. })));
    assert!(kinds.iter().any(|k| matches!(k, EventKind::OrbitStageReleased)));
}

#[tokio::test(start_paused = true)]
async fn trace_is_in_time_order() {
    let mut vehicle = SimVehicle::kerbin(SimConfig::default());
    let mut runner = MissionRunner::new(MissionConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    runner.run(&mut vehicle, &cancel).await.unwrap();

    let trace = runner.trace();
    assert!(!trace.is_empty());
    assert!(trace.windows(2).all(|w| w[1].ut >= w[0].ut));
    assert!(trace.windows(2).all(|w| w[1].total_dv >= w[0].total_dv));
}

#[tokio::test(start_paused = true)]
async fn survives_telemetry_dropouts() {
    let mut vehicle = SimVehicle::kerbin(SimConfig { dropout_every: Some(7), ..Default::default() });
    let mut runner = MissionRunner::new(MissionConfig::default()).unwrap();
    let cancel = CancellationToken::new();

    let summary = runner.run(&mut vehicle, &cancel).await.unwrap();
    assert!(summary.final_periapsis > 70_000.0, "periapsis {}", summary.final_periapsis);
    assert_eq!(vehicle.throttle(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn abort_mid_ascent_cuts_the_engine() {
    let mut vehicle = SimVehicle::kerbin(SimConfig::default());
    let mut runner = MissionRunner::new(MissionConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });

    let err = runner.run(&mut vehicle, &cancel).await.unwrap_err();
    assert!(matches!(err, GuidanceError::Cancelled));
    assert_eq!(vehicle.throttle(), 0.0);
    assert!(!runner.events().kinds().any(|k| matches!(k, EventKind::MissionComplete { .. })));
}
