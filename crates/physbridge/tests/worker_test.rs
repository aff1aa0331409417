//! Worker thread and client driven together, the way a scene uses them.

use physbridge::{BackendWorker, ClientError, ClientEvent, PhysicsClient, WorkerMessage};
use physbridge_backend::{BackendConfig, Inbound, SandboxEngine};
use physbridge_core::{AuxBuffers, Vec3};
use physbridge_protocol::{BodyDesc, CreateCommand, MotionType, RayCast, ShapeSettings, PROTOCOL_VERSION};

const STEP: f32 = 1.0 / 60.0;

fn worker() -> BackendWorker {
    let config = BackendConfig::default();
    BackendWorker::spawn(SandboxEngine::from_config(&config), config).unwrap()
}

fn floor(client: &mut PhysicsClient) {
    let desc = BodyDesc::new(0, ShapeSettings::cuboid(Vec3::new(10.0, 0.5, 10.0)), MotionType::Static)
        .at(Vec3::new(0.0, -0.5, 0.0));
    client.push(CreateCommand::Body(Box::new(desc))).unwrap();
}

fn falling_box(client: &mut PhysicsClient, pcid: u32, height: f32) {
    let desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::new(0.5, 0.5, 0.5)), MotionType::Dynamic)
        .at(Vec3::new(0.0, height, 0.0));
    client.push(CreateCommand::Body(Box::new(desc))).unwrap();
}

#[test]
fn test_startup_constants_arrive_first() {
    let worker = worker();

    let WorkerMessage::Startup(constants) = worker.receive().unwrap() else {
        panic!("expected the startup message first");
    };
    assert_eq!(constants.protocol_version, PROTOCOL_VERSION);
    assert!(!constants.commands.is_empty());

    worker.shutdown();
}

#[test]
fn test_idle_until_first_buffer() {
    let worker = worker();
    assert!(worker.step(None, STEP).unwrap().is_none());
    assert_eq!(worker.status().steps, 0);
}

#[test]
fn test_body_falls_through_worker() {
    let worker = worker();
    let mut client = PhysicsClient::default();
    floor(&mut client);
    falling_box(&mut client, 1, 10.0);

    let mut inbound = Some(client.flush());
    for _ in 0..30 {
        let output = worker.step(inbound.take(), STEP).unwrap().unwrap();
        client.apply(&output).unwrap();
        if let Some(bytes) = output.recycled {
            client.recycle(bytes);
        }
    }

    let transform = client.transform(1).unwrap();
    assert!(transform.position.y < 10.0);
    assert!(transform.linear_velocity.y < 0.0);
    assert!(client.transform(0).is_none());

    let status = worker.status();
    assert_eq!(status.bodies, 2);
    assert!(status.steps >= 29);
    assert!(!status.halted);
}

#[test]
fn test_ray_callback_resolves() {
    let worker = worker();
    let mut client = PhysicsClient::default();
    floor(&mut client);
    worker.step(Some(client.flush()), STEP).unwrap();

    let callback = client
        .cast_ray(RayCast::new(0, Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -20.0, 0.0)))
        .unwrap();
    assert_eq!(client.pending_callbacks(), 1);

    let output = worker.step(Some(client.flush()), STEP).unwrap().unwrap();
    let events = client.apply(&output).unwrap();

    let result = events
        .iter()
        .find_map(|event| match event {
            ClientEvent::RayResult(result) => Some(result),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.callback, callback);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].pcid, 0);
    assert!(result.hits[0].point.y.abs() < 1e-4);
    assert_eq!(client.pending_callbacks(), 0);
}

#[test]
fn test_clear_empties_world() {
    let worker = worker();
    let mut client = PhysicsClient::default();
    floor(&mut client);
    falling_box(&mut client, 1, 3.0);
    falling_box(&mut client, 2, 6.0);
    worker.step(Some(client.flush()), STEP).unwrap();
    assert_eq!(worker.status().bodies, 3);

    worker.clear().unwrap();
    loop {
        if matches!(worker.receive().unwrap(), WorkerMessage::Cleared) {
            break;
        }
    }
    assert_eq!(worker.status().bodies, 0);

    let output = worker.step(None, STEP).unwrap().unwrap();
    assert!(client.apply(&output).unwrap().is_empty());
}

#[test]
fn test_halted_worker_reports_nothing() {
    let worker = worker();
    let mut client = PhysicsClient::default();
    falling_box(&mut client, 1, 5.0);
    let mut bytes = client.flush().bytes;
    bytes.truncate(20);

    let failed = worker.step(Some(Inbound::new(bytes, AuxBuffers::new())), STEP);
    assert!(matches!(failed, Err(ClientError::Backend(_))));
    assert!(worker.status().halted);

    assert!(worker.step(None, STEP).unwrap().is_none());
}
