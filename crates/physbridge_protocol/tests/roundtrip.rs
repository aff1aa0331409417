//! End to end encode/decode of a realistic command stream and of the
//! records a backend writes back.

use physbridge_core::{CommandsBuffer, Isometry, Quat, Vec3};
use physbridge_protocol::{
    AxisLimit, BackFaceMode, BodyDesc, BodyMutation, BodyTransform, Buoyancy, CharacterDesc,
    CharacterMutation, CharacterState, CleanCommand, Command, CompoundChild, ConstraintDesc,
    ConstraintMutation, ConstraintType, CreateCommand, EngineDesc, GroundState, GroundSupport,
    HeightFieldRef, IsometryUpdate, MassOverride, MeshRef, ModifyCommand, MotionType, MotorSettings, MotorState,
    ProtocolError, QueryCommand, QueryHit, QueryResult, RayCast, Response, ShapeCast, ShapeGeometry,
    ShapeSettings, SpringMode, SpringSettings, TransmissionDesc, TransmissionMode, VehicleDesc,
    VehicleInput, VehicleType, WheelDesc,
};

fn scene_commands() -> Vec<Command> {
    let floor = BodyDesc::new(1, ShapeSettings::cuboid(Vec3::new(50.0, 0.5, 50.0)), MotionType::Static);

    let mut crate_body = BodyDesc::new(
        2,
        ShapeSettings::cuboid(Vec3::new(0.5, 0.5, 0.5)).with_scale(Vec3::new(1.0, 2.0, 1.0)),
        MotionType::Dynamic,
    )
    .at(Vec3::new(0.0, 5.0, 0.0));
    crate_body.group = Some(0);
    crate_body.sub_group = Some(3);
    crate_body.mass = MassOverride::Provided {
        mass: 12.0,
        inertia_diagonal: Vec3::ONE,
        inertia_rotation: Quat::IDENTITY,
    };

    let compound = ShapeSettings::new(ShapeGeometry::StaticCompound(vec![
        CompoundChild {
            shape: ShapeSettings::sphere(0.5).as_child(),
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
        },
        CompoundChild {
            shape: ShapeSettings::capsule(1.0, 0.25).as_child(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        },
    ]));

    let terrain = ShapeSettings::new(ShapeGeometry::HeightField(HeightFieldRef {
        samples: 2,
        offset: Vec3::new(-32.0, 0.0, -32.0),
        scale: Vec3::ONE,
        sample_count: 64,
        block_size: 4,
        bits_per_sample: 8,
        active_edge_cos_threshold: 0.996,
    }));

    let hull = ShapeSettings::new(ShapeGeometry::ConvexHull(MeshRef {
        positions: 0,
        indices: 1,
        base: 0,
        offset: 0,
        stride: 3,
        vertex_count: 8,
        index_count: 36,
        index_offset: 0,
    }));

    let mut hinge = ConstraintDesc::new(ConstraintType::Hinge, 0, 1, 2);
    hinge.point1 = Some(Vec3::new(0.0, 4.0, 0.0));
    hinge.axis1 = Some(Vec3::Z);
    hinge.limits_min = Some(-1.0);
    hinge.limits_max = Some(1.0);
    hinge.motor = Some(MotorSettings {
        spring: SpringSettings {
            mode: SpringMode::Frequency,
            value: 2.0,
            damping: 1.0,
        },
        max_force: 1.0e6,
        max_torque: 1.0e6,
    });

    let mut six_dof = ConstraintDesc::new(ConstraintType::SixDof, 1, 2, 1);
    six_dof.axis_limits = vec![AxisLimit {
        axis: 3,
        min: -0.5,
        max: 0.5,
    }];
    six_dof.velocity_steps = Some(10);

    let mut character = CharacterDesc::new(5, ShapeSettings::capsule(0.9, 0.3));
    character.back_face_mode = BackFaceMode::Ignore;
    character.position = Vec3::new(2.0, 1.2, 0.0);

    let vehicle = VehicleDesc {
        pcid: 2,
        index: 2,
        vehicle_type: VehicleType::Wheeled,
        up: Vec3::Y,
        forward: Vec3::Z,
        max_pitch_roll_angle: std::f32::consts::PI,
        engine: EngineDesc {
            max_torque: 500.0,
            min_rpm: 1000.0,
            max_rpm: 6000.0,
        },
        transmission: TransmissionDesc {
            mode: TransmissionMode::Auto,
            gear_ratios: vec![2.66, 1.78, 1.3, 1.0, 0.74],
            clutch_strength: 10.0,
        },
        wheels: vec![
            WheelDesc {
                position: Vec3::new(-0.9, -0.3, 1.2),
                suspension_min: 0.3,
                suspension_max: 0.5,
                radius: 0.3,
                width: 0.1,
                max_steer_angle: 0.5,
                max_brake_torque: 1500.0,
            };
            4
        ],
    };

    let mut ray = RayCast::new(9, Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -20.0, 0.0));
    ray.first_only = Some(true);

    vec![
        CreateCommand::Groups(vec![4, 2]).into(),
        CreateCommand::Shape { index: 0, settings: compound }.into(),
        CreateCommand::Shape { index: 1, settings: terrain }.into(),
        CreateCommand::Shape { index: 2, settings: hull }.into(),
        CreateCommand::Body(Box::new(floor)).into(),
        CreateCommand::Body(Box::new(crate_body)).into(),
        CreateCommand::Constraint(Box::new(hinge)).into(),
        CreateCommand::Constraint(Box::new(six_dof)).into(),
        CreateCommand::Character(Box::new(character)).into(),
        CreateCommand::Vehicle(Box::new(vehicle)).into(),
        ModifyCommand::ChangeGravity(Vec3::new(0.0, -3.7, 0.0)).into(),
        ModifyCommand::ToggleGroupPair {
            group: 0,
            sub_group1: 1,
            sub_group2: 3,
            enable: false,
        }
        .into(),
        ModifyCommand::Body {
            pcid: 2,
            mutation: BodyMutation::AddImpulse {
                impulse: Vec3::new(0.0, 50.0, 0.0),
                offset: Some(Vec3::new(0.1, 0.0, 0.0)),
            },
        }
        .into(),
        ModifyCommand::Body {
            pcid: 2,
            mutation: BodyMutation::ApplyBuoyancyImpulse(Buoyancy {
                surface_position: Vec3::ZERO,
                surface_normal: Vec3::Y,
                buoyancy: 1.1,
                linear_drag: 0.3,
                angular_drag: 0.05,
                fluid_velocity: Vec3::X,
            }),
        }
        .into(),
        ModifyCommand::Body {
            pcid: 2,
            mutation: BodyMutation::SetShape(Box::new(ShapeSettings::sphere(0.75))),
        }
        .into(),
        ModifyCommand::Body {
            pcid: 2,
            mutation: BodyMutation::SetVehicleInput(VehicleInput {
                forward: 1.0,
                right: -0.25,
                brake: 0.0,
                hand_brake: 0.0,
            }),
        }
        .into(),
        ModifyCommand::Body {
            pcid: 2,
            mutation: BodyMutation::SetCollisionGroup {
                group: None,
                sub_group: Some(1),
            },
        }
        .into(),
        ModifyCommand::Character {
            pcid: 5,
            mutation: CharacterMutation::SetShape {
                callback: Some(4),
                shape: Box::new(ShapeSettings::capsule(0.5, 0.3)),
            },
        }
        .into(),
        ModifyCommand::Constraint {
            index: 0,
            mutation: ConstraintMutation::SetMotorState(MotorState::Velocity),
        }
        .into(),
        QueryCommand::CastRay(ray).into(),
        QueryCommand::CastShape(ShapeCast {
            callback: 10,
            shape_index: 0,
            position: Vec3::new(0.0, 3.0, 0.0),
            rotation: Quat::IDENTITY,
            direction: Vec3::new(0.0, -3.0, 0.0),
            scale: None,
            offset: Some(Vec3::ZERO),
            back_face_mode: Some(BackFaceMode::Collide),
            first_only: None,
            calculate_normal: Some(true),
        })
        .into(),
        CleanCommand::DestroyConstraint(1).into(),
        CleanCommand::DestroyBody(2).into(),
        CleanCommand::DestroyShape(0).into(),
    ]
}

#[test]
fn test_command_stream_survives_the_boundary() {
    let commands = scene_commands();

    // Start small so the stream has to grow several times.
    let mut writer = CommandsBuffer::new(32);
    for command in &commands {
        command.encode(&mut writer).unwrap();
    }
    assert_eq!(usize::from(writer.commands_count()), commands.len());

    let bytes = writer.take_bytes();
    let mut reader = CommandsBuffer::from_bytes(bytes);
    let decoded: Vec<Command> = (0..reader.commands_count())
        .map(|_| Command::decode(&mut reader).unwrap())
        .collect();

    assert_eq!(decoded, commands);
    assert!(!reader.has_overrun());
}

#[test]
fn test_compound_and_solver_modifiers_survive_the_boundary() {
    let body = |mutation| Command::from(ModifyCommand::Body { pcid: 8, mutation });
    let commands = vec![
        CreateCommand::Shape {
            index: 4,
            settings: ShapeSettings::new(ShapeGeometry::MutableCompound(Vec::new())),
        }
        .into(),
        body(BodyMutation::SetAutoUpdateIsometry(IsometryUpdate::BackToFront)),
        body(BodyMutation::AddShape {
            shape: 1,
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
            user_data: 77,
        }),
        body(BodyMutation::ModifyShape {
            child: 0,
            position: Vec3::X,
            rotation: Quat::IDENTITY,
            shape: None,
        }),
        body(BodyMutation::ModifyShape {
            child: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shape: Some(2),
        }),
        body(BodyMutation::RemoveShape(0)),
        body(BodyMutation::SetDebugDrawDepth(false)),
        body(BodyMutation::SetAngularFactor(0.2)),
        body(BodyMutation::SetKinematicCollideNonDynamic(true)),
        body(BodyMutation::SetApplyGyroscopicForce(true)),
        body(BodyMutation::SetEnhancedInternalEdgeRemoval(false)),
        body(BodyMutation::SetVelocitySteps(12)),
        body(BodyMutation::SetPositionSteps(3)),
        body(BodyMutation::UpdateBitFilter {
            group: 0b0101,
            mask: 0b0011,
        }),
        body(BodyMutation::SetLinearVelocityClamped(Vec3::new(0.0, 40.0, 0.0))),
        body(BodyMutation::SetAngularVelocityClamped(Vec3::Y)),
    ];

    let mut writer = CommandsBuffer::new(16);
    for command in &commands {
        command.encode(&mut writer).unwrap();
    }
    let mut reader = CommandsBuffer::from_bytes(writer.take_bytes());
    let decoded: Vec<Command> = (0..reader.commands_count())
        .map(|_| Command::decode(&mut reader).unwrap())
        .collect();

    assert_eq!(decoded, commands);
    assert!(!reader.has_overrun());
}

#[test]
fn test_fixed_buffer_keeps_whole_records_only() {
    let commands = scene_commands();
    let mut writer = CommandsBuffer::fixed(256);

    let mut written = 0;
    for command in &commands {
        match command.encode(&mut writer) {
            Ok(()) => written += 1,
            Err(ProtocolError::Overflow) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(written > 0 && written < commands.len());

    let mut reader = CommandsBuffer::from_bytes(writer.into_bytes());
    for expected in &commands[..written] {
        assert_eq!(&Command::decode(&mut reader).unwrap(), expected);
    }
}

#[test]
fn test_outbound_tick_decodes_in_order() {
    let mut outbound = CommandsBuffer::new(64);
    let responses = vec![
        Response::QueryResult(QueryResult {
            callback: 9,
            first_only: true,
            hits: vec![QueryHit {
                pcid: 1,
                point: Vec3::new(0.0, 0.5, 0.0),
                normal: None,
            }],
        }),
        Response::CharacterShapeChanged { callback: 4 },
        Response::Transform(BodyTransform {
            pcid: 2,
            position: Vec3::new(0.0, 4.9, 0.0),
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::new(0.0, -0.16, 0.0),
            angular_velocity: Vec3::ZERO,
            wheels: vec![Isometry::IDENTITY; 4],
        }),
        Response::Characters(vec![CharacterState {
            pcid: 5,
            position: Vec3::new(2.0, 1.2, 0.0),
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            ground_state: GroundState::OnGround,
            support: Some(GroundSupport {
                ground: Some(1),
                too_steep: false,
                ground_velocity: Vec3::ZERO,
                ground_normal: Vec3::Y,
            }),
        }]),
    ];
    for response in &responses {
        response.encode(&mut outbound).unwrap();
    }

    let mut reader = CommandsBuffer::from_bytes(outbound.take_bytes());
    assert_eq!(Response::decode_all(&mut reader).unwrap(), responses);
}
