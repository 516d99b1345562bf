    use super::*;
    use engine::{TemplateKey, Vec3};

    use super::lanes::Lane;

    fn key(raw: &str) -> TemplateKey {
        TemplateKey::new(raw).expect("template key")
    }

    fn base_config() -> SpawnerConfig {
        SpawnerConfig {
            obstacle_template: Some(key("obstacle.train")),
            segment_template: Some(key("obstacle.car")),
            min_delay: 100.0,
            max_delay: 100.0,
            rng_seed: Some(42),
            ..SpawnerConfig::default()
        }
    }

    fn started(config: SpawnerConfig) -> (ObstacleSpawner, SceneWorld) {
        let mut world = SceneWorld::default();
        let mut spawner = ObstacleSpawner::new(config);
        spawner.start(&mut world);
        (spawner, world)
    }

    fn tick(
        spawner: &mut ObstacleSpawner,
        world: &mut SceneWorld,
        dt: f32,
        gameplay_active: bool,
    ) {
        spawner.tick(&TickContext::new(dt, gameplay_active), world);
    }

    fn spawned(outcome: SpawnOutcome) -> EntityId {
        match outcome {
            SpawnOutcome::Spawned(id) => id,
            other => panic!("expected a spawn, got {other:?}"),
        }
    }

    fn position_of(world: &SceneWorld, id: EntityId) -> Vec3 {
        world.find_entity(id).expect("entity").transform.position
    }

    #[test]
    fn start_prewarms_inactive_pool() {
        let (spawner, world) = started(SpawnerConfig {
            pool_size: 5,
            ..base_config()
        });

        assert_eq!(spawner.pool_count(), 5);
        assert_eq!(spawner.active_count(), 0);
        assert_eq!(world.entity_count(), 5);
        assert_eq!(world.active_entity_count(), 0);
    }

    #[test]
    fn third_rapid_spawn_is_refused_at_capacity() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            max_active: 2,
            ..base_config()
        });

        spawned(spawner.spawn_now(&mut world));
        spawned(spawner.spawn_now(&mut world));
        assert_eq!(spawner.spawn_now(&mut world), SpawnOutcome::AtCapacity);
        assert_eq!(spawner.active_count(), 2);
        assert_eq!(spawner.snapshot().spawned_total, 2);
    }

    #[test]
    fn spawned_primary_is_activated_at_its_lane() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            segments_per_obstacle: 1,
            ..base_config()
        });

        let primary = spawned(spawner.spawn_now(&mut world));

        let entity = world.find_entity(primary).expect("primary");
        assert!(entity.active);
        let lane = spawner.snapshot().last_lane.expect("lane");
        assert_eq!(entity.transform.position, spawner.config().lanes[lane].position);
        assert_eq!(spawner.pool_count(), 4);
    }

    #[test]
    fn consecutive_spawns_never_share_a_lane() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            max_active: 500,
            ..base_config()
        });

        let mut previous = None;
        for _ in 0..150 {
            spawned(spawner.spawn_now(&mut world));
            let lane = spawner.snapshot().last_lane;
            assert!(lane.is_some());
            assert_ne!(lane, previous);
            previous = lane;
        }
    }

    #[test]
    fn single_lane_repeats_freely() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            lanes: vec![Lane::new(Vec3::ZERO, 0.0)],
            ..base_config()
        });

        for _ in 0..5 {
            spawned(spawner.spawn_now(&mut world));
            assert_eq!(spawner.snapshot().last_lane, Some(0));
        }
    }

    #[test]
    fn timer_spawns_after_delay() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            min_delay: 1.0,
            max_delay: 1.0,
            ..base_config()
        });

        for _ in 0..3 {
            tick(&mut spawner, &mut world, 0.25, true);
        }
        assert_eq!(spawner.active_count(), 0);

        tick(&mut spawner, &mut world, 0.25, true);
        assert_eq!(spawner.active_count(), 1);
    }

    #[test]
    fn active_count_never_exceeds_limit_over_long_run() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            max_active: 3,
            min_delay: 0.05,
            max_delay: 0.2,
            move_speed: 40.0,
            segments_per_obstacle: 2,
            ..base_config()
        });

        for _ in 0..2_000 {
            tick(&mut spawner, &mut world, 1.0 / 60.0, true);
            assert!(spawner.active_count() <= 3);
            assert!(world.active_entity_count() <= 3 * 2);
        }
        assert!(spawner.snapshot().spawned_total > 3);
        assert!(spawner.snapshot().recycled_total > 0);
    }

    #[test]
    fn freed_slot_is_filled_on_next_tick() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            max_active: 1,
            min_delay: 1.0,
            max_delay: 1.0,
            sitting_probability: 1.0,
            min_sit: 100.0,
            max_sit: 100.0,
            ..base_config()
        });

        spawned(spawner.spawn_now(&mut world));
        for _ in 0..4 {
            tick(&mut spawner, &mut world, 0.5, true);
        }
        assert!(spawner.snapshot().capacity_blocked > 0);
        assert_eq!(spawner.snapshot().spawned_total, 1);

        assert_eq!(spawner.despawn_all(&mut world), 1);
        tick(&mut spawner, &mut world, 0.01, true);

        assert_eq!(spawner.active_count(), 1);
        assert_eq!(spawner.snapshot().spawned_total, 2);
    }

    #[test]
    fn crossing_tick_moves_obstacle_by_leftover_time() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            sitting_probability: 1.0,
            min_sit: 2.0,
            max_sit: 2.0,
            move_speed: 6.0,
            move_direction: Vec3::new(0.0, 0.0, 1.0),
            ..base_config()
        });

        let primary = spawned(spawner.spawn_now(&mut world));
        let start = position_of(&world, primary);
        tick(&mut spawner, &mut world, 2.5, true);

        let moved = position_of(&world, primary) - start;
        assert!(moved.distance(Vec3::new(0.0, 0.0, 3.0)) < 1e-4);
        let view = spawner
            .active_obstacles(&world)
            .into_iter()
            .find(|view| view.id == primary)
            .expect("view");
        assert_eq!(view.state, ObstacleState::Moving);
    }

    #[test]
    fn inactive_gameplay_freezes_motion_and_spawning() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            min_delay: 0.1,
            max_delay: 0.1,
            sitting_probability: 0.0,
            ..base_config()
        });
        let primary = spawned(spawner.spawn_now(&mut world));
        let before = position_of(&world, primary);

        for _ in 0..120 {
            tick(&mut spawner, &mut world, 1.0 / 60.0, false);
        }

        assert_eq!(position_of(&world, primary), before);
        assert_eq!(spawner.active_count(), 1);
        assert_eq!(spawner.snapshot().spawned_total, 1);
    }

    #[test]
    fn composite_segments_trail_the_primary() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            lanes: vec![Lane::new(Vec3::new(3.0, 0.0, 10.0), 0.0)],
            segments_per_obstacle: 3,
            segment_offset: Vec3::new(-1.5, 0.0, 0.0),
            ..base_config()
        });

        let primary = spawned(spawner.spawn_now(&mut world));
        let views = spawner.active_obstacles(&world);

        assert_eq!(views.len(), 3);
        assert_eq!(views[0].id, primary);
        assert_eq!(views[0].transform.position, Vec3::new(3.0, 0.0, 10.0));
        assert_eq!(views[1].segment_index, 1);
        assert_eq!(views[1].transform.position, Vec3::new(1.5, 0.0, 10.0));
        assert_eq!(views[2].segment_index, 2);
        assert_eq!(views[2].transform.position, Vec3::new(0.0, 0.0, 10.0));
        assert!(views.iter().all(|view| view.primary == primary));
        for view in &views[1..] {
            assert_eq!(
                world.find_entity(view.id).expect("segment").template.as_str(),
                "obstacle.car"
            );
        }
    }

    #[test]
    fn rotated_lane_rotates_segment_offsets() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            lanes: vec![Lane::new(Vec3::ZERO, std::f32::consts::FRAC_PI_2)],
            segments_per_obstacle: 2,
            segment_offset: Vec3::new(0.0, 0.0, 2.0),
            ..base_config()
        });

        spawned(spawner.spawn_now(&mut world));
        let views = spawner.active_obstacles(&world);

        let expected = Vec3::new(0.0, 0.0, 2.0).rotate_yaw(std::f32::consts::FRAC_PI_2);
        assert!(views[1].transform.position.distance(expected) < 1e-5);
        assert_eq!(views[1].transform.yaw_radians, std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn composite_needs_segment_template() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            segments_per_obstacle: 3,
            segment_template: None,
            ..base_config()
        });

        spawned(spawner.spawn_now(&mut world));
        assert_eq!(spawner.active_obstacles(&world).len(), 1);
    }

    #[test]
    fn stale_composite_returns_primary_and_destroys_segments() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            pool_size: 5,
            segments_per_obstacle: 3,
            sitting_probability: 0.0,
            move_speed: 200.0,
            ..base_config()
        });

        let primary = spawned(spawner.spawn_now(&mut world));
        let segment_ids: Vec<EntityId> = spawner
            .active_obstacles(&world)
            .iter()
            .filter(|view| view.segment_index > 0)
            .map(|view| view.id)
            .collect();
        assert_eq!(segment_ids.len(), 2);
        assert_eq!(spawner.pool_count(), 4);

        tick(&mut spawner, &mut world, 1.0, true);

        assert_eq!(spawner.active_count(), 0);
        assert_eq!(spawner.pool_count(), 5);
        assert!(!world.find_entity(primary).expect("pooled primary").active);
        let pool = spawner.pool.as_ref().expect("pool");
        assert!(pool.is_pooled(primary));
        for id in segment_ids {
            assert!(!pool.is_pooled(id));
            assert!(!world.contains(id));
        }
        assert_eq!(world.entity_count(), 5);
        assert_eq!(spawner.snapshot().recycled_total, 1);
    }

    #[test]
    fn recycled_primary_is_reused_on_next_spawn() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            pool_size: 1,
            ..base_config()
        });

        let first = spawned(spawner.spawn_now(&mut world));
        spawner.despawn_all(&mut world);
        let second = spawned(spawner.spawn_now(&mut world));

        assert_eq!(first, second);
    }

    #[test]
    fn despawn_all_recycles_every_entry() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            pool_size: 5,
            segments_per_obstacle: 2,
            ..base_config()
        });
        for _ in 0..3 {
            spawned(spawner.spawn_now(&mut world));
        }

        assert_eq!(spawner.despawn_all(&mut world), 3);

        assert_eq!(spawner.active_count(), 0);
        assert_eq!(spawner.pool_count(), 5);
        assert_eq!(world.entity_count(), 5);
        assert_eq!(world.active_entity_count(), 0);
        assert_eq!(spawner.snapshot().recycled_total, 3);
    }

    #[test]
    fn externally_removed_primary_is_pruned_with_its_segments() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            segments_per_obstacle: 2,
            ..base_config()
        });
        let primary = spawned(spawner.spawn_now(&mut world));
        let segment = spawner.active_obstacles(&world)[1].id;

        world.despawn(primary);
        tick(&mut spawner, &mut world, 0.1, true);

        assert_eq!(spawner.active_count(), 0);
        assert!(!world.contains(segment));
        assert_eq!(spawner.snapshot().recycled_total, 0);
    }

    #[test]
    fn missing_template_skips_and_counts() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            obstacle_template: None,
            min_delay: 0.5,
            max_delay: 0.5,
            ..base_config()
        });

        assert_eq!(
            spawner.spawn_now(&mut world),
            SpawnOutcome::Skipped(SkipReason::MissingTemplate)
        );
        for _ in 0..4 {
            tick(&mut spawner, &mut world, 0.5, true);
        }

        assert_eq!(spawner.snapshot().skipped_spawns, 5);
        assert_eq!(world.entity_count(), 0);
        assert_eq!(
            spawner.prewarm_to(3, &mut world),
            Err(SkipReason::MissingTemplate)
        );
    }

    #[test]
    fn empty_lane_registry_skips() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            lanes: Vec::new(),
            ..base_config()
        });

        assert_eq!(
            spawner.spawn_now(&mut world),
            SpawnOutcome::Skipped(SkipReason::NoLanes)
        );
        assert_eq!(spawner.pool_count(), 5);
        assert_eq!(spawner.snapshot().last_lane, None);
    }

    #[test]
    fn prewarm_to_tops_up_the_pool() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            pool_size: 5,
            ..base_config()
        });

        assert_eq!(spawner.prewarm_to(8, &mut world), Ok(3));
        assert_eq!(spawner.prewarm_to(2, &mut world), Ok(0));
        assert_eq!(spawner.pool_count(), 8);
    }

    #[test]
    fn axis_bound_policy_recycles_past_the_bound() {
        let (mut spawner, mut world) = started(SpawnerConfig {
            sitting_probability: 0.0,
            move_speed: 10.0,
            staleness: sweeper::StalenessPolicy::AxisBound {
                axis: sweeper::Axis::Z,
                min: -1.0,
                max: 15.0,
            },
            ..base_config()
        });
        spawned(spawner.spawn_now(&mut world));

        tick(&mut spawner, &mut world, 1.0, true);
        assert_eq!(spawner.active_count(), 1);

        tick(&mut spawner, &mut world, 1.0, true);
        assert_eq!(spawner.active_count(), 0);
    }

    #[test]
    fn same_seed_produces_same_lane_sequence() {
        let run = || {
            let (mut spawner, mut world) = started(SpawnerConfig {
                max_active: 50,
                ..base_config()
            });
            (0..20)
                .map(|_| {
                    spawned(spawner.spawn_now(&mut world));
                    spawner.snapshot().last_lane
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }
