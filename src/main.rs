use std::path::PathBuf;
use std::time::{Duration, Instant};
use anyhow::{bail, Context};
use glam::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use uuid::Uuid;
use slv_flexi::config::load_layered;
use slv_flexi::utils::logging::{init_logging, log_system_info};
use slv_flexi::world::flexible::{FlexibleParams, PathParams};
use slv_flexi::world::{CameraView, GustingWind, ObjectUpdate, PCode, RegionHost, Transform, World};

const FRAME_TIME: Duration = Duration::from_millis(33);

struct Options {
    config: Option<PathBuf>,
    objects: usize,
    frames: u64,
    seed: u64,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        config: None,
        objects: 500,
        frames: 300,
        seed: 1,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = || args.next().with_context(|| format!("{} needs a value", arg));
        match arg.as_str() {
            "--config" => options.config = Some(PathBuf::from(value()?)),
            "--objects" => options.objects = value()?.parse().context("--objects")?,
            "--frames" => options.frames = value()?.parse().context("--frames")?,
            "--seed" => options.seed = value()?.parse().context("--seed")?,
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    let options = parse_args()?;
    let settings = load_layered(options.config.as_deref())?;
    init_logging(&settings.logging)?;
    log_system_info();
    info!("🌿 Profile {:?}, flexible slice {:?}", settings.profile, settings.flexible_time_slice());

    let mut world = World::new(&settings);
    world.set_wind(Box::new(GustingWind::new(options.seed, 16, Vec2::new(3.0, 0.5), 2.0)));

    let host = RegionHost::new([127, 0, 0, 1], 13000);
    world.registry.add_region(host);

    // A field of flexible prims, every tenth one linked to the previous root
    let mut rng = StdRng::seed_from_u64(options.seed);
    for i in 0..options.objects {
        let local_id = i as u32 + 1;
        let position = Vec3::new(
            rng.random_range(0.0..256.0),
            rng.random_range(0.0..256.0),
            rng.random_range(20.0..40.0),
        );
        let transform = Transform::new(
            position,
            Quat::from_rotation_x(rng.random_range(-0.3..0.3)),
            Vec3::new(0.1, 0.1, rng.random_range(0.5..4.0)),
        );
        let params = FlexibleParams::default()
            .with_simulate_lod(rng.random_range(0..=3))
            .with_wind_sensitivity(rng.random_range(0.0..3.0))
            .with_gravity(rng.random_range(0.0..1.0));

        let mut update = ObjectUpdate::new(Uuid::new_v4(), local_id, host, PCode::Volume)
            .with_transform(transform)
            .with_flexible(params, PathParams::default());
        if i % 10 != 0 {
            update = update.with_parent(local_id - (i % 10) as u32);
        }
        world.registry.process_object_update(update);
    }
    info!("🌿 Spawned {} flexible object(s)", world.registry.len());

    let camera = CameraView {
        position: Vec3::new(128.0, 128.0, 30.0),
        ..CameraView::default()
    };

    let started = Instant::now();
    let mut totals = (0usize, 0usize, 0usize, 0usize);
    for _ in 0..options.frames {
        let report = world.step_frame(&camera, FRAME_TIME);
        totals.0 += report.flexible.updated;
        totals.1 += report.flexible.forced;
        totals.2 += report.flexible.deferred;
        totals.3 += report.flexible.nonfinite;
    }

    let elapsed = started.elapsed();
    info!(
        "🌿 {} frame(s) in {:?}: {} updated, {} forced, {} deferred, {} reset",
        options.frames, elapsed, totals.0, totals.1, totals.2, totals.3
    );

    world.registry.kill_all_objects();
    Ok(())
}
