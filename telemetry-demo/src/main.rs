//! Drives a synthetic 35 Hz tic loop and calls the public emission surface on it, to exercise
//! the whole composition-to-transport pipeline end to end without an actual engine attached.

use clap::{App, Arg};
use telemetry_core::event::{ExtraValue, GameObject, ObjectKind, Position};
use telemetry_core::{self as telemetry, Extra, TelemetryConfig};
use std::path::Path;
use std::thread;
use std::time::Duration;

const TICS_PER_SECOND: u64 = 35;
const TIC_DURATION: Duration = Duration::from_nanos(1_000_000_000 / TICS_PER_SECOND);
const DEMO_TIC_COUNT: u64 = 70;

fn load_config(path: Option<&str>) -> TelemetryConfig {
    match path {
        Some(path) if Path::new(path).exists() => TelemetryConfig::load(path),
        _ => TelemetryConfig::default(),
    }
}

fn player_at(tic: u64) -> GameObject {
    GameObject {
        id: 1,
        position: Position { x: 12.0 + tic as f32, y: 13.0, z: 0.0, angle: 180.0, subsector: 7 },
        kind: ObjectKind::Player,
        health: 100,
        armor: Some(20),
    }
}

fn enemy() -> GameObject {
    GameObject {
        id: 2,
        position: Position { x: 40.0, y: 40.0, z: 0.0, angle: 0.0, subsector: 3 },
        kind: ObjectKind::Enemy(telemetry_core::event::EnemyKind::ShotgunSoldier),
        health: 25,
        armor: None,
    }
}

fn main() {
    let matches = App::new("telemetry-demo")
        .about("Drives a synthetic tic loop through the telemetry core")
        .arg(Arg::with_name("config").long("config").takes_value(true))
        .get_matches();

    let log = telemetry_core::logging::init(telemetry_core::logging::LogDestination::Terminal, "info");
    let config = load_config(matches.value_of("config"));
    let fatal = telemetry::logging_fatal_handler(log.clone());

    let mode = telemetry::init_telemetry(&config, log.clone(), &fatal);
    telemetry_core::logging::info!(log, "telemetry initialized"; "mode" => format!("{:?}", mode));

    let player = player_at(0);
    let level = serde_json::json!({ "episode": 1, "level": 1, "difficulty": 2 });
    telemetry::on_start_level(0, 0, &player, Extra { key: "level", value: ExtraValue::Map(&level) });

    for tic in 1..=DEMO_TIC_COUNT {
        let millis = tic * 1000 / TICS_PER_SECOND;
        let player = player_at(tic);

        telemetry::on_move(tic, millis, &player);

        if tic == 10 {
            let victim = enemy();
            telemetry::on_targeted(tic, millis, &player, &victim);
        }
        if tic == 12 {
            telemetry::on_hit(tic, millis, Some(&player), Some(&enemy()), 17);
        }
        if tic == 14 {
            let victim = enemy();
            telemetry::on_killed(tic, millis, &player, &victim);
        }
        if tic == 20 {
            telemetry::on_pickup_health(tic, millis, &player, 25);
        }

        thread::sleep(TIC_DURATION);
    }

    telemetry::on_end_level(DEMO_TIC_COUNT, DEMO_TIC_COUNT * 1000 / TICS_PER_SECOND, &player_at(DEMO_TIC_COUNT));
    telemetry::stop_telemetry();
}
