//! Drivers demo - simulated vehicles wandering a map
//!
//! Builds a population of driver agents whose position derives from a
//! chain of dependent parameters (heading and ignition feed speed,
//! speed and elapsed seconds feed distance, distance and heading feed
//! the x/y coordinates) and renders each agent update as a KML
//! placemark or a JSON snapshot stream.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use micro_agents::agent::MarkovAgent;
use micro_agents::core::config::WorldConfig;
use micro_agents::core::error::Result;
use micro_agents::core::types::Value;
use micro_agents::world::World;

#[derive(Parser, Debug)]
#[command(name = "drivers", about = "Stochastic driver simulation demo")]
struct Args {
    /// Number of simulated drivers
    #[arg(long, default_value_t = 3)]
    agents: usize,

    /// Number of ticks to run
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// RNG seed (same seed reproduces the same run)
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Milliseconds between ticks; 0 runs as fast as possible without
    /// the timer-driven loop
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Output format
    #[arg(long, value_enum, default_value = "kml")]
    format: Format,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Kml,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("micro_agents=info")
        .init();

    let args = Args::parse();

    let config = WorldConfig {
        tick_interval: Duration::from_millis(args.interval_ms.max(1)),
        population: args.agents,
        sampling_fraction: 1.0,
        seed: args.seed,
    };

    let seed = args.seed;
    let mut world = World::new(config, |index| driver_agent(index, seed))?;

    // One snapshot per agent update, in update order
    let snapshots: Rc<RefCell<Vec<ahash::AHashMap<String, Value>>>> =
        Rc::new(RefCell::new(Vec::new()));
    {
        let snapshots = Rc::clone(&snapshots);
        world.set_step_hook(move |agent| {
            snapshots.borrow_mut().push(agent.snapshot());
        });
    }

    if args.interval_ms > 0 {
        // Timer-driven loop; the end hook stops it after the requested
        // number of ticks.
        let handle = world.stop_handle();
        let target = args.ticks;
        let completed = Rc::new(Cell::new(0u64));
        {
            let completed = Rc::clone(&completed);
            world.set_end_hook(move || {
                completed.set(completed.get() + 1);
                if completed.get() >= target {
                    handle.stop();
                }
            });
        }
        world.start()?;
    } else {
        for _ in 0..args.ticks {
            world.tick()?;
        }
    }

    let snapshots = snapshots.borrow();
    match args.format {
        Format::Kml => println!("{}", render_kml(&snapshots)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&*snapshots)?),
    }

    Ok(())
}

/// Build one driver agent.
///
/// The dependency chain mirrors a vehicle: ignition gates speed, speed
/// and the per-tick elapsed seconds produce a distance delta, and the
/// distance delta plus heading move the x/y coordinates across a
/// degrees-based map.
fn driver_agent(index: usize, seed: u64) -> Result<MarkovAgent> {
    // Per-agent rule randomness, derived from the world seed so whole
    // runs stay reproducible.
    let rng = Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(
        seed.wrapping_add(index as u64 + 1),
    )));
    let start_heading = rng.borrow_mut().gen_range(0..360) as f64;
    let start_speed = rng.borrow_mut().gen_range(1..=130) as f64;

    let heading_rng = Rc::clone(&rng);
    let speed_rng = Rc::clone(&rng);
    let seconds_rng = Rc::clone(&rng);

    MarkovAgent::builder()
        .parameter("name", |p| {
            p.start_value(format!("sim_{index}"));
        })
        .parameter("heading", |p| {
            p.start_value(start_heading)
                .probability(0.1)
                .change_rule(move |value, _| {
                    let turn = heading_rng.borrow_mut().gen_range(0..=120) as f64;
                    Value::Number((value.as_number().unwrap_or(0.0) + turn) % 360.0)
                });
        })
        .parameter("ignition", |p| {
            p.start_value(true).probability(0.001).change_rule(|value, _| {
                Value::Bool(!value.as_bool().unwrap_or(true))
            });
        })
        .parameter("speed", |p| {
            p.start_value(start_speed)
                .probability(0.2)
                .depends_on(["ignition"])
                .min(0.0)
                .max(135.0)
                .change_rule(move |value, deps| {
                    let running = deps.first().and_then(Value::as_bool).unwrap_or(false);
                    if !running {
                        return Value::Number(0.0);
                    }
                    let delta = speed_rng.borrow_mut().gen_range(-30..=30) as f64;
                    Value::Number(value.as_number().unwrap_or(0.0) + delta)
                });
        })
        .parameter("seconds_delta", |p| {
            p.start_value(0.0).change_rule(move |_, _| {
                Value::Number(seconds_rng.borrow_mut().gen_range(1..=5) as f64)
            });
        })
        .parameter("distance_delta", |p| {
            p.start_value(0.0)
                .depends_on(["speed", "seconds_delta"])
                .change_rule(|_, deps| {
                    // speed in km/h
                    let speed = deps.first().and_then(Value::as_number).unwrap_or(0.0);
                    let seconds = deps.get(1).and_then(Value::as_number).unwrap_or(0.0);
                    Value::Number(speed / 3600.0 * seconds)
                });
        })
        .parameter("y", |p| {
            p.start_value(-39.0)
                .depends_on(["heading", "distance_delta"])
                .change_rule(|value, deps| {
                    let heading = deps.first().and_then(Value::as_number).unwrap_or(0.0);
                    let delta_km = deps.get(1).and_then(Value::as_number).unwrap_or(0.0);
                    // ~111 km per degree of latitude
                    let y_km = heading.to_radians().cos() * delta_km;
                    Value::Number(value.as_number().unwrap_or(0.0) + y_km / 111.0)
                });
        })
        .parameter("x", |p| {
            p.start_value(176.0)
                .depends_on(["heading", "distance_delta", "y"])
                .change_rule(|value, deps| {
                    let heading = deps.first().and_then(Value::as_number).unwrap_or(0.0);
                    let delta_km = deps.get(1).and_then(Value::as_number).unwrap_or(0.0);
                    let y = deps.get(2).and_then(Value::as_number).unwrap_or(0.0);
                    let x_km = heading.to_radians().sin() * delta_km;
                    // longitude degrees shrink with latitude
                    let km_per_degree = y.to_radians().cos() * 111.0;
                    Value::Number(value.as_number().unwrap_or(0.0) + x_km / km_per_degree)
                });
        })
        .build()
}

fn render_kml(snapshots: &[ahash::AHashMap<String, Value>]) -> String {
    let mut placemarks = String::new();
    for snapshot in snapshots {
        let name = snapshot
            .get("name")
            .map(|v| v.to_string())
            .unwrap_or_default();
        let x = snapshot
            .get("x")
            .and_then(Value::as_number)
            .unwrap_or_default();
        let y = snapshot
            .get("y")
            .and_then(Value::as_number)
            .unwrap_or_default();
        placemarks.push_str(&format!(
            "    <Placemark>\n      <name>{name}</name>\n      <Point>\n        <coordinates>{x}, {y}</coordinates>\n      </Point>\n    </Placemark>\n"
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n  <Document>\n{placemarks}  </Document>\n</kml>"
    )
}
