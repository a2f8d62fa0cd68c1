use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};
use log::info;

use sightline_runtime::services::{self, Services};
use sightline_runtime::{GazeEvent, Scene, SimEvent, Simulation, TickReport, WeaponEvent};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path))?;
    let scene = Scene::from_xml(&xml).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} actors)",
        scene.objects.len(),
        scene.actors().count()
    );
    for object in &scene.objects {
        println!(" - {} ({})", object.name, object.object_type);
    }

    let ticks = options
        .ticks
        .unwrap_or_else(|| scene.default_ticks())
        .max(1);

    let installed = services::install(Services::new(scene.catalog.clone()))
        .context("failed to install services")?;
    let mut simulation = Simulation::from_scene(scene, installed.clone())
        .context("failed to build simulation")?;

    info!(
        "Running {ticks} ticks at {} Hz",
        simulation.config().tick_rate
    );
    for _ in 0..ticks {
        let report = simulation.tick();
        if !options.summary_only {
            print_report(&report);
        }
    }

    print_final_state(&simulation);
    Ok(())
}

fn print_report(report: &TickReport) {
    for event in &report.events {
        let line = match event {
            SimEvent::Gaze { actor, event } => match event {
                GazeEvent::Enter(hit) => format!("{actor} gaze enter {}", hit.name),
                GazeEvent::Exit(hit) => format!("{actor} gaze exit {}", hit.name),
            },
            SimEvent::Weapon { actor, event } => match event {
                WeaponEvent::Equipped(weapon) => format!("{actor} equipped {weapon}"),
                WeaponEvent::AimChanged(true) => format!("{actor} aims"),
                WeaponEvent::AimChanged(false) => format!("{actor} lowers aim"),
                WeaponEvent::Attacked { weapon, damage } => {
                    format!("{actor} attacks with {weapon} for {damage:.2}")
                }
                WeaponEvent::DryFire { weapon } => format!("{actor} dry fires {weapon}"),
                WeaponEvent::Reloaded { weapon, rounds } => {
                    format!("{actor} reloads {weapon} with {rounds} rounds")
                }
            },
            SimEvent::Died { entity } => format!("{entity} died"),
        };
        println!("[tick {}] {line}", report.tick);
    }
}

fn print_final_state(simulation: &Simulation) {
    let services = simulation.services();
    println!("Final health:");
    for record in services.health.all_records() {
        println!(
            " - {} health={:.2}{}",
            record.entity_id,
            record.current_health,
            if record.is_dead { " (dead)" } else { "" }
        );
    }
    println!("Final inventory:");
    for entry in services.inventory.entries() {
        if entry.quantity == 0 {
            continue;
        }
        println!(
            " - {} {} x{}",
            entry.owner.as_deref().unwrap_or("<shared>"),
            entry.item_id,
            entry.quantity
        );
    }
}

struct CliOptions {
    path: String,
    ticks: Option<u64>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: sightline-runtime <scene.xml> [--ticks N] [--summary-only]"
            ));
        };
        let mut ticks = None;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--ticks" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--ticks expects a number"))?;
                    let value = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid tick count {value}"))?;
                    ticks = Some(value);
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --ticks or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            ticks,
            summary_only,
        })
    }
}
