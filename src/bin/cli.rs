use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand, ValueEnum};

use route_dsl::diagnostics::{Diagnostics, Severity};
use route_dsl::dsl::{load_route, preview_route, LoadedRoute};
use route_dsl::loader::{Encoding, FsLoader};
use route_dsl::registry::{
    CycleCommand, OptionsCommand, RouteCommand, SignalCommand, StructureCommand, TrackCommand,
    TrainCommand,
};
use route_dsl::settings::{self, RouteSettings};
use route_dsl::RouteError;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "route-dsl-cli", about = "Route file interpreter", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON). Missing file = defaults.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Text encoding override
    #[arg(long, global = true, value_enum)]
    encoding: Option<EncodingArg>,

    /// Seed for $Rnd and weighted $Include
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a route and report diagnostics only
    Check { path: PathBuf },
    /// Print the route summary (comment, image, gauge, timetable)
    Preview { path: PathBuf },
    /// Interpret a route and build its world
    Build {
        path: PathBuf,
        /// Write the built world as JSON to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List every supported command
    Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Utf8,
    Latin1,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => Encoding::Utf8,
            EncodingArg::Latin1 => Encoding::Latin1,
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────

fn resolve_settings(cli: &Cli) -> RouteSettings {
    let mut resolved = match &cli.settings {
        Some(path) => settings::load_settings(path).unwrap_or_else(|e| {
            eprintln!("Failed to load settings '{}': {e}", path.display());
            process::exit(1);
        }),
        None => RouteSettings::default(),
    };
    if let Some(encoding) = cli.encoding {
        resolved.encoding = encoding.into();
    }
    if let Some(seed) = cli.seed {
        resolved.random_seed = seed;
    }
    resolved
}

// ── Output formatting ────────────────────────────────────────────

fn print_diagnostics(diagnostics: &Diagnostics, raw_json: bool) {
    if raw_json {
        println!(
            "{}",
            serde_json::to_string_pretty(diagnostics.entries()).unwrap_or_default()
        );
        return;
    }
    for d in diagnostics.entries() {
        println!("{}", d.format_with_location());
    }
    println!(
        "{} error(s), {} warning(s)",
        diagnostics.count(Severity::Error),
        diagnostics.count(Severity::Warning)
    );
}

fn print_loaded(loaded: &LoadedRoute) {
    let data = &loaded.data;
    println!("Blocks:   {}", data.blocks.len());
    println!("Stations: {}", data.stations.len());
    println!("Gauge:    {} m", data.route.gauge);
    if let Some(world) = &loaded.world {
        println!("Elements: {}", world.elements.len());
        println!("Objects:  {}", world.objects.len());
        println!("Events:   {}", world.events.len());
    }
}

fn print_commands() {
    fn section<T: Copy>(ns: &str, all: &[T], name: impl Fn(T) -> &'static str, desc: impl Fn(T) -> &'static str) {
        println!("[{ns}]");
        for &c in all {
            println!("  {:<22} {}", name(c), desc(c));
        }
    }
    section(OptionsCommand::NAMESPACE, OptionsCommand::all(), OptionsCommand::name, OptionsCommand::description);
    section(RouteCommand::NAMESPACE, RouteCommand::all(), RouteCommand::name, RouteCommand::description);
    section(TrainCommand::NAMESPACE, TrainCommand::all(), TrainCommand::name, TrainCommand::description);
    section(StructureCommand::NAMESPACE, StructureCommand::all(), StructureCommand::name, StructureCommand::description);
    section(SignalCommand::NAMESPACE, SignalCommand::all(), SignalCommand::name, SignalCommand::description);
    section(CycleCommand::NAMESPACE, CycleCommand::all(), CycleCommand::name, CycleCommand::description);
    section(TrackCommand::NAMESPACE, TrackCommand::all(), TrackCommand::name, TrackCommand::description);
}

fn fail(path: &Path, e: &RouteError) -> ! {
    eprintln!("Error loading '{}': {e}", path.display());
    process::exit(1);
}

// ── Entry point ──────────────────────────────────────────────────

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli);
    let loader = FsLoader::new();
    let cancel = AtomicBool::new(false);
    let raw = cli.json;
    let mut diagnostics = Diagnostics::new();

    match &cli.command {
        Commands::Commands => print_commands(),
        Commands::Preview { path } => {
            let summary = preview_route(path, &settings, &loader, &mut diagnostics, Some(&cancel))
                .unwrap_or_else(|e| fail(path, &e));
            if raw {
                println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
            } else {
                println!("Comment:   {}", summary.comment);
                if let Some(image) = &summary.image {
                    println!("Image:     {}", image.display());
                }
                println!("Gauge:     {} m", summary.gauge);
                println!("Timetable: {}", summary.timetable);
            }
        }
        Commands::Check { path } => {
            let loaded = load_route(path, &settings, &loader, &mut diagnostics, Some(&cancel))
                .unwrap_or_else(|e| fail(path, &e));
            print_diagnostics(&diagnostics, raw);
            if !raw {
                print_loaded(&loaded);
            }
            if diagnostics.has_critical() {
                process::exit(2);
            }
        }
        Commands::Build { path, out } => {
            let loaded = load_route(path, &settings, &loader, &mut diagnostics, Some(&cancel))
                .unwrap_or_else(|e| fail(path, &e));
            if let Some(out) = out {
                let json = serde_json::to_string_pretty(&loaded.world).unwrap_or_else(|e| {
                    eprintln!("Failed to serialize world: {e}");
                    process::exit(1);
                });
                if let Err(e) = std::fs::write(out, json) {
                    eprintln!("Failed to write '{}': {e}", out.display());
                    process::exit(1);
                }
            }
            if raw {
                println!("{}", serde_json::to_string_pretty(&loaded).unwrap_or_default());
            } else {
                print_diagnostics(&diagnostics, false);
                print_loaded(&loaded);
                println!("Resources: {}", loader.resource_count());
            }
        }
    }
}
