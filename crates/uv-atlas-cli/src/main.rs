use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use uv_atlas_core::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "uv-atlas",
    about = "Bake the materials of a scene into one texture atlas and remap its UVs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the atlas, bake every channel and write the remapped scene
    Bake(BakeArgs),
    /// Layout-only run: compute placements and export JSON (scene is not modified)
    Layout(BakeArgs),
}

#[derive(Parser, Debug, Clone)]
struct BakeArgs {
    // Input/Output
    /// Scene description (.json, .yaml or .yml)
    #[arg(help_heading = "Input/Output")]
    scene: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Base name of the written files
    #[arg(short, long, default_value = "atlas", help_heading = "Input/Output")]
    name: String,
    /// YAML or JSON config file; flags below override its values
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Only atlas these objects (repeatable). Defaults to every object of the scene
    #[arg(long = "object", help_heading = "Input/Output")]
    objects: Vec<String>,

    // Layout
    /// Atlas width in pixels
    #[arg(long, help_heading = "Layout")]
    width: Option<u32>,
    /// Atlas height in pixels
    #[arg(long, help_heading = "Layout")]
    height: Option<u32>,
    /// Padding around every island, in material pixels
    #[arg(long, help_heading = "Layout")]
    padding: Option<f64>,
    /// Island merge tolerance in material pixels
    #[arg(long, help_heading = "Layout")]
    epsilon: Option<f64>,
    /// Fill-ratio importance exponent (scales up gappy materials)
    #[arg(long, help_heading = "Layout")]
    area_importance: Option<f64>,

    // Packing
    /// Packing rounds (first round keeps the input order)
    #[arg(long, help_heading = "Packing")]
    rounds: Option<usize>,
    /// Shuffle seed for reproducible layouts
    #[arg(long, help_heading = "Packing")]
    seed: Option<u64>,
    /// Algorithm: maxrects | skyline
    #[arg(long, value_parser = ["maxrects", "skyline"], help_heading = "Packing")]
    algorithm: Option<String>,
    /// MaxRects heuristic: baf|bssf|blsf|bl|cp
    #[arg(long, help_heading = "Heuristics")]
    heuristic: Option<String>,
    /// Skyline heuristic: bl|minwaste
    #[arg(long, help_heading = "Heuristics")]
    skyline: Option<String>,
    /// Grid cells along the side of the packing bin
    #[arg(long, help_heading = "Packing")]
    grid_resolution: Option<u32>,

    // Bake
    /// Channel to bake (repeatable): diffuse|alpha|emit|normal|roughness|metallic
    #[arg(long = "channel", help_heading = "Bake")]
    channels: Vec<String>,
    /// AOV channel as name=value or name=r,g,b (repeatable)
    #[arg(long = "aov", help_heading = "Bake")]
    aovs: Vec<String>,
    /// Draw red outlines around islands in the previews (debug)
    #[arg(long, default_value_t = false, help_heading = "Bake")]
    outlines: bool,
    /// Do not write preview PNGs
    #[arg(long, default_value_t = false, help_heading = "Bake")]
    no_previews: bool,

    // Export
    /// Export run stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after config file and flags) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: run everything but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let show_progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Bake(args) => run(args, true, show_progress),
        Commands::Layout(args) => run(args, false, show_progress),
    }
}

fn run(args: &BakeArgs, apply: bool, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(args)?;
    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let description = load_scene(&args.scene)?;
    info!(
        objects = description.objects.len(),
        materials = description.materials.len(),
        "loaded scene"
    );
    let mut scene = MemoryScene::new(description);
    if apply && !args.no_previews {
        scene = scene.with_previews(args.outlines);
    }
    let policy = scene.policy();
    let objects = if args.objects.is_empty() {
        scene.object_names()
    } else {
        args.objects.clone()
    };

    let mut pipeline = AtlasBuildPipeline::new(&mut scene, &policy, cfg.clone(), objects)?;
    if show_progress {
        pipeline = pipeline.with_observer(Box::new(BarObserver::new()?));
    }
    let result = if apply { pipeline.run() } else { pipeline.plan() };
    let outcome = result.with_context(|| format!("atlas build for {}", args.scene.display()))?;
    println!("{}", outcome.stats.summary());

    if args.dry_run {
        info!("dry run, nothing written");
        return Ok(());
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;

    let mut written = Vec::new();
    let layout_path = args.out_dir.join(format!("{}.layout.json", args.name));
    let json = serde_json::to_string_pretty(&layout_to_json(&outcome.layout))?;
    fs::write(&layout_path, json).with_context(|| format!("write {}", layout_path.display()))?;
    info!(?layout_path, quads = outcome.layout.quads.len(), "layout written");
    written.push(layout_path);

    if apply {
        let scene_path = args.out_dir.join(format!("{}.scene.json", args.name));
        let json = scene.description().to_json()?;
        fs::write(&scene_path, json).with_context(|| format!("write {}", scene_path.display()))?;
        info!(?scene_path, "remapped scene written");
        written.push(scene_path);

        for (channel, image) in scene.previews() {
            let png_path = args.out_dir.join(format!("{}_{}.png", args.name, channel.name()));
            image
                .save(&png_path)
                .with_context(|| format!("write {}", png_path.display()))?;
            info!(?png_path, %channel, "wrote preview");
            written.push(png_path);
        }
    }

    if let Some(stats_path) = &args.export_stats {
        let summary = RunSummary {
            scene: &args.scene,
            baked: apply,
            channels: cfg.channels.iter().map(|c| c.name().to_string()).collect(),
            stats: &outcome.stats,
            waste_percentage: outcome.stats.waste_percentage(),
            pack: &outcome.pack,
            outputs: &written,
        };
        fs::write(stats_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("write {}", stats_path.display()))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct RunSummary<'a> {
    scene: &'a Path,
    baked: bool,
    channels: Vec<String>,
    stats: &'a AtlasStats,
    waste_percentage: f64,
    pack: &'a PackReport,
    outputs: &'a [PathBuf],
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn load_scene(path: &Path) -> anyhow::Result<SceneDescription> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let description = if is_yaml(path) {
        serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))?
    } else {
        SceneDescription::from_json(&text).with_context(|| format!("parse {}", path.display()))?
    };
    Ok(description)
}

fn build_config(args: &BakeArgs) -> anyhow::Result<AtlasConfig> {
    // Config file sets everything en bloc, flags override single values
    let mut cfg = match &args.config {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            let parsed: AtlasConfig = if is_yaml(path) {
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parse config {}", path.display()))?
            } else {
                serde_json::from_str(&text)
                    .with_context(|| format!("parse config {}", path.display()))?
            };
            parsed
        }
        None => AtlasConfig::default(),
    };

    if let Some(v) = args.width {
        cfg.atlas_width = v;
    }
    if let Some(v) = args.height {
        cfg.atlas_height = v;
    }
    if let Some(v) = args.padding {
        cfg.padding = v;
    }
    if let Some(v) = args.epsilon {
        cfg.default_epsilon = v;
    }
    if let Some(v) = args.area_importance {
        cfg.area_importance = Some(v);
    }
    if let Some(v) = args.rounds {
        cfg.rounds = v;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    if let Some(v) = &args.algorithm {
        cfg.algorithm = parse_named(v, "algorithm")?;
    }
    if let Some(v) = &args.heuristic {
        cfg.mr_heuristic = parse_named(v, "maxrects heuristic")?;
    }
    if let Some(v) = &args.skyline {
        cfg.skyline_heuristic = parse_named(v, "skyline heuristic")?;
    }
    if let Some(v) = args.grid_resolution {
        cfg.grid_resolution = v;
    }
    if !args.channels.is_empty() || !args.aovs.is_empty() {
        let mut channels = Vec::new();
        for c in &args.channels {
            channels.push(parse_named::<BakeChannel>(c, "channel")?);
        }
        for a in &args.aovs {
            channels.push(BakeChannel::Aov(parse_aov(a)?));
        }
        cfg.channels = channels;
    }
    if cfg.channels.is_empty() {
        warn!("no bake channels configured, only the layout and UVs will change");
    }
    cfg.validate()?;
    Ok(cfg)
}

fn parse_named<T: FromStr<Err = ()>>(value: &str, what: &str) -> anyhow::Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown {}: {}", what, value))
}

fn parse_aov(s: &str) -> anyhow::Result<AovSpec> {
    let (name, default) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("AOV must be name=value or name=r,g,b, got {s}"))?;
    let values = default
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("AOV {name} default"))?;
    let (kind, default) = match values.as_slice() {
        [v] => (AovKind::Value, AovDefault::Value(*v)),
        [r, g, b] => (AovKind::Color, AovDefault::Color([*r, *g, *b])),
        _ => anyhow::bail!("AOV {name} needs 1 value or 3 color components"),
    };
    Ok(AovSpec::new(name.trim(), kind, default)?)
}

/// Progress bar driven by pipeline stages.
struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {msg} {pos}/{len} [{elapsed_precise}]",
        )?);
        Ok(Self { bar })
    }
}

impl ProgressObserver for BarObserver {
    fn on_stage(&mut self, stage: Stage) {
        self.bar.set_message(stage.name());
        self.bar.set_length(0);
        self.bar.set_position(0);
    }

    fn on_progress(&mut self, _stage: Stage, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
    }

    fn on_finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
