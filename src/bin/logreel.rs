use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "logreel", version)]
struct Cli {
    /// JSON config file. Flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a whole log into an animated GIF (requires graphviz on PATH).
    Render(RenderArgs),
    /// Render the frame after one log record as a PNG.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Output GIF path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Per-frame delay in milliseconds (multiple of 10).
    #[arg(long)]
    delay_ms: Option<u32>,

    /// Repeat count; 0 loops forever.
    #[arg(long = "loop")]
    loop_count: Option<u16>,

    /// Fail instead of replacing an existing output file.
    #[arg(long)]
    no_overwrite: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Frame index (0-based, counting non-blank log lines).
    #[arg(long)]
    index: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Input game log (newline-delimited JSON).
    #[arg(long = "in")]
    in_path: Option<PathBuf>,

    /// Graphviz layout engine.
    #[arg(long, value_enum)]
    engine: Option<logreel::LayoutEngine>,

    /// Caption font file.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Integer downscale factor.
    #[arg(long)]
    reduce: Option<u32>,

    /// Bitmap shown until the first graph event.
    #[arg(long)]
    base_graph: Option<PathBuf>,

    /// Scratch directory for graph sources and bitmaps.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Print diagnostics about the caption font (family name + SHA-256 of font bytes).
    #[arg(long)]
    dump_font: bool,
}

impl CommonArgs {
    fn apply(&self, cfg: &mut logreel::ReelConfig) {
        if let Some(p) = &self.in_path {
            cfg.input = p.clone();
        }
        if let Some(e) = self.engine {
            cfg.engine = e;
        }
        if let Some(f) = &self.font {
            cfg.caption.font = f.clone();
        }
        if let Some(r) = self.reduce {
            cfg.animation.reduce_factor = r;
        }
        if let Some(b) = &self.base_graph {
            cfg.base_graph = Some(b.clone());
        }
        if let Some(w) = &self.work_dir {
            cfg.work_dir = w.clone();
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => logreel::ReelConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => logreel::ReelConfig::default(),
    };

    match cli.cmd {
        Command::Render(args) => cmd_render(&mut cfg, args),
        Command::Frame(args) => cmd_frame(&mut cfg, args),
    }
}

struct Pipeline {
    session: logreel::ReplaySession,
    renderer: logreel::GraphvizRenderer,
    compositor: logreel::CpuCompositor,
    records: logreel::LogReader<std::io::BufReader<std::fs::File>>,
}

fn prepare(cfg: &logreel::ReelConfig, dump_font: bool) -> anyhow::Result<Pipeline> {
    cfg.validate()?;

    let font = logreel::CaptionFont::load(&cfg.caption.font)
        .with_context(|| "load caption font (set --font or caption.font in the config)")?;
    let font_sha = dump_font.then(|| font.sha256_hex());

    let compositor =
        logreel::CpuCompositor::new(logreel::ComposeOpts::from_config(cfg, font))?;
    if let Some(sha) = font_sha {
        eprintln!("caption font diagnostics:");
        eprintln!("    path:    {}", cfg.caption.font.display());
        eprintln!("    family:  {}", compositor.font_family()?);
        eprintln!("    sha256:  {}", sha);
    }

    let base_graph = cfg
        .base_graph
        .as_deref()
        .map(logreel::load_image)
        .transpose()?;

    let renderer = logreel::GraphvizRenderer::new(cfg.engine, &cfg.work_dir)?;
    let records = logreel::LogReader::open(&cfg.input)?;

    Ok(Pipeline {
        session: logreel::ReplaySession::new(base_graph),
        renderer,
        compositor,
        records,
    })
}

fn cmd_render(cfg: &mut logreel::ReelConfig, args: RenderArgs) -> anyhow::Result<()> {
    args.common.apply(cfg);
    if let Some(out) = args.out {
        cfg.output = out;
    }
    if let Some(d) = args.delay_ms {
        cfg.animation.frame_delay_ms = d;
    }
    if let Some(l) = args.loop_count {
        cfg.animation.loop_count = l;
    }

    let mut p = prepare(cfg, args.common.dump_font)?;

    let mut sink = logreel::GifSink::new(logreel::GifSinkOpts {
        out_path: cfg.output.clone(),
        overwrite: !args.no_overwrite,
        speed: cfg.animation.gif_speed,
    });

    let stats = p.session.replay(
        p.records,
        cfg.sink_config(),
        &mut p.renderer,
        &mut p.compositor,
        &mut sink,
    )?;

    eprintln!(
        "wrote {} ({} frames, {} graph renders)",
        cfg.output.display(),
        stats.frames,
        stats.graph_renders
    );
    Ok(())
}

fn cmd_frame(cfg: &mut logreel::ReelConfig, args: FrameArgs) -> anyhow::Result<()> {
    args.common.apply(cfg);

    let mut p = prepare(cfg, args.common.dump_font)?;
    let frame = p.session.replay_until(
        p.records,
        args.index,
        &mut p.renderer,
        &mut p.compositor,
    )?;

    logreel::write_png(&args.out, &frame)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
