// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan - command-line host.
//
// Runs one scan session over an image file: orientation search, corner
// detection (or outline fallback), an optional corner override standing in
// for the interactive polygon editor, then perspective correction and
// binarization. Writes corrected.png and binarized.png.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;

use flatscan_core::human_errors::humanize_error;
use flatscan_core::{CornerSet, ImageSize, Point2D, ScanConfig, ScanError};
use flatscan_pipeline::{DetectionSummary, HostViewport, ScanSession};
use flatscan_vision::ImageprocBackend;

#[derive(Parser, Debug)]
#[command(name = "flatscan")]
#[command(about = "Flatten and binarize a photographed document page")]
#[command(version)]
struct Args {
    /// Photo of the page
    input: PathBuf,

    /// Directory for corrected.png and binarized.png
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Display viewport the preview is fitted into, as WIDTHxHEIGHT
    #[arg(long, default_value = "1000x1000", value_parser = parse_size)]
    viewport: ImageSize,

    /// JSON config file; defaults apply to anything it leaves out
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display-space corners "x,y x,y x,y x,y" (top-left, top-right,
    /// bottom-left, bottom-right), replacing the detected ones
    #[arg(long, value_parser = parse_corners)]
    corners: Option<CornerSet>,

    /// Print a JSON summary on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    detection: &'a DetectionSummary,
    corners: CornerSet,
    corrected: PathBuf,
    binarized: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Flatscan v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(scan) = err.downcast_ref::<ScanError>() {
                let human = humanize_error(scan);
                eprintln!("{}\n{}", human.message, human.suggestion);
            }
            Err(err)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    let image = image::open(&args.input)
        .with_context(|| format!("cannot read image {}", args.input.display()))?;

    let backend = Arc::new(ImageprocBackend::new(config.detection.clone()));
    let viewport = HostViewport::ready(args.viewport);
    let session = ScanSession::new(backend, config, &viewport);

    let summary = session
        .begin(image, |loading: bool| tracing::debug!(loading, "loading"))
        .wait()
        .await?;
    tracing::info!(
        rotation = ?summary.rotation_degrees,
        source = ?summary.corner_source,
        display = %summary.display_size,
        "page located"
    );

    if let Some(corners) = args.corners {
        session.update_corners(corners)?;
    }
    let output = session.crop().await?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("cannot create {}", args.out_dir.display()))?;
    let corrected = args.out_dir.join("corrected.png");
    let binarized = args.out_dir.join("binarized.png");
    output
        .corrected
        .save(&corrected)
        .with_context(|| format!("cannot write {}", corrected.display()))?;
    output
        .binarized
        .save(&binarized)
        .with_context(|| format!("cannot write {}", binarized.display()))?;
    tracing::info!(corrected = %corrected.display(), binarized = %binarized.display(), "scan written");

    if args.json {
        let report = Report {
            detection: &summary,
            corners: session.corners(),
            corrected,
            binarized,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    session.shutdown();
    Ok(())
}

fn parse_size(s: &str) -> anyhow::Result<ImageSize> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .context("expected WIDTHxHEIGHT")?;
    let size = ImageSize::new(w.trim().parse()?, h.trim().parse()?);
    if size.is_empty() {
        bail!("viewport must be non-empty");
    }
    Ok(size)
}

fn parse_corners(s: &str) -> anyhow::Result<CornerSet> {
    let points = s
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("expected x,y but got {pair:?}"))?;
            Ok(Point2D::new(x.parse()?, y.parse()?))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let points: [Point2D; 4] = points
        .try_into()
        .map_err(|p: Vec<Point2D>| anyhow::anyhow!("expected 4 corners, got {}", p.len()))?;
    Ok(CornerSet::from_ordered(points))
}
