//! Track one object through a sequence of image files and write a JSON
//! report with one entry per frame.
//!
//! ```text
//! tld-track --bbox 120,80,64,48 -r report.json frames/*.png
//! tld-track --model-in car.model.json -r report.json frames/*.png
//! ```

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tld::frames::{gray_view, load_gray};
use tld::{write_json, FrameResult, Rect, Tld, TldConfig, TrackingState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracking-Learning-Detection over image files", long_about = None)]
struct Args {
    /// Frames in playback order.
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Object in the first frame as x,y,width,height.
    #[arg(short, long, value_parser = parse_rect)]
    bbox: Option<Rect>,

    /// JSON config; missing fields take their defaults. An imported model
    /// carries its own.
    #[arg(short, long, conflicts_with = "model_in")]
    config: Option<PathBuf>,

    /// Start from a previously exported model instead of a selection.
    #[arg(long, conflicts_with = "bbox")]
    model_in: Option<PathBuf>,

    /// Export the learned model after the last frame.
    #[arg(long)]
    model_out: Option<PathBuf>,

    /// Per-frame JSON report.
    #[arg(short, long, default_value = "tld_report.json")]
    report: PathBuf,

    /// Do not update the model from tracked frames.
    #[arg(long)]
    no_learning: bool,

    /// Learn only on every other valid frame.
    #[arg(long)]
    alternating: bool,

    /// Emit tracing output as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, w, h] => Ok(Rect::new(x, y, w, h)),
        _ => Err(format!("expected x,y,width,height, got {s:?}")),
    }
}

#[derive(Serialize)]
struct FrameReport {
    path: String,
    #[serde(flatten)]
    result: FrameResult,
}

#[derive(Serialize)]
struct RunReport {
    config: TldConfig,
    selection: Option<Rect>,
    frames: Vec<FrameReport>,
    /// Frames with a box.
    tracked: usize,
    /// Frames whose confidence reached the acceptance threshold.
    trusted: usize,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let level = tld::core::level_from_verbosity(args.verbose);
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        tld::core::init_tracing(args.json_logs, level);
        log::set_max_level(level);
    }
    #[cfg(not(feature = "tracing"))]
    tld::core::init_with_level(level)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    let Some((first_path, rest)) = args.frames.split_first() else {
        return Err("no frames given".into());
    };
    let first = load_gray(first_path)?;
    let (width, height) = (first.width() as usize, first.height() as usize);

    let mut tld = match (&args.model_in, args.bbox) {
        (Some(path), _) => {
            let tld = Tld::import_model(&fs::read(path)?)?;
            if tld.frame_size() != (width, height) {
                return Err(format!(
                    "model was trained on {:?} frames, {} is {width}x{height}",
                    tld.frame_size(),
                    first_path.display()
                )
                .into());
            }
            tld
        }
        (None, Some(_)) => {
            let config = match &args.config {
                Some(path) => TldConfig::load_json(path)?,
                None => TldConfig::default(),
            };
            Tld::new(width, height, config)?
        }
        (None, None) => return Err("either --bbox or --model-in is required".into()),
    };
    if args.no_learning {
        tld.set_learning_enabled(false);
    }
    if args.alternating {
        tld.set_alternating(true);
    }

    // A selection consumes the first frame; an imported model has to find
    // the object in it.
    let pending: Vec<&PathBuf> = match args.bbox {
        Some(rect) => {
            tld.select_object(&gray_view(&first), rect)?;
            rest.iter().collect()
        }
        None => args.frames.iter().collect(),
    };

    let threshold = tld.config().acceptance_threshold;
    let mut frames = Vec::with_capacity(pending.len());
    for path in pending {
        let img = load_gray(path)?;
        let result = tld.process_frame(&gray_view(&img))?;
        match result.bbox {
            Some(b) => log::info!(
                "{}: {},{},{},{} conf {:.3}",
                path.display(),
                b.x,
                b.y,
                b.width,
                b.height,
                result.confidence
            ),
            None => log::info!("{}: lost", path.display()),
        }
        frames.push(FrameReport {
            path: path.display().to_string(),
            result,
        });
    }

    let report = RunReport {
        config: tld.config().clone(),
        selection: args.bbox,
        tracked: frames.iter().filter(|f| f.result.bbox.is_some()).count(),
        trusted: frames
            .iter()
            .filter(|f| f.result.is_trusted(threshold))
            .count(),
        frames,
    };
    write_json(&args.report, &report)?;
    println!(
        "{} frames, {} tracked, {} trusted, final state {:?}",
        report.frames.len(),
        report.tracked,
        report.trusted,
        tld.state()
    );

    if let Some(path) = &args.model_out {
        if tld.state() == TrackingState::Uninitialized {
            return Err("nothing to export".into());
        }
        fs::write(path, tld.export_model()?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_argument_parses() {
        assert_eq!(parse_rect("1, 2,30,40"), Ok(Rect::new(1, 2, 30, 40)));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }

    #[test]
    fn config_and_imported_model_are_exclusive() {
        let err = Args::try_parse_from([
            "tld-track",
            "--model-in",
            "car.model.json",
            "--config",
            "tld.json",
            "f0.png",
        ])
        .expect_err("conflict");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let args = Args::try_parse_from(["tld-track", "-c", "tld.json", "-b", "1,2,3,4", "-vv", "f0.png"])
            .expect("args");
        assert_eq!(args.verbose, 2);
        assert_eq!(args.bbox, Some(Rect::new(1, 2, 3, 4)));
    }
}
