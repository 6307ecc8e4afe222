use std::path::PathBuf;

use clap::Parser;
use env_logger;
use log::{error, warn};

use hipscut::hips_fetcher::Hips2FitsFetcher;
use hipscut::pipeline::Pipeline;
use hipscut::simbad_resolver::SimbadResolver;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Target identifier resolvable by SIMBAD, e.g. "Vega" or "M 31".
    target: String,

    /// Coordinate frame used to interpret the resolved position.
    #[arg(long, default_value = "ICRS")]
    frame: String,

    /// HiPS survey to fetch. Repeat the flag to request several surveys
    /// (used with --grid).
    #[arg(long = "survey", default_value = "DSS")]
    surveys: Vec<String>,

    /// Colormap used to render the image, e.g. "gray" or "viridis".
    #[arg(long, default_value = "gray")]
    cmap: String,

    /// Field of view of the cutout, degrees.
    #[arg(long, value_parser = parse_fov, default_value = "1.0")]
    fov: f64,

    /// Compose all requested surveys into a single multi-panel figure.
    #[arg(long)]
    grid: bool,

    /// Directory where the output figure is written.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn parse_fov(arg: &str) -> Result<f64, String> {
    let fov: f64 = arg.parse().map_err(|_| format!("`{}` is not a number", arg))?;
    if !fov.is_finite() || fov <= 0.0 {
        return Err(format!("field of view must be a positive number, got {}", arg));
    }
    Ok(fov)
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let pipeline = Pipeline::new(Box::new(SimbadResolver::new()),
                                 Box::new(Hips2FitsFetcher::new()),
                                 &args.out_dir);
    let status = if args.grid {
        match pipeline.render_grid(&args.target, &args.frame, &args.surveys,
                                   &args.cmap, args.fov) {
            Ok(report) if report.all_succeeded() => 0,
            Ok(_) => 1,  // Figure written, but some panels failed.
            Err(e) => {
                error!("{}", e);
                1
            },
        }
    } else {
        if args.surveys.len() > 1 {
            warn!("Multiple surveys requested without --grid; using '{}'",
                  args.surveys[0]);
        }
        match pipeline.render_single(&args.target, &args.frame,
                                     &args.surveys[0], &args.cmap, args.fov) {
            Ok(_) => 0,
            Err(e) => {
                error!("{}", e);
                1
            },
        }
    };
    std::process::exit(status);
}
