//! refcam: project and unproject through a calibrated camera.

mod logger;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nalgebra::{Vector2, Vector3};
use refcam_core::Camera;
use refcam_io::load_calibration;
use tracing::{Level, error};

use crate::logger::{init_logger, init_logger_with_level};

#[derive(Debug, Parser)]
#[command(name = "refcam")]
#[command(version, about = "Bearing/pixel mappings for pinhole, fisheye and refractive cameras")]
struct Args {
    /// Path to the YAML calibration file
    #[arg(long, short)]
    calibration: PathBuf,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Project a bearing in camera coordinates to a pixel
    Project {
        /// Bearing as x,y,z
        #[arg(long, value_parser = parse_vector3, allow_hyphen_values = true)]
        bearing: Vector3<f64>,

        /// Refractive index overriding the calibrated one
        #[arg(long)]
        index: Option<f64>,

        /// Also print d(pixel)/d(bearing) and d(pixel)/dn
        #[arg(long)]
        jacobian: bool,
    },
    /// Recover a unit bearing from a pixel
    Unproject {
        /// Pixel as u,v
        #[arg(long, value_parser = parse_vector2, allow_hyphen_values = true)]
        pixel: Vector2<f64>,

        /// Use the closed-form inverse (refractive models only)
        #[arg(long)]
        analytic: bool,

        /// Refractive index overriding the calibrated one, for --analytic
        #[arg(long, requires = "analytic")]
        index: Option<f64>,
    },
}

fn parse_components<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {N} comma-separated values, got {}", v.len()))
}

fn parse_vector3(s: &str) -> Result<Vector3<f64>, String> {
    parse_components::<3>(s).map(Vector3::from)
}

fn parse_vector2(s: &str) -> Result<Vector2<f64>, String> {
    parse_components::<2>(s).map(Vector2::from)
}

fn run(camera: &Camera, command: &Command) -> Result<String, Box<dyn Error>> {
    let output = match command {
        Command::Project {
            bearing,
            index,
            jacobian: false,
        } => {
            let pixel = camera.bearing_to_pixel(bearing, *index)?;
            format!("pixel: {} {}", pixel.x, pixel.y)
        }
        Command::Project {
            bearing,
            index,
            jacobian: true,
        } => {
            let j = camera.bearing_to_pixel_with_jacobian(bearing, *index)?;
            format!(
                "pixel: {} {}\nd_bearing:{}d_index: {} {}",
                j.pixel.x, j.pixel.y, j.d_bearing, j.d_index.x, j.d_index.y
            )
        }
        Command::Unproject {
            pixel,
            analytic,
            index,
        } => {
            let bearing = if *analytic {
                camera.pixel_to_bearing_analytical(pixel, *index)?
            } else {
                camera.pixel_to_bearing(pixel)?
            };
            format!("bearing: {} {} {}", bearing.x, bearing.y, bearing.z)
        }
    };
    Ok(output)
}

fn try_main(args: &Args) -> Result<(), Box<dyn Error>> {
    let camera = load_calibration(&args.calibration)?;
    println!("{}", run(&camera, &args.command)?);
    Ok(())
}

fn main() {
    let args = Args::parse();
    if args.verbose {
        init_logger_with_level(Level::DEBUG);
    } else {
        init_logger();
    }

    if let Err(err) = try_main(&args) {
        error!("{err}");
        std::process::exit(1);
    }
}
