use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Sea-level relief tile CLI tool
#[derive(Parser)]
#[command(name = "relief")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Elevation encoding of source tiles (gsi, gsj, mapbox, terrarium)
    #[arg(
        short = 'E',
        long,
        env = "RELIEF_ENCODING",
        default_value = "mapbox",
        global = true
    )]
    encoding: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Paint a local elevation tile as a flood overlay
    Transform {
        /// Input tile (PNG or WebP)
        input: PathBuf,

        /// Output file (defaults to <input>_relief.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threshold in meters; pixels at or below it are painted blue
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        elevation: i32,
    },

    /// Fetch a tile through the relief scheme and write the overlay
    Fetch {
        /// Tile URL: custom-relief://<url>[?elevation=N] or a plain http(s) URL
        url: String,

        /// Output file
        #[arg(short, long, default_value = "relief.png")]
        output: PathBuf,

        /// Threshold in meters (a URL elevation parameter takes precedence)
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        elevation: i32,

        /// Upstream request timeout in seconds
        #[arg(long, env = "RELIEF_TIMEOUT_SECS", default_value = "30")]
        timeout: u64,
    },

    /// Display elevation statistics of a tile
    Info {
        /// Input tile (PNG or WebP)
        input: PathBuf,

        /// Threshold in meters used for the flooded share
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        elevation: i32,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Decode one pixel to an elevation
    Height {
        /// Red channel
        r: u8,
        /// Green channel
        g: u8,
        /// Blue channel
        b: u8,
        /// Alpha channel
        #[arg(default_value_t = 255)]
        a: u8,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Transform every tile in a directory
    Batch {
        /// Directory containing source tiles
        input: PathBuf,

        /// Directory for overlay tiles
        output: PathBuf,

        /// Threshold in meters
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        elevation: i32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            input,
            output,
            elevation,
        } => commands::transform::run(&cli.encoding, input, output, elevation),
        Commands::Fetch {
            url,
            output,
            elevation,
            timeout,
        } => commands::fetch::run(&cli.encoding, &url, output, elevation, timeout),
        Commands::Info {
            input,
            elevation,
            json,
        } => commands::info::run(&cli.encoding, input, elevation, json),
        Commands::Height { r, g, b, a, json } => {
            commands::height::run(&cli.encoding, [r, g, b, a], json)
        }
        Commands::Batch {
            input,
            output,
            elevation,
        } => commands::batch::run(&cli.encoding, input, output, elevation),
    }
}
