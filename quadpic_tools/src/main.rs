mod utils;

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use quadpic::{picture::write_atomic, MirrorAxis};
use utils::{exists_decision, mirror_axis, read_image, write_ppm, Assume};

#[derive(Parser, Debug)]
#[command(name = "quadpic", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Subcommands,

    /// Overwrite output files
    #[arg(short = 'n', long = "overwrite", conflicts_with = "assumeno", global = true)]
    assumeyes: bool,

    /// Do not overwrite output files
    #[arg(short = 'y', long = "preserve", conflicts_with = "assumeyes", global = true)]
    assumeno: bool,

    /// Log more detail. Overridden by `RUST_LOG`
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Compress an image into a quadtree file
    Compress(CompressArgs),

    /// Decompress a quadtree file into a PPM image
    Decompress(DecompressArgs),

    /// Mirror an image by way of its quadtree
    Mirror(MirrorArgs),

    /// Show the header and shape of a quadtree file
    Info(InfoArgs),
}

#[derive(Debug, Args)]
struct CompressArgs {
    /// Homogeneity threshold, a lower value = more detail.
    ///
    /// Regions whose mean squared color deviation is above this are split.
    #[arg(default_value_t = 0, short, long)]
    threshold: u32,

    /// Input image file of any type supported by `image`, must be square
    input: PathBuf,

    /// Output quadtree file
    output: PathBuf,
}

#[derive(Debug, Args)]
struct DecompressArgs {
    /// Input quadtree file
    input: PathBuf,

    /// Output PPM image
    output: PathBuf,
}

#[derive(Debug, Args)]
struct MirrorArgs {
    /// Which way to mirror
    ///
    /// `h` mirrors left to right, any other value mirrors top to bottom.
    #[arg(value_parser = mirror_axis, verbatim_doc_comment)]
    axis: MirrorAxis,

    /// Homogeneity threshold used to build the tree
    #[arg(default_value_t = 0, short, long)]
    threshold: u32,

    /// Input image file of any type supported by `image`, must be square
    input: PathBuf,

    /// Output PPM image
    output: PathBuf,
}

#[derive(Debug, Args)]
struct InfoArgs {
    /// Input quadtree file
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    let assume = if args.assumeyes {
        Some(Assume::Yes)
    } else if args.assumeno {
        Some(Assume::No)
    } else {
        None
    };

    match args.command {
        Subcommands::Compress(a) => compress(a, assume),
        Subcommands::Decompress(a) => decompress(a, assume),
        Subcommands::Mirror(a) => mirror(a, assume),
        Subcommands::Info(a) => show_info(a),
    }
}

fn check_paths(input: &Path, output: &Path, assume: Option<Assume>) -> Result<bool> {
    if !input.try_exists()? {
        bail!("Input file {:?} does not exist", input);
    }

    if output.try_exists()?
        && !exists_decision("Output", "Overwrite", &output, assume)
    {
        return Ok(false)
    }

    Ok(true)
}

fn compress(args: CompressArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let buffer = read_image(&args.input)?;
    write_atomic(&args.output, |out| {
        quadpic::compress(&buffer, args.threshold, out).map(|_| ())
    })?;

    Ok(())
}

fn decompress(args: DecompressArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let input = BufReader::new(File::open(&args.input)?);
    let buffer = quadpic::decompress(input)?;
    write_ppm(&args.output, buffer)?;

    Ok(())
}

fn mirror(args: MirrorArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let buffer = read_image(&args.input)?;
    let mirrored = quadpic::mirror(&buffer, args.axis, args.threshold)?;
    write_ppm(&args.output, mirrored)?;

    info!("{:?}: mirrored across the {:?} axis", args.output, args.axis);

    Ok(())
}

fn show_info(args: InfoArgs) -> Result<()> {
    if !args.input.try_exists()? {
        bail!("Input file {:?} does not exist", args.input);
    }

    let picture = quadpic::open(&args.input)?;
    let header = picture.header();
    let side = picture.side()?;

    println!("size:   {side}×{side}");
    println!("nodes:  {}", header.node_count);
    println!("leaves: {}", header.leaf_count);
    println!("depth:  {}", picture.root().depth());

    Ok(())
}
