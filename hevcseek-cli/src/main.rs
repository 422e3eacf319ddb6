//! Thin CLI shell over `hevcseek-core`: no decode/encode logic lives here,
//! only argument parsing and result rendering.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use hevcseek_core::{Frame, OutputFormat, Reader, ReaderOptions, Writer, WriterOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hevcseek",
    about = "Deterministic frame-indexed random access and closed-GOP writing for HEVC video",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a file for read and print its `VideoInfo` attributes.
    Info {
        path: PathBuf,
    },
    /// Dump a single frame or an inclusive range as dense row-major files.
    Extract {
        path: PathBuf,
        /// 1-based frame index. Mutually exclusive with `--range`.
        #[arg(long)]
        index: Option<usize>,
        /// 1-based inclusive `START:END`. Mutually exclusive with `--index`.
        #[arg(long, value_parser = parse_range)]
        range: Option<(usize, usize)>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        gray: bool,
        #[arg(long)]
        rgb: bool,
    },
    /// Encode a directory of raw row-major frame dumps into a closed-GOP HEVC file.
    Encode {
        frames_dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long)]
        fps: u32,
        #[arg(long)]
        gray: bool,
        #[arg(long, default_value_t = 50)]
        gop_size: u32,
        #[arg(long, default_value_t = 18)]
        crf: u8,
    },
}

fn parse_range(s: &str) -> std::result::Result<(usize, usize), String> {
    let (a, b) = s.split_once(':').ok_or_else(|| format!("expected START:END, got '{s}'"))?;
    let start: usize = a.parse().map_err(|_| format!("bad range start '{a}'"))?;
    let end: usize = b.parse().map_err(|_| format!("bad range end '{b}'"))?;
    Ok((start, end))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Info {
            path,
        } => info(&path),
        Command::Extract {
            path,
            index,
            range,
            out,
            gray,
            rgb,
        } => extract(&path, index, range, &out, gray, rgb),
        Command::Encode {
            frames_dir,
            out,
            width,
            height,
            fps,
            gray,
            gop_size,
            crf,
        } => encode(&frames_dir, &out, width, height, fps, gray, gop_size, crf),
    }
}

fn output_format(gray: bool, rgb: bool) -> Result<OutputFormat> {
    match (gray, rgb) {
        (true, true) => bail!("--gray and --rgb are mutually exclusive"),
        (true, false) => Ok(OutputFormat::Gray8),
        (false, true) => Ok(OutputFormat::Rgb24),
        (false, false) => Ok(OutputFormat::Auto),
    }
}

fn info(path: &Path) -> Result<()> {
    let reader =
        Reader::open(path, ReaderOptions::default()).with_context(|| format!("opening {}", path.display()))?;

    println!("path:        {}", path.display());
    println!("frame_count: {}", reader.frame_count());
    println!("width:       {}", reader.width());
    println!("height:      {}", reader.height());
    let (num, den) = reader.frame_rate();
    println!("frame_rate:  {num}/{den}");
    println!("duration_s:  {:.3}", reader.duration());
    println!("is_gray:     {}", reader.is_gray());
    Ok(())
}

fn extract(
    path: &Path,
    index: Option<usize>,
    range: Option<(usize, usize)>,
    out: &Path,
    gray: bool,
    rgb: bool,
) -> Result<()> {
    let options = ReaderOptions {
        output_format: output_format(gray, rgb)?,
    };
    let mut reader =
        Reader::open(path, options).with_context(|| format!("opening {}", path.display()))?;
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let frames: Vec<(usize, Frame)> = match (index, range) {
        (Some(i), None) => vec![(i, reader.read(i)?)],
        (None, Some((start, end))) => reader
            .read_range(start, end)?
            .into_iter()
            .enumerate()
            .map(|(offset, frame)| (start + offset, frame))
            .collect(),
        (Some(_), Some(_)) => bail!("--index and --range are mutually exclusive"),
        (None, None) => bail!("one of --index or --range is required"),
    };

    for (index, frame) in &frames {
        let ext = if frame.is_gray() {
            "gray"
        } else {
            "rgb"
        };
        let dest = out.join(format!("frame_{index:06}.{ext}"));
        fs::write(&dest, frame.data()).with_context(|| format!("writing {}", dest.display()))?;
    }
    println!("wrote {} frame(s) to {}", frames.len(), out.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode(
    frames_dir: &Path,
    out: &Path,
    width: u32,
    height: u32,
    fps: u32,
    gray: bool,
    gop_size: u32,
    crf: u8,
) -> Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(frames_dir)
        .with_context(|| format!("reading {}", frames_dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    ensure!(!paths.is_empty(), "{} contains no frame files", frames_dir.display());

    let channels = if gray {
        1
    } else {
        3
    };
    let expected_len = width as usize * height as usize * channels;

    let mut writer = Writer::open(
        out,
        width,
        height,
        fps,
        WriterOptions {
            is_gray: gray,
            gop_size,
            crf,
        },
    )
    .with_context(|| format!("opening {}", out.display()))?;

    for path in &paths {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        ensure!(
            data.len() == expected_len,
            "{} is {} bytes, expected {expected_len} for {width}x{height} {}",
            path.display(),
            data.len(),
            if gray {
                "gray8"
            } else {
                "rgb24"
            }
        );
        let frame = if gray {
            Frame::Gray8 {
                width,
                height,
                data,
            }
        } else {
            Frame::Rgb24 {
                width,
                height,
                data,
            }
        };
        writer.write(&frame).with_context(|| format!("writing frame from {}", path.display()))?;
    }

    writer.close().with_context(|| format!("closing {}", out.display()))?;
    println!("wrote {} frame(s) to {}", paths.len(), out.display());
    Ok(())
}
