use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use fibrillation_common::SnapshotFile;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod plot;
mod render;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin, written by the engine in bincode format)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "animated_simulation.mp4")]
    output: PathBuf,

    /// Output path for the activity time-series plot (.png)
    #[arg(long, default_value = "num_active_cells.png")]
    activity_plot: PathBuf,

    /// Pixels per lattice cell along each axis
    #[arg(long, default_value_t = 4)]
    scale: u32,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 50)]
    fps: u32,

    /// Also write every frame as a PNG into this directory
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Only plot the activity history
    #[arg(long)]
    skip_video: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn load_snapshot_file(path: &Path) -> Result<SnapshotFile> {
    let input_file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let reader = BufReader::new(input_file);
    bincode::deserialize_from(reader)
        .with_context(|| format!("Failed to decode snapshots from {}", path.display()))
}

fn progress_bar(len: u64, template: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Fibrillation Visualizer...");
    info!("Input file: {}", args.input.display());

    let recording = load_snapshot_file(&args.input)?;
    info!(
        "Loaded {} snapshots of a {}x{} lattice (refractory period {}, driving period {}).",
        recording.snapshots.len(),
        recording.row_size,
        recording.col_size,
        recording.refractory_period,
        recording.driving_period
    );

    // --- Activity plot ---
    plot::plot_activity(&args.activity_plot, &recording.activity, (800, 600))
        .with_context(|| format!("Failed to plot activity to {}", args.activity_plot.display()))?;
    info!("Activity plot saved to {}", args.activity_plot.display());

    if args.skip_video {
        info!("Skipping video as requested.");
        return Ok(());
    }

    // --- Render frames ---
    let states: Vec<&[u16]> = recording
        .snapshots
        .iter()
        .filter_map(|s| s.state.as_deref())
        .collect();
    if states.is_empty() {
        warn!("No snapshots contain grid data! Re-run the engine with --record to animate.");
        return Ok(());
    }
    if states.len() < recording.snapshots.len() {
        warn!(
            "{} of {} snapshots carry no grid and are skipped.",
            recording.snapshots.len() - states.len(),
            recording.snapshots.len()
        );
    }

    let expected_cells = recording.row_size * recording.col_size;
    if let Some(bad) = states.iter().position(|s| s.len() != expected_cells) {
        anyhow::bail!(
            "Snapshot {} holds {} cells, expected {}.",
            bad,
            states[bad].len(),
            expected_cells
        );
    }

    let (width, height) = render::frame_dimensions(recording.row_size, recording.col_size, args.scale);
    info!("Output video dimensions: {}x{} px at {} fps", width, height, args.fps);

    let start_time = Instant::now();
    let render_progress = progress_bar(
        states.len() as u64,
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]",
    );
    let frames: Vec<_> = states
        .par_iter()
        .progress_with(render_progress.clone())
        .map(|state| {
            render::draw_frame(
                state,
                recording.row_size,
                recording.col_size,
                args.scale,
                recording.refractory_period,
            )
        })
        .collect();
    render_progress.finish_with_message("Rendered frames");

    if let Some(dir) = &args.frames_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frames directory {}", dir.display()))?;
        frames
            .par_iter()
            .enumerate()
            .try_for_each(|(i, frame)| {
                let path = dir.join(format!("frame_{:05}.png", i));
                frame
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))
            })?;
        info!("Wrote {} PNG frames to {}", frames.len(), dir.display());
    }

    // --- Initialize video encoder ---
    info!("Setting up video encoder...");
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)),
    )
    .context("Failed to initialize H.264 encoder")?;

    let encode_progress = progress_bar(
        frames.len() as u64,
        "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]",
    );

    // Frames must reach the encoder in order; only the colour conversion is parallel.
    const ENCODE_BATCH_SIZE: usize = 30;
    let mut h264_data = Vec::new();
    let mut frame_count = 0;
    for batch in frames.chunks(ENCODE_BATCH_SIZE) {
        let yuv_frames: Vec<Vec<u8>> = batch.par_iter().map(render::gray_to_yuv420).collect();
        for yuv_data in yuv_frames {
            let yuv_source = YUVBuffer::from_vec(yuv_data, width as usize, height as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", frame_count, e),
            }
            encode_progress.inc(1);
        }
    }
    encode_progress.finish_with_message(format!("Encoded {} frames", frame_count));

    // --- Mux into MP4 ---
    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    {
        let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
        let video_description = format!(
            "Atrial fibrillation lattice {}x{}",
            recording.row_size, recording.col_size
        );
        mp4muxer.init_video(width as i32, height as i32, false, &video_description);
        mp4muxer.write_video(&h264_data);
        mp4muxer.close();
    }

    let video_bytes = video_buffer.into_inner();
    fs::write(&args.output, &video_bytes)
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64().max(1e-9)
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibrillation_common::Snapshot;

    #[test]
    fn loads_bincode_snapshot_file() {
        let recording = SnapshotFile {
            row_size: 2,
            col_size: 3,
            refractory_period: 4,
            driving_period: 8,
            activity: vec![2, 1],
            snapshots: vec![
                Snapshot { step: 0, active_cells: 0, state: Some(vec![0; 6]) },
                Snapshot { step: 1, active_cells: 2, state: None },
            ],
        };
        let path = std::env::temp_dir().join(format!("fibrillation_vis_{}.bin", std::process::id()));
        let file = File::create(&path).unwrap();
        bincode::serialize_into(file, &recording).unwrap();

        let loaded = load_snapshot_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, recording);
        assert_eq!(loaded.frames_with_state(), 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        let path = std::env::temp_dir().join("fibrillation_vis_missing_input.bin");
        assert!(load_snapshot_file(&path).is_err());
    }
}
