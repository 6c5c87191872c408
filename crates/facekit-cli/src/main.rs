mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facekit::{Descriptor, DetectionNetwork, FaceEntry, LabeledDescriptors, PrepareOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facekit", about = "Face detection, age/gender annotation and recognition")]
struct Cli {
    /// TOML file with prepare options (detection_network, min_confidence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Detector network: ssd_mobilenetv1, tiny_face_detector or scrfd
    #[arg(long, global = true)]
    network: Option<DetectionNetwork>,

    /// Minimum detector score, in (0, 1]
    #[arg(long, global = true)]
    min_confidence: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces and print age/gender summaries as JSON
    Detect {
        image: PathBuf,
        /// Write the annotated image as JPEG
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Build labeled descriptor sets from reference images
    Build {
        /// Label for the reference images
        #[arg(short, long)]
        label: Option<String>,
        /// Reference image (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,
        /// JSON array of precomputed descriptors for the label
        #[arg(long)]
        descriptors_from: Option<PathBuf>,
        /// JSON array of entries ({label, imagePaths, descriptors})
        #[arg(long)]
        entries: Option<PathBuf>,
        /// Where to write the labeled descriptor sets
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Match the faces in a query image against labeled descriptor sets
    Recognize {
        /// Labeled descriptor sets written by `build`
        #[arg(short, long)]
        sets: PathBuf,
        query: PathBuf,
        /// Write the annotated image as JPEG
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List the networks this build can load
    Nets,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Detect { image, out } => {
            facekit::prepare(resolve_options(&cli)?)?;
            let detections = facekit::detect_faces(image)?;
            print_json(&detections.summaries)?;
            if let Some(out) = out {
                write_jpeg(out, &detections.jpeg_buffer()?)?;
            }
        }
        Commands::Build {
            label,
            images,
            descriptors_from,
            entries,
            out,
        } => {
            let entries = collect_entries(label.as_deref(), images, descriptors_from.as_deref(), entries.as_deref())?;
            if entries.iter().any(|e| !e.image_paths.is_empty()) {
                facekit::prepare(resolve_options(&cli)?)?;
            }

            let report = facekit::build_descriptors(&entries)?;
            for missing in report.missing() {
                eprintln!(
                    "warning: no face found in {} (label {})",
                    missing.image_path.display(),
                    missing.label
                );
            }
            let json = serde_json::to_string_pretty(&report.sets)?;
            std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
            println!("Wrote {} labeled descriptor set(s) to {}", report.sets.len(), out.display());
        }
        Commands::Recognize { sets, query, out } => {
            let sets: Vec<LabeledDescriptors> = read_json(sets)?;
            facekit::prepare(resolve_options(&cli)?)?;
            let recognition = facekit::recognize(&sets, query)?;
            print_json(&recognition.summaries)?;
            if let Some(out) = out {
                write_jpeg(out, &recognition.jpeg_buffer()?)?;
            }
        }
        Commands::Nets => {
            for net in facekit::available_networks() {
                println!("{:<20} {:<12} {}", net.name, format!("{:?}", net.role), net.weights_file);
            }
        }
    }

    Ok(())
}

/// Config file, then environment, then flags.
fn resolve_options(cli: &Cli) -> Result<PrepareOptions> {
    let mut options = config::load(cli.config.as_deref())?;
    if let Some(network) = cli.network {
        options.detection_network = network;
    }
    if let Some(min_confidence) = cli.min_confidence {
        options.min_confidence = min_confidence;
    }
    options.validate()?;
    Ok(options)
}

fn collect_entries(
    label: Option<&str>,
    images: &[PathBuf],
    descriptors_from: Option<&Path>,
    entries_file: Option<&Path>,
) -> Result<Vec<FaceEntry>> {
    let mut entries: Vec<FaceEntry> = match entries_file {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    match label {
        Some(label) => {
            let descriptors: Vec<Descriptor> = match descriptors_from {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            entries.push(FaceEntry::new(label).with_images(images).with_descriptors(descriptors));
        }
        None if !images.is_empty() || descriptors_from.is_some() => {
            bail!("--image and --descriptors-from need a --label");
        }
        None => {}
    }

    if entries.is_empty() {
        bail!("nothing to build: pass --label with --image, or --entries");
    }
    Ok(entries)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_jpeg(path: &Path, jpeg: &[u8]) -> Result<()> {
    std::fs::write(path, jpeg).with_context(|| format!("writing {}", path.display()))?;
    eprintln!("Annotated image written to {}", path.display());
    Ok(())
}
