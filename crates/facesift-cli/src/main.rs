use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facesift_core::{spawn_engine, DescriptorExtractor, EngineHandle};
use facesift_drive::{FolderEnumerator, GoogleDriveClient, StorageProvider};
use facesift_pipeline::{BatchScheduler, MatchEvaluator, RunStatus, SearchSession};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod output;

use config::Config;

#[derive(Parser)]
#[command(name = "facesift", about = "Find photos of one person in a shared folder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the reference face from a local image and print it as JSON
    Detect {
        /// Image file
        image: PathBuf,
    },
    /// List the image files in a shared folder
    List {
        /// Shareable folder link (.../folders/<id>)
        folder: String,
    },
    /// Search a shared folder for photos containing the reference face
    Search {
        /// Image of the person to look for
        #[arg(short, long)]
        reference: PathBuf,
        /// Shareable folder link (.../folders/<id>)
        folder: String,
        /// Directory to save matching photos into
        #[arg(short, long, default_value = "./matches")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Detect { image } => detect(&config, &image).await,
        Commands::List { folder } => list(&config, &folder).await,
        Commands::Search {
            reference,
            folder,
            output,
        } => search(&config, &reference, &folder, &output).await,
    }
}

fn engine(config: &Config) -> Result<EngineHandle> {
    tracing::info!(model_dir = %config.model_dir.display(), "loading face models");
    spawn_engine(&config.detector_model_path(), &config.recognizer_model_path())
        .context("failed to start face engine (is FACESIFT_MODEL_DIR set?)")
}

fn drive(config: &Config) -> Result<Arc<dyn StorageProvider>> {
    let Some(api_key) = config.api_key.clone() else {
        bail!("GOOGLE_API_KEY is not set");
    };
    Ok(Arc::new(GoogleDriveClient::new(api_key)))
}

async fn detect(config: &Config, image: &Path) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("cannot read {}", image.display()))?;
    let extractor = DescriptorExtractor::new(Arc::new(engine(config)?));

    match extractor
        .extract_reference(bytes, &image.display().to_string())
        .await?
    {
        Some(reference) => println!("{}", serde_json::to_string_pretty(&reference)?),
        None => println!("no face detected"),
    }
    Ok(())
}

async fn list(config: &Config, folder: &str) -> Result<()> {
    let enumerator = FolderEnumerator::new(drive(config)?, config.page_size);
    let mut files = enumerator.files(folder)?;

    let mut count = 0usize;
    while let Some(file) = files.next().await {
        let file = file?;
        println!("{}\t{}\t{}", file.id, file.mime_type, file.name);
        count += 1;
    }
    eprintln!("{count} image file(s)");
    Ok(())
}

async fn search(config: &Config, reference: &Path, folder: &str, output: &Path) -> Result<()> {
    let bytes = std::fs::read(reference)
        .with_context(|| format!("cannot read {}", reference.display()))?;
    let storage = drive(config)?;
    let capability = Arc::new(engine(config)?);

    let evaluator = MatchEvaluator::new(storage.clone(), capability.clone(), config.match_options());
    let scheduler = BatchScheduler::new(
        FolderEnumerator::new(storage, config.page_size),
        Arc::new(evaluator),
        config.batch_options(),
    );
    let session = SearchSession::spawn(DescriptorExtractor::new(capability), scheduler);

    if session
        .set_reference(bytes, reference.display().to_string())
        .await?
        .is_none()
    {
        bail!("no face detected in {}", reference.display());
    }

    let generation = session.search(folder).await?;
    let mut updates = session.subscribe();
    let mut last_progress = (usize::MAX, usize::MAX);
    let state = loop {
        let state = updates.borrow_and_update().clone();
        if state.generation != generation {
            bail!("search was superseded");
        }
        let progress = (state.processed_count, state.total_count);
        if progress != last_progress {
            let suffix = if state.total_final { "" } else { "+" };
            eprintln!(
                "[{}/{}{}] {} match(es)",
                state.processed_count,
                state.total_count,
                suffix,
                state.results.len()
            );
            last_progress = progress;
        }
        if state.is_finished() {
            break state;
        }
        updates
            .changed()
            .await
            .context("search session stopped unexpectedly")?;
    };

    let written = output::write_matches(output, &state.results)
        .with_context(|| format!("cannot write matches to {}", output.display()))?;
    for path in &written {
        println!("{}", path.display());
    }
    eprintln!(
        "{} match(es) out of {} photo(s) saved to {}",
        written.len(),
        state.processed_count,
        output.display()
    );

    if let RunStatus::Failed(reason) = state.status {
        bail!("search failed: {reason}");
    }
    Ok(())
}
