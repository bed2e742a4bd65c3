//! tsuzuri - EPUB3 assembly for translated volumes

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tsuzuri::reconstruct::MergeDecision;
use tsuzuri::{BuildConfig, BuildOutcome, PageProgression, build_volume, inspect_volume, validate_epub};

#[derive(Parser)]
#[command(name = "tsuzuri")]
#[command(version, about = "Assemble translated volumes into EPUB3", long_about = None)]
#[command(after_help = "EXAMPLES:
    tsuzuri build work/vol01                 Build work/vol01/output/<title>.epub
    tsuzuri build work/vol01 -o vol01.epub   Build to an explicit path
    tsuzuri inspect work/vol01               Show how the volume would be assembled
    tsuzuri inspect work/vol01 --json        Same, as JSON
    tsuzuri validate vol01.epub              Check a written EPUB")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build one volume from its work directory
    Build {
        #[arg(value_name = "WORK_DIR")]
        work_dir: PathBuf,

        /// Output file (default: <WORK_DIR>/output/<title>.epub)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Source language code
        #[arg(long, default_value = "jp")]
        source_lang: String,

        /// Target language code
        #[arg(long, default_value = "en")]
        target_lang: String,

        /// Build even if translation is not complete
        #[arg(long)]
        force: bool,

        /// Declare right-to-left page progression
        #[arg(long)]
        rtl: bool,

        /// Do not write the builder state back into the manifest
        #[arg(long)]
        no_state: bool,
    },

    /// Print the normalized manifest, merge decision and act layout
    Inspect {
        #[arg(value_name = "WORK_DIR")]
        work_dir: PathBuf,

        #[arg(long, default_value = "jp")]
        source_lang: String,

        #[arg(long, default_value = "en")]
        target_lang: String,

        /// Print the normalized manifest and merge decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the structure of an EPUB
    Validate {
        #[arg(value_name = "EPUB")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Build {
            work_dir,
            output,
            source_lang,
            target_lang,
            force,
            rtl,
            no_state,
        } => {
            let mut config = BuildConfig::new(work_dir)
                .with_languages(source_lang, target_lang)
                .with_force(force)
                .with_update_state(!no_state);
            if let Some(output) = output {
                config = config.with_output(output);
            }
            if rtl {
                config = config.with_page_progression(PageProgression::Rtl);
            }
            build(&config)
        }
        Command::Inspect {
            work_dir,
            source_lang,
            target_lang,
            json,
        } => {
            let config = BuildConfig::new(work_dir).with_languages(source_lang, target_lang);
            match inspect(&config, json) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Validate { path } => match validate_epub(&path) {
            Ok(epub) => {
                println!(
                    "{}: valid ({} items, {} spine entries)",
                    path.display(),
                    epub.items.len(),
                    epub.spine.len()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "tsuzuri=error",
        (false, 0) => "tsuzuri=info",
        (false, 1) => "tsuzuri=debug",
        (false, _) => "tsuzuri=trace",
    };
    let filter = if quiet || verbose > 0 {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(config: &BuildConfig) -> ExitCode {
    let report = build_volume(config);
    match report.outcome {
        BuildOutcome::Succeeded {
            output,
            chapters,
            images,
            spine_items,
            merged,
        } => {
            println!("{}", output.display());
            println!("  chapters: {chapters}{}", if merged { " (merged)" } else { "" });
            println!("  images:   {images}");
            println!("  spine:    {spine_items}");
            ExitCode::SUCCESS
        }
        BuildOutcome::Failed { error } => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn inspect(config: &BuildConfig, json: bool) -> tsuzuri::Result<()> {
    let inspection = inspect_volume(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }
    let volume = &inspection.manifest;

    println!("Title: {}", volume.title.target);
    if !volume.title.source.is_empty() {
        println!("Original title: {}", volume.title.source);
    }
    println!("Author: {}", volume.author.target);
    if !volume.publisher.target.is_empty() {
        println!("Publisher: {}", volume.publisher.target);
    }
    if !volume.series.target.is_empty() {
        println!("Series: {}", volume.series.target);
    }
    if let Some(ref schema) = volume.schema_version {
        println!("Schema: {schema}");
    }
    for (stage, status) in &volume.state.stages {
        println!("Stage {stage}: {status}");
    }

    println!("Chapters: {}", volume.chapters.len());
    for chapter in &volume.chapters {
        let flags = match (chapter.pre_toc, chapter.raw_group) {
            (true, Some(g)) => format!(" [pre-toc, group {g}]"),
            (true, None) => " [pre-toc]".to_string(),
            (false, Some(g)) => format!(" [group {g}]"),
            (false, None) => String::new(),
        };
        println!("  {:>3}. {}{}", chapter.toc_order, chapter.title, flags);
    }

    let assets = &volume.assets;
    println!(
        "Assets: cover={} kuchie={} illustrations={} ancillary={}",
        assets.cover.as_ref().map(|c| c.file.as_str()).unwrap_or("-"),
        assets.kuchie.len(),
        assets.illustrations.len(),
        assets.ancillary.len()
    );

    match &volume.structure {
        Some(structure) => {
            for act in &structure.acts {
                println!(
                    "Act {}: chapters {}-{}, {} kuchie{}",
                    act.number,
                    act.first_chapter,
                    act.last_chapter,
                    act.kuchie.len(),
                    if act.title.is_empty() { String::new() } else { format!(" ({})", act.title) }
                );
            }
        }
        None => println!("Acts: single"),
    }

    let decision = match &inspection.reconstruction.decision {
        MergeDecision::NotCandidate => "no split chapters".to_string(),
        MergeDecision::Uninspectable => "split chapters, raw extraction not inspectable".to_string(),
        MergeDecision::Declined(f) => format!(
            "keep split (toc_entries={}, text_pages={}, titles={})",
            f.toc_entries, f.text_page_count, f.detected_title_count
        ),
        MergeDecision::Merged(f) => format!(
            "merge (toc_entries={}, text_pages={}, titles={})",
            f.toc_entries, f.text_page_count, f.detected_title_count
        ),
    };
    println!(
        "Reconstruction: {} -> {} batches, {}{}",
        volume.chapters.len(),
        inspection.reconstruction.batches.len(),
        decision,
        if inspection.raw_available { "" } else { " (no raw extraction)" }
    );
    Ok(())
}
