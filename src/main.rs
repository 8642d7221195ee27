use clap::{Parser, Subcommand, ValueEnum};
use random_prompt_gen_lib::{
    commands,
    composer::{ClothingMode, ComposeOptions, PoseMode},
    init_logging,
    scanner::ScanOutcome,
    settings::{self, Settings},
    AppState,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "random-prompt-gen")]
#[command(about = "Random prompt composer, saved prompts and LoRA library browser", long_about = None)]
struct Cli {
    /// Directory holding settings.json and the data/ folder
    #[arg(long, env = settings::BASE_DIR_ENV)]
    base_dir: Option<PathBuf>,

    /// Override the tag file location
    #[arg(long)]
    tags: Option<PathBuf>,

    /// Override the LoRA model directory
    #[arg(long)]
    lora_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum PoseArg {
    ContextAware,
    Chaos,
}

#[derive(Clone, Copy, ValueEnum)]
enum ClothingArg {
    FullSet,
    MixMatch,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a random prompt from the tag file
    Generate {
        #[arg(long, value_enum, default_value_t = PoseArg::ContextAware)]
        pose: PoseArg,
        #[arg(long, value_enum, default_value_t = ClothingArg::FullSet)]
        clothing: ClothingArg,
        #[arg(long)]
        nsfw: bool,
        #[arg(long)]
        extreme: bool,
        /// Skip the quality tag prefix
        #[arg(long)]
        no_quality: bool,
    },
    /// Prefix quality tags onto an existing prompt
    Quality { prompt: String },
    /// Split a prompt into its tags
    Analyze { prompt: String },
    /// Save a prompt under a name
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        prompt: String,
    },
    /// Print a saved prompt (empty when the name is unknown)
    Load { name: String },
    /// List saved prompt names
    List,
    /// Scan the LoRA directory and print the library
    Scan {
        /// Print the library as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append a LoRA's trigger words to a prompt
    Trigger {
        name: String,
        #[arg(long, default_value = "")]
        prompt: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = cli.base_dir.unwrap_or_else(settings::default_base_dir);
    let mut settings = Settings::load(&base_dir);
    if let Some(tags) = cli.tags {
        settings.tags_path = tags;
    }
    if let Some(lora_dir) = cli.lora_dir {
        settings.lora_dir = lora_dir;
    }
    let state = AppState::new(settings);

    match cli.command {
        Command::Generate {
            pose,
            clothing,
            nsfw,
            extreme,
            no_quality,
        } => {
            let options = ComposeOptions {
                pose_mode: match pose {
                    PoseArg::ContextAware => PoseMode::ContextAware,
                    PoseArg::Chaos => PoseMode::Chaos,
                },
                clothing_mode: match clothing {
                    ClothingArg::FullSet => ClothingMode::FullSet,
                    ClothingArg::MixMatch => ClothingMode::MixMatch,
                },
                allow_nsfw: nsfw,
                allow_extreme: extreme,
                prepend_quality: !no_quality,
            };
            println!("{}", commands::generate_prompt(options, &state));
        }
        Command::Quality { prompt } => {
            println!("{}", commands::add_quality_tags(&prompt, &state));
        }
        Command::Analyze { prompt } => {
            let analysis = commands::analyze_tags(&prompt);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Save { name, prompt } => {
            let result = commands::save_prompt(&name, &prompt, &state);
            println!("{}", result.status);
            if !result.ok {
                std::process::exit(1);
            }
        }
        Command::Load { name } => {
            println!("{}", commands::load_prompt(&name, &state));
        }
        Command::List => {
            for name in commands::list_saved_prompts(&state) {
                println!("{}", name);
            }
        }
        Command::Scan { json } => {
            let outcome = commands::scan_lora_library(true, &state).map_err(anyhow::Error::msg)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_library(&outcome);
            }
        }
        Command::Trigger { name, prompt } => match commands::find_lora(&name, &state) {
            Ok(entry) => println!("{}", commands::insert_triggers(&prompt, &entry)),
            Err(error) => {
                eprintln!("{}", error);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn print_library(outcome: &ScanOutcome) {
    let snapshot = match outcome {
        ScanOutcome::NotFound { root } => {
            println!("{}: {}", commands::LIBRARY_NOT_FOUND_MESSAGE, root);
            return;
        }
        ScanOutcome::Library(snapshot) => snapshot,
    };

    if snapshot.is_empty() {
        println!("No LoRA models found in {}", snapshot.root);
        return;
    }

    for folder in &snapshot.folders {
        println!("[{}]", folder.label);
        for entry in &folder.entries {
            let preview = if entry.image.is_some() { "*" } else { " " };
            if entry.trigger_text.is_empty() {
                println!("  {} {}", preview, entry.name);
            } else {
                println!("  {} {}  ({})", preview, entry.name, entry.trigger_text);
            }
        }
    }
    for issue in &snapshot.issues {
        eprintln!("warning: {}", issue.message);
    }
}
