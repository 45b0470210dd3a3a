//! Progy - git-backed course distribution and progress sync
//!
//! CLI entry point over `progy-core`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use progy_core::config::CourseConfig;
use progy_core::registry::{self, BumpLevel, GuardSnapshot};
use progy_core::scaffold::{self, ScaffoldKind};
use progy_core::sync::{AuthContext, CourseRef, SyncManager};
use progy_core::{api, container, ProgyError};

/// Default registry publish endpoint
const DEFAULT_REGISTRY_URL: &str = "https://registry.progy.dev/api/registry/publish";

/// Default git credentials endpoint
const DEFAULT_CREDENTIALS_URL: &str = "https://registry.progy.dev/api/git/credentials";

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "progy",
    about = "Git-backed course distribution with non-destructive progress sync",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Course working directory
    #[clap(long, default_value = ".", global = true)]
    workdir: PathBuf,
}

#[derive(Parser, Debug)]
enum Command {
    /// Initialize the working directory to track an upstream course
    Init {
        /// Course id (keys the upstream cache)
        #[clap(long)]
        course: String,

        /// Upstream repository URL
        #[clap(long)]
        repo: String,

        /// Branch to pin
        #[clap(long, default_value = "main")]
        branch: String,

        /// Subpath within the upstream repo (monorepo courses)
        #[clap(long)]
        path: Option<String>,
    },

    /// Pull the latest upstream content without touching local edits
    Sync,

    /// Commit and push your progress
    Save {
        /// Commit message
        #[clap(long, short)]
        message: String,
    },

    /// Reset a single file to its upstream version, discarding local edits
    Reset {
        /// Path of the file, relative to the working directory
        path: PathBuf,
    },

    /// Pack the course into a portable .progy archive
    Pack {
        /// Output file (defaults to <course-id>.progy)
        #[clap(long, short)]
        output: Option<PathBuf>,
    },

    /// Unpack a .progy archive
    Unpack {
        /// Archive file
        archive: PathBuf,

        /// Destination directory (defaults to the archive name)
        #[clap(long)]
        dest: Option<PathBuf>,
    },

    /// List the course's modules and exercises
    List {
        /// Output the manifest as JSON
        #[clap(long)]
        json: bool,
    },

    /// Run an exercise
    Run {
        /// Exercise id (as shown by `progy list`)
        id: String,
    },

    /// Create a module, exercise, lesson or quiz skeleton
    Scaffold {
        #[clap(value_enum)]
        kind: ScaffoldKindArg,

        /// Name (numeric prefix is added automatically)
        name: String,

        /// Parent module for exercises, lessons and quizzes
        #[clap(long)]
        module: Option<String>,
    },

    /// Publish the packed course to the registry
    Publish {
        /// Bump the major version
        #[clap(long, conflicts_with_all = ["minor", "patch"])]
        major: bool,

        /// Bump the minor version
        #[clap(long, conflicts_with = "patch")]
        minor: bool,

        /// Bump the patch version
        #[clap(long)]
        patch: bool,

        /// Registry publish endpoint
        #[clap(long, default_value = DEFAULT_REGISTRY_URL)]
        registry: String,

        /// Registry owner (your username)
        #[clap(long)]
        owner: String,
    },
}

/// Scaffold kinds accepted on the command line
#[derive(Debug, Clone, ValueEnum)]
enum ScaffoldKindArg {
    Module,
    Exercise,
    Lesson,
    Quiz,
}

impl From<ScaffoldKindArg> for ScaffoldKind {
    fn from(kind: ScaffoldKindArg) -> Self {
        match kind {
            ScaffoldKindArg::Module => ScaffoldKind::Module,
            ScaffoldKindArg::Exercise => ScaffoldKind::Exercise,
            ScaffoldKindArg::Lesson => ScaffoldKind::Lesson,
            ScaffoldKindArg::Quiz => ScaffoldKind::Quiz,
        }
    }
}

fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Auth context from the environment, when the user is signed in
fn auth_from_env() -> Option<AuthContext> {
    let token = std::env::var("PROGY_TOKEN").ok()?;
    let credentials_endpoint =
        std::env::var("PROGY_CREDENTIALS_URL").unwrap_or_else(|_| DEFAULT_CREDENTIALS_URL.to_string());
    Some(AuthContext {
        credentials_endpoint,
        token,
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    if let Err(e) = run(cli).await {
        // Lock contention and security rejections carry their own guidance;
        // keep the message intact rather than re-wrapping it
        eprintln!("error: {e:#}");
        match e.downcast_ref::<ProgyError>() {
            Some(ProgyError::NetworkFailure { .. }) => {
                eprintln!("hint: check your network connection and registry URL");
            }
            Some(ProgyError::GitFailure { .. }) => {
                eprintln!("hint: inspect the repository state with `git status`");
            }
            _ => {}
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let workdir = cli.workdir;

    match cli.command {
        Command::Init {
            course,
            repo,
            branch,
            path,
        } => {
            let manager = SyncManager::new()?;
            let course_ref = CourseRef {
                id: course.clone(),
                repo,
                branch,
                path,
            };
            let outcome = manager.init(&workdir, course_ref).await?;
            println!(
                "Initialized course `{}`: {} files",
                course,
                outcome.layered.copied.len()
            );
        }

        Command::Sync => {
            let manager = SyncManager::new()?;
            let outcome = manager.sync(&workdir).await?;
            println!(
                "Synced: {} new upstream files, {} local files untouched",
                outcome.layered.copied.len(),
                outcome.layered.skipped
            );
        }

        Command::Save { message } => {
            let manager = SyncManager::new()?;
            manager.save(&workdir, &message, auth_from_env().as_ref()).await?;
            println!("Progress saved");
        }

        Command::Reset { path } => {
            let manager = SyncManager::new()?;
            let restored = manager.reset_in_workdir(&workdir, &path)?;
            println!("Reset {} to its upstream version", restored.display());
        }

        Command::Pack { output } => {
            let config = CourseConfig::load(&workdir)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.progy", config.id)));
            container::pack(&workdir, &output)?;
            let digest = container::sha256_digest(&output)?;
            println!("Packed {} ({})", output.display(), digest);
        }

        Command::Unpack { archive, dest } => {
            let dest = dest.unwrap_or_else(|| {
                archive
                    .file_stem()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("course"))
            });
            container::unpack_to(&archive, &dest)?;
            println!("Unpacked into {}", dest.display());
        }

        Command::List { json } => {
            let config = CourseConfig::load(&workdir)?;
            let manifest = api::list_exercises(&workdir, &config)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                for module in manifest.ordered_modules() {
                    println!("{module}");
                    for exercise in &manifest.modules[module] {
                        println!("  {}", exercise.id);
                    }
                }
                debug!("{} exercises total", manifest.exercise_count());
            }
        }

        Command::Run { id } => {
            let config = CourseConfig::load(&workdir)?;
            let request = api::RunRequest {
                exercise_name: id.rsplit('/').next().unwrap_or(&id).to_string(),
                id,
            };
            let response = api::run(&workdir, &config, &request).await?;

            println!("{}", response.friendly_output);
            if let Some(progress) = &response.progress {
                if progress.xp_awarded > 0 {
                    println!(
                        "+{} XP (total {}, streak {} days)",
                        progress.xp_awarded, progress.total_xp, progress.streak_days
                    );
                }
            }
            if !response.success {
                anyhow::bail!(
                    "exercise failed{}",
                    response
                        .error
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default()
                );
            }
        }

        Command::Scaffold { kind, name, module } => {
            let config = CourseConfig::load(&workdir)?;
            let content_root = config.content_root(&workdir);
            std::fs::create_dir_all(&content_root)?;
            let created =
                scaffold::scaffold(&content_root, kind.into(), &name, module.as_deref())?;
            println!("Created {}", created.display());
        }

        Command::Publish {
            major,
            minor,
            patch,
            registry,
            owner,
        } => {
            let config = CourseConfig::load(&workdir)?;

            let level = if major {
                BumpLevel::Major
            } else if minor {
                BumpLevel::Minor
            } else if patch {
                BumpLevel::Patch
            } else {
                anyhow::bail!("pass one of --major, --minor or --patch");
            };

            let token = std::env::var("PROGY_TOKEN")
                .context("PROGY_TOKEN must be set to publish (sign in first)")?;

            let next_version = registry::bump_version(&config.version, level)?;

            let archive = std::env::temp_dir().join(format!("{}-{}.progy", config.id, next_version));
            container::pack(&workdir, &archive)?;

            let snapshot = GuardSnapshot::sample(&workdir)?;
            let metadata =
                registry::metadata_for(&owner, &config.name, &next_version, None, &archive)?;

            let receipt =
                registry::publish(&registry, &token, &metadata, &snapshot, &archive).await?;

            // Persist the bumped version only after the registry accepted it
            let config_path = workdir.join(progy_core::config::COURSE_CONFIG_FILE);
            registry::persist_version(&config_path, &next_version)?;

            println!("Published {} v{}", receipt.name, receipt.version);
        }
    }

    Ok(())
}
