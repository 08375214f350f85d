mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_REPORT_ERROR, EXIT_SUCCESS};
use config::{Config, Flags};
use icdscan_discovery::{Discovery, Environment, Sysroot};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "icdscan",
    version,
    about = "Show which EGL and Vulkan drivers and layers the system loaders would find"
)]
struct Cli {
    /// Directory to treat as the root filesystem (default: /).
    #[arg(long, global = true)]
    sysroot: Option<PathBuf>,

    /// Configuration file (default: $XDG_CONFIG_HOME/icdscan/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Multiarch tuple to consider, e.g. x86_64-linux-gnu. Repeatable.
    #[arg(long = "abi", value_name = "TUPLE", global = true)]
    abi: Vec<String>,

    /// Directory containing <tuple>-inspect-library helpers.
    #[arg(long, global = true)]
    helpers_dir: Option<PathBuf>,

    /// Skip duplicate detection.
    #[arg(long, default_value_t = false, global = true)]
    no_duplicates: bool,

    /// Exit with status 4 if any record has issues.
    #[arg(long, default_value_t = false, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List EGL ICDs and EGL external platforms.
    Egl,
    /// List Vulkan ICDs and explicit and implicit layers.
    Vulkan,
    /// Print everything as a JSON report.
    Report,
    /// Display a report saved by `icdscan report`.
    ShowReport {
        /// Path to the saved report.
        file: PathBuf,
    },
    /// Print the search path a loader would use.
    SearchPaths {
        /// egl-icd, egl-external-platform, vulkan-icd, vulkan-layer-explicit or vulkan-layer-implicit.
        kind: String,
    },
    /// Write one record from a saved report back out as a manifest.
    WriteManifest {
        /// Path to the saved report.
        report: PathBuf,
        /// Loader kind of the record (see search-paths).
        kind: String,
        /// Zero-based index of the record within its list.
        index: usize,
        /// Where to write the manifest.
        dest: PathBuf,
        /// Point the manifest at this library instead.
        #[arg(long)]
        library_path: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ICDSCAN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let strict = cli.strict;

    let result = match &cli.command {
        Commands::Egl => {
            discovery(&cli).and_then(|d| commands::egl::run(&d, json_output, strict))
        }
        Commands::Vulkan => {
            discovery(&cli).and_then(|d| commands::vulkan::run(&d, json_output, strict))
        }
        Commands::Report => discovery(&cli).and_then(|d| commands::report::run(&d, strict)),
        Commands::ShowReport { file } => commands::show_report::run(file, json_output, strict),
        Commands::SearchPaths { kind } => {
            discovery(&cli).and_then(|d| commands::search_paths::run(&d, kind, json_output))
        }
        Commands::WriteManifest {
            report,
            kind,
            index,
            dest,
            library_path,
        } => commands::write_manifest::run(report, kind, *index, dest, library_path.as_deref()),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "icdscan", &mut std::io::stdout());
            Ok(EXIT_SUCCESS)
        }
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("report error:") {
                EXIT_REPORT_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn discovery(cli: &Cli) -> Result<Discovery, String> {
    let env = Environment::from_process();
    let config = Config::resolve(cli.config.as_deref(), &env)?.merge(&Flags {
        sysroot: cli.sysroot.as_deref(),
        abi_tuples: &cli.abi,
        helpers_dir: cli.helpers_dir.as_deref(),
        no_duplicates: cli.no_duplicates,
    });
    let sysroot = Sysroot::new(config.sysroot_path()).map_err(|e| e.to_string())?;
    Ok(Discovery::new(sysroot, env, config.discovery_options()))
}
