//! gpm: browse Group Policy definitions and edit local `Registry.pol`
//! policy state.
//!
//! Usage:
//!   gpm list --filter firewall
//!   gpm show windows:DisableAutoplay
//!   gpm state windows:DisableAutoplay
//!   gpm enable windows:Autorun --class machine --values 'NoAutorunCmd=1'
//!   gpm batch changes.json

use clap::{Parser, Subcommand, ValueEnum};
use gpm::{load_batch, logging, GpmResult, Settings, Workspace};
use gpm_admx::PolicyClass;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "gpm", version)]
#[command(about = "Group Policy definition browser and local policy editor")]
struct Cli {
    /// Settings file (default: <config dir>/gpm/settings.json)
    #[arg(long, global = true, env = "GPM_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with *.admx files and language subfolders
    #[arg(long, global = true)]
    definitions: Option<PathBuf>,

    /// ADML language, e.g. en-US
    #[arg(long, global = true)]
    language: Option<String>,

    /// Machine Registry.pol path
    #[arg(long, global = true)]
    machine_pol: Option<PathBuf>,

    /// User Registry.pol path
    #[arg(long, global = true)]
    user_pol: Option<PathBuf>,

    /// Log changes without writing them
    #[arg(long, short = 'n', global = true)]
    dry_run: bool,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List policies
    List {
        /// Substring of the policy id or display name
        #[arg(long, short = 'f')]
        filter: Option<String>,
        #[arg(long, short = 'c', value_enum)]
        class: Option<ClassArg>,
    },
    /// Show one policy's definition as JSON
    Show { policy: String },
    /// Print the policy's state per class
    State {
        policy: String,
        #[arg(long, short = 'c', value_enum)]
        class: Option<ClassArg>,
    },
    /// Print the policy's current element values in command-line form
    Values {
        policy: String,
        #[arg(long, short = 'c', value_enum)]
        class: ClassArg,
    },
    /// Enable a policy
    Enable {
        policy: String,
        #[arg(long, short = 'c', value_enum)]
        class: ClassArg,
        /// Element values as `id=value` tokens; defaults when omitted
        #[arg(long)]
        values: Option<String>,
    },
    /// Disable a policy
    Disable {
        policy: String,
        #[arg(long, short = 'c', value_enum)]
        class: ClassArg,
    },
    /// Remove every trace of a policy
    NotConfigure {
        policy: String,
        #[arg(long, short = 'c', value_enum)]
        class: ClassArg,
    },
    /// Apply a JSON file of policy commands and save once
    Batch {
        file: PathBuf,
        /// Attempt every command even after a failure
        #[arg(long)]
        continue_on_error: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassArg {
    Machine,
    User,
}

impl From<ClassArg> for PolicyClass {
    fn from(c: ClassArg) -> Self {
        match c {
            ClassArg::Machine => PolicyClass::Machine,
            ClassArg::User => PolicyClass::User,
        }
    }
}

fn settings_for(cli: &Cli) -> GpmResult<Settings> {
    let mut settings = match cli.config.clone().or_else(Settings::default_path) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    if let Some(dir) = &cli.definitions {
        settings.definitions_dir = dir.clone();
    }
    if let Some(language) = &cli.language {
        settings.language = language.clone();
    }
    if let Some(path) = &cli.machine_pol {
        settings.machine_pol = path.clone();
    }
    if let Some(path) = &cli.user_pol {
        settings.user_pol = path.clone();
    }
    settings.dry_run |= cli.dry_run;
    settings.json_logs |= cli.json_logs;
    if let Command::Batch {
        continue_on_error: true,
        ..
    } = cli.command
    {
        settings.stop_on_first_failure = false;
    }
    Ok(settings)
}

fn print_json<T: serde::Serialize>(value: &T) -> GpmResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| gpm::GpmError::Json {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    println!("{json}");
    Ok(())
}

async fn run(cli: Cli, settings: Settings) -> GpmResult<()> {
    let workspace = Workspace::open(settings).await?;
    let result = execute(cli.command, &workspace).await;
    workspace.close().await?;
    result
}

async fn execute(command: Command, workspace: &Workspace) -> GpmResult<()> {
    match command {
        Command::List { filter, class } => {
            for p in workspace.list(filter.as_deref(), class.map(Into::into)) {
                println!("{:<60} {:<8} {}", p.unique_id, p.class.to_string(), p.display_name);
            }
        }
        Command::Show { policy } => print_json(&workspace.show(&policy)?)?,
        Command::State { policy, class } => {
            for (class, state) in workspace.state(&policy, class.map(Into::into)).await? {
                println!("{class}: {state}");
            }
        }
        Command::Values { policy, class } => {
            println!("{}", workspace.values(&policy, class.into()).await?);
        }
        Command::Enable { policy, class, values } => {
            let state = workspace.enable(&policy, class.into(), values.as_deref()).await?;
            println!("{policy}: {state}");
        }
        Command::Disable { policy, class } => {
            let state = workspace.disable(&policy, class.into()).await?;
            println!("{policy}: {state}");
        }
        Command::NotConfigure { policy, class } => {
            let state = workspace.not_configure(&policy, class.into()).await?;
            println!("{policy}: {state}");
        }
        Command::Batch { file, .. } => {
            let commands = load_batch(&file)?;
            let total = commands.len();
            let report = workspace.batch(commands).await?;
            print_json(&report)?;
            let failed = report.failures();
            if failed > 0 {
                return Err(gpm::GpmError::BatchFailed { failed, total });
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match settings_for(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&settings.log_level, settings.json_logs) {
        eprintln!("warning: {e}");
    }

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
