use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(
    name = "focuscycle",
    version,
    about = "Work/break cycle timer with reminders",
    after_help = "While `focuscycle run` is active it owns the timer and reminders; other commands \
                  can only read them.\n\nThe completion tone is the terminal bell on stderr and is \
                  silent when stderr is redirected."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Cycle settings (durations, rounds, side effects)
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// One-shot reminders
    Remind {
        #[command(subcommand)]
        action: commands::remind::RemindAction,
    },
    /// Application configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run a foreground session reading commands from stdin
    Run,
    /// Guided breathing sequence in the foreground
    Breathe {
        /// 446 (in 4s, hold 4s, out 6s) or square (4s each)
        pattern: focuscycle_core::BreathingPattern,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSCYCLE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("focuscycle=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Remind { action } => commands::remind::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run => commands::run::run(),
        Commands::Breathe { pattern } => commands::breathe::run(pattern),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "focuscycle", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
