use crate::catalog::{
    run_certificate_import, run_course_import, run_course_list, CsvImportArgs,
};
use crate::server;
use academy_intake::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Academy Intake",
    about = "Run the academy enrollment and payment intake service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Manage the local course catalog
    Courses {
        #[command(subcommand)]
        command: CoursesCommand,
    },
    /// Load certificates issued outside the service
    Certificates {
        #[command(subcommand)]
        command: CertificatesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CoursesCommand {
    /// Upsert courses from an `id,shortname,name` CSV file
    Import(CsvImportArgs),
    /// Print the current catalog
    List,
}

#[derive(Subcommand, Debug)]
enum CertificatesCommand {
    /// Record certificates from a `national_id,course_label,url` CSV file
    Import(CsvImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Keep every record in memory instead of the SQLite database
    #[arg(long)]
    pub(crate) ephemeral: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Courses {
            command: CoursesCommand::Import(args),
        } => run_course_import(args),
        Command::Courses {
            command: CoursesCommand::List,
        } => run_course_list(),
        Command::Certificates {
            command: CertificatesCommand::Import(args),
        } => run_certificate_import(args),
    }
}
