use clap::{Parser, Subcommand};
use run_conditions_report::config::{
    DEFAULT_CALIBRATION_OUTPUT, DEFAULT_CCDB_URL, DEFAULT_CCDB_USER, DEFAULT_CONDITIONS_OUTPUT,
    DEFAULT_FCUP_TABLE, DEFAULT_MAX_WARNINGS, DEFAULT_RCDB_URL, DEFAULT_RUN_PATTERN,
};
use run_conditions_report::error::UsageError;
use run_conditions_report::report::render_list;
use run_conditions_report::runner::{
    CalibrationArgs, ConditionListArgs, ConditionTableArgs, run_calibration_report,
    run_condition_list, run_condition_table,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Clone)]
#[command(
    name = "run-conditions",
    about = "Report run conditions (RCDB) and calibration constants (CCDB)"
)]
struct Args {
    /// Run conditions database connection string
    #[arg(long, global = true, default_value = DEFAULT_RCDB_URL)]
    rcdb_url: String,

    /// Calibration constants database connection string
    #[arg(long, global = true, default_value = DEFAULT_CCDB_URL)]
    ccdb_url: String,

    /// Quiet mode - no progress bar, only warnings and results
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Print one condition for the run of each HIPO file
    List {
        /// Input files; the run number is taken from each name
        #[arg(required = true, num_args = 1..)]
        files: Vec<String>,

        /// Condition to look up (e.g. target)
        condition: String,

        /// Regex extracting the run number from a file name (capture group 1)
        #[arg(long, default_value = DEFAULT_RUN_PATTERN)]
        pattern: String,
    },

    /// Print a CSV table of conditions for an inclusive run range
    Table {
        /// First run (inclusive)
        #[arg(value_parser = parse_run)]
        run_min: u32,

        /// Last run (inclusive)
        #[arg(value_parser = parse_run)]
        run_max: u32,

        /// Conditions to retrieve, one column each (e.g. events_rate target)
        #[arg(required = true, num_args = 1..)]
        conditions: Vec<String>,

        /// Extra runs taken from HIPO file names (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,

        /// Regex extracting the run number from a file name (capture group 1)
        #[arg(long, default_value = DEFAULT_RUN_PATTERN)]
        pattern: String,

        /// Number of lookup warnings printed before only the total is reported
        #[arg(long, default_value_t = DEFAULT_MAX_WARNINGS, conflicts_with = "all_warnings")]
        max_warnings: usize,

        /// Print every lookup warning
        #[arg(long)]
        all_warnings: bool,

        /// Write the CSV to a file and echo the table instead of printing CSV
        /// (`--output` alone uses the default name; give a path as `--output=FILE`)
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = DEFAULT_CONDITIONS_OUTPUT
        )]
        output: Option<PathBuf>,
    },

    /// Write the Faraday-cup calibration table to CSV and check run coverage
    Fcup {
        /// CCDB type table path
        #[arg(long, default_value = DEFAULT_FCUP_TABLE)]
        table_path: String,

        /// Name recorded for the CCDB session
        #[arg(long, default_value = DEFAULT_CCDB_USER)]
        ccdb_user: String,

        /// Output CSV file
        #[arg(long, default_value = DEFAULT_CALIBRATION_OUTPUT)]
        output: PathBuf,
    },
}

fn parse_run(s: &str) -> Result<u32, String> {
    cli::parse_run(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    cli::init_tracing(args.quiet);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(usage) = e.downcast_ref::<UsageError>() {
                eprintln!("error: {usage}");
                eprintln!();
                eprintln!("{}", cli::usage());
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut stderr = std::io::stderr();

    match args.command {
        Command::List {
            files,
            condition,
            pattern,
        } => {
            let result = run_condition_list(
                ConditionListArgs {
                    rcdb_url: args.rcdb_url,
                    files,
                    pattern,
                    condition,
                    quiet: args.quiet,
                },
                &mut stderr,
            )
            .await?;

            println!("{}", render_list(&result.values));
        }

        Command::Table {
            run_min,
            run_max,
            conditions,
            files,
            pattern,
            max_warnings,
            all_warnings,
            output,
        } => {
            let result = run_condition_table(
                ConditionTableArgs {
                    rcdb_url: args.rcdb_url,
                    run_min,
                    run_max,
                    files,
                    pattern,
                    conditions,
                    max_warnings: (!all_warnings).then_some(max_warnings),
                    output,
                    quiet: args.quiet,
                },
                &mut stderr,
            )
            .await?;

            match result.output {
                Some(path) => {
                    print!("{}", result.table.render_aligned());
                    println!("Created <{}>", path.display());
                }
                None => print!("{}", result.table.to_csv_string()?),
            }
        }

        Command::Fcup {
            table_path,
            ccdb_user,
            output,
        } => {
            let result = run_calibration_report(
                CalibrationArgs {
                    ccdb_url: args.ccdb_url,
                    ccdb_user,
                    table_path,
                    output,
                },
                &mut stderr,
            )
            .await?;

            print!("{}", result.table.render_aligned());
            println!("Created <{}>", result.output.display());
        }
    }

    Ok(())
}

/// CLI utility functions
mod cli {
    use clap::CommandFactory;
    use run_conditions_report::error::UsageError;
    use run_conditions_report::report::runs::parse_run_number;

    /// Logs go to stderr so stdout carries only report output
    pub fn init_tracing(quiet: bool) {
        use tracing_subscriber::{EnvFilter, FmtSubscriber};
        let filter = if quiet {
            EnvFilter::new("run_conditions_report=warn,sqlx=off")
        } else {
            EnvFilter::new("run_conditions_report=info,sqlx=off")
        };
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    pub fn parse_run(s: &str) -> Result<u32, UsageError> {
        parse_run_number(s)
    }

    pub fn usage() -> String {
        super::Args::command().render_usage().to_string()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_run() {
            assert_eq!(parse_run("16400"), Ok(16400));
            assert!(parse_run("16400a").is_err());
            assert!(parse_run("0").is_err());
        }

        #[test]
        fn test_usage_names_binary() {
            assert!(usage().contains("run-conditions"));
        }
    }
}
