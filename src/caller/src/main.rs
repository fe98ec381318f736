//! This crate defines the command line interface for the taint_checker.
//! General documentation about the taint_checker is contained in the [`taint_checker_lib`] crate.

extern crate taint_checker_lib; // Needed for the docstring-link to work

use anyhow::Error;
use structopt::StructOpt;
use taint_checker_lib::analysis::class_hierarchy::ClassHierarchy;
use taint_checker_lib::analysis::pointer_analysis::{self, Config};
use taint_checker_lib::analysis::taint::config::TaintConfig;
use taint_checker_lib::analysis::taint::TaintAnalysis;
use taint_checker_lib::utils::log::{filter_debug_messages, print_all_messages, LogMessage};
use taint_checker_lib::utils::read_project_file;

#[derive(Debug, StructOpt)]
/// Find taint flows in a program using context-sensitive pointer analysis
struct CmdlineArgs {
    /// The path to the program IR file.
    #[structopt(validator(check_file_existence))]
    program: String,

    /// Path to the taint rule file.
    /// If no rule file is given, only the pointer analysis is run
    /// and the taint-flow report is empty.
    #[structopt(long, short, validator(check_file_existence))]
    config: Option<String>,

    /// The context sensitivity policy of the pointer analysis:
    /// 'insensitive', '<k>-call' or '<k>-obj'.
    #[structopt(long, default_value = "2-call")]
    context: String,

    /// Write the results to a file instead of stdout.
    /// This only affects the taint-flow report. Log messages are still printed to stdout.
    #[structopt(long, short)]
    out: Option<String>,

    /// Generate JSON output.
    #[structopt(long, short)]
    json: bool,

    /// Do not print log messages. This prevents polluting stdout for json output.
    #[structopt(long, short)]
    quiet: bool,

    /// Also print debug log messages generated during the analysis.
    #[structopt(long)]
    verbose: bool,
}

fn main() {
    let cmdline_args = CmdlineArgs::from_args();

    if let Err(error) = run_analysis(cmdline_args) {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}

/// Check the existence of a file
fn check_file_existence(file_path: String) -> Result<(), String> {
    if std::fs::metadata(&file_path)
        .map_err(|err| format!("{}", err))?
        .is_file()
    {
        Ok(())
    } else {
        Err(format!("{} is not a file.", file_path))
    }
}

/// Load the program and the taint rules, run the analysis and print the results.
fn run_analysis(args: CmdlineArgs) -> Result<(), Error> {
    let project = read_project_file(&args.program)?;
    let hierarchy = ClassHierarchy::build(&project.program)?;

    let mut all_logs: Vec<LogMessage> = Vec::new();
    let taint_analysis = match &args.config {
        Some(config_path) => {
            let taint_config = TaintConfig::read_from_file(config_path)?;
            let (taint_analysis, mut logs) = TaintAnalysis::new(&taint_config, &hierarchy)?;
            all_logs.append(&mut logs);
            Some(taint_analysis)
        }
        None => None,
    };

    let config = Config {
        context: args.context.clone(),
    };
    let results = pointer_analysis::run(&hierarchy, &config, taint_analysis.as_ref())?;
    all_logs.extend(results.logs().iter().cloned());

    if args.quiet {
        all_logs = Vec::new();
    } else if !args.verbose {
        all_logs = filter_debug_messages(all_logs);
    }
    print_all_messages(
        all_logs,
        results.taint_flows(),
        args.out.as_deref(),
        args.json,
    );
    Ok(())
}
