//! `colrev-hooks`: pre-commit checks, formatting and status of a CoLRev project

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colrev_core::{logging, ReviewManager};
use colrev_dataset::FormatOutcome;
use colrev_record::Record;
use colrev_state::{Operation, StateModel};
use std::path::PathBuf;
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("colrev-hooks")
        .version(colrev_core::VERSION)
        .about("Pre-commit hooks of a CoLRev project")
        .arg(
            Arg::new("path")
                .long("path")
                .short('p')
                .global(true)
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Project root"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("More output (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log as JSON"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("check").about("Run the cross-record checks and report operation preconditions"))
        .subcommand(Command::new("format").about("Bring the records file into canonical form"))
        .subcommand(Command::new("status").about("Print the number of records per state"))
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    logging::init(matches.get_count("verbose"), matches.get_flag("json"));

    match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let root = matches
        .get_one::<PathBuf>("path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let manager = ReviewManager::open(&root).with_context(|| format!("opening project at {}", root.display()))?;

    match matches.subcommand() {
        Some(("check", _)) => check(&manager),
        Some(("format", _)) => {
            let outcome = manager.dataset().format_records_file(manager.quality_model())?;
            manager.status()?;
            if outcome == FormatOutcome::Formatted {
                println!("Records file formatted");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("status", _)) => {
            let report = manager.status()?;
            for (state, count) in &report.states {
                println!("{:<32}{count:>6}", state.to_string());
            }
            println!("{:<32}{:>6}", "total", report.total);
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

fn check(manager: &ReviewManager) -> anyhow::Result<ExitCode> {
    let report = manager.check()?;
    for line in report.messages() {
        println!("{line}");
    }

    let records = manager.dataset().load_records_dict(true)?;
    let states: Vec<_> = records.values().map(Record::status).collect();
    for operation in Operation::ALL.iter().filter(|op| !op.is_pseudo()) {
        let ready = StateModel::check_operation_precondition(*operation, states.iter().copied());
        match ready {
            Ok(()) => println!("{:<16}ready", operation.as_str()),
            Err(e) => println!("{:<16}{e}", operation.as_str()),
        }
    }

    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn flags_are_global() {
        let matches = cli().try_get_matches_from(["colrev-hooks", "status", "-vv", "--json"]).unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
        assert!(matches.get_flag("json"));
        assert_eq!(matches.subcommand_name(), Some("status"));
    }
}
