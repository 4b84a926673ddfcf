use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use kickstack::{api, config::RawArgs, exit_codes, materialize::PlannedAction, preview, report};
use std::{
    ffi::OsString,
    io::{self, Write},
    path::PathBuf,
};

// The CLI layer should only parse inputs and forward them to library code.
fn main() {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .help("Target repo root, created if absent (default: current directory)")
                .value_parser(value_parser!(OsString)),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .help("Overwrite existing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .value_name("KEY=VALUE")
                .help("Override a default, e.g. --set BACKEND_PORT=9000 (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML file of KEY = value overrides; --set takes precedence")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Show what would be written without touching the filesystem")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let raw = raw_args(&matches);

    let code = if matches.get_flag("dry-run") {
        handle_preview(&raw)
    } else {
        handle_generate(&raw)
    };

    std::process::exit(code);
}

fn init_logging(is_verbose: bool) {
    let default_filter = if is_verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn raw_args(matches: &ArgMatches) -> RawArgs {
    RawArgs {
        root: matches.get_one::<OsString>("root").cloned(),
        force: matches.get_flag("force"),
        assignments: matches
            .get_many::<String>("set")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        config_file: matches.get_one::<PathBuf>("config").cloned(),
    }
}

fn handle_generate(raw: &RawArgs) -> i32 {
    let summary = match api::generate(raw) {
        Ok(summary) => summary,
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            return exit_codes::INVALID_ARGUMENT;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(error) = report::write_summary(&mut stdout, &summary).and_then(|_| stdout.flush()) {
        log::error!("unable to print summary: {}", error);
    }

    summary.exit_code()
}

fn handle_preview(raw: &RawArgs) -> i32 {
    let (config, planned) = match api::preview(raw) {
        Ok(preview) => preview,
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            return exit_codes::INVALID_ARGUMENT;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(error) =
        preview::preview_as_tree(&mut stdout, &planned, config.root()).and_then(|_| stdout.flush())
    {
        log::error!("unable to print preview: {}", error);
    }

    if planned
        .iter()
        .any(|file| matches!(file.action, PlannedAction::Reject(_)))
    {
        exit_codes::FILE_FAILED
    } else {
        exit_codes::OK
    }
}
