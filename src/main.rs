use clap::error::ErrorKind;
use clap::{Arg, ArgAction, Command, arg};

use crate::output::{
    detect_mode_from_args, emit_help, emit_version, init_panic_hook_if_json, is_json_mode,
    set_output_mode,
};
use crate::storage_clients::{storage_add_fields, storage_type_values};
use crate::utils::handle_error;

mod commands;
mod output;
mod storage_clients;
mod utils;
mod workflow;

fn storage_add_command() -> Command {
    let mut command = Command::new("add")
        .about("Add a new storage")
        .arg(arg!(-n --name <NAME> "The name of the storage").required(false))
        .arg(
            arg!(-t --type <TYPE> "The type of the storage")
                .required(false)
                .value_parser(storage_type_values()),
        );

    for field in storage_add_fields() {
        let mut storage_arg = Arg::new(field.arg_name)
            .long(field.arg_name)
            .value_name(field.value_name)
            .help(field.help)
            .required(false);
        if let Some(short) = field.short {
            storage_arg = storage_arg.short(short);
        }
        command = command.arg(storage_arg);
    }

    command
}

fn run_command() -> Command {
    Command::new("run")
        .about("Create a container, upload, list, download and delete it again")
        .arg(arg!(-s --storage <STORAGE> "The storage to run the tour against").required(false))
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DATA_DIR")
                .help("Where the local files are written (default: ./data)")
                .required(false),
        )
        .arg(
            Arg::new("name-hint")
                .long("name-hint")
                .value_name("NAME_HINT")
                .help("Prefix for the generated container name (default: blobtour)")
                .required(false),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .help("Do not pause between steps")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep-files")
                .long("keep-files")
                .help("Keep the uploaded and downloaded files in the data directory")
                .action(ArgAction::SetTrue),
        )
}

fn cli() -> Command {
    Command::new("blobtour")
        .about("A guided tour of object storage: containers, uploads, listings and downloads.")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            arg!(--mode <MODE> "Output mode")
                .required(false)
                .global(true)
                .value_parser(["interactive", "json"]),
        )
        .subcommand(run_command())
        .subcommand(
            Command::new("storage")
                .about("Manage your storages")
                .subcommand_required(true)
                .subcommand(storage_add_command())
                .subcommand(Command::new("list").about("List all storages"))
                .subcommand(
                    Command::new("remove")
                        .about("Remove a storage")
                        .arg(arg!(-n --name <NAME> "The name of the storage").required(false)),
                ),
        )
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    set_output_mode(detect_mode_from_args(&args));
    init_panic_hook_if_json();

    let matches = match cli().try_get_matches_from(&args) {
        Ok(matches) => matches,
        Err(e) if is_json_mode() => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                emit_help(e.to_string());
                return;
            }
            ErrorKind::DisplayVersion => {
                emit_version(e.to_string());
                return;
            }
            _ => handle_error(e.to_string(), None),
        },
        Err(e) => e.exit(),
    };

    match matches.subcommand() {
        None => commands::run(None).await,
        Some(("run", matches)) => commands::run(Some(matches)).await,
        Some(("storage", matches)) => match matches.subcommand() {
            Some(("add", matches)) => commands::storage::add(matches),
            Some(("list", _)) => commands::storage::list(),
            Some(("remove", matches)) => commands::storage::remove(matches),
            _ => {
                handle_error(
                    "Invalid subcommand! Run 'blobtour storage --help' for more information."
                        .to_string(),
                    None,
                );
            }
        },
        _ => {
            handle_error(
                "Invalid command! Run 'blobtour --help' for more information.".to_string(),
                None,
            );
        }
    }
}
