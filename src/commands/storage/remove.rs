use crate::commands::prompt::{ask_choice, require_interactive};
use crate::output::{emit_output, finish_spinner, is_json_mode, start_spinner};
use crate::utils::{handle_error, storage_file, storage_names};
use clap::ArgMatches;
use serde::Serialize;

pub fn remove(matches: &ArgMatches) {
    let storages_names = storage_names().unwrap_or_else(|e| handle_error(e, None));

    if storages_names.is_empty() {
        handle_error("There are no storages to remove.".to_string(), None);
    }

    let name = match matches.get_one::<String>("name") {
        Some(name) => name.clone(),
        None => {
            require_interactive("name", "");
            let index = ask_choice("Select the storage to remove", &storages_names)
                .unwrap_or_else(|e| handle_error(e, None));
            storages_names[index].clone()
        }
    };

    if !storages_names.contains(&name) {
        handle_error(format!("Storage '{}' not found", name), None);
    }

    let pb = start_spinner(&format!("Removing storage '{}'...", name));

    let storage_path = storage_file(&name).unwrap_or_else(|e| handle_error(e, Some(&pb)));
    std::fs::remove_file(storage_path).unwrap_or_else(|e| {
        handle_error(format!("Failed to remove storage: {}", e), Some(&pb))
    });

    finish_spinner(&pb, "Storage removed");

    if is_json_mode() {
        #[derive(Serialize)]
        struct RemovedOutput {
            name: String,
        }

        emit_output(&RemovedOutput { name });
    }
}
