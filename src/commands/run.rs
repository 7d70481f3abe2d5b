use crate::commands::prompt::{ask_choice, missing_argument};
use crate::output::{emit_output, emit_progress_message, is_json_mode};
use crate::storage_clients::{LocalClientStorage, ObjectStore, build_storage_client};
use crate::utils::{get_storage, handle_error, storage_names};
use crate::workflow::{
    Acknowledge, AutoContinue, DEFAULT_DATA_DIR, DEFAULT_NAME_HINT, KeyPress, WorkflowRunner,
};
use bytesize::ByteSize;
use clap::ArgMatches;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn run(matches: Option<&ArgMatches>) {
    let params = match get_params(matches) {
        Ok(params) => params,
        Err(e) => handle_error(e, None),
    };

    let (store, label): (Arc<dyn ObjectStore>, String) = match &params.storage {
        Some(name) => {
            let storage = get_storage(name).unwrap_or_else(|e| handle_error(e, None));
            let store = build_storage_client(&storage).unwrap_or_else(|e| handle_error(e, None));
            (store, format!("'{}'", name))
        }
        None => {
            let root = fallback_store_root(&params.data_dir);
            notice(&format!(
                "No storage configured, using a local store in {}. Run 'blobtour storage add' to use your own.",
                root.display()
            ));
            let label = format!("the local store in {}", root.display());
            let store: Arc<dyn ObjectStore> = Arc::new(LocalClientStorage::new(root));
            (store, label)
        }
    };

    let acknowledge: Box<dyn Acknowledge> = if params.yes || is_json_mode() {
        Box::new(AutoContinue)
    } else {
        Box::new(KeyPress)
    };

    if !is_json_mode() {
        println!(
            "{}",
            style(format!("Object storage tour using {}", label)).bold()
        );
    }

    let runner =
        WorkflowRunner::new(store, &params.data_dir, acknowledge).keep_files(params.keep_files);

    let report = match runner.run(&params.name_hint).await {
        Ok(report) => report,
        Err(e) => handle_error(e, None),
    };

    if is_json_mode() {
        emit_output(&report);
    } else {
        println!(
            "\n{} Tour finished: {} blob(s) listed, {} downloaded.",
            style("✓").green(),
            report.blobs.len(),
            ByteSize::b(report.bytes_written)
        );
    }
}

fn notice(message: &str) {
    if is_json_mode() {
        emit_progress_message(message);
    } else {
        println!("{}", style(message).yellow());
    }
}

/// Where the tour keeps its containers when no storage profile exists.
fn fallback_store_root(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join("store")
}

struct RunParams {
    /// `None` runs against the local fallback store.
    storage: Option<String>,
    data_dir: String,
    name_hint: String,
    yes: bool,
    keep_files: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum StorageChoice {
    Named(String),
    Fallback,
    Ask,
}

fn choose_storage(requested: Option<String>, names: &[String]) -> Result<StorageChoice, String> {
    match requested {
        Some(name) if names.contains(&name) => Ok(StorageChoice::Named(name)),
        Some(name) => Err(format!("Storage '{}' not found", name)),
        None => match names {
            [] => Ok(StorageChoice::Fallback),
            [only] => Ok(StorageChoice::Named(only.clone())),
            _ => Ok(StorageChoice::Ask),
        },
    }
}

fn get_params(matches: Option<&ArgMatches>) -> Result<RunParams, String> {
    let arg = |name: &str| matches.and_then(|m| m.get_one::<String>(name).cloned());
    let flag = |name: &str| matches.is_some_and(|m| m.get_flag(name));

    let storages_names = storage_names()?;

    let storage = match choose_storage(arg("storage"), &storages_names)? {
        StorageChoice::Named(name) => Some(name),
        StorageChoice::Fallback => None,
        StorageChoice::Ask if is_json_mode() => {
            return Err(missing_argument(
                "storage",
                " when more than one storage exists",
            ));
        }
        StorageChoice::Ask => {
            let index = ask_choice("Select the storage to use", &storages_names)?;
            Some(storages_names[index].clone())
        }
    };

    Ok(RunParams {
        storage,
        data_dir: arg("data-dir").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        name_hint: arg("name-hint").unwrap_or_else(|| DEFAULT_NAME_HINT.to_string()),
        yes: flag("yes"),
        keep_files: flag("keep-files"),
    })
}
