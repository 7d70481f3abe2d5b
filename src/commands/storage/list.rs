use crate::output::{emit_output, is_json_mode};
use crate::storage_clients::{public_fields, storage_details};
use crate::utils::{get_storage, handle_error, storage_names};
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StorageRow {
    name: String,
    storage_type: String,
    details: String,
}

#[derive(Serialize)]
struct StorageEntry {
    name: String,
    storage_type: String,
    fields: BTreeMap<String, String>,
}

pub fn list() {
    let names = storage_names().unwrap_or_else(|e| handle_error(e, None));

    let mut rows = Vec::new();
    let mut entries = Vec::new();

    for name in names {
        let storage = get_storage(&name).unwrap_or_else(|e| handle_error(e, None));

        rows.push(StorageRow {
            name: name.clone(),
            storage_type: storage.storage_type.clone(),
            details: storage_details(&storage),
        });
        entries.push(StorageEntry {
            name,
            fields: public_fields(&storage),
            storage_type: storage.storage_type,
        });
    }

    if is_json_mode() {
        emit_output(&entries);
        return;
    }

    if rows.is_empty() {
        println!(
            "{}",
            style("No storages yet. Run 'blobtour storage add' to add one.").yellow()
        );
        return;
    }

    let table = Table::new(rows).to_string();

    println!("{table}");
}
