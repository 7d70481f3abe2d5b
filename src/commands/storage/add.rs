use clap::ArgMatches;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::commands::prompt::{ask_choice, ask_text, missing_argument, require_interactive};
use crate::output::{emit_output, finish_spinner, is_json_mode, start_spinner};
use crate::storage_clients::{
    StorageConfig, StorageDefinition, StorageField, StorageFields, encode_storage_config,
    public_fields, storage_definition, storage_definitions, storage_type_values,
};
use crate::utils::{handle_error, is_valid_storage_name, storage_file, storages_dir};

#[derive(Serialize)]
struct AddedStorage {
    name: String,
    storage_type: String,
    fields: BTreeMap<String, String>,
}

pub fn add(matches: &ArgMatches) {
    let name = match matches.get_one::<String>("name") {
        Some(name) => name.clone(),
        None => {
            require_interactive("name", "");
            ask_text("Enter the name of the storage", Some("default".to_string()))
        }
    };

    if !is_valid_storage_name(&name) {
        handle_error(
            "The storage name can only contain letters, numbers, underscores (_), or hyphens (-)."
                .to_string(),
            None,
        );
    }

    let definition = select_storage_definition(matches).unwrap_or_else(|e| handle_error(e, None));
    let mut storage = collect_fields(definition, |field, fields| {
        resolve_field_value(field, matches.get_one::<String>(field.arg_name), fields)
    })
    .unwrap_or_else(|e| handle_error(e, None));

    if let Some(prepare) = definition.prepare {
        prepare(&mut storage).unwrap_or_else(|e| handle_error(e, None));
    }

    let pb = start_spinner(&format!("Writing storage '{}'...", name));
    if let Err(e) = save_storage(&name, &storage) {
        handle_error(e, Some(&pb));
    }
    finish_spinner(&pb, "Storage written");

    if is_json_mode() {
        emit_output(&AddedStorage {
            name,
            storage_type: storage.storage_type.clone(),
            fields: public_fields(&storage),
        });
    }
}

fn save_storage(name: &str, storage: &StorageConfig) -> Result<(), String> {
    let dir = storages_dir()?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create storage directory: {}", e))?;

    let bytes = encode_storage_config(storage)?;
    std::fs::write(storage_file(name)?, bytes)
        .map_err(|e| format!("Failed to write storage: {}", e))
}

fn select_storage_definition(matches: &ArgMatches) -> Result<&'static StorageDefinition, String> {
    let available = storage_type_values().join(", ");

    if let Some(storage_type) = matches.get_one::<String>("type") {
        return storage_definition(storage_type).ok_or_else(|| {
            format!(
                "Unknown storage type '{}'. Available types: {}",
                storage_type, available
            )
        });
    }

    if is_json_mode() {
        return Err(missing_argument(
            "type",
            &format!(". Available types: {}", available),
        ));
    }

    let definitions = storage_definitions();
    let labels: Vec<&str> = definitions.iter().map(|definition| definition.label).collect();
    let index = ask_choice("Enter the type of the storage", &labels)?;

    Ok(&definitions[index])
}

/// Builds the profile field by field; `resolve` sees the values gathered so far so
/// defaults can depend on earlier answers (the S3 endpoint on the region).
fn collect_fields(
    definition: &StorageDefinition,
    mut resolve: impl FnMut(&StorageField, &StorageFields) -> Result<Option<String>, String>,
) -> Result<StorageConfig, String> {
    let mut fields = StorageFields::new();
    for field in definition.fields {
        if let Some(value) = resolve(field, &fields)? {
            fields.insert(field.key.to_string(), value);
        }
    }

    Ok(StorageConfig {
        storage_type: definition.id.to_string(),
        fields,
    })
}

fn resolve_field_value(
    field: &StorageField,
    passed: Option<&String>,
    fields: &StorageFields,
) -> Result<Option<String>, String> {
    if let Some(value) = passed {
        return Ok(Some(value.clone()));
    }

    let default_value = field.default_value.map(|default| default(fields));

    if is_json_mode() || (!field.required && default_value.is_none()) {
        if field.required && default_value.is_none() {
            return Err(missing_argument(field.arg_name, ""));
        }
        return Ok(default_value);
    }

    let typed_value = ask_text(field.prompt, default_value);

    if field.required && typed_value.trim().is_empty() {
        return Err(format!("Field '{}' is required", field.arg_name));
    }

    Ok(Some(typed_value).filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3() -> &'static StorageDefinition {
        storage_definition("s3").unwrap()
    }

    #[test]
    fn passed_values_win_over_defaults() {
        let endpoint = s3().fields.iter().find(|f| f.key == "endpoint").unwrap();
        let passed = "http://localhost:9000".to_string();

        let value = resolve_field_value(endpoint, Some(&passed), &StorageFields::new()).unwrap();

        assert_eq!(value.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn defaults_follow_earlier_fields() {
        let storage = collect_fields(s3(), |field, fields| match field.key {
            "region" => Ok(Some("eu-central-1".to_string())),
            "access_key" | "secret_key" => Ok(Some("key".to_string())),
            _ => Ok(field.default_value.map(|default| default(fields))),
        })
        .unwrap();

        assert_eq!(storage.storage_type, "s3");
        assert_eq!(
            storage.fields.get("endpoint").map(String::as_str),
            Some("https://s3.eu-central-1.amazonaws.com")
        );
        assert_eq!(
            storage.fields.get("path_style").map(String::as_str),
            Some("false")
        );
    }

    #[test]
    fn resolver_errors_abort_collection() {
        let result = collect_fields(s3(), |field, _| {
            Err(missing_argument(field.arg_name, ""))
        });

        assert_eq!(
            result.unwrap_err(),
            "Missing required argument: --region (required in --mode json)"
        );
    }
}
