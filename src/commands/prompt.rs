use crate::output::is_json_mode;
use crate::utils::handle_error;
use dialoguer::{Input, Select};

/// JSON mode never prompts, so a value the user did not pass is fatal there.
pub(crate) fn require_interactive(arg_name: &str, detail: &str) {
    if is_json_mode() {
        handle_error(missing_argument(arg_name, detail), None);
    }
}

pub(crate) fn missing_argument(arg_name: &str, detail: &str) -> String {
    format!(
        "Missing required argument: --{} (required in --mode json){}",
        arg_name, detail
    )
}

pub(crate) fn ask_text(prompt: &str, default: Option<String>) -> String {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default).show_default(true);
    }

    input
        .interact_text()
        .unwrap_or_else(|e| handle_error(format!("Error: {}", e), None))
}

pub(crate) fn ask_choice<T: std::fmt::Display>(
    prompt: &str,
    items: &[T],
) -> Result<usize, String> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .map_err(|e| format!("Error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_argument_names_the_flag() {
        assert_eq!(
            missing_argument("storage", ""),
            "Missing required argument: --storage (required in --mode json)"
        );
        assert_eq!(
            missing_argument("type", ". Available types: local, s3"),
            "Missing required argument: --type (required in --mode json). Available types: local, s3"
        );
    }
}
