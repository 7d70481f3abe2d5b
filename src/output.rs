use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    Json,
}

static OUTPUT_MODE: OnceLock<OutputMode> = OnceLock::new();

fn parse_mode(value: &str) -> OutputMode {
    match value.to_ascii_lowercase().as_str() {
        "interactive" => OutputMode::Interactive,
        _ => OutputMode::Json,
    }
}

/// Scans raw arguments so the mode is known before clap prints help or errors.
pub fn detect_mode_from_args(args: &[String]) -> OutputMode {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--mode" {
            return iter
                .next()
                .map(|value| parse_mode(value))
                .unwrap_or(OutputMode::Json);
        } else if let Some(value) = arg.strip_prefix("--mode=") {
            return parse_mode(value);
        }
    }

    OutputMode::Interactive
}

pub fn set_output_mode(mode: OutputMode) {
    let _ = OUTPUT_MODE.set(mode);
}

pub fn output_mode() -> OutputMode {
    *OUTPUT_MODE.get_or_init(|| OutputMode::Interactive)
}

pub fn is_json_mode() -> bool {
    output_mode() == OutputMode::Json
}

#[derive(Serialize)]
struct Event<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: T,
}

#[derive(Serialize)]
struct ErrorData<'a> {
    message: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct ErrorDataOwned {
    message: String,
    code: String,
}

#[derive(Serialize)]
struct WarningData<'a> {
    message: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct PanicData {
    message: String,
    code: &'static str,
    location: Option<String>,
}

#[derive(Serialize)]
struct TextData {
    text: String,
}

#[derive(Serialize)]
struct ProgressData<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct StepData<'a> {
    step: &'a str,
    index: usize,
    total: usize,
    message: &'a str,
}

fn render_event<T: Serialize>(kind: &str, data: &T) -> String {
    let event = Event { kind, data };
    serde_json::to_string(&event).unwrap_or_else(|e| {
        let fallback = Event {
            kind: "error",
            data: ErrorDataOwned {
                message: e.to_string(),
                code: "serialization_error".to_string(),
            },
        };
        serde_json::to_string(&fallback)
            .unwrap_or_else(|_| "{\"type\":\"error\",\"data\":{\"message\":\"serialization_error\",\"code\":\"serialization_error\"}}".to_string())
    })
}

fn emit_event<T: Serialize>(kind: &'static str, data: &T, to_stderr: bool) {
    let json = render_event(kind, data);

    if to_stderr {
        eprintln!("{json}");
    } else {
        println!("{json}");
    }
}

pub fn emit_output<T: Serialize>(data: &T) {
    emit_event("output", data, false);
}

pub fn emit_help(text: String) {
    emit_event("help", &TextData { text }, false);
}

pub fn emit_version(text: String) {
    emit_event("version", &TextData { text }, false);
}

pub fn emit_progress_message(message: &str) {
    emit_event("progress", &ProgressData { message }, false);
}

pub fn emit_step(step: &str, index: usize, total: usize, message: &str) {
    let payload = StepData {
        step,
        index,
        total,
        message,
    };
    emit_event("step", &payload, false);
}

pub fn emit_error(message: &str, code: &str) -> ! {
    let payload = ErrorData { message, code };
    emit_event("error", &payload, true);
    std::process::exit(1);
}

pub fn emit_warning(message: &str, code: &str) {
    if is_json_mode() {
        let payload = WarningData { message, code };
        emit_event("warning", &payload, true);
    } else {
        eprintln!("Warning: {}", message);
    }
}

pub fn init_panic_hook_if_json() {
    if !is_json_mode() {
        return;
    }

    std::panic::set_hook(Box::new(|info| {
        let message = if let Some(value) = info.payload().downcast_ref::<&str>() {
            value.to_string()
        } else if let Some(value) = info.payload().downcast_ref::<String>() {
            value.clone()
        } else {
            "panic".to_string()
        };

        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()));

        let payload = PanicData {
            message,
            code: "panic",
            location,
        };

        emit_event("error", &payload, true);
    }));
}

/// A spinner in interactive mode, a single `progress` event in JSON mode.
pub fn start_spinner(message: &str) -> ProgressBar {
    if is_json_mode() {
        emit_progress_message(message);
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(100);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

pub fn finish_spinner(pb: &ProgressBar, message: &str) {
    if is_json_mode() {
        pb.finish_and_clear();
        return;
    }

    let elapsed = pb.elapsed();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix("✓");
    pb.finish_with_message(format!("{} ({:.2?})", message, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn mode_defaults_to_interactive() {
        assert_eq!(
            detect_mode_from_args(&args(&["blobtour", "run", "--yes"])),
            OutputMode::Interactive
        );
    }

    #[test]
    fn mode_flag_accepts_both_spellings() {
        assert_eq!(
            detect_mode_from_args(&args(&["blobtour", "--mode", "json", "run"])),
            OutputMode::Json
        );
        assert_eq!(
            detect_mode_from_args(&args(&["blobtour", "--mode=interactive"])),
            OutputMode::Interactive
        );
    }

    #[test]
    fn unknown_or_missing_mode_value_means_json() {
        assert_eq!(
            detect_mode_from_args(&args(&["blobtour", "--mode=yaml"])),
            OutputMode::Json
        );
        assert_eq!(
            detect_mode_from_args(&args(&["blobtour", "--mode"])),
            OutputMode::Json
        );
    }

    #[test]
    fn events_carry_type_and_data() {
        let json = render_event("step", &StepData {
            step: "list_blobs",
            index: 3,
            total: 5,
            message: "Listing blobs...",
        });

        assert_eq!(
            json,
            r#"{"type":"step","data":{"step":"list_blobs","index":3,"total":5,"message":"Listing blobs..."}}"#
        );
    }
}
