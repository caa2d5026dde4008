//! Output formatting: JSON, compact JSON, YAML.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Serialize `data` in the format selected by `--output`.
pub fn render<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
    };
    rendered.map_err(CliError::Output)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn formats_differ_only_in_layout() {
        let value = json!({ "Id": "1", "EventTypes": ["Alert"] });
        assert_eq!(
            render(&OutputFormat::JsonCompact, &value).unwrap(),
            r#"{"EventTypes":["Alert"],"Id":"1"}"#
        );
        assert!(render(&OutputFormat::Json, &value).unwrap().contains("\n  \"Id\": \"1\""));
        assert!(render(&OutputFormat::Yaml, &value).unwrap().contains("Id: '1'"));
    }
}
