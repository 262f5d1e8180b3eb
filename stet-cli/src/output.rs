use serde::Serialize;
use serde_json::Value;

/// Output format for CLI responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(format!("Unknown format: {}. Use 'json' or 'text'", s)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Envelope<'a, T: Serialize> {
    Success { data: &'a T },
    Error { error: &'a str },
}

fn to_json<T: Serialize>(envelope: &Envelope<'_, T>) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|e| {
        format!(
            "{{\"status\":\"error\",\"error\":\"Serialization failed: {}\"}}",
            e
        )
    })
}

/// Print a successful result on stdout
pub fn print_success<T: Serialize>(format: OutputFormat, data: &T) {
    match format {
        OutputFormat::Json => println!("{}", to_json(&Envelope::Success { data })),
        OutputFormat::Text => {
            let value = serde_json::to_value(data).unwrap_or(Value::Null);
            for line in text_lines(&value) {
                println!("{}", line);
            }
        }
    }
}

/// Print an error on stderr
pub fn print_error(format: OutputFormat, error: &str) {
    match format {
        OutputFormat::Json => eprintln!("{}", to_json::<()>(&Envelope::Error { error })),
        OutputFormat::Text => eprintln!("Error: {}", error),
    }
}

/// Flattens a JSON value into `dotted.key: value` lines.
pub fn text_lines(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    flatten(value, "", &mut lines);
    lines
}

fn flatten(value: &Value, prefix: &str, lines: &mut Vec<String>) {
    let key = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten(child, &key(name), lines);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(child, &key(&index.to_string()), lines);
            }
        }
        Value::Null => {}
        Value::String(s) => lines.push(format!("{}: {}", prefix, s)),
        scalar => lines.push(format!("{}: {}", prefix, scalar)),
    }
}
