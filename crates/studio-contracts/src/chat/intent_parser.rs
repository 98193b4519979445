use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, INDEX_COMMANDS, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_index(&self, key: &str) -> Option<usize> {
        self.command_args
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn arg_paths(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_spec(command: &str, specs: &[CommandSpec]) -> Option<CommandSpec> {
    specs.iter().find(|spec| spec.command == command).copied()
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

/// Turns one line of REPL input into an [`Intent`].
///
/// Plain text (anything not starting with `/<word>`) becomes the prompt.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(spec) = find_spec(&command, RAW_ARG_COMMANDS) {
                return Intent::new(spec.action, text)
                    .with_arg(spec.arg_key, Value::String(arg.to_string()));
            }

            if let Some(spec) = find_spec(&command, SINGLE_PATH_COMMANDS) {
                return Intent::new(spec.action, text)
                    .with_arg(spec.arg_key, Value::String(parse_single_path_arg(arg)));
            }

            if let Some(spec) = find_spec(&command, MULTI_PATH_COMMANDS) {
                let paths = parse_path_args(arg).into_iter().map(Value::String).collect();
                return Intent::new(spec.action, text).with_arg(spec.arg_key, Value::Array(paths));
            }

            if let Some(spec) = find_spec(&command, INDEX_COMMANDS) {
                let index = arg
                    .parse::<u64>()
                    .map(|value| Value::Number(value.into()))
                    .unwrap_or(Value::Null);
                return Intent::new(spec.action, text).with_arg(spec.arg_key, index);
            }

            if let Some(spec) = find_spec(&command, NO_ARG_COMMANDS) {
                return Intent::new(spec.action, text);
            }

            return Intent::new("unknown", text)
                .with_arg("command", Value::String(command))
                .with_arg("arg", Value::String(arg.to_string()));
        }
    }

    let mut intent = Intent::new("set_prompt", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent.with_arg("prompt", Value::String(raw_trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::parse_intent;

    #[test]
    fn plain_text_sets_prompt() {
        let intent = parse_intent("  a futuristic cityscape at sunset ");
        assert_eq!(intent.action, "set_prompt");
        assert_eq!(intent.prompt.as_deref(), Some("a futuristic cityscape at sunset"));
        assert_eq!(intent.arg_str("prompt"), Some("a futuristic cityscape at sunset"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn raw_arg_commands_keep_argument_text() {
        let mode = parse_intent("/mode Virtual Try-on");
        assert_eq!(mode.action, "set_mode");
        assert_eq!(mode.arg_str("mode"), Some("Virtual Try-on"));

        let style = parse_intent("/style Ideogram V3");
        assert_eq!(style.action, "set_style");
        assert_eq!(style.command_args["style"], json!("Ideogram V3"));

        let factor = parse_intent("/FACTOR 4");
        assert_eq!(factor.action, "set_factor");
        assert_eq!(factor.arg_str("factor"), Some("4"));
    }

    #[test]
    fn path_commands_accept_quoted_paths() {
        let image = parse_intent("/image \"/tmp/my photo.png\"");
        assert_eq!(image.action, "set_image");
        assert_eq!(image.arg_str("path"), Some("/tmp/my photo.png"));

        let garment = parse_intent("/garment jacket.jpg");
        assert_eq!(garment.action, "set_reference");
        assert_eq!(garment.arg_str("path"), Some("jacket.jpg"));

        let tray = parse_intent("/tray a.png \"/tmp/b c.png\"");
        assert_eq!(tray.action, "tray_add");
        assert_eq!(tray.arg_paths("paths"), vec!["a.png", "/tmp/b c.png"]);
    }

    #[test]
    fn save_without_directory_has_empty_path() {
        let save = parse_intent("/save");
        assert_eq!(save.action, "save");
        assert_eq!(save.arg_str("path"), None);
    }

    #[test]
    fn index_commands_parse_numbers() {
        let remove = parse_intent("/untray 2");
        assert_eq!(remove.action, "tray_remove");
        assert_eq!(remove.arg_index("index"), Some(2));

        let bad = parse_intent("/pick two");
        assert_eq!(bad.action, "tray_pick");
        assert_eq!(bad.command_args["index"], Value::Null);
        assert_eq!(bad.arg_index("index"), None);
    }

    #[test]
    fn no_arg_commands_and_aliases() {
        assert_eq!(parse_intent("/go").action, "submit");
        assert_eq!(parse_intent("/run").action, "submit");
        assert_eq!(parse_intent("/exit").action, "quit");
        assert_eq!(parse_intent("/clear_reference").action, "clear_reference");
    }

    #[test]
    fn unknown_command_keeps_name_and_arg() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
