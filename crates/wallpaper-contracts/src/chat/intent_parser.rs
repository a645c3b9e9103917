use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, INDEX_COMMAND, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
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
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
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
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

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

            if let Some((spec, key)) = RAW_ARG_COMMANDS
                .iter()
                .find(|(spec, _)| spec.command == command)
            {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert((*key).to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if command == INDEX_COMMAND.command {
                let mut intent = Intent::new(INDEX_COMMAND.action, text);
                intent.command_args.insert(
                    "index".to_string(),
                    arg.parse::<u64>()
                        .map(|index| Value::Number(index.into()))
                        .unwrap_or(Value::Null),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::parse_intent;

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn plain_text_generates_with_prompt() {
        let intent = parse_intent("  a lone knight at sunset ");
        assert_eq!(intent.action, "generate");
        assert_eq!(intent.prompt.as_deref(), Some("a lone knight at sunset"));
    }

    #[test]
    fn bare_generate_keeps_current_prompt() {
        let intent = parse_intent("/generate");
        assert_eq!(intent.action, "generate");
        assert_eq!(intent.prompt, None);
    }

    #[test]
    fn parse_setting_commands() {
        let aspect = parse_intent("/aspect 16:9");
        assert_eq!(aspect.action, "set_aspect_ratio");
        assert_eq!(aspect.command_args["aspect_ratio"], json!("16:9"));

        let style = parse_intent("/STYLE cyberpunk");
        assert_eq!(style.action, "set_style");
        assert_eq!(style.command_args["style"], json!("cyberpunk"));

        let lang = parse_intent("/lang ar");
        assert_eq!(lang.action, "set_language");
        assert_eq!(lang.command_args["language"], json!("ar"));

        let prompt = parse_intent("/prompt castle in the clouds");
        assert_eq!(prompt.action, "set_prompt");
        assert_eq!(prompt.command_args["prompt"], json!("castle in the clouds"));
    }

    #[test]
    fn parse_single_path_commands() {
        let base = parse_intent("/base \"/tmp/my photo.png\"");
        assert_eq!(base.action, "set_base_image");
        assert_eq!(base.command_args["path"], json!("/tmp/my photo.png"));

        let save = parse_intent("/save out.jpg");
        assert_eq!(save.action, "save_image");
        assert_eq!(save.command_args["path"], json!("out.jpg"));

        let empty = parse_intent("/save");
        assert_eq!(empty.command_args["path"], json!(""));
    }

    #[test]
    fn parse_select_index() {
        let select = parse_intent("/select 3");
        assert_eq!(select.action, "select_history");
        assert_eq!(select.command_args["index"], json!(3));

        let bad = parse_intent("/select third");
        assert_eq!(bad.command_args["index"], Value::Null);
    }

    #[test]
    fn parse_no_arg_commands() {
        for (line, action) in [
            ("/enhance", "enhance"),
            ("/suggest", "suggest"),
            ("/upscale", "upscale"),
            ("/history", "history"),
            ("/clear_history", "clear_history"),
            ("/clear_base", "clear_base_image"),
            ("/share", "share"),
            ("/quit", "quit"),
        ] {
            assert_eq!(parse_intent(line).action, action);
        }
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
