use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in raw TOML text
///
/// `{{ env.VAR | default("fallback") }}` substitutes the fallback when the
/// variable is unset. Expansion happens before deserialization so config
/// structs hold plain `String`/`SecretString` values. TOML comment lines
/// are passed through untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder pattern is valid")
    });

    let mut output = String::with_capacity(input.len());
    let mut error: Option<String> = None;

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let expanded = re.replace_all(line, |caps: &Captures<'_>| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_owned(),
                    None => {
                        error.get_or_insert_with(|| {
                            format!("environment variable not found: `{var}`")
                        });
                        String::new()
                    }
                },
            }
        });

        if let Some(e) = error.take() {
            return Err(e);
        }
        output.push_str(&expanded);
    }

    Ok(output)
}
