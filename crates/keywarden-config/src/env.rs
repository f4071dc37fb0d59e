use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Placeholder syntax: `{{ env.NAME }}` or `{{ env.NAME | default("value") }}`
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder regex must compile")
    })
}

/// Substitute environment placeholders in raw TOML text
///
/// Comment lines are copied through untouched so that documented but
/// disabled settings never require their variables to be set.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    let mut lines = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
            continue;
        }

        let mut failure = None;
        let expanded = placeholder().replace_all(line, |caps: &Captures<'_>| {
            match resolve(caps) {
                Ok(value) => value,
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }

        lines.push(expanded.into_owned());
    }

    let mut output = lines.join("\n");
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn resolve(caps: &Captures<'_>) -> anyhow::Result<String> {
    let key = &caps[1];
    let fallback = caps.get(2).map(|m| m.as_str());

    let Some(name) = key.strip_prefix("env.").filter(|n| !n.contains('.')) else {
        anyhow::bail!("unsupported placeholder `{key}`, expected `env.NAME`");
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => anyhow::bail!("environment variable `{name}` is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "cookie_name = \"app_errors\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn substitutes_set_variable() {
        temp_env::with_var("KEYWARDEN_TEST_TOKEN", Some("secret"), || {
            let out = expand_env("token = \"{{ env.KEYWARDEN_TEST_TOKEN }}\"").unwrap();
            assert_eq!(out, "token = \"secret\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("KEYWARDEN_MISSING", || {
            let err = expand_env("token = \"{{ env.KEYWARDEN_MISSING }}\"").unwrap_err();
            assert!(err.to_string().contains("KEYWARDEN_MISSING"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("KEYWARDEN_ROLE", || {
            let out = expand_env("role = \"{{ env.KEYWARDEN_ROLE | default(\"superadmin\") }}\"").unwrap();
            assert_eq!(out, "role = \"superadmin\"");
        });

        temp_env::with_var("KEYWARDEN_ROLE", Some("owner"), || {
            let out = expand_env("role = \"{{ env.KEYWARDEN_ROLE | default(\"superadmin\") }}\"").unwrap();
            assert_eq!(out, "role = \"owner\"");
        });
    }

    #[test]
    fn other_scopes_are_rejected() {
        let err = expand_env("x = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.to_string().contains("vault.TOKEN"));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("KEYWARDEN_MISSING", || {
            let input = "  # token = \"{{ env.KEYWARDEN_MISSING }}\"\nrole = \"admin\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
