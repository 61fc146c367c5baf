use insightbot_core::{Config, Paths};

/// Show the effective configuration, secrets masked.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let mut json = serde_json::to_value(&config)?;
    mask_secrets(&mut json);

    println!();
    println!("Current Configuration");
    println!("  File: {}", paths.config_file().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Write a default config file unless one exists.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let path = paths.config_file();
    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }
    Config::default().save(&path)?;
    std::fs::create_dir_all(paths.artifacts_dir())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn mask_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if matches!(key.as_str(), "apiKey" | "token") {
                    if let serde_json::Value::String(s) = v {
                        if !s.is_empty() {
                            let chars: Vec<char> = s.chars().collect();
                            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
                            *s = format!("****{}", tail);
                        }
                        continue;
                    }
                }
                mask_secrets(v);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_secrets() {
        let mut v = json!({
            "providers": {"groq": {"apiKey": "gsk_abcdef1234", "apiBase": null}},
            "tools": {"codeSearch": {"token": "", "language": "python"}}
        });
        mask_secrets(&mut v);
        assert_eq!(v["providers"]["groq"]["apiKey"], "****1234");
        assert_eq!(v["tools"]["codeSearch"]["token"], "");
        assert_eq!(v["tools"]["codeSearch"]["language"], "python");
    }
}
