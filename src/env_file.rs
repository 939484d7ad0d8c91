//! `.env` loading: `KEY=value` lines with optional `export`, quoting and trailing comments.
//! Variables already present in the process environment are never overwritten.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LoadedEnvFile {
    pub path: PathBuf,
    /// Passed with `--env-file` rather than picked up from the working directory.
    pub explicit: bool,
    /// Variables actually set from the file.
    pub applied: usize,
}

/// Load `explicit` (which must exist), or `./.env` when present.
pub fn load(explicit: Option<&Path>) -> Result<Option<LoadedEnvFile>, String> {
    let (path, explicit) = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            (path.to_path_buf(), true)
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            (path, false)
        }
    };

    let applied = apply_file(&path)?;
    Ok(Some(LoadedEnvFile { path, explicit, applied }))
}

fn apply_file(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let mut applied = 0;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        let parsed = parse_line(&line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        let Some((key, value)) = parsed else { continue };
        if std::env::var_os(&key).is_none() {
            // Only called from main before any other thread exists.
            unsafe {
                std::env::set_var(&key, value);
            }
            applied += 1;
        }
    }
    Ok(applied)
}

/// One line of a `.env` file; `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(q @ ('"' | '\'')) => parse_quoted(&raw[1..], q)?,
        _ => raw.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key.to_string(), value)))
}

/// Body of a quoted value after the opening quote. Escapes apply inside double quotes only.
fn parse_quoted(input: &str, quote: char) -> Result<String, String> {
    let mut value = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == quote {
            let rest = chars.as_str().trim();
            return if rest.is_empty() || rest.starts_with('#') {
                Ok(value)
            } else {
                Err(format!("unexpected characters after closing {}", quote))
            };
        }
        if ch == '\\' && quote == '"' {
            let escaped = chars
                .next()
                .ok_or_else(|| "unterminated escape sequence in double-quoted value".to_string())?;
            value.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            continue;
        }
        value.push(ch);
    }
    Err(format!("unterminated {}-quoted value", quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> Option<(String, String)> {
        Some((k.to_string(), v.to_string()))
    }

    #[test]
    fn skips_blanks_and_comments() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   # THERMO_BACKEND=cloud"), Ok(None));
    }

    #[test]
    fn plain_and_exported_values() {
        assert_eq!(parse_line("THERMO_BACKEND=cloud"), Ok(pair("THERMO_BACKEND", "cloud")));
        assert_eq!(
            parse_line("export THERMO_API_BASE = https://gw/prod # staging"),
            Ok(pair("THERMO_API_BASE", "https://gw/prod"))
        );
        assert_eq!(parse_line("EMPTY="), Ok(pair("EMPTY", "")));
        assert_eq!(parse_line("URL=http://h/?a=b"), Ok(pair("URL", "http://h/?a=b")));
    }

    #[test]
    fn quoted_values() {
        assert_eq!(parse_line(r#"A="x # y""#), Ok(pair("A", "x # y")));
        assert_eq!(parse_line(r#"A="line\nnext \"q\"""#), Ok(pair("A", "line\nnext \"q\"")));
        assert_eq!(parse_line(r"A='raw\n' # c"), Ok(pair("A", r"raw\n")));
    }

    #[test]
    fn malformed_lines() {
        assert!(parse_line("NO_EQUALS").is_err());
        assert!(parse_line("=value").is_err());
        assert!(parse_line("BAD KEY=1").is_err());
        assert!(parse_line(r#"A="open"#).is_err());
        assert!(parse_line(r#"A="x" trailing"#).is_err());
        assert!(parse_line("A='open").is_err());
    }
}
