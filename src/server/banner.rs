//! Startup banner
//!
//! Templates may use `{time}`, `{date}` and `{version}`. Uses crossterm for
//! colors.

use chrono::{DateTime, Local};
use crossterm::style::Stylize;
use std::path::Path;

const BUILTIN: &str = r"
  __  __       _ _   _
 |  \/  | __ _(_) | | |_ _ __ ___
 | |\/| |/ _` | | | | __| '_ ` _ \
 | |  | | (_| | | |_| |_| | | | | |
 |_|  |_|\__,_|_|_(_)\__|_| |_| |_|
";

/// Fill in the placeholders of a banner template
pub fn render(template: &str, now: DateTime<Local>) -> String {
    template
        .replace("{time}", &now.format("%H:%M:%S").to_string())
        .replace("{date}", &now.format("%Y-%m-%d").to_string())
        .replace("{version}", env!("CARGO_PKG_VERSION"))
}

/// The built-in banner, colored
pub fn builtin(now: DateTime<Local>) -> String {
    let art = BUILTIN.trim_start_matches('\n').cyan().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).magenta();
    let started = render("started {date} {time}", now).green();
    format!("{}\n  {}  {}\n", art, version, started)
}

/// Banner text: the template at `path` when given, else the built-in one
pub fn load(path: Option<&Path>, now: DateTime<Local>) -> crate::Result<String> {
    match path {
        Some(path) => {
            let template = std::fs::read_to_string(path)?;
            Ok(render(&template, now))
        }
        None => Ok(builtin(now)),
    }
}

/// Print the banner; a missing or unreadable template is logged, not fatal
pub fn print(path: Option<&Path>) {
    match load(path, Local::now()) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::warn!(error = %e, "Could not print banner"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let text = render("{date} {time} v{version} {unknown}", fixed_time());
        assert_eq!(
            text,
            format!("2024-03-09 14:05:07 v{} {{unknown}}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Inbox watcher {{version}}").unwrap();

        let text = load(Some(file.path()), fixed_time()).unwrap();
        assert_eq!(
            text.trim_end(),
            format!("Inbox watcher {}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let missing = Path::new("/no/such/banner.txt");
        assert!(load(Some(missing), fixed_time()).is_err());
        // print() only logs
        print(Some(missing));
    }

    #[test]
    fn test_builtin_mentions_version() {
        let text = builtin(fixed_time());
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
        assert!(text.contains("2024-03-09"));
    }
}
