use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the application home directory.
///
/// - `None` gives `<user home>/<default_subdir>`.
/// - A leading `~` expands to the user home.
/// - Relative paths are rejected; the result is always absolute.
///
/// With `create` set, the directory is created when missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let path = match configured {
        None => user_home()?.join(default_subdir),
        Some(raw) => expand_tilde(raw.trim())?,
    };

    if !path.is_absolute() {
        bail!(
            "home_dir must be absolute or start with '~', got '{}'",
            path.display()
        );
    }

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create home_dir {}", path.display()))?;
    }
    Ok(path)
}

fn user_home() -> Result<PathBuf> {
    dirs::home_dir().context("cannot determine the user home directory")
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return user_home();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(user_home()?.join(rest));
    }
    Ok(Path::new(raw).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_kept_and_created() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("a/b");
        let got = resolve_home_dir(Some(target.to_string_lossy().to_string()), ".x", true)
            .unwrap();
        assert_eq!(got, target);
        assert!(target.is_dir());
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = resolve_home_dir(Some("relative/dir".into()), ".x", false).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn tilde_and_default_expand_to_user_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let got = resolve_home_dir(Some("~/.pairing-test".into()), ".x", false).unwrap();
        assert_eq!(got, home.join(".pairing-test"));

        let got = resolve_home_dir(None, ".pairing-default", false).unwrap();
        assert_eq!(got, home.join(".pairing-default"));
    }
}
