use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}

/// Expands `~` and anchors relative paths at `base`.
pub fn resolve_relative_to(path: &str, base: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() { expanded } else { base.join(expanded) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_anchored_at_base() {
        let resolved = resolve_relative_to("exts/files.py", Path::new("/etc/lumen"));
        assert_eq!(resolved, PathBuf::from("/etc/lumen/exts/files.py"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let resolved = resolve_relative_to("/opt/ext", Path::new("/etc/lumen"));
        assert_eq!(resolved, PathBuf::from("/opt/ext"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde("~/x"), home.join("x"));
        }
    }
}
