//! Git branch lookup.

use std::path::Path;
use std::process::Command;

/// Gets the current branch name for the repository containing `cwd`.
///
/// Runs `git branch --show-current`; on any failure (not a repo, git not
/// installed, detached HEAD) returns "unknown" rather than an error.
pub fn current_branch(cwd: &Path) -> String {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .current_dir(cwd)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout);
            let branch = branch.trim();
            if branch.is_empty() {
                // Detached HEAD produces empty output
                "unknown".to_string()
            } else {
                branch.to_string()
            }
        }
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_current_branch_not_a_repo() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(current_branch(temp.path()), "unknown");
    }

    #[test]
    fn test_current_branch_nonexistent_directory() {
        let cwd = PathBuf::from("/this/path/does/not/exist/at/all");
        assert_eq!(current_branch(&cwd), "unknown");
    }
}
