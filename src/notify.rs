//! Operator notification for fatal conditions.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Desktop dialogs tried, in order, when no command is configured.
const DIALOGS: [&[&str]; 2] = [&["zenity", "--error", "--text"], &["kdialog", "--error"]];

/// Reports a fatal condition and waits until the operator has seen it.
///
/// With a command (configured, or the first of `zenity` / `kdialog` found on
/// `PATH`), the title and message are appended as the last argument and the
/// command is waited on. Without one, or if it fails, the message goes to
/// stderr.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    command: Option<Vec<String>>,
}

impl Notifier {
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self::with_search_path(command, std::env::var_os("PATH").as_deref())
    }

    /// Like [`Notifier::new`], looking for a fallback dialog in `search_path`.
    pub fn with_search_path(command: Option<Vec<String>>, search_path: Option<&OsStr>) -> Self {
        let command = command
            .filter(|cmd| !cmd.is_empty())
            .or_else(|| search_path.and_then(default_dialog));
        if command.is_none() {
            log::debug!("no notify command; fatal errors go to stderr only");
        }
        Self { command }
    }

    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }

    pub fn notify_fatal(&self, title: &str, message: &str) {
        log::error!("{title}: {message}");
        let text = format!("{title}\n\n{message}");
        if let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) {
            match Command::new(program).args(args).arg(&text).status() {
                Ok(status) if status.success() => return,
                Ok(status) => log::warn!("notify command {} exited with {}", program, status),
                Err(err) => log::warn!("notify command {} failed: {}", program, err),
            }
        }
        eprintln!("{text}");
    }
}

fn default_dialog(search_path: &OsStr) -> Option<Vec<String>> {
    DIALOGS.iter().find_map(|dialog| {
        let (program, args) = dialog.split_first()?;
        let found = find_on_path(program, search_path)?;
        let mut cmd = vec![found.to_string_lossy().into_owned()];
        cmd.extend(args.iter().map(|a| a.to_string()));
        Some(cmd)
    })
}

/// Full path of the first `name` in the `PATH`-style list `search_path`.
fn find_on_path(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidates(&dir, name))
        .find(|p| is_executable(p))
}

fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![dir.join(format!("{name}.exe")), dir.join(name)]
    } else {
        vec![dir.join(name)]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_program(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    #[test]
    fn configured_command_wins_over_dialogs() {
        let notifier = Notifier::with_search_path(
            Some(vec!["notify-send".to_string()]),
            Some(OsStr::new("/usr/bin")),
        );
        assert_eq!(notifier.command(), Some(&["notify-send".to_string()][..]));
    }

    #[test]
    fn nothing_found_means_stderr_only() -> anyhow::Result<()> {
        let empty = tempfile::tempdir()?;
        let notifier = Notifier::with_search_path(Some(Vec::new()), Some(empty.path().as_os_str()));
        assert_eq!(notifier.command(), None);
        assert_eq!(Notifier::with_search_path(None, None).command(), None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn zenity_on_path_is_the_default_dialog() -> anyhow::Result<()> {
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        fake_program(first.path(), "kdialog")?;
        let zenity = fake_program(second.path(), "zenity")?;
        std::fs::write(first.path().join("zenity"), "not executable")?;

        let search = std::env::join_paths([first.path(), second.path()])?;
        let notifier = Notifier::with_search_path(None, Some(search.as_os_str()));
        let expected = vec![
            zenity.to_string_lossy().into_owned(),
            "--error".to_string(),
            "--text".to_string(),
        ];
        assert_eq!(notifier.command(), Some(&expected[..]));

        let notifier = Notifier::with_search_path(None, Some(first.path().as_os_str()));
        let expected = vec![
            first.path().join("kdialog").to_string_lossy().into_owned(),
            "--error".to_string(),
        ];
        assert_eq!(notifier.command(), Some(&expected[..]));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_title_and_message_as_last_argument() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("seen.txt");
        let script = format!("printf '%s' \"$0\" > '{}'", out.display());
        let notifier = Notifier::new(Some(vec!["sh".to_string(), "-c".to_string(), script]));

        notifier.notify_fatal("Counterpick", "inference failed");
        assert_eq!(std::fs::read_to_string(&out)?, "Counterpick\n\ninference failed");
        Ok(())
    }
}
