use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const PROBE_TIMEOUT: Duration = Duration::from_millis(200);
const PROBE_POLL: Duration = Duration::from_millis(10);

/// Source of the foreground window's title.
pub trait FocusProbe {
    fn foreground_title(&mut self) -> Result<String>;
}

/// Whether the foreground window title contains `game_title`, ignoring case.
///
/// Any probe failure counts as "not focused".
pub fn is_game_focused(probe: &mut dyn FocusProbe, game_title: &str) -> bool {
    match probe.foreground_title() {
        Ok(title) => title.to_lowercase().contains(&game_title.to_lowercase()),
        Err(err) => {
            log::debug!("focus probe failed: {:#}", err);
            false
        }
    }
}

/// Runs an external command (e.g. `xdotool getactivewindow getwindowname`)
/// and takes its stdout as the title.
///
/// The command is killed if it does not finish within a short timeout so the
/// visibility ticker never stalls.
#[derive(Clone, Debug)]
pub struct CommandFocusProbe {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFocusProbe {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("focus command must not be empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: PROBE_TIMEOUT,
        })
    }
}

impl FocusProbe for CommandFocusProbe {
    fn foreground_title(&mut self) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to run {}", self.program))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!("{} timed out", self.program));
            }
            std::thread::sleep(PROBE_POLL);
        };
        if !status.success() {
            return Err(anyhow!("{} exited with {}", self.program, status));
        }

        let mut title = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_string(&mut title)
                .context("focus command wrote non-UTF-8 output")?;
        }
        Ok(title.trim().to_string())
    }
}

/// A probe that reports a fixed title, or fails when there is none.
#[derive(Clone, Debug, Default)]
pub struct FixedFocusProbe {
    title: Option<String>,
}

impl FixedFocusProbe {
    pub fn new(title: Option<String>) -> Self {
        Self { title }
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }
}

impl FocusProbe for FixedFocusProbe {
    fn foreground_title(&mut self) -> Result<String> {
        self.title
            .clone()
            .ok_or_else(|| anyhow!("no foreground window"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_match_is_case_insensitive_substring() {
        let mut probe = FixedFocusProbe::new(Some("Dota 2 - Vulkan".to_string()));
        assert!(is_game_focused(&mut probe, "dota 2"));
        probe.set_title(Some("Terminal".to_string()));
        assert!(!is_game_focused(&mut probe, "dota 2"));
    }

    #[test]
    fn probe_failure_means_not_focused() {
        let mut probe = FixedFocusProbe::new(None);
        assert!(!is_game_focused(&mut probe, "dota 2"));

        let mut missing =
            CommandFocusProbe::new(&["counterpick-no-such-binary".to_string()]).expect("probe");
        assert!(!is_game_focused(&mut missing, "dota 2"));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandFocusProbe::new(&[]).is_err());
    }
}
