//! Command substitution: `<!(...)` and `<!@(...)`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use fxhash::FxHashMap;
use tracing::debug;

use crate::errors::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandLine {
    /// Run through `sh -c`.
    Shell(String),
    /// Run directly, no shell involved.
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn display(&self) -> String {
        match self {
            CommandLine::Shell(s) => s.clone(),
            CommandLine::Argv(argv) => gypsum_util::shell::encode_posix_list(argv),
        }
    }

    fn to_command(&self) -> Option<Command> {
        match self {
            CommandLine::Shell(s) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(s);
                Some(cmd)
            }
            CommandLine::Argv(argv) => {
                let (program, args) = argv.split_first()?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                Some(cmd)
            }
        }
    }
}

/// Runs substituted commands, bounding each by an optional timeout and caching results for the
/// lifetime of the runner.
#[derive(Debug, Default)]
pub struct CommandRunner {
    timeout: Option<Duration>,
    cache: Mutex<FxHashMap<(CommandLine, PathBuf), String>>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

impl CommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `command` in `cwd` and return its standard output with trailing whitespace removed.
    pub fn run(&self, command: &CommandLine, cwd: &Path) -> EvalResult<String> {
        let key = (command.clone(), cwd.to_path_buf());
        if let Some(cached) = self.cache.lock().ok().and_then(|c| c.get(&key).cloned()) {
            debug!("cached output for {:?} in {}", command.display(), cwd.display());
            return Ok(cached);
        }

        debug!("executing {:?} in {}", command.display(), cwd.display());
        let output = self.execute(command, cwd)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, output.clone());
        }
        Ok(output)
    }

    fn execute(&self, command: &CommandLine, cwd: &Path) -> EvalResult<String> {
        let spawn_error = |source| EvalError::CommandSpawn {
            command: command.display(),
            source,
        };

        let Some(mut cmd) = command.to_command() else {
            return Err(spawn_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            )));
        };

        let mut child = cmd
            .current_dir(if cwd.as_os_str().is_empty() {
                Path::new(".")
            } else {
                cwd
            })
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Drain both pipes on their own threads so a chatty child can't block on a full pipe
        let drain = |pipe: Option<Box<dyn Read + Send>>| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                if let Some(mut pipe) = pipe {
                    let _ = pipe.read_to_end(&mut buf);
                }
                buf
            })
        };
        let stdout = drain(child.stdout.take().map(|p| Box::new(p) as Box<dyn Read + Send>));
        let stderr = drain(child.stderr.take().map(|p| Box::new(p) as Box<dyn Read + Send>));

        let status = match self.timeout {
            None => child.wait().map_err(spawn_error)?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(spawn_error)? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EvalError::CommandTimedOut {
                            command: command.display(),
                            cwd: cwd.display().to_string(),
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(EvalError::CommandFailed {
                command: command.display(),
                cwd: cwd.display().to_string(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim_end().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
    }
}
