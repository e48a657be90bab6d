use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Classifier, ClassifierError};
use crate::config::ClassifierConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external recognizer per call: PNG bytes on stdin, text on stdout.
///
/// With a deadline set, a command still running when it expires is killed
/// and reaped before `classify` returns [`ClassifierError::Timeout`].
#[derive(Clone, Debug)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    thread_safe: bool,
    deadline: Option<Duration>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            thread_safe: true,
            deadline: None,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let program = config
            .command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .ok_or_else(|| {
                ClassifierError::Unavailable(
                    "no recognition command configured (set OCRMCP_CLASSIFIER_CMD)".to_string(),
                )
            })?;
        Ok(Self {
            program: program.to_string(),
            args: config.args.clone(),
            thread_safe: config.thread_safe,
            deadline: None,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ClassifierError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| ClassifierError::Engine(format!("recognition command failed: {e}")))?
            {
                return Ok(status);
            }
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(program = %self.program, millis = deadline.as_millis() as u64, "recognition command overran, killing it");
                    if let Err(e) = child.kill() {
                        warn!(error = %e, "failed to kill recognition command");
                    }
                    let _ = child.wait();
                    return Err(ClassifierError::Timeout {
                        millis: deadline.as_millis() as u64,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

// Pipes are drained on their own threads so a chatty command cannot block on
// a full buffer while we poll for its exit.
fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>, ClassifierError> {
    match reader.map(JoinHandle::join) {
        None => Ok(Vec::new()),
        Some(Ok(Ok(buf))) => Ok(buf),
        Some(Ok(Err(e))) => Err(ClassifierError::Engine(format!("cannot read command output: {e}"))),
        Some(Err(_)) => Err(ClassifierError::Engine("output reader panicked".to_string())),
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, image: &[u8]) -> Result<String, ClassifierError> {
        debug!(program = %self.program, bytes = image.len(), "invoking recognition command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClassifierError::Engine(format!("cannot start `{}`: {e}", self.program)))?;

        let writer = child.stdin.take().map(|mut stdin| {
            let payload = image.to_vec();
            thread::spawn(move || stdin.write_all(&payload))
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        // On timeout the I/O threads are left to finish once the pipes close.
        let status = self.wait(&mut child)?;

        if let Some(Ok(Err(e))) = writer.map(JoinHandle::join) {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(ClassifierError::Engine(format!("cannot feed image: {e}")));
            }
        }
        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ClassifierError::Engine(format!(
                "`{}` exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }
}
