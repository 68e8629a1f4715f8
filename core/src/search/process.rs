//! Search process abstraction and the tokio-backed ripgrep implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 8 * 1024;
const MAX_STDERR_BYTES: usize = 16 * 1024;

/// Pull-based stream of raw stdout chunks
pub type ChunkStream = BoxStream<'static, io::Result<Bytes>>;

/// What to launch for one search session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    pub command: PathBuf,
    pub args: Vec<OsString>,
}

impl ProcessOptions {
    pub fn new<P: Into<PathBuf>>(command: P) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// How a search process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Captured standard error, possibly truncated
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running search process owned by exactly one session
#[async_trait]
pub trait SearchProcess: Send {
    /// Take the stdout stream; only the first call returns it
    fn take_output(&mut self) -> Option<ChunkStream>;

    /// Terminate the process and reap it
    async fn kill(&mut self) -> io::Result<()>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> io::Result<ProcessExit>;
}

/// Launches search processes
pub trait ProcessFactory: Send + Sync {
    fn spawn(&self, options: &ProcessOptions) -> io::Result<Box<dyn SearchProcess>>;
}

/// Readable description of a failure to launch the search binary
pub fn spawn_error_message(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::NotFound => "could not find the ripgrep (rg) binary".to_string(),
        io::ErrorKind::PermissionDenied => "could not execute the ripgrep (rg) binary".to_string(),
        _ => format!("an error occurred while starting ripgrep: {}", error),
    }
}

/// Spawns real ripgrep processes through `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct RipgrepProcessFactory;

impl RipgrepProcessFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessFactory for RipgrepProcessFactory {
    fn spawn(&self, options: &ProcessOptions) -> io::Result<Box<dyn SearchProcess>> {
        let program = &options.command;

        let mut cmd = Command::new(program);
        cmd.args(&options.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        tracing::debug!(program = %program.display(), pid = ?child.id(), "spawned search process");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stdout"))?;
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(collect_stderr(pipe)));

        Ok(Box::new(RipgrepProcess {
            child,
            output: Some(chunk_stream(stdout)),
            stderr,
        }))
    }
}

struct RipgrepProcess {
    child: Child,
    output: Option<ChunkStream>,
    stderr: Option<JoinHandle<String>>,
}

#[async_trait]
impl SearchProcess for RipgrepProcess {
    fn take_output(&mut self) -> Option<ChunkStream> {
        self.output.take()
    }

    async fn kill(&mut self) -> io::Result<()> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already exited and reaped
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(ProcessExit {
            code: status.code(),
            stderr,
        })
    }
}

fn chunk_stream<R>(reader: R) -> ChunkStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

async fn collect_stderr<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                // Keep draining past the cap so the process never blocks on stderr
                let room = MAX_STDERR_BYTES.saturating_sub(captured.len());
                captured.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&captured).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_messages() {
        let not_found = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(
            spawn_error_message(&not_found),
            "could not find the ripgrep (rg) binary"
        );

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            spawn_error_message(&denied),
            "could not execute the ripgrep (rg) binary"
        );

        let other = io::Error::other("boom");
        assert!(spawn_error_message(&other).contains("boom"));
    }

    #[test]
    fn test_process_options_builder() {
        let options = ProcessOptions::new("rg").arg("--json").args(["foo", "/tmp"]);
        assert_eq!(options.command, PathBuf::from("rg"));
        assert_eq!(options.args.len(), 3);
        assert_eq!(options.args[1], OsString::from("foo"));
    }

    #[tokio::test]
    async fn test_chunk_stream_reads_until_eof() {
        let data: &[u8] = b"line one\nline two\n";
        let chunks: Vec<_> = chunk_stream(data).collect().await;

        let joined: Vec<u8> = chunks
            .into_iter()
            .map(|c| c.unwrap())
            .flat_map(|b| b.to_vec())
            .collect();
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let factory = RipgrepProcessFactory::new();
        let options = ProcessOptions::new("/nonexistent/wsgrep-test/rg").arg("--version");

        let err = match factory.spawn(&options) {
            Ok(_) => panic!("spawning a missing binary should fail"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process_output_and_exit() {
        let factory = RipgrepProcessFactory::new();
        let options = ProcessOptions::new("sh")
            .arg("-c")
            .arg("printf 'hello\\n'; echo oops >&2; exit 3");

        let mut process = factory.spawn(&options).unwrap();
        let output = process.take_output().unwrap();
        assert!(process.take_output().is_none());

        let chunks: Vec<_> = output.collect().await;
        let stdout: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect();
        assert_eq!(stdout, b"hello\n");

        let exit = process.wait().await.unwrap();
        assert_eq!(exit.code, Some(3));
        assert_eq!(exit.stderr, "oops");
        assert!(!exit.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_stops_long_running_process() {
        let factory = RipgrepProcessFactory::new();
        let mut process = factory
            .spawn(&ProcessOptions::new("sleep").arg("30"))
            .unwrap();

        process.kill().await.unwrap();
        let exit = process.wait().await.unwrap();
        assert_eq!(exit.code, None);
    }
}
