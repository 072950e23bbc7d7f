use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::ResolveError;

/// Looks up one address for a domain, optionally through a specific server.
pub trait Resolve: Send + Sync {
    /// `Ok(None)` means the server answered without a record.
    fn resolve(
        &self,
        domain: &str,
        server: Option<&str>,
    ) -> impl Future<Output = Result<Option<String>, ResolveError>> + Send;
}

/// Shells out to `dig +short`.
#[derive(Debug, Clone)]
pub struct DigResolver {
    program: String,
}

impl DigResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, domain: &str, server: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("+short");
        if let Some(server) = server {
            cmd.arg(format!("@{server}"));
        }
        cmd.arg(domain)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for DigResolver {
    fn default() -> Self {
        Self::new("dig")
    }
}

impl Resolve for DigResolver {
    async fn resolve(
        &self,
        domain: &str,
        server: Option<&str>,
    ) -> Result<Option<String>, ResolveError> {
        let output = self
            .command(domain, server)
            .output()
            .await
            .map_err(ResolveError::Spawn)?;

        if !output.status.success() {
            return Err(ResolveError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(first_answer(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn first_answer(stdout: &str) -> Option<String> {
    stdout.split_whitespace().next().map(str::to_string)
}
