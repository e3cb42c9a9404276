// tapfetch/src/cli/exec.rs
use std::process::{self, Command as StdCommand};

use clap::Args;
use tapfetch_common::config::Config;
use tapfetch_common::credential::CredentialResolver;
use tapfetch_common::error::{FetchError, Result};
use tracing::{debug, instrument};

/// Consuming phase: takes the hand-off token (or resolves one) and passes it to a
/// child process through its environment only.
#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Environment variable the child receives the token in
    #[arg(long, default_value = "GITHUB_TOKEN", value_name = "NAME")]
    pub env: String,

    /// Program and arguments to run
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}

impl ExecArgs {
    #[instrument(skip(self, config), fields(program = ?self.command.first()))]
    pub fn run(&self, config: &Config) -> Result<()> {
        let code = self.run_child(config)?;
        if code != 0 {
            debug!("Child exited with status {}", code);
            process::exit(code);
        }
        Ok(())
    }

    fn run_child(&self, config: &Config) -> Result<i32> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| FetchError::Validation("No program given to exec".to_string()))?;

        let resolver = CredentialResolver::new(config);
        let (credential, source) = resolver.resolve_for_consumer()?;
        debug!("Passing token from {} to '{}' as {}", source, program, self.env);

        let status = StdCommand::new(program)
            .args(args)
            .env(&self.env, credential.expose())
            .status()
            .map_err(|e| FetchError::CommandExec(format!("Failed to run '{program}': {e}")))?;
        Ok(status.code().unwrap_or(1))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use tapfetch_common::credential::write_handoff;
    use tapfetch_common::Credential;

    use super::*;

    fn exec_args(env: &str, script: &str) -> ExecArgs {
        ExecArgs {
            env: env.to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        }
    }

    #[test]
    fn handoff_token_reaches_child_and_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::isolated(dir.path());
        let credential = Credential::new("ghp_handed_over").unwrap();
        write_handoff(&config.handoff_path, &credential).unwrap();

        let out = dir.path().join("seen");
        let args = exec_args(
            "TAPFETCH_TEST_TOKEN",
            &format!("printf %s \"$TAPFETCH_TEST_TOKEN\" > '{}'", out.display()),
        );
        assert_eq!(args.run_child(&config).unwrap(), 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "ghp_handed_over");
        assert!(!config.handoff_path.exists());
    }

    #[test]
    fn falls_back_to_configured_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::isolated(dir.path());
        config.github_token = Some("github_pat_fallback".to_string());

        let args = exec_args("T", "test \"$T\" = github_pat_fallback");
        assert_eq!(args.run_child(&config).unwrap(), 0);
    }

    #[test]
    fn child_exit_code_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::isolated(dir.path());
        config.github_token = Some("github_pat_x".to_string());

        assert_eq!(exec_args("T", "exit 3").run_child(&config).unwrap(), 3);
    }

    #[test]
    fn missing_token_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::isolated(dir.path());
        let marker = dir.path().join("ran");
        let args = exec_args("T", &format!("touch '{}'", marker.display()));

        assert!(matches!(
            args.run_child(&config),
            Err(FetchError::MissingCredential(_))
        ));
        assert!(!marker.exists());
    }
}
