//! Construction of client and server invocations.
//!
//! Both protocol variants of a scenario get the same argv apart from the
//! target address, the `--h3` flag and the artifact path.

use std::path::{Path, PathBuf};

use protobench_core::protocol::Protocol;
use protobench_core::scenario::Scenario;

use crate::config::EngineConfig;

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Shell-like rendering for display and logs. Not re-parseable.
    pub fn render(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// The program's file name, used to label errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Resolve a binary name against the configured directory, or leave it bare
/// for a `PATH` lookup.
pub fn resolve_program(config: &EngineConfig, binary: &str) -> PathBuf {
    match &config.bin_dir {
        Some(dir) => dir.join(binary),
        None => PathBuf::from(binary),
    }
}

/// Target URL a client of `protocol` is pointed at.
pub fn target_addr(config: &EngineConfig, protocol: Protocol) -> &str {
    match protocol {
        Protocol::H2 => &config.h2_addr,
        Protocol::H3 => &config.h3_addr,
    }
}

/// `<binary> --addr <addr> --h3=<bool> --csv <artifact> --quiet [--mode cold]`
pub fn client_command(
    config: &EngineConfig,
    scenario: Scenario,
    protocol: Protocol,
    artifact: &Path,
) -> CommandSpec {
    let mut args = vec![
        "--addr".to_string(),
        target_addr(config, protocol).to_string(),
        format!("--h3={}", protocol.is_h3()),
        "--csv".to_string(),
        artifact.display().to_string(),
        "--quiet".to_string(),
    ];
    args.extend(scenario.mode_args().iter().map(|a| a.to_string()));

    CommandSpec {
        program: resolve_program(config, scenario.binary_name()),
        args,
        env: config.client_env.clone(),
    }
}

/// `bench-server-<protocol> --addr <listen> --cert <cert> --key <key>`
pub fn server_command(config: &EngineConfig, protocol: Protocol) -> CommandSpec {
    let listen = match protocol {
        Protocol::H2 => &config.h2_listen,
        Protocol::H3 => &config.h3_listen,
    };
    CommandSpec {
        program: resolve_program(config, &format!("bench-server-{}", protocol.as_str())),
        args: vec![
            "--addr".to_string(),
            listen.clone(),
            "--cert".to_string(),
            config.server_cert.clone(),
            "--key".to_string(),
            config.server_key.clone(),
        ],
        env: Vec::new(),
    }
}
