//! Command scripts for Slurm clusters
//!
//! Only generation lives here; the commands are meant to be run in a login shell on
//! one of the [`SlurmHost`]s.

use std::fmt;
use std::str::FromStr;

/// Known cluster login hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlurmHost {
    Beluga,
    Graham,
    Helios,
    Cedar,
}

impl SlurmHost {
    pub const ALL: [SlurmHost; 4] = [Self::Beluga, Self::Graham, Self::Helios, Self::Cedar];

    pub fn hostname(self) -> &'static str {
        match self {
            Self::Beluga => "beluga.computecanada.ca",
            Self::Graham => "graham.sharcnet.ca",
            Self::Helios => "helios.calculquebec.ca",
            Self::Cedar => "cedar.computecanada.ca",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Beluga => "beluga",
            Self::Graham => "graham",
            Self::Helios => "helios",
            Self::Cedar => "cedar",
        }
    }
}

impl fmt::Display for SlurmHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hostname())
    }
}

impl FromStr for SlurmHost {
    type Err = String;

    /// Accepts the short name or the full hostname
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|host| host.name() == s || host.hostname() == s)
            .ok_or_else(|| format!("unknown slurm host '{s}'"))
    }
}

/// Commands that refresh the repository, submit and cancel jobs, then list the queue
///
/// `bash_file_to_run` is submitted `run_count` times with `sbatch`.
pub fn generate_slurm_cmd(
    repository_root: &str,
    username: &str,
    bash_file_to_run: Option<&str>,
    run_count: usize,
    job_to_cancel: Option<&str>,
) -> Vec<String> {
    let mut cmd = vec![
        format!("cd {repository_root}"),
        "git pull".to_string(),
        "ls".to_string(),
    ];
    if let Some(bash_file) = bash_file_to_run {
        cmd.extend(std::iter::repeat_n(format!("sbatch {bash_file}"), run_count));
    }
    if let Some(job) = job_to_cancel {
        cmd.push(format!("scancel {job}"));
    }
    cmd.push(format!("squeue -u {username}"));
    cmd
}

/// Join commands into one newline-separated script
pub fn render_script(cmd: &[String]) -> String {
    cmd.join("\n")
}
