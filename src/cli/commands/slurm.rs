use crate::slurm::{SlurmHost, generate_slurm_cmd, render_script};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct SlurmArgs {
    #[command(subcommand)]
    pub command: SlurmCommand,
}

#[derive(Subcommand)]
pub enum SlurmCommand {
    /// Print the shell commands that refresh a checkout and submit jobs
    Generate {
        /// Repository root on the cluster
        #[arg(long)]
        root: String,
        /// Account whose queue is listed
        #[arg(short, long)]
        user: String,
        /// Job script submitted with sbatch
        #[arg(short, long)]
        script: Option<String>,
        /// Number of submissions of the script
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Job id to scancel
        #[arg(long)]
        cancel: Option<String>,
    },
    /// List the known cluster hosts
    Hosts,
}

pub fn execute(args: SlurmArgs) -> Result<()> {
    match args.command {
        SlurmCommand::Generate {
            root,
            user,
            script,
            count,
            cancel,
        } => {
            let cmd = generate_slurm_cmd(&root, &user, script.as_deref(), count, cancel.as_deref());
            println!("{}", render_script(&cmd));
        }
        SlurmCommand::Hosts => {
            for host in SlurmHost::ALL {
                println!("{:<8} {}", host.name(), host.hostname());
            }
        }
    }
    Ok(())
}
