use clap::{Parser, Subcommand};

/// Start, kill and inspect jobs on a job server
#[derive(Debug, Parser)]
#[command(name = "jobctl", version)]
pub struct ArgParser {
    /// Base URL of the server
    #[arg(short = 's', long = "server", env = "JOB_SERVER", default_value = "http://127.0.0.1:9922")]
    pub server: String,
    /// Shared token the server expects
    #[arg(short = 't', long = "token", env = "JOB_TOKEN", hide_env_values = true)]
    pub token: String,
    /// The sub-command to use
    #[command(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Subcommand)]
pub enum SubCommand {
    /// start a new job
    Start {
        /// name of the script to run, without the `.sh` suffix
        job: String,
    },
    /// kill a running job
    Kill {
        /// id the server handed out when the job started
        id: u64,
    },
    /// show whether a job is still live
    Status {
        /// id the server handed out when the job started
        id: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start() {
        let args = ArgParser::try_parse_from(["jobctl", "--token", "t", "start", "build"]).unwrap();
        assert_eq!(args.token, "t");
        assert_eq!(
            args.sub_command,
            SubCommand::Start {
                job: "build".into()
            }
        );
    }

    #[test]
    fn parses_kill_with_server() {
        let args = ArgParser::try_parse_from([
            "jobctl",
            "-s",
            "http://jobs.internal:9922",
            "-t",
            "t",
            "kill",
            "12",
        ])
        .unwrap();
        assert_eq!(args.server, "http://jobs.internal:9922");
        assert_eq!(args.sub_command, SubCommand::Kill { id: 12 });
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(ArgParser::try_parse_from(["jobctl", "-t", "t", "status", "abc"]).is_err());
    }
}
