//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for Crystal.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Crystal - Personal assistant with hybrid local/remote models
///
/// Chat with an assistant persona, organize directories, schedule
/// reminders, or run the HTTP/WebSocket server.
#[derive(Parser, Debug)]
#[command(name = "crystal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "CRYSTAL_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message to an assistant
    Chat {
        /// The message to send
        message: String,

        /// Assistant to talk to
        #[arg(short, long, default_value = "ruby")]
        assistant: String,

        /// Also print routing metadata
        #[arg(long)]
        details: bool,
    },

    /// Show assistant status (all assistants when no name is given)
    Status {
        assistant: Option<String>,
    },

    /// Sort a directory into category folders
    Organize {
        directory: PathBuf,

        /// Prefix file names with the category instead of moving into subfolders
        #[arg(long)]
        no_subdirs: bool,
    },

    /// Find content-identical files under a directory
    Duplicates {
        directory: PathBuf,
    },

    /// Search a directory by file name (and optionally content)
    Search {
        directory: PathBuf,

        pattern: String,

        /// Also search inside text files
        #[arg(long)]
        content: bool,
    },

    /// Schedule a reminder and wait for it in the foreground
    Schedule {
        /// What to be reminded of
        description: String,

        /// When: cron, "every 10 minutes", "daily at 09:30", "in 2 hours", RFC 3339
        #[arg(short, long)]
        when: String,

        /// Job id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Bundled assistant management
    Assistants {
        #[command(subcommand)]
        subcommand: AssistantsSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Run the HTTP/WebSocket server
    Serve {
        /// Bind host (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Display version and build information
    Version,
}

/// Assistant subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AssistantsSubcommand {
    /// List configured and bundled assistants
    List,

    /// Write a bundled assistant's instructions into the instructions directory
    Install {
        name: String,

        /// Overwrite existing instructions
        #[arg(short, long)]
        force: bool,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration (API key masked)
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_chat_defaults() {
        let cli = Cli::parse_from(["crystal", "chat", "hello there"]);
        match cli.command {
            Commands::Chat {
                message,
                assistant,
                details,
            } => {
                assert_eq!(message, "hello there");
                assert_eq!(assistant, "ruby");
                assert!(!details);
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["crystal", "status", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert!(matches!(cli.command, Commands::Status { assistant: None }));
    }

    #[test]
    fn test_organize_flags() {
        let cli = Cli::parse_from(["crystal", "organize", "~/Downloads", "--no-subdirs"]);
        match cli.command {
            Commands::Organize {
                directory,
                no_subdirs,
            } => {
                assert_eq!(directory, PathBuf::from("~/Downloads"));
                assert!(no_subdirs);
            }
            _ => panic!("Expected Organize command"),
        }
    }

    #[test]
    fn test_schedule_requires_when() {
        assert!(Cli::try_parse_from(["crystal", "schedule", "stretch"]).is_err());

        let cli = Cli::parse_from(["crystal", "schedule", "stretch", "--when", "in 1 hour"]);
        match cli.command {
            Commands::Schedule { description, when, id } => {
                assert_eq!(description, "stretch");
                assert_eq!(when, "in 1 hour");
                assert!(id.is_none());
            }
            _ => panic!("Expected Schedule command"),
        }
    }

    #[test]
    fn test_assistants_install() {
        let cli = Cli::parse_from(["crystal", "assistants", "install", "ruby", "--force"]);
        match cli.command {
            Commands::Assistants {
                subcommand: AssistantsSubcommand::Install { name, force },
            } => {
                assert_eq!(name, "ruby");
                assert!(force);
            }
            _ => panic!("Expected Assistants Install command"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from(["crystal", "serve", "--host", "0.0.0.0", "-p", "9000"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["crystal", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["crystal", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
