use anyhow::{Context, Result};
use cgkit_cli::commands::{
    exit_code, parse_assignment, parse_group_spec, stage_assignments, Assignment, GroupSpec,
    EXIT_FAILURE, EXIT_OK,
};
use cgkit_cli::{apply_groups, Config};
use cgkit_core::{Controller, Group, Hierarchy, Pid, Tunable, ValueKind, VERSION};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use tracing::{info, warn};

/// cgkit - manage cgroup v1 groups for the cpu, cpuset and blkio controllers
#[derive(Parser, Debug)]
#[command(name = "cgkit")]
#[command(version = VERSION)]
#[command(about = "Create, tune and join cgroup v1 groups", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/cgkit/config.toml")]
    config: PathBuf,

    /// Locate controller mounts in /proc/mounts instead of the configured roots
    #[arg(long)]
    discover: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a group exists (exit 1 when it does not)
    Exists {
        controller: Controller,
        group: String,
    },

    /// Create a group and write the given tunables
    Create {
        controller: Controller,
        group: String,
        /// Tunable to write, as TUNABLE=VALUE (repeatable)
        #[arg(short, long = "set", value_parser = parse_assignment)]
        set: Vec<Assignment>,
    },

    /// Write tunables to an existing group
    Modify {
        controller: Controller,
        group: String,
        /// Tunable to write, as TUNABLE=VALUE (repeatable)
        #[arg(short, long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<Assignment>,
    },

    /// Remove an empty group
    Delete {
        controller: Controller,
        group: String,
    },

    /// Move a process into a group
    Attach {
        controller: Controller,
        group: String,
        /// Process to move (default: this process)
        #[arg(short, long)]
        pid: Option<i32>,
    },

    /// Move a process back to the root group
    Detach {
        controller: Controller,
        group: String,
        /// Process to move (default: this process)
        #[arg(short, long)]
        pid: Option<i32>,
    },

    /// Print tunable values of a group
    Get {
        controller: Controller,
        group: String,
        /// Single tunable to print (default: every tunable of the controller)
        tunable: Option<Tunable>,
    },

    /// List the PIDs in a group
    Members {
        controller: Controller,
        group: String,
    },

    /// Create or modify every group in the configuration file
    Apply,

    /// Join groups, then run a command in them
    Exec {
        /// Group to join, as CONTROLLER:GROUP (repeatable)
        #[arg(short, long = "group", value_parser = parse_group_spec, required = true)]
        groups: Vec<GroupSpec>,
        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Show where each controller is mounted
    Mounts,

    /// Generate default configuration file
    GenerateConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },

    /// Print shell completions
    Completions { shell: Shell },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    // neither needs a configuration or logging
    match &cli.command {
        Commands::GenerateConfig { output } => return generate_config(output),
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "cgkit", &mut std::io::stdout());
            return Ok(EXIT_OK);
        }
        _ => {}
    }

    let (mut config, from_file) = load_config(&cli.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
    if cli.discover {
        config.hierarchy.discover = true;
    }

    let _guard = cgkit_cli::logging::init_logging(&config.logging)?;
    if from_file {
        info!("Configuration loaded from {}", cli.config.display());
    } else {
        warn!(
            "Configuration file not found: {}, using defaults",
            cli.config.display()
        );
    }

    let hierarchy = config.resolve_hierarchy()?;

    match cli.command {
        Commands::Exists { controller, group } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            if group.exists() {
                println!("{} {}:{} exists", "✅".green(), controller, group.name());
                Ok(EXIT_OK)
            } else {
                println!("{} {}:{} does not exist", "⚠️ ".yellow(), controller, group.name());
                Ok(EXIT_FAILURE)
            }
        }
        Commands::Create {
            controller,
            group,
            set,
        } => {
            let mut group = Group::new(&hierarchy, controller, &group)?;
            stage_assignments(&mut group, &set)?;
            group
                .create()
                .with_context(|| format!("Failed to create {}:{}", controller, group.name()))?;
            println!("{} Created {}:{}", "✅".green(), controller, group.name());
            Ok(EXIT_OK)
        }
        Commands::Modify {
            controller,
            group,
            set,
        } => {
            let mut group = Group::new(&hierarchy, controller, &group)?;
            stage_assignments(&mut group, &set)?;
            group
                .modify()
                .with_context(|| format!("Failed to modify {}:{}", controller, group.name()))?;
            println!("{} Modified {}:{}", "✅".green(), controller, group.name());
            Ok(EXIT_OK)
        }
        Commands::Delete { controller, group } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            group
                .delete()
                .with_context(|| format!("Failed to delete {}:{}", controller, group.name()))?;
            println!("{} Deleted {}:{}", "✅".green(), controller, group.name());
            Ok(EXIT_OK)
        }
        Commands::Attach {
            controller,
            group,
            pid,
        } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            match pid {
                Some(pid) => group.attach_pid(Pid::from_raw(pid))?,
                None => group.attach()?,
            }
            println!("{} Attached to {}:{}", "✅".green(), controller, group.name());
            Ok(EXIT_OK)
        }
        Commands::Detach {
            controller,
            group,
            pid,
        } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            match pid {
                Some(pid) => group.detach_pid(Pid::from_raw(pid))?,
                None => group.detach()?,
            }
            println!("{} Detached from {}:{}", "✅".green(), controller, group.name());
            Ok(EXIT_OK)
        }
        Commands::Get {
            controller,
            group,
            tunable,
        } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            let tunables = match tunable {
                Some(tunable) => vec![tunable],
                None => controller.tunables().to_vec(),
            };
            for tunable in tunables {
                print_tunable(&group, tunable)?;
            }
            Ok(EXIT_OK)
        }
        Commands::Members { controller, group } => {
            let group = Group::new(&hierarchy, controller, &group)?;
            for pid in group.members()? {
                println!("{}", pid);
            }
            Ok(EXIT_OK)
        }
        Commands::Apply => {
            println!("{}", "=== cgkit apply ===".green().bold());
            for outcome in apply_groups(&hierarchy, &config.groups)? {
                println!(
                    "  {:<7} {:<30} {}",
                    outcome.controller,
                    outcome.group,
                    outcome.action.to_string().cyan()
                );
            }
            Ok(EXIT_OK)
        }
        Commands::Exec { groups, command } => exec_in_groups(&hierarchy, &groups, &command),
        Commands::Mounts => {
            print_mounts(&hierarchy);
            Ok(EXIT_OK)
        }
        Commands::GenerateConfig { .. } | Commands::Completions { .. } => Ok(EXIT_OK),
    }
}

fn print_tunable(group: &Group, tunable: Tunable) -> Result<()> {
    if tunable.kind() == ValueKind::DeviceRate {
        let rules = group.read_devices(tunable)?;
        if rules.is_empty() {
            println!("{} = {}", tunable.file_name(), "-".dimmed());
        }
        for rule in rules {
            println!("{} = {}", tunable.file_name(), rule);
        }
    } else {
        match group.read(tunable)? {
            Some(value) => println!("{} = {}", tunable.file_name(), value),
            None => println!("{} = {}", tunable.file_name(), "-".dimmed()),
        }
    }
    Ok(())
}

fn print_mounts(hierarchy: &Hierarchy) {
    println!("{}", "=== cgroup v1 mounts ===".green().bold());
    for controller in Controller::ALL {
        let root = hierarchy.mount_root(controller);
        let status = if hierarchy.is_mounted(controller) {
            "mounted".green()
        } else {
            "missing".red()
        };
        println!("  {:<7} {:<40} {}", controller, root.display(), status);
    }
    println!("  membership file: {}", hierarchy.membership_file.file_name());
}

/// Attach this process to every group, then replace it with `command`
fn exec_in_groups(hierarchy: &Hierarchy, groups: &[GroupSpec], command: &[String]) -> Result<u8> {
    for spec in groups {
        let group = Group::with_name(hierarchy, spec.controller, spec.name.clone());
        group
            .attach()
            .with_context(|| format!("Failed to join {}:{}", spec.controller, spec.name))?;
    }

    let (program, args) = command
        .split_first()
        .context("No command given")?;

    info!(program = %program, groups = groups.len(), "Executing in cgroups");

    // exec only returns on failure
    let err = Command::new(program).args(args).exec();
    Err(err).with_context(|| format!("Failed to execute {}", program))
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = Config::load_from_file(path)?;
        Ok((config, true))
    } else {
        Ok((Config::default(), false))
    }
}

/// Generate default configuration file
fn generate_config(output: &Path) -> Result<u8> {
    Config::example()
        .save_to_file(output)
        .context("Failed to save configuration file")?;

    println!(
        "{} Configuration written to {}",
        "✅".green(),
        output.display()
    );
    Ok(EXIT_OK)
}
