use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

const PACKAGE: &str = "ps2rx";
const BENCH: &str = "packet_bench";

/// Library test filters, one per core module
const MODULES: [(&str, &str); 4] = [
    ("core::dma", "DMA"),
    ("core::packet", "Packet"),
    ("core::vif", "VIF"),
    ("core::gsmem", "GS memory"),
];

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for ps2rx")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test, bench build, demo)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Quick checks before commit (fmt, clippy)
    Check {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy on the library, binary, tests and benches
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the library and the ps2rx binary
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
        /// Run only DMA tag and transport tests
        #[arg(long)]
        dma: bool,
        /// Run only packet builder tests
        #[arg(long)]
        packet: bool,
        /// Run only VIF code tests
        #[arg(long)]
        vif: bool,
        /// Run only GS memory manager tests
        #[arg(long)]
        gsmem: bool,
        /// Run only the end-to-end tests
        #[arg(long)]
        integration: bool,
        /// Run only the property tests
        #[arg(long)]
        property: bool,
    },
    /// Run the packet benchmarks
    Bench {
        /// Benchmark group to run (all when omitted)
        #[arg(value_enum)]
        group: Option<BenchGroup>,
        /// Compile the benchmarks without running them
        #[arg(long)]
        no_run: bool,
    },
    /// Build a sample packet and allocation with the ps2rx binary
    Demo {
        /// Transfer DMA tags with the data
        #[arg(long)]
        tte: bool,
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Pre-commit hook (fmt, clippy, library and integration tests)
    PreCommit,
    /// Install git hooks
    InstallHooks,
}

#[derive(Clone, Copy, ValueEnum)]
enum BenchGroup {
    /// Plain command buffer appends
    Packet,
    /// Tag building and chain walking
    SourceChain,
    /// V4_32 unpack packets
    Vif,
    /// Allocation with eviction
    Gsmem,
}

impl BenchGroup {
    /// Criterion name filter for the group
    fn filter(self) -> &'static str {
        match self {
            BenchGroup::Packet => "packet_add",
            BenchGroup::SourceChain => "source_chain",
            BenchGroup::Vif => "vif_unpack",
            BenchGroup::Gsmem => "gsmem_alloc",
        }
    }
}

/// Which tests `cargo x test` runs
#[derive(Default)]
struct TestSelection {
    doc: bool,
    ignored: bool,
    modules: [bool; 4],
    integration: bool,
    property: bool,
}

impl TestSelection {
    fn all() -> Self {
        Self::default()
    }

    fn is_everything(&self) -> bool {
        !self.modules.iter().any(|m| *m) && !self.integration && !self.property
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Check { verbose } => run_check(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test {
            doc,
            ignored,
            dma,
            packet,
            vif,
            gsmem,
            integration,
            property,
        } => run_test(&TestSelection {
            doc,
            ignored,
            modules: [dma, packet, vif, gsmem],
            integration,
            property,
        }),
        Commands::Bench { group, no_run } => run_bench(group, no_run),
        Commands::Demo { tte, release } => run_demo(tte, release),
        Commands::PreCommit => run_pre_commit(),
        Commands::InstallHooks => install_hooks(),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running ps2rx CI Pipeline ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task("Test", || run_test(&TestSelection::all()), verbose)?;
    run_task("Bench Build", || run_bench(None, true), verbose)?;
    run_task("Packet Demo", || run_ps2rx(&["packet"], false), verbose)?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_check(verbose: bool) -> Result<()> {
    println!("{}", "=== Running Quick Checks ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ Checks passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn cargo(subcommand: &str) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg(subcommand);
    cmd
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = cargo("fmt");
    cmd.arg("--all");

    if check {
        cmd.arg("--").arg("--check");
    }

    execute_command(&mut cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = cargo("clippy");
    cmd.args(["-p", PACKAGE, "--lib", "--bin", PACKAGE, "--tests", "--bench", BENCH]);

    if fix {
        cmd.arg("--fix");
    } else {
        cmd.args(["--", "-D", "warnings"]);
    }

    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = cargo("build");
    cmd.args(["-p", PACKAGE, "--lib", "--bin", PACKAGE]);

    if release {
        cmd.arg("--release");
    }

    execute_command(&mut cmd)
}

fn test_command(ignored: bool, target: &[&str], filter: Option<&str>) -> Command {
    let mut cmd = cargo("test");
    cmd.args(["-p", PACKAGE]).args(target);
    if let Some(filter) = filter {
        cmd.arg(filter);
    }
    if ignored {
        cmd.arg("--").arg("--ignored");
    }
    cmd
}

fn run_test(selection: &TestSelection) -> Result<()> {
    if selection.doc {
        return execute_command(&mut test_command(selection.ignored, &["--doc"], None));
    }

    if selection.is_everything() {
        return execute_command(&mut test_command(selection.ignored, &[], None));
    }

    let mut runs: Vec<(String, Command)> = Vec::new();
    for ((filter, name), enabled) in MODULES.iter().zip(selection.modules) {
        if enabled {
            let cmd = test_command(selection.ignored, &["--lib"], Some(*filter));
            runs.push((name.to_string(), cmd));
        }
    }
    if selection.integration {
        let cmd = test_command(selection.ignored, &["--test", "integration_test"], None);
        runs.push(("Integration".to_string(), cmd));
    }
    if selection.property {
        let cmd = test_command(selection.ignored, &["--test", "property_test"], None);
        runs.push(("Property".to_string(), cmd));
    }

    let single = runs.len() == 1;
    let mut failed = Vec::new();

    for (name, mut cmd) in runs {
        println!("{} Running {} tests...", "→".blue(), name.bold());

        match execute_command(&mut cmd) {
            Ok(_) => println!("{} {} tests passed\n", "✓".green(), name),
            Err(e) => {
                println!("{} {} tests failed\n", "✗".red(), name);
                if single {
                    return Err(e);
                }
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Tests failed in: {}", failed.join(", "))
    }
}

fn run_bench(group: Option<BenchGroup>, no_run: bool) -> Result<()> {
    let mut cmd = cargo("bench");
    cmd.args(["-p", PACKAGE, "--bench", BENCH]);

    if no_run {
        cmd.arg("--no-run");
    } else if let Some(group) = group {
        cmd.arg("--").arg(group.filter());
    }

    execute_command(&mut cmd)
}

fn run_demo(tte: bool, release: bool) -> Result<()> {
    println!("{}", "=== ps2rx Demo ===".bold().blue());
    println!(
        "{} Build mode: {}",
        "→".blue(),
        if release {
            "release".green().bold()
        } else {
            "debug".yellow().bold()
        }
    );
    println!();

    let start = Instant::now();

    // Sample VIF1 chain
    let mut packet = Vec::from(["packet"]);
    if tte {
        packet.push("--tte");
    }
    run_ps2rx(&packet, release)?;
    println!();

    // Framebuffers and textures in the default slot layout
    run_ps2rx(
        &[
            "alloc",
            "--frames",
            "3",
            "640x448:psm32",
            "256x256:psm8",
            "256x256:psm4",
            "128x128:psm16",
        ],
        release,
    )?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ Demo completed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_ps2rx(args: &[&str], release: bool) -> Result<()> {
    let mut cmd = cargo("run");
    cmd.args(["-p", PACKAGE, "--bin", PACKAGE]);

    if release {
        cmd.arg("--release");
    }

    cmd.arg("--").args(args);

    if let Err(e) = execute_command(&mut cmd) {
        let subcommand = args.first().copied().unwrap_or("");
        println!("\n{} ps2rx {} failed", "✗".red().bold(), subcommand);
        return Err(e);
    }

    Ok(())
}

fn run_pre_commit() -> Result<()> {
    println!("{}", "=== Pre-commit Checks ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), false)?;
    run_task("Clippy", || run_clippy(false), false)?;
    run_task(
        "Library Tests",
        || execute_command(&mut test_command(false, &["--lib"], None)),
        false,
    )?;
    run_task(
        "Integration Tests",
        || execute_command(&mut test_command(false, &["--test", "integration_test"], None)),
        false,
    )?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ Pre-commit checks passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn install_hooks() -> Result<()> {
    use std::fs;

    println!("{}", "Installing git hooks...".bold());

    let hook_content = r#"#!/bin/sh
# Installed by cargo x install-hooks (ps2rx)
set -e

cargo x pre-commit
"#;

    let hook_path = ".git/hooks/pre-commit";
    fs::write(hook_path, hook_content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(hook_path, perms)?;
    }

    println!("{}", "✓ Git hooks installed".green());
    println!("  Pre-commit hook will run: fmt, clippy, library and integration tests");

    Ok(())
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);

    let start = Instant::now();

    match task() {
        Ok(_) => {
            let elapsed = start.elapsed();
            println!(
                "{} {}",
                "✓".green().bold(),
                if verbose {
                    format!("({:.2}s)", elapsed.as_secs_f64())
                } else {
                    String::new()
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }

    Ok(())
}
