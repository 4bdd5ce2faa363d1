use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rg_probe::{emit_help, register_rule, Buffer, Registration, ValueKind, Variable};
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;

/// rg-probe - run telemetry extraction rules against a byte stream
///
/// Feeds one sample (command output, file contents, or stdin) through a
/// buffer, completes one interval, and prints every rule's value.
#[derive(Parser, Debug)]
#[command(name = "rg-probe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extraction rule, repeatable (e.g. "read:scanf:num:value=%d")
    #[arg(short = 'r', long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// Command whose standard output is fed through the buffer
    #[arg(short = 'c', long = "command", value_name = "CMD", conflicts_with = "file")]
    command: Option<String>,

    /// File whose contents are fed through the buffer (default: stdin)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Print the supported rule templates and exit
    #[arg(long = "help-rules")]
    help_rules: bool,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if cli.help_rules {
        print!("{}", emit_help("exec", "probe"));
        return Ok(());
    }
    anyhow::ensure!(
        !cli.rules.is_empty(),
        "at least one --rule is required (see --help-rules)"
    );

    let mut buffer = Buffer::new();
    let mut outputs: Vec<(Rc<Variable>, Registration, String)> = Vec::new();
    for (index, rule) in cli.rules.iter().enumerate() {
        let var = Variable::new(format!("probe{}", index));
        let reg = register_rule(&mut buffer, rule, Some(&var))
            .with_context(|| format!("invalid rule `{}`", rule))?;
        outputs.push((var, reg, rule.clone()));
    }

    let bytes = acquire(&cli)?;
    info!("acquired {} bytes", bytes.len());
    buffer.feed(&bytes);
    buffer.complete_interval();

    for (var, reg, rule) in &outputs {
        if !var.take_dirty() {
            info!("rule `{}` produced no fresh value this interval", rule);
        }
        match reg.kind() {
            ValueKind::Numeric => {
                println!("{} = {}", var.name(), reg.number().unwrap_or(f64::NAN))
            }
            ValueKind::Text => {
                println!("{} = {}", var.name(), reg.text().unwrap_or_default())
            }
        }
    }
    Ok(())
}

/// Acquire one sample of raw bytes. This is the host side of the pipeline:
/// the extraction core itself never touches I/O.
fn acquire(cli: &Cli) -> Result<Vec<u8>> {
    if let Some(command) = &cli.command {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .with_context(|| format!("failed to run command `{}`", command))?;
        Ok(output.stdout)
    } else if let Some(path) = &cli.file {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    } else {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read stdin")?;
        Ok(bytes)
    }
}
