use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use vdl_ledger::{Ledger, ValidationReport};
use vdl_server::{ServerConfig, VdlServer};
use vdl_store::BlockStore;
use vdl_types::{Block, Confidence, Label, Verdict};

use crate::cli::*;

type CliLedger = Ledger<Box<dyn BlockStore>>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Init(_) => cmd_init(&config, format),
        Command::Record(args) => cmd_record(&config, format, args),
        Command::Log(args) => cmd_log(&config, format, args),
        Command::Show(args) => cmd_show(&config, format, args),
        Command::Verify(_) => cmd_verify(&config, format),
        Command::Summary(_) => cmd_summary(&config, format),
        Command::Serve(args) => cmd_serve(config, args),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn open_ledger(config: &ServerConfig) -> anyhow::Result<CliLedger> {
    let ledger = Ledger::new(config.open_store()?);
    ledger.initialize().context("failed to initialize ledger")?;
    Ok(ledger)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn label_colored(label: Label) -> colored::ColoredString {
    match label {
        Label::Real => label.as_str().green(),
        Label::Fake => label.as_str().red(),
        Label::Genesis => label.as_str().cyan(),
    }
}

fn print_block(block: &Block) {
    println!(
        "{}  {}",
        format!("block #{}", block.index).yellow().bold(),
        block.hash.to_hex().dimmed()
    );
    println!("  Label:      {}", label_colored(block.label).bold());
    println!("  Confidence: {}", block.confidence);
    println!("  Time:       {}", block.timestamp.to_rfc3339());
    println!("  Prev:       {}", block.prev_hash);
}

fn cmd_init(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let history = ledger.history()?;
    let genesis = history.first().context("ledger has no genesis block")?;
    if format == OutputFormat::Json {
        print_json(genesis)?;
    } else {
        let location = config
            .chain_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".into());
        println!("{} Ledger ready at {}", "✓".green().bold(), location.bold());
        println!("  Blocks:  {}", history.len());
        println!("  Genesis: {}", genesis.hash.to_hex().cyan());
    }
    ledger.shutdown()?;
    Ok(())
}

fn cmd_record(config: &ServerConfig, format: OutputFormat, args: RecordArgs) -> anyhow::Result<()> {
    let is_real = args.label == VerdictLabel::Real;
    let verdict = match args.confidence {
        Some(c) => {
            let label = if is_real { Label::Real } else { Label::Fake };
            Verdict::new(label, Confidence::new(c)?)?
        }
        None => Verdict::from_prediction(is_real),
    };

    let ledger = open_ledger(config)?;
    let block = ledger.record(&verdict)?;
    if format == OutputFormat::Json {
        print_json(&block)?;
    } else {
        println!(
            "{} Recorded {} as block {}",
            "✓".green().bold(),
            verdict,
            format!("#{}", block.index).yellow()
        );
        println!("  Hash: {}", block.hash.to_hex().dimmed());
    }
    ledger.shutdown()?;
    Ok(())
}

fn cmd_log(config: &ServerConfig, format: OutputFormat, args: LogArgs) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let history = ledger.history()?;
    let newest: Vec<&Block> = history.iter().rev().take(args.limit).collect();

    if format == OutputFormat::Json {
        print_json(&newest)?;
    } else if args.oneline {
        for block in &newest {
            println!(
                "{} {} {} {}",
                format!("#{}", block.index).yellow(),
                block.hash.short_hex().dimmed(),
                label_colored(block.label),
                block.confidence
            );
        }
    } else {
        for block in &newest {
            print_block(block);
            println!();
        }
    }
    ledger.shutdown()?;
    Ok(())
}

fn cmd_show(config: &ServerConfig, format: OutputFormat, args: ShowArgs) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let block = ledger
        .block(args.index)?
        .with_context(|| format!("no block at index {}", args.index))?;
    if format == OutputFormat::Json {
        print_json(&block)?;
    } else {
        print_block(&block);
    }
    ledger.shutdown()?;
    Ok(())
}

fn cmd_verify(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let report = ledger.validate()?;
    ledger.shutdown()?;

    if format == OutputFormat::Json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    match report.first_violation() {
        None => Ok(()),
        Some(v) => anyhow::bail!("chain integrity violated at block {}", v.index),
    }
}

fn print_report(report: &ValidationReport) {
    if report.is_valid() {
        println!("{} Hash chain integrity verified", "✓".green().bold());
    } else {
        println!("{} Hash chain integrity {}", "✗".red().bold(), "FAILED".red().bold());
    }
    println!("  Blocks: {}", report.block_count);
    if let Some(head) = report.head {
        println!("  Head:   {}", head.to_hex().dimmed());
    }
    for v in &report.violations {
        println!("  {} block #{} {:?}: {}", "✗".red(), v.index, v.kind, v.description);
    }
    for w in &report.warnings {
        println!("  {} block #{}: {}", "!".yellow(), w.index, w.description);
    }
}

fn cmd_summary(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let summary = ledger.summary()?;
    ledger.shutdown()?;

    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    println!("Blocks:   {}", summary.block_count.to_string().bold());
    println!("Real:     {}", summary.real_count.to_string().green());
    println!("Fake:     {}", summary.fake_count.to_string().red());
    if let Some(ratio) = summary.fake_ratio() {
        println!("Fake %:   {:.1}", ratio * 100.0);
    }
    if let (Some(first), Some(last)) = (summary.first_verdict_at, summary.last_verdict_at) {
        println!("Verdicts: {} .. {}", first.to_rfc3339(), last.to_rfc3339());
    }
    Ok(())
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "VDL server on {} (data: {})",
        config.bind_addr.to_string().bold(),
        config.data_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(VdlServer::new(config).serve())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn run(dir: &tempfile::TempDir, args: &[&str]) -> anyhow::Result<()> {
        let data_dir = dir.path().to_str().unwrap();
        let mut argv = vec!["vdl", "--data-dir", data_dir];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    fn stored(dir: &tempfile::TempDir) -> Vec<Block> {
        let config = ServerConfig {
            data_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        open_ledger(&config).unwrap().history().unwrap()
    }

    #[test]
    fn init_then_record() {
        let dir = tempfile::tempdir().unwrap();
        run(&dir, &["init"]).unwrap();
        run(&dir, &["record", "--label", "real"]).unwrap();
        run(&dir, &["record", "--label", "fake", "--confidence", "0.25"]).unwrap();

        let blocks = stored(&dir);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].label, Label::Real);
        assert_eq!(blocks[1].confidence, Confidence::ONE);
        assert_eq!(blocks[2].label, Label::Fake);
        assert_eq!(blocks[2].confidence.canonical(), "0.25");
    }

    #[test]
    fn verify_passes_on_fresh_chain() {
        let dir = tempfile::tempdir().unwrap();
        run(&dir, &["record", "-l", "real"]).unwrap();
        run(&dir, &["--format", "json", "verify"]).unwrap();
        run(&dir, &["summary"]).unwrap();
        run(&dir, &["log", "--oneline"]).unwrap();
    }

    #[test]
    fn record_rejects_out_of_range_confidence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir, &["record", "-l", "real", "--confidence", "1.5"]).is_err());
        assert_eq!(stored(&dir).len(), 1);
    }

    #[test]
    fn show_missing_block_fails() {
        let dir = tempfile::tempdir().unwrap();
        run(&dir, &["show", "0"]).unwrap();
        assert!(run(&dir, &["show", "5"]).is_err());
    }
}
