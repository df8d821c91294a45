use std::path::Path;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use latentbert_encoder::{EncoderConfig, EncoderInput, TransformerBuilder};
use log::{error, info};

/// Define the describe subcommand.
fn describe_subcommand() -> Command {
    Command::new("describe")
        .about("Print the structure and parameter count of an encoder configuration")
        .arg(
            Arg::new("config")
                .help("Path to the configuration JSON document")
                .required(true)
                .index(1),
        )
}

/// Define the encode subcommand.
fn encode_subcommand() -> Command {
    Command::new("encode")
        .about("Run a forward pass over one batch of token ids")
        .arg(
            Arg::new("config")
                .help("Path to the configuration JSON document")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("tokens")
                .short('t')
                .long("tokens")
                .value_name("IDS")
                .help("Comma-separated token ids")
                .required(true),
        )
        .arg(
            Arg::new("segments")
                .short('g')
                .long("segments")
                .value_name("IDS")
                .help("Comma-separated segment ids [default: all zeros]"),
        )
        .arg(
            Arg::new("mask")
                .short('m')
                .long("mask")
                .value_name("BITS")
                .help("Comma-separated 0/1 attention mask [default: no mask]"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("INT")
                .help("Seed for the deterministic parameter initialization")
                .default_value("42")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn parse_ids(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("invalid id: {part}"))
        })
        .collect()
}

fn parse_mask(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(|part| match part.trim() {
            "0" => Ok(0.0),
            "1" => Ok(1.0),
            other => Err(anyhow::anyhow!("invalid mask bit: {other}")),
        })
        .collect()
}

/// Run the describe command with the provided arguments
fn run_describe_command(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.get_one::<String>("config").unwrap();
    let config = EncoderConfig::from_file(Path::new(config_path))?;
    let model = TransformerBuilder::new(config.clone()).build()?;

    info!("Encoder configuration:");
    info!("   • Vocabulary size: {}", config.vocab_size);
    info!("   • Hidden width: {} (factorized embedding width {})", config.hidden, config.embedding);
    info!("   • Max sequence length: {}", config.max_len);
    info!("   • Latent array: {} x {}", config.num_latents, config.latent_dim);
    info!("   • Cross heads: {} (width {})", config.cross_heads, config.cross_head_width());
    info!("   • Latent heads: {} (width {})", config.latent_heads, config.latent_head_width());
    info!("   • Feed-forward width: {}", config.ffw);
    info!("   • Processing rounds: {} (shared weights)", config.process_layers);
    info!("   • Parameters: {}", model.parameter_count());

    Ok(())
}

/// Run the encode command with the provided arguments
fn run_encode_command(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.get_one::<String>("config").unwrap();
    let seed = *matches.get_one::<u64>("seed").unwrap();

    let token_ids = parse_ids(matches.get_one::<String>("tokens").unwrap())?;
    let seq_len = token_ids.len();

    let segment_ids = match matches.get_one::<String>("segments") {
        Some(raw) => parse_ids(raw)?,
        None => vec![0; seq_len],
    };
    let mask = matches.get_one::<String>("mask").map(|raw| parse_mask(raw)).transpose()?;

    let config = EncoderConfig::from_file(Path::new(config_path))?;
    let model = TransformerBuilder::new(config).with_seed(seed).build()?;

    let input = EncoderInput::new(&token_ids, &segment_ids, mask.as_deref(), 1, seq_len)?;
    let output = model.forward(&input)?;

    let latent = output.latent.data();
    let mean = latent.iter().sum::<f32>() / latent.len() as f32;
    let min = latent.iter().fold(f32::INFINITY, |acc, &v| acc.min(v));
    let max = latent.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));

    info!("Encoded {seq_len} tokens into latent shape {:?}", output.latent.shape());
    info!("   • mean {mean:.6}, min {min:.6}, max {max:.6}");

    Ok(())
}

fn execute_commands() -> Result<()> {
    // Initialize logger with clean format (no timestamp/module prefix)
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{}", record.args())
        })
        .init();

    let matches = Command::new("latentbert")
        .about("latentbert CLI: inspect and run the hybrid latent encoder")
        .subcommand(describe_subcommand())
        .subcommand(encode_subcommand())
        .get_matches();

    match matches.subcommand() {
        Some(("describe", matches)) => run_describe_command(matches),
        Some(("encode", matches)) => run_encode_command(matches),
        _ => anyhow::bail!("No subcommand specified. Use -h to print help information."),
    }
}

fn main() {
    if let Err(e) = execute_commands() {
        error!("Error: {e}");
        std::process::exit(1);
    }
}
