//! imagine-cache — 提示词指纹计算、图像生成与缓存查询的命令行工具
//!
//! Usage:
//!   imagine-cache fingerprint <prompt>                 Print the cache key of a prompt
//!   imagine-cache resolve <prompt> [--out <file>]      Get or generate the image
//!   imagine-cache submit <prompt>                      Record a prompt, print its key
//!   imagine-cache lookup <fingerprint> [--out <file>]  Fetch by key alone
//!   imagine-cache state <fingerprint>                  Show which records exist

use anyhow::{bail, Context};
use imagine_cache::cache::{fingerprint, CacheConfig, Fingerprint, GenerationCache};
use imagine_cache::generator::WorkersAiGenerator;
use imagine_cache::store::WorkersKvStore;
use imagine_cache::Resolved;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "fingerprint" => cmd_fingerprint(&args[2..]),
        "resolve" => cmd_resolve(&args[2..]).await,
        "submit" => cmd_submit(&args[2..]).await,
        "lookup" => cmd_lookup(&args[2..]).await,
        "state" => cmd_state(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"imagine-cache — 内容寻址图像生成缓存命令行工具

USAGE:
    imagine-cache <COMMAND> [OPTIONS]

COMMANDS:
    fingerprint <prompt>                 Print the SHA-256 cache key of a prompt
    resolve <prompt> [--out <file>]      Return the cached image or generate it
    submit <prompt>                      Record the prompt only and print its key
    lookup <fingerprint> [--out <file>]  Fetch an image by key (never generates for unknown keys)
    state <fingerprint>                  Show which records exist for a key
    version                              Show version information
    help                                 Show this help message

OPTIONS:
    --config <file>                      YAML cache configuration (otherwise IMAGINE_* env)

ENVIRONMENT:
    CLOUDFLARE_ACCOUNT_ID                Account owning the KV namespace and AI binding
    CLOUDFLARE_API_TOKEN                 API token
    IMAGINE_KV_NAMESPACE_ID              KV namespace holding prompt and image records
    IMAGINE_MODEL                        Text-to-image model id
    IMAGINE_WRITE_MODE                   eager | lazy
    RUST_LOG                             Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!("imagine-cache {}", env!("CARGO_PKG_VERSION"));
}

const VALUE_FLAGS: &[&str] = &["--out", "--config"];

/// Positional arguments, with `--flag value` pairs removed. Unknown flags are rejected.
fn positional(args: &[String]) -> anyhow::Result<Vec<&str>> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            if iter.next().is_none() {
                bail!("{arg} requires a value");
            }
        } else if arg.starts_with("--") {
            bail!("unknown option: {arg}");
        } else {
            out.push(arg.as_str());
        }
    }
    Ok(out)
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn single_arg<'a>(args: &'a [String], what: &str) -> anyhow::Result<&'a str> {
    match positional(args)?.as_slice() {
        [one] => Ok(*one),
        [] => bail!("missing <{what}>"),
        _ => bail!("expected exactly one <{what}>; quote prompts containing spaces"),
    }
}

fn build_cache(args: &[String]) -> anyhow::Result<GenerationCache> {
    let config = match flag(args, "--config") {
        Some(path) => CacheConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => CacheConfig::from_env()?,
    };
    let store = WorkersKvStore::builder().build().context("configuring KV store")?;
    let generator = WorkersAiGenerator::builder()
        .build()
        .context("configuring generator")?;
    Ok(GenerationCache::new(config, Arc::new(store), Arc::new(generator))?)
}

fn cmd_fingerprint(args: &[String]) -> anyhow::Result<()> {
    let prompt = single_arg(args, "prompt")?;
    println!("{}", fingerprint(prompt));
    Ok(())
}

async fn cmd_resolve(args: &[String]) -> anyhow::Result<()> {
    let prompt = single_arg(args, "prompt")?;
    let cache = build_cache(args)?;
    let resolved = cache.resolve(prompt).await?;
    report(&resolved, flag(args, "--out"))
}

async fn cmd_submit(args: &[String]) -> anyhow::Result<()> {
    let prompt = single_arg(args, "prompt")?;
    let cache = build_cache(args)?;
    println!("{}", cache.submit(prompt).await?);
    Ok(())
}

async fn cmd_lookup(args: &[String]) -> anyhow::Result<()> {
    let key = single_arg(args, "fingerprint")?;
    let cache = build_cache(args)?;
    match cache.lookup_existing(key).await? {
        Some(resolved) => report(&resolved, flag(args, "--out")),
        None => bail!("not found: no prompt recorded for {key}"),
    }
}

async fn cmd_state(args: &[String]) -> anyhow::Result<()> {
    let fp = Fingerprint::parse(single_arg(args, "fingerprint")?)?;
    let cache = build_cache(args)?;
    println!("{fp}: {:?}", cache.state(&fp).await?);
    Ok(())
}

fn report(resolved: &Resolved, out: Option<&str>) -> anyhow::Result<()> {
    let format = resolved.format();
    println!("fingerprint: {}", resolved.fingerprint);
    println!("outcome:     {:?}", resolved.outcome);
    println!("format:      {}", format.mime_type());
    println!("bytes:       {}", resolved.image.len());
    if let Some(path) = out {
        let path = PathBuf::from(path);
        std::fs::write(&path, &resolved.image)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("written:     {}", path.display());
    }
    Ok(())
}
