//! jit-translate 命令行入口

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jit_translator::env::{self, EnvVar};
use jit_translator::parsers::{get_charset, html_to_dom};
use jit_translator::translation::config::ConfigManager;
use jit_translator::translation::languages::{self, LANGUAGES};
use jit_translator::translation::{CacheKind, HtmlDocument, TranslationResult, TranslationService};

#[derive(Parser, Debug)]
#[command(name = "jit-translate", author, version, about = "即时翻译 HTML 文档")]
struct Args {
    /// 输入 HTML 文件，`-` 表示标准输入
    #[arg(required_unless_present_any = ["list_languages", "env_docs"])]
    input: Option<String>,

    /// 目标语言
    #[arg(short, long)]
    target: Option<String>,

    /// 源语言
    #[arg(short, long)]
    source: Option<String>,

    /// 输出文件，默认写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 翻译后端: openai, deeplx, mock
    #[arg(long)]
    provider: Option<String>,

    /// 缓存类型: memory, redis, none
    #[arg(long)]
    cache: Option<CacheKind>,

    /// 列出已知语言
    #[arg(long)]
    list_languages: bool,

    /// 输出环境变量说明
    #[arg(long)]
    env_docs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("错误: {}", e);
        std::process::exit(1);
    }
}

/// 日志写到标准错误，标准输出只留给翻译结果
fn init_tracing() {
    let level = env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("{}", e);
        "info".to_string()
    });
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> TranslationResult<()> {
    if args.list_languages {
        for info in LANGUAGES {
            println!(
                "{}\t{}\t{}\t{}",
                info.code,
                info.name,
                info.native_name,
                languages::text_direction(info.code).as_str()
            );
        }
        return Ok(());
    }

    if args.env_docs {
        print!("{}", env::generate_env_docs());
        return Ok(());
    }

    let manager = match &args.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.into_config();
    if let Some(target) = args.target {
        config.target_lang = target;
    }
    if let Some(source) = args.source {
        config.source_lang = source;
    }
    if let Some(provider) = args.provider {
        config.provider.provider_type = provider;
    }
    if let Some(cache) = args.cache {
        config.cache.kind = cache;
    }

    let input = args.input.unwrap_or_else(|| "-".to_string());
    let data = read_input(&input)?;

    // 先按 UTF-8 解析一次以读取 <meta charset>
    let charset = get_charset(&html_to_dom(&data, "utf-8")?.document).unwrap_or_else(|| "utf-8".to_string());
    let mut doc = HtmlDocument::from_bytes(&data, &charset)?;

    let service = TranslationService::new(config)?;
    let report = service.translate_document(&mut doc, None).await?;
    let output = doc.to_bytes()?;

    match &args.output {
        Some(path) => std::fs::write(path, &output)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }

    eprintln!(
        "{} 个片段: 缓存 {}，翻译 {}，写回 {}",
        report.segments, report.cached, report.translated, report.applied
    );
    Ok(())
}

fn read_input(input: &str) -> TranslationResult<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        Ok(std::fs::read(input)?)
    }
}
