//! 命令行入口：翻译一个 HTML 文件并输出结果

use std::fs;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use clap::Parser;

use livetrans::config::{ConfigManager, DisplayMode, ServiceKind, TranslationConfig};
use livetrans::dom::{html_to_dom, serialize_document};
use livetrans::error::TranslationResult;
use livetrans::markers::NoopMarkers;
use livetrans::orchestrator::{RecordingFeed, Session, VisibilityEvent};
use livetrans::{HttpBackend, PassthroughBackend, TranslationBackend, Translator};

/// Livetrans - 就地翻译 HTML 文档
#[derive(Parser, Debug)]
#[command(name = "livetrans")]
#[command(version)]
#[command(about = "Translate an HTML document in place, bilingual or replace mode")]
struct Cli {
    /// 输入 HTML 文件
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 目标语言，例如 zh、en、ja
    #[arg(short, long)]
    target_lang: Option<String>,

    /// 显示模式: bilingual 或 replace
    #[arg(short, long)]
    mode: Option<String>,

    /// 翻译服务，例如 deeplx、google、openai
    #[arg(short, long)]
    service: Option<String>,

    /// 翻译 API 地址
    #[arg(long)]
    api_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 缓存文件，启动时加载，结束后写回
    #[arg(long)]
    cache: Option<PathBuf>,

    /// 不调用翻译服务，只演练节点选择
    #[arg(long)]
    dry_run: bool,

    /// 输出文件，缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> TranslationResult<TranslationConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.into_config();

    if let Some(lang) = &cli.target_lang {
        config.target_lang = lang.clone();
    }
    if let Some(mode) = &cli.mode {
        config.display = mode.parse::<DisplayMode>()?;
    }
    if let Some(service) = &cli.service {
        config.service = service.parse::<ServiceKind>()?;
    }
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: TranslationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(&cli.input)?;
    let dom = html_to_dom(&data, "utf-8");

    let backend: Arc<dyn TranslationBackend> = if cli.dry_run {
        Arc::new(PassthroughBackend)
    } else {
        Arc::new(HttpBackend::from_config(&config)?)
    };
    let translator = Rc::new(Translator::from_config(backend, &config));

    if let Some(path) = cli.cache.as_ref().filter(|p| p.exists()) {
        let loaded = translator.cache().load(path)?;
        tracing::info!("从 {} 载入 {} 条缓存", path.display(), loaded);
    }

    let feed = Rc::new(RecordingFeed::new());
    let session = Session::builder(dom.document.clone(), translator.clone())
        .config(Rc::new(config))
        .markers(Box::new(NoopMarkers))
        .visibility(feed.clone())
        .mutations(feed.clone())
        .build();

    session.start();

    // 没有视口：把所有登记节点视为可见，直到不再有新登记
    loop {
        let pending = feed.take_observed();
        if pending.is_empty() {
            break;
        }
        session.on_visibility(pending.into_iter().map(VisibilityEvent::visible));
        session.wait_idle().await;
    }

    let status = session.status();
    tracing::info!(
        "翻译完成: {} 个单元已翻译，{} 个失败，共 {} 次请求",
        status.translated,
        status.failed,
        status.requests
    );
    session.stop();

    if let Some(path) = &cli.cache {
        translator.cache().save(path)?;
    }

    let html = serialize_document(&dom, "utf-8");
    match &cli.output {
        Some(path) => fs::write(path, html)?,
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&html)?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    livetrans::logging::init(cli.log_level.as_deref());

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: 无法创建运行时: {}", e);
            process::exit(1);
        }
    };

    let local = tokio::task::LocalSet::new();
    if let Err(e) = local.block_on(&runtime, run(cli, config)) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
