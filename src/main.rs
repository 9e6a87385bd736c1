use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use rfshield::internal::paths;
use rfshield::prefs::{MemoryPreferences, READER_MODE_STYLE_KEY};
use rfshield::reader::{DiskReaderModeCache, ReadabilityResult, ReaderModeCache, ReaderModeHandler};
use rfshield::{BridgeConfig, InternalRequest, InternalSchemeHandler, InternalUrl, ScriptArgument, ScriptCall};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "rfshield", version, about = "RFox script bridge and reader-mode tools")]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (defaults apply when omitted)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a sanitized script call and optionally run it
    Call {
        function: String,
        /// Arguments as JSON values; with --strings every argument is a plain string
        args: Vec<String>,
        #[arg(long, default_value_t = false)]
        strings: bool,
        /// Evaluate the call in the Boa web view after loading this page script
        #[arg(long)]
        eval: Option<String>,
    },
    /// Store a readability result in the reader cache
    CachePut {
        #[arg(long)]
        url: Url,
        /// File holding the ReadabilityResult JSON
        #[arg(long)]
        file: PathBuf,
    },
    /// Render the reader page for a cached URL
    Reader {
        #[arg(long)]
        url: Url,
        /// Style dictionary, e.g. {"theme":"dark","fontType":"serif","fontSize":5}
        #[arg(long)]
        style: Option<String>,
    },
}

fn parse_args(raw: &[String], strings: bool) -> anyhow::Result<Vec<ScriptArgument>> {
    raw.iter()
        .map(|a| {
            if strings {
                Ok(ScriptArgument::from(a.as_str()))
            } else {
                let value: serde_json::Value =
                    serde_json::from_str(a).with_context(|| format!("argument {:?} is not JSON", a))?;
                Ok(ScriptArgument::from(value))
            }
        })
        .collect()
}

#[cfg(feature = "boa")]
async fn evaluate(config: &BridgeConfig, page_script: &str, call: ScriptCall) -> anyhow::Result<serde_json::Value> {
    use rfshield::webview::ContentWorld;
    use rfshield::{EvaluationRequest, ScriptRegistry, TabMessageDispatcher, UiThread};

    let registry = ScriptRegistry::builder(rfshield::DirectoryScriptSource::new(&config.script_dir))?.build();
    let ui = UiThread::spawn()?;
    let limits = config.script_limits();
    let tab = ui.open_tab(
        move || Ok(rfshield::boa::BoaWebView::new(limits)),
        TabMessageDispatcher::new(Arc::new(registry)),
    )?;
    tab.load(Url::parse("about:blank")?, page_script).await?;
    let value = tab
        .evaluate(EvaluationRequest::expression(call.as_str(), ContentWorld::Page))
        .await?;
    tab.close().await?;
    ui.shutdown();
    Ok(value)
}

#[cfg(not(feature = "boa"))]
async fn evaluate(_: &BridgeConfig, _: &str, _: ScriptCall) -> anyhow::Result<serde_json::Value> {
    bail!("built without the boa feature; nothing can evaluate scripts")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BridgeConfig::from_json_file(path)?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Commands::Call {
            function,
            args,
            strings,
            eval,
        } => {
            let call = ScriptCall::build(&function, &parse_args(&args, strings)?, true)?;
            println!("{}", call);
            if let Some(page_script) = eval {
                let value = evaluate(&config, &page_script, call).await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        Commands::CachePut { url, file } => {
            let data = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let result: ReadabilityResult = serde_json::from_str(&data).context("invalid readability result")?;
            let cache = DiskReaderModeCache::new(&config.reader_cache_dir);
            cache.put(&url, &result)?;
            println!("{}", rfshield::reader::cache_key(&url));
        }
        Commands::Reader { url, style } => {
            let prefs = Arc::new(MemoryPreferences::new());
            if let Some(style) = style {
                prefs.set(READER_MODE_STYLE_KEY, serde_json::from_str(&style).context("invalid style JSON")?);
            }
            let cache = Arc::new(DiskReaderModeCache::new(&config.reader_cache_dir));
            let mut router = InternalSchemeHandler::new();
            router.register(
                paths::READER_MODE,
                ReaderModeHandler::new(cache, prefs, &config.resource_origin),
            )?;

            let response = router.respond(&InternalRequest::new(InternalUrl::reader_mode(&url)));
            println!("HTTP {}", response.status);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!();
            println!("{}", String::from_utf8_lossy(&response.body));
            if response.status != 200 {
                bail!("reader page unavailable for {}", url);
            }
        }
    }
    Ok(())
}
