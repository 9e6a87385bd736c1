//! RFox Shield
//!
//! The trust boundary between a browser's native code and the web content it
//! renders.
//!
//! # Features
//!
//! - **Safe script calls**: every argument handed to page JavaScript goes
//!   through [`script::sanitize`], so page-derived text is always data.
//! - **Authenticated messaging**: injected scripts talk back over per-script
//!   channels guarded by a random security token ([`registry`], [`dispatch`]).
//! - **Reader mode**: cached articles served through `internal://` with a
//!   fresh CSP nonce per response ([`reader`], [`internal`]).
//! - **Boa backend** (default `boa` feature): a pure-Rust [`webview::WebView`]
//!   with one JS context per content world.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rfshield::{
//!     boa::BoaWebView, EvaluationRequest, MemoryScriptSource, ScriptDefinition, ScriptRegistry,
//!     TabMessageDispatcher, UiThread,
//! };
//! use rfshield::webview::ContentWorld;
//!
//! # #[tokio::main]
//! # async fn main() -> rfshield::Result<()> {
//! let source = MemoryScriptSource::new().with("Greeter", "var greet = function(n) { return 'hi ' + n; };");
//! let mut builder = ScriptRegistry::builder(source)?;
//! builder.register(ScriptDefinition::new("Greeter"))?;
//! let registry = Arc::new(builder.build());
//!
//! let ui = UiThread::spawn()?;
//! let tab = ui.open_tab(|| Ok(BoaWebView::default()), TabMessageDispatcher::new(registry))?;
//! let request = EvaluationRequest::call("document.title.concat", vec!["<b>".into()], ContentWorld::Page);
//! let title = tab.evaluate(request).await?;
//! println!("{}", title);
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result, SanitizeError};

pub mod blocking;
pub mod dispatch;
pub mod favicon;
pub mod internal;
pub mod prefs;
pub mod reader;
pub mod registry;
pub mod script;
pub mod security;
pub mod tab;
pub mod ui_thread;
pub mod webview;

// Pure-Rust script host backed by Boa
#[cfg(feature = "boa")]
pub mod boa;

pub use dispatch::{MessageContext, MessageHandler, TabMessageDispatcher};
pub use internal::{InternalRequest, InternalResponse, InternalSchemeHandler, InternalSchemeResponse, InternalUrl};
pub use registry::{DirectoryScriptSource, MemoryScriptSource, ScriptDefinition, ScriptRegistry, ScriptWorldBinding};
pub use script::{sanitize, ScriptArgument, ScriptCall};
pub use tab::{EvaluationRequest, Tab};
pub use ui_thread::{TabId, UiThread};

/// Configuration for the bridge
///
/// The defaults are conservative: scripts come from `./scripts`, reader
/// content is cached under `./reader-cache`, and reader pages may only load
/// styles and fonts from `http://localhost`.
///
/// # Examples
///
/// ```
/// let cfg = rfshield::BridgeConfig::default();
/// assert_eq!(cfg.resource_origin, "http://localhost");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Origin allowed to serve reader-mode stylesheets and fonts
    pub resource_origin: String,
    /// Directory holding `<ScriptName>.js` sources
    pub script_dir: PathBuf,
    /// Root of the on-disk reader cache
    pub reader_cache_dir: PathBuf,
    /// Maximum loop iterations before Boa throws an error (0 => disabled)
    pub script_loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub script_recursion_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            resource_origin: "http://localhost".to_string(),
            script_dir: PathBuf::from("scripts"),
            reader_cache_dir: PathBuf::from("reader-cache"),
            script_loop_iteration_limit: 1_000_000,
            script_recursion_limit: 1024,
        }
    }
}

impl BridgeConfig {
    /// Load a config file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let origin = url::Url::parse(&self.resource_origin)
            .map_err(|e| Error::ConfigError(format!("resource_origin {:?}: {}", self.resource_origin, e)))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.path() != "/" || origin.query().is_some() {
            return Err(Error::ConfigError(format!(
                "resource_origin must be a bare http(s) origin, got {:?}",
                self.resource_origin
            )));
        }
        Ok(())
    }

    #[cfg(feature = "boa")]
    pub fn script_limits(&self) -> boa::ScriptLimits {
        boa::ScriptLimits {
            loop_iteration_limit: self.script_loop_iteration_limit,
            recursion_limit: self.script_recursion_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides_some_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{"resource_origin": "https://localhost:6571", "script_dir": "/opt/scripts"}"#).unwrap();
        let cfg = BridgeConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.resource_origin, "https://localhost:6571");
        assert_eq!(cfg.script_dir, PathBuf::from("/opt/scripts"));
        assert_eq!(cfg.reader_cache_dir, PathBuf::from("reader-cache"));
        assert_eq!(cfg.script_recursion_limit, 1024);
    }

    #[test]
    fn rejects_origin_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{"resource_origin": "http://localhost/styles"}"#).unwrap();
        assert!(matches!(BridgeConfig::from_json_file(&path), Err(Error::ConfigError(_))));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(BridgeConfig::from_json_file(&path), Err(Error::ConfigError(_))));
    }

    #[test]
    fn manifest_file_references_exist() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let manifest = std::fs::read_to_string(root.join("Cargo.toml")).unwrap();
        for line in manifest.lines() {
            let Some((key, value)) = line.split_once('=') else { continue };
            if matches!(key.trim(), "readme" | "license-file" | "build") {
                let file = value.trim().trim_matches('"');
                assert!(root.join(file).is_file(), "Cargo.toml names missing file {}", file);
            }
        }
    }
}
