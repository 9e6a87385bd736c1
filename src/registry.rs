//! Script identity registry.
//!
//! Every installable script gets a random security token and a message
//! channel name when it is registered. The raw source is wrapped so the only
//! way it can post to its channel is through a closure that attaches the
//! token. The finished [`ScriptRegistry`] is immutable and shared by every
//! tab for the rest of the process.

use crate::script::{sanitize, ScriptArgument};
use crate::security::{random_hex, SecurityToken};
use crate::webview::{ContentWorld, InjectionTime, UserScript};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Placeholder in raw script sources replaced by the channel name
pub const MESSAGE_HANDLER_PLACEHOLDER: &str = "$<message_handler>";
/// Placeholder in raw script sources replaced by the security token
pub const SECURITY_TOKEN_PLACEHOLDER: &str = "$<security_token>";

/// Where raw script sources come from
pub trait ScriptSource: Send + Sync {
    /// Raw source for `name`, or `None` when the script does not exist
    fn load(&self, name: &str) -> Option<String>;
}

/// Loads `<dir>/<name>.js`
#[derive(Debug, Clone)]
pub struct DirectoryScriptSource {
    dir: PathBuf,
}

impl DirectoryScriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScriptSource for DirectoryScriptSource {
    fn load(&self, name: &str) -> Option<String> {
        let path = self.dir.join(format!("{}.js", name));
        match std::fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read user script {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Sources held in memory, keyed by script name
#[derive(Debug, Clone, Default)]
pub struct MemoryScriptSource {
    scripts: HashMap<String, String>,
}

impl MemoryScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, source: &str) -> Self {
        self.scripts.insert(name.to_string(), source.to_string());
        self
    }
}

impl ScriptSource for MemoryScriptSource {
    fn load(&self, name: &str) -> Option<String> {
        self.scripts.get(name).cloned()
    }
}

/// How and where a named script is installed
#[derive(Debug, Clone)]
pub struct ScriptDefinition {
    pub name: String,
    pub injection_time: InjectionTime,
    pub main_frame_only: bool,
    pub world: ContentWorld,
}

impl ScriptDefinition {
    /// Main-frame script in the default isolated world, injected at document start
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            injection_time: InjectionTime::AtDocumentStart,
            main_frame_only: true,
            world: ContentWorld::DefaultClient,
        }
    }

    pub fn injection_time(mut self, time: InjectionTime) -> Self {
        self.injection_time = time;
        self
    }

    pub fn all_frames(mut self) -> Self {
        self.main_frame_only = false;
        self
    }

    pub fn world(mut self, world: ContentWorld) -> Self {
        self.world = world;
        self
    }
}

/// A registered script: wrapped source, installation parameters and identity
#[derive(Debug)]
pub struct ScriptWorldBinding {
    name: String,
    channel: String,
    token: SecurityToken,
    source: String,
    injection_time: InjectionTime,
    main_frame_only: bool,
    world: ContentWorld,
}

impl ScriptWorldBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wrapped source, token included
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn injection_time(&self) -> InjectionTime {
        self.injection_time
    }

    pub fn main_frame_only(&self) -> bool {
        self.main_frame_only
    }

    pub fn world(&self) -> &ContentWorld {
        &self.world
    }

    /// Check the token an inbound message presented
    pub fn verify_token(&self, presented: &str) -> bool {
        self.token.verify(presented)
    }

    pub fn user_script(&self) -> UserScript {
        UserScript {
            source: self.source.clone(),
            injection_time: self.injection_time,
            main_frame_only: self.main_frame_only,
            world: self.world.clone(),
        }
    }
}

/// Immutable set of script bindings shared by all tabs
#[derive(Debug)]
pub struct ScriptRegistry {
    bindings: Vec<Arc<ScriptWorldBinding>>,
    by_channel: HashMap<String, usize>,
}

impl ScriptRegistry {
    /// Start a registry. The message secret used in channel names is drawn here,
    /// once per registry.
    pub fn builder(source: impl ScriptSource + 'static) -> Result<ScriptRegistryBuilder> {
        Ok(ScriptRegistryBuilder {
            source: Box::new(source),
            message_secret: random_hex(16)?,
            bindings: Vec::new(),
            by_channel: HashMap::new(),
        })
    }

    pub fn binding(&self, name: &str) -> Option<&Arc<ScriptWorldBinding>> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn binding_for_channel(&self, channel: &str) -> Option<&Arc<ScriptWorldBinding>> {
        self.by_channel.get(channel).map(|&i| &self.bindings[i])
    }

    /// Bindings in registration order
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<ScriptWorldBinding>> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Collects registrations before the registry is frozen
pub struct ScriptRegistryBuilder {
    source: Box<dyn ScriptSource>,
    message_secret: String,
    bindings: Vec<Arc<ScriptWorldBinding>>,
    by_channel: HashMap<String, usize>,
}

impl ScriptRegistryBuilder {
    /// Register a script by name.
    ///
    /// Returns `Ok(None)` when no source exists for the script; the capability
    /// is then simply absent. A name that is not a plain identifier, or that
    /// would reuse an existing channel, is a configuration error.
    pub fn register(&mut self, definition: ScriptDefinition) -> Result<Option<Arc<ScriptWorldBinding>>> {
        if !is_script_name(&definition.name) {
            return Err(Error::ConfigError(format!(
                "script name {:?} must be ASCII letters, digits or '_'",
                definition.name
            )));
        }

        let channel = format!("{}_{}", definition.name, self.message_secret);
        if self.by_channel.contains_key(&channel) {
            return Err(Error::ConfigError(format!(
                "message channel for script {} registered twice",
                definition.name
            )));
        }

        let raw = match self.source.load(&definition.name) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => {
                info!("No source for user script {}; capability disabled", definition.name);
                return Ok(None);
            }
        };

        let token = SecurityToken::generate()?;
        let source = secure_script(&channel, &token, &raw)?;

        let binding = Arc::new(ScriptWorldBinding {
            name: definition.name,
            channel: channel.clone(),
            token,
            source,
            injection_time: definition.injection_time,
            main_frame_only: definition.main_frame_only,
            world: definition.world,
        });
        debug!("Registered user script {} in {:?}", binding.name, binding.world);

        self.by_channel.insert(channel, self.bindings.len());
        self.bindings.push(binding.clone());
        Ok(Some(binding))
    }

    pub fn build(self) -> ScriptRegistry {
        ScriptRegistry {
            bindings: self.bindings,
            by_channel: self.by_channel,
        }
    }
}

fn is_script_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Channel and token are native-generated hex/identifier text; nothing here is page derived.
fn secure_script(channel: &str, token: &SecurityToken, raw: &str) -> Result<String> {
    let channel_literal = sanitize(&ScriptArgument::from(channel), true)?;
    let token_literal = sanitize(&ScriptArgument::from(token.as_str()), true)?;
    let body = raw
        .replace(MESSAGE_HANDLER_PLACEHOLDER, channel)
        .replace(SECURITY_TOKEN_PLACEHOLDER, token.as_str());

    Ok(format!(
        r#"(function() {{
  "use strict";
  const $securityToken = {token};
  const $messageHandler = webkit.messageHandlers[{channel}];
  const $postMessage = function(data) {{
    return $messageHandler.postMessage({{ securityToken: $securityToken, data: data }});
  }};
{body}
}})();
"#,
        token = token_literal,
        channel = channel_literal,
        body = body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemoryScriptSource {
        MemoryScriptSource::new()
            .with("FaviconScript", "$postMessage([]);")
            .with("ReaderScript", "var handler = '$<message_handler>'; var t = '$<security_token>';")
            .with("EmptyScript", "   \n")
    }

    #[test]
    fn missing_source_is_absent_not_fatal() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        assert!(b.register(ScriptDefinition::new("NoSuchScript")).unwrap().is_none());
        assert!(b.register(ScriptDefinition::new("EmptyScript")).unwrap().is_none());
        assert!(b.build().is_empty());
    }

    #[test]
    fn channel_is_name_plus_shared_secret() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        let fav = b.register(ScriptDefinition::new("FaviconScript")).unwrap().unwrap();
        let reader = b.register(ScriptDefinition::new("ReaderScript")).unwrap().unwrap();
        let fav_secret = fav.channel().strip_prefix("FaviconScript_").unwrap();
        let reader_secret = reader.channel().strip_prefix("ReaderScript_").unwrap();
        assert_eq!(fav_secret, reader_secret);
        assert_eq!(fav_secret.len(), 32);
    }

    #[test]
    fn duplicate_registration_is_a_config_error() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        b.register(ScriptDefinition::new("FaviconScript")).unwrap();
        let err = b.register(ScriptDefinition::new("FaviconScript")).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        for bad in ["", "a-b", "a'b", "a b"] {
            assert!(matches!(b.register(ScriptDefinition::new(bad)), Err(Error::ConfigError(_))));
        }
    }

    #[test]
    fn wrapped_source_binds_token_and_channel() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        let binding = b.register(ScriptDefinition::new("ReaderScript")).unwrap().unwrap();
        let src = binding.source();
        assert!(src.starts_with("(function() {"));
        assert!(src.contains(&format!("webkit.messageHandlers['{}']", binding.channel())));
        assert!(src.contains(&format!("var handler = '{}'", binding.channel())));
        assert!(!src.contains(MESSAGE_HANDLER_PLACEHOLDER));
        assert!(!src.contains(SECURITY_TOKEN_PLACEHOLDER));
        assert!(binding.verify_token(src.split("const $securityToken = '").nth(1).unwrap().split('\'').next().unwrap()));
    }

    #[test]
    fn tokens_differ_per_script_and_registry() {
        let mut b1 = ScriptRegistry::builder(source()).unwrap();
        let mut b2 = ScriptRegistry::builder(source()).unwrap();
        let a = b1.register(ScriptDefinition::new("FaviconScript")).unwrap().unwrap();
        let c = b1.register(ScriptDefinition::new("ReaderScript")).unwrap().unwrap();
        let a2 = b2.register(ScriptDefinition::new("FaviconScript")).unwrap().unwrap();
        assert_ne!(a.channel(), a2.channel());
        assert!(!a.verify_token(&token_of(&c)));
        assert!(!a2.verify_token(&token_of(&a)));
    }

    fn token_of(b: &ScriptWorldBinding) -> String {
        b.token.as_str().to_string()
    }

    #[test]
    fn lookup_by_channel() {
        let mut b = ScriptRegistry::builder(source()).unwrap();
        let fav = b.register(ScriptDefinition::new("FaviconScript").all_frames()).unwrap().unwrap();
        let registry = b.build();
        let found = registry.binding_for_channel(fav.channel()).unwrap();
        assert_eq!(found.name(), "FaviconScript");
        assert!(!found.main_frame_only());
        assert!(registry.binding_for_channel("FaviconScript_0000").is_none());
    }

    #[test]
    fn directory_source_reads_js_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FaviconScript.js"), "$postMessage(1);").unwrap();
        let src = DirectoryScriptSource::new(dir.path());
        assert_eq!(src.load("FaviconScript").as_deref(), Some("$postMessage(1);"));
        assert!(src.load("Missing").is_none());
    }
}
