//! Safe script evaluation against one tab's web view.
//!
//! [`Tab::evaluate_safe_javascript`] is the callback primitive; the async
//! [`Tab::evaluate`] is a thin adapter that suspends until that callback fires.

use crate::script::{ScriptArgument, ScriptCall};
use crate::ui_thread::{Command, Completion, TabId};
use crate::webview::{ContentWorld, FrameInfo};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::mpsc::{SendError, Sender};
use tokio::sync::oneshot;
use url::Url;

/// What to evaluate, where, and how to treat the arguments
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Function path when `as_function` is set, otherwise a raw expression
    pub function_name: String,
    pub args: Vec<ScriptArgument>,
    pub frame: Option<FrameInfo>,
    pub world: ContentWorld,
    pub escape_args: bool,
    pub as_function: bool,
}

impl EvaluationRequest {
    /// Call `function_name` with sanitized arguments
    pub fn call(function_name: &str, args: Vec<ScriptArgument>, world: ContentWorld) -> Self {
        Self {
            function_name: function_name.to_string(),
            args,
            frame: None,
            world,
            escape_args: true,
            as_function: true,
        }
    }

    /// Evaluate a native-authored expression as is. Never pass page-derived text here.
    pub fn expression(javascript: &str, world: ContentWorld) -> Self {
        Self {
            as_function: false,
            ..Self::call(javascript, Vec::new(), world)
        }
    }

    pub fn in_frame(mut self, frame: FrameInfo) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Splice string arguments verbatim. Only for static, trusted literals.
    pub fn unescaped(mut self) -> Self {
        self.escape_args = false;
        self
    }

    /// The script text that will reach the engine
    pub fn javascript(&self) -> Result<String> {
        if self.as_function {
            ScriptCall::build(&self.function_name, &self.args, self.escape_args).map(ScriptCall::into_string)
        } else {
            Ok(self.function_name.clone())
        }
    }
}

/// A handle to one web view living on the UI thread
#[derive(Clone)]
pub struct Tab {
    id: TabId,
    cmd_tx: Sender<Command>,
}

impl Tab {
    pub(crate) fn new(id: TabId, cmd_tx: Sender<Command>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    fn send(&self, cmd: Command) {
        if let Err(SendError(cmd)) = self.cmd_tx.send(cmd) {
            cmd.fail("UI thread stopped");
        }
    }

    /// Evaluate a request and report the outcome to `completion` exactly once.
    ///
    /// A request whose call cannot be built completes immediately with that
    /// error; the engine is never involved. Otherwise the completion runs on
    /// the UI thread once the engine has finished. There is no cancellation:
    /// dropping interest in the result does not stop the evaluation.
    pub fn evaluate_safe_javascript<F>(&self, request: EvaluationRequest, completion: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let completion = Completion::new(completion);
        let javascript = match request.javascript() {
            Ok(js) => js,
            Err(e) => return completion.complete(Err(e)),
        };
        self.send(Command::Evaluate {
            tab: self.id,
            javascript,
            frame: request.frame,
            world: request.world,
            completion,
        });
    }

    /// Evaluate a request and wait for the result
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.evaluate_safe_javascript(request, move |res| {
            let _ = tx.send(res);
        });
        rx.await
            .map_err(|e| Error::Other(format!("Evaluation canceled: {}", e)))?
    }

    /// Issue several evaluations at once and collect results in request order.
    /// They run on the UI thread in the order they were queued.
    pub async fn evaluate_many(&self, requests: Vec<EvaluationRequest>) -> Vec<Result<Value>> {
        futures::future::join_all(requests.into_iter().map(|r| self.evaluate(r))).await
    }

    /// Load a document; `page_script` runs in the page world
    pub fn load_with<F>(&self, url: Url, page_script: &str, completion: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.send(Command::Load {
            tab: self.id,
            url,
            page_script: page_script.to_string(),
            completion: Completion::new(completion),
        });
    }

    pub async fn load(&self, url: Url, page_script: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.load_with(url, page_script, move |res| {
            let _ = tx.send(res);
        });
        rx.await
            .map_err(|e| Error::Other(format!("Load canceled: {}", e)))?
    }

    /// Destroy the web view. Later requests on this tab fail.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::CloseTab {
            tab: self.id,
            completion: Completion::new(move |res| {
                let _ = tx.send(res);
            }),
        });
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_request_builds_sanitized_javascript() {
        let req = EvaluationRequest::call("reader.show", vec!["<b>".into(), ScriptArgument::Null], ContentWorld::DefaultClient);
        assert_eq!(req.javascript().unwrap(), "reader.show('\\u003cb\\u003e', null)");
    }

    #[test]
    fn expression_request_is_passed_through() {
        let req = EvaluationRequest::expression("document.title", ContentWorld::Page);
        assert!(!req.as_function);
        assert_eq!(req.javascript().unwrap(), "document.title");
    }

    #[test]
    fn unescaped_request_splices_literals() {
        let req = EvaluationRequest::call("setMode", vec!["MODE_ON".into()], ContentWorld::Page).unescaped();
        assert_eq!(req.javascript().unwrap(), "setMode(MODE_ON)");
    }
}
