// src/materialize/document.rs

//! In-memory HTML document materializer.
//!
//! Released items become `<script>`, `<style>` or `<link>` nodes appended to
//! a shared [`Document`]. Fetched content is inlined; direct references keep
//! the locator as `src`/`href`.

use std::fmt::{self, Write as _};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{LoaderEvent, MaterializeOutcome, MaterializedHandle};
use crate::errors::Result;
use crate::materialize::backend::{report_outcomes, MaterializerBackend};
use crate::queue::MaterializeJob;
use crate::settings::options::{SCRIPT_CONTENT_TYPE, STYLESHEET_CONTENT_TYPE};
use crate::types::{FetchMode, ResourceKind};

const SCRIPT_ATTRIBUTES: [&str; 3] = ["id", "type", "charset"];
const STYLESHEET_ATTRIBUTES: [&str; 3] = ["id", "media", "title"];

/// A CSS rule: a selector or at-rule prelude followed by a block.
const CSS_RULE_PATTERN: &str = r"[^{};\s][^{};]*\{";

fn css_rule_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(CSS_RULE_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "invalid css rule pattern; inline stylesheets are not checked");
            None
        }
    })
    .as_ref()
}

/// Number of rules in a stylesheet, ignoring comments.
///
/// Returns `None` when the rule pattern is unavailable.
pub fn count_css_rules(css: &str) -> Option<usize> {
    let re = css_rule_regex()?;
    let mut stripped = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        stripped.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => rest = "",
        }
    }
    stripped.push_str(rest);
    Some(re.find_iter(&stripped).count())
}

/// One element in the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: &'static str,
    pub attributes: Vec<(String, String)>,
    /// Inline text; `None` renders a void or empty element.
    pub text: Option<String>,
}

impl Node {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            text: None,
        }
    }

    fn with_attribute(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.attributes.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, escape_attribute(value))?;
        }
        if self.tag == "link" {
            return f.write_str(">");
        }
        f.write_str(">")?;
        if let Some(text) = &self.text {
            let closing = format!("</{}", self.tag);
            f.write_str(&text.replace(&closing, &format!("<\\/{}", self.tag)))?;
        }
        write!(f, "</{}>", self.tag)
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// The document head items are attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, handle: MaterializedHandle) -> Option<&Node> {
        self.nodes.get(handle.0)
    }

    /// Attach a fragment, returning the handle of each node in order.
    fn attach(&mut self, fragment: Vec<Node>) -> Vec<MaterializedHandle> {
        let start = self.nodes.len();
        self.nodes.extend(fragment);
        (start..self.nodes.len()).map(MaterializedHandle).collect()
    }

    /// Render as a `<head>` fragment, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::from("<head>\n");
        for node in &self.nodes {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "  {node}");
        }
        out.push_str("</head>\n");
        out
    }
}

/// Build the node for one released item.
pub fn build_node(job: &MaterializeJob) -> std::result::Result<Node, String> {
    let inline = match (job.mode, job.content.as_deref()) {
        (FetchMode::Fetch, Some(content)) => Some(content),
        _ => None,
    };

    if inline.is_none() && job.locator.is_empty() {
        return Err("item has neither content nor locator".to_string());
    }

    let node = match job.kind {
        ResourceKind::Script => {
            let base = match inline {
                Some(content) => Node {
                    text: Some(content.to_string()),
                    ..Node::new("script")
                },
                None => Node::new("script").with_attribute("src", &job.locator),
            };
            copy_attributes(base, job, &SCRIPT_ATTRIBUTES, STYLESHEET_CONTENT_TYPE, SCRIPT_CONTENT_TYPE)
        }
        ResourceKind::Stylesheet => {
            let base = match inline {
                Some(content) => {
                    if count_css_rules(content) == Some(0) {
                        return Err("inline stylesheet has no rules".to_string());
                    }
                    Node {
                        text: Some(content.to_string()),
                        ..Node::new("style")
                    }
                }
                None => Node::new("link")
                    .with_attribute("rel", "stylesheet")
                    .with_attribute("href", &job.locator),
            };
            copy_attributes(base, job, &STYLESHEET_ATTRIBUTES, SCRIPT_CONTENT_TYPE, STYLESHEET_CONTENT_TYPE)
        }
        ResourceKind::Barrier => {
            return Err("barrier items have nothing to materialize".to_string());
        }
    };

    Ok(node)
}

/// Copy allowlisted attributes, replacing a `type` of the other kind.
fn copy_attributes(
    mut node: Node,
    job: &MaterializeJob,
    allowlist: &[&str],
    foreign_type: &str,
    own_type: &str,
) -> Node {
    for key in allowlist {
        let Some(value) = job.attributes.get(*key) else {
            continue;
        };
        let value = if *key == "type" && value == foreign_type {
            own_type
        } else {
            value.as_str()
        };
        node = node.with_attribute(key, value);
    }
    node
}

/// Materializer that renders items into a shared [`Document`].
pub struct DocumentMaterializer {
    document: Arc<Mutex<Document>>,
    runtime_tx: mpsc::Sender<LoaderEvent>,
}

impl DocumentMaterializer {
    pub fn new(runtime_tx: mpsc::Sender<LoaderEvent>) -> Self {
        Self::with_document(runtime_tx, Arc::new(Mutex::new(Document::new())))
    }

    pub fn with_document(runtime_tx: mpsc::Sender<LoaderEvent>, document: Arc<Mutex<Document>>) -> Self {
        Self {
            document,
            runtime_tx,
        }
    }

    /// Shared handle to the document being built.
    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.document)
    }

    fn lock(&self) -> MutexGuard<'_, Document> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, batch: Vec<MaterializeJob>) -> Vec<(usize, MaterializeOutcome)> {
        let mut fragment = Vec::new();
        let mut attached = Vec::new();
        let mut outcomes = Vec::with_capacity(batch.len());

        for job in &batch {
            match build_node(job) {
                Ok(node) => {
                    fragment.push(node);
                    attached.push(job.index);
                }
                Err(reason) => {
                    debug!(index = job.index, locator = %job.locator, %reason, "cannot materialize item");
                    outcomes.push((job.index, MaterializeOutcome::Failed(reason)));
                }
            }
        }

        let handles = self.lock().attach(fragment);
        outcomes.extend(
            attached
                .into_iter()
                .zip(handles)
                .map(|(index, handle)| (index, MaterializeOutcome::Applied(handle))),
        );
        outcomes
    }
}

impl MaterializerBackend for DocumentMaterializer {
    fn materialize_batch(
        &mut self,
        batch: Vec<MaterializeJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let outcomes = self.apply(batch);
        report_outcomes(&self.runtime_tx, outcomes);
        Box::pin(async { Ok(()) })
    }
}
