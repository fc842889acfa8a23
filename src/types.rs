use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What kind of resource a request loads.
///
/// - `Script`: executable code, materialized as a `<script>` node.
/// - `Stylesheet`: style rules, materialized as `<style>` or `<link>`.
/// - `Barrier`: no network identity at all. It only occupies a slot in the
///   queue so a callback can fire at a well-defined point in the ordering
///   (usually together with `blocking = true`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    #[serde(alias = "css")]
    Stylesheet,
    #[serde(alias = "wait")]
    Barrier,
}

impl Default for ResourceKind {
    fn default() -> Self {
        ResourceKind::Script
    }
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Barrier => "barrier",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "script" | "js" => Ok(ResourceKind::Script),
            "stylesheet" | "css" => Ok(ResourceKind::Stylesheet),
            "barrier" | "wait" => Ok(ResourceKind::Barrier),
            other => Err(format!(
                "invalid resource kind: {other} (expected \"script\", \"stylesheet\" or \"barrier\")"
            )),
        }
    }
}

/// How an item's content reaches the materializer.
///
/// - `Fetch`: programmatic GET; the fetched text is injected inline.
/// - `Direct`: the materializer loads the resource by reference
///   (`src` / `href`), no fetch happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Fetch,
    Direct,
}
