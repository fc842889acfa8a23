// src/queue/origin.rs

//! Minimal origin handling for locators.
//!
//! Only `http:` and `https:` locators carry an origin. Anything else
//! (`js/app.js`, `/css/site.css`) is relative to the page and therefore
//! same-origin.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

const ORIGIN_PATTERN: &str = r"(?i)^(https?:)//([\w.\-_%:@]+)";

fn origin_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(ORIGIN_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "invalid origin pattern; every locator treated as relative");
            None
        }
    })
    .as_ref()
}

/// Scheme plus authority of an absolute locator, lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
}

impl Origin {
    /// Parse the origin of `locator`. Returns `None` for relative locators.
    pub fn parse(locator: &str) -> Option<Origin> {
        let caps = origin_regex()?.captures(locator.trim())?;
        let scheme = caps.get(1)?.as_str().to_lowercase();
        let host = caps.get(2)?.as_str().to_lowercase();
        Some(Origin { scheme, host })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}", self.scheme, self.host)
    }
}

/// Whether loading `locator` from a page at `page` stays within one origin.
///
/// Relative locators are always same-origin. With no page origin known,
/// every absolute locator counts as foreign.
pub fn is_same_origin(page: Option<&Origin>, locator: &str) -> bool {
    match Origin::parse(locator) {
        None => true,
        Some(target) => page.is_some_and(|p| *p == target),
    }
}

/// Turn `locator` into an absolute URL using `page` as the base.
///
/// Returns `None` when the locator is relative and there is no base.
pub fn absolutize(page: Option<&Origin>, locator: &str) -> Option<String> {
    let locator = locator.trim();
    if Origin::parse(locator).is_some() {
        return Some(locator.to_string());
    }
    let page = page?;
    if let Some(rest) = locator.strip_prefix("//") {
        return Some(format!("{}//{}", page.scheme, rest));
    }
    Some(format!("{}/{}", page, locator.trim_start_matches('/')))
}
