//! Locator abstraction for element selection.
//!
//! A [`Selector`] is a pure description of how to find elements. Drivers
//! render it to a JavaScript expression ([`Selector::to_query_all`]) that
//! evaluates to an array of matching elements in document order; the mock
//! driver keys its fixture elements by the selector value itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for auto-waiting (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// ARIA roles the catalogs query by
pub mod role {
    /// Autocomplete suggestion entry
    pub const OPTION: &str = "option";
    /// Checkbox input
    pub const CHECKBOX: &str = "checkbox";
    /// Hyperlink
    pub const LINK: &str = "link";
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Innermost elements whose trimmed text equals the value
    Text(String),
    /// Elements with an ARIA role, optionally filtered by accessible name
    Role {
        /// ARIA role
        role: String,
        /// Accessible name filter
        name: Option<String>,
        /// Exact name match (otherwise case-insensitive substring)
        exact: bool,
    },
    /// `inner` evaluated inside the first match of `scope`
    Within {
        /// Scoping selector
        scope: Box<Selector>,
        /// Selector evaluated within the scope
        inner: Box<Selector>,
    },
    /// The nearest enclosing table row of the first match
    EnclosingRow(Box<Selector>),
}

/// JSON-escape a string for embedding in a script
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}

/// Accessible name as the catalogs understand it
pub(crate) const ACCESSIBLE_NAME_JS: &str = "(el) => ((el.getAttribute('aria-label') \
     || (el.labels && el.labels.length ? el.labels[0].textContent : null) \
     || el.textContent || '').trim())";

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create an exact text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a role selector without a name filter
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
            exact: false,
        }
    }

    /// Create a role selector filtered by accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<String>, exact: bool) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
            exact,
        }
    }

    /// Evaluate `inner` inside the first match of `self`
    #[must_use]
    pub fn within(self, inner: Self) -> Self {
        Self::Within {
            scope: Box::new(self),
            inner: Box::new(inner),
        }
    }

    /// The table row enclosing the first match of `self`
    #[must_use]
    pub fn enclosing_row(self) -> Self {
        Self::EnclosingRow(Box::new(self))
    }

    /// JavaScript function `(root) => Element[]`
    #[must_use]
    pub fn to_js_fn(&self) -> String {
        match self {
            Self::Css(s) => format!("(root) => Array.from(root.querySelectorAll({}))", js_string(s)),
            Self::XPath(s) => format!(
                "(root) => {{ const r = document.evaluate({}, root, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 return Array.from({{ length: r.snapshotLength }}, (_, i) => r.snapshotItem(i)); }}",
                js_string(s)
            ),
            Self::Text(t) => format!(
                "(root) => {{ const t = {}; \
                 return Array.from(root.querySelectorAll('*')).filter(el => \
                 el.textContent.trim() === t && \
                 !Array.from(el.children).some(c => c.textContent.trim() === t)); }}",
                js_string(t)
            ),
            Self::Role { role, name, exact } => {
                let base = match role.as_str() {
                    role::OPTION => "[role=option], option",
                    role::CHECKBOX => "input[type=checkbox], [role=checkbox]",
                    role::LINK => "a[href], [role=link]",
                    _ => "",
                };
                let base = if base.is_empty() {
                    format!("[role={}]", js_string(role))
                } else {
                    base.to_string()
                };
                let filter = match name {
                    None => String::from("true"),
                    Some(n) if *exact => format!("name(el) === {}", js_string(n)),
                    Some(n) => format!(
                        "name(el).toLowerCase().includes({}.toLowerCase())",
                        js_string(n)
                    ),
                };
                format!(
                    "(root) => {{ const name = {ACCESSIBLE_NAME_JS}; \
                     return Array.from(root.querySelectorAll({})).filter(el => {filter}); }}",
                    js_string(&base)
                )
            }
            Self::Within { scope, inner } => format!(
                "(root) => {{ const s = ({})(root)[0]; return s ? ({})(s) : []; }}",
                scope.to_js_fn(),
                inner.to_js_fn()
            ),
            Self::EnclosingRow(inner) => format!(
                "(root) => {{ const s = ({})(root)[0]; const tr = s ? s.closest('tr') : null; \
                 return tr ? [tr] : []; }}",
                inner.to_js_fn()
            ),
        }
    }

    /// Expression evaluating to all matches in document order
    #[must_use]
    pub fn to_query_all(&self) -> String {
        format!("({})(document)", self.to_js_fn())
    }

    /// Expression evaluating to the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("{}.length", self.to_query_all())
    }

    /// Expression evaluating to the match at `index` (or `undefined`)
    #[must_use]
    pub fn to_nth_query(&self, index: usize) -> String {
        format!("{}[{index}]", self.to_query_all())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text(t) => write!(f, "text={t:?}"),
            Self::Role { role, name, exact } => match name {
                Some(n) if *exact => write!(f, "role={role}[name={n:?} exact]"),
                Some(n) => write!(f, "role={role}[name~={n:?}]"),
                None => write!(f, "role={role}"),
            },
            Self::Within { scope, inner } => write!(f, "{scope} >> {inner}"),
            Self::EnclosingRow(inner) => write!(f, "{inner} >> ancestor::tr[1]"),
        }
    }
}

/// Which of several matches an action addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nth {
    /// First match
    #[default]
    First,
    /// Last match
    Last,
    /// Match at a zero-based index
    Index(usize),
}

impl Nth {
    /// Resolve against a match count
    #[must_use]
    pub const fn resolve(self, count: usize) -> Option<usize> {
        match self {
            Self::First if count > 0 => Some(0),
            Self::Last if count > 0 => Some(count - 1),
            Self::Index(i) if i < count => Some(i),
            _ => None,
        }
    }
}

/// A named selector with its own auto-wait timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: Selector,
    timeout: Duration,
}

impl Locator {
    /// Create a locator with a CSS selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Set a custom timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_css_query_escapes() {
            let q = Selector::css("input[name=\"gas\"]").to_query_all();
            assert!(q.contains(r#"querySelectorAll("input[name=\"gas\"]")"#));
        }

        #[test]
        fn test_xpath_query_uses_snapshot() {
            let q = Selector::xpath("//th[text()='Distributor']").to_count_query();
            assert!(q.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
            assert!(q.ends_with(".length"));
        }

        #[test]
        fn test_role_exact_name_filter() {
            let q = Selector::role_named(role::OPTION, "12 Sample St", true).to_query_all();
            assert!(q.contains("[role=option], option"));
            assert!(q.contains(r#"name(el) === "12 Sample St""#));
        }

        #[test]
        fn test_role_fuzzy_name_filter() {
            let q = Selector::role_named(role::CHECKBOX, "Electricity", false).to_query_all();
            assert!(q.contains("toLowerCase().includes"));
        }

        #[test]
        fn test_unknown_role_falls_back_to_attribute() {
            let q = Selector::role("listbox").to_query_all();
            assert!(q.contains(r#"[role=\"listbox\"]"#));
        }

        #[test]
        fn test_row_links_compose() {
            let links = Selector::text("Origin Basic")
                .enclosing_row()
                .within(Selector::css("a"));
            let q = links.to_nth_query(2);
            assert!(q.contains("closest('tr')"));
            assert!(q.ends_with("[2]"));
        }

        #[test]
        fn test_display() {
            let sel = Selector::text("Origin Basic").enclosing_row();
            assert_eq!(sel.to_string(), "text=\"Origin Basic\" >> ancestor::tr[1]");
            assert_eq!(
                Selector::role_named("link", "x", true).to_string(),
                "role=link[name=\"x\" exact]"
            );
        }

        #[test]
        fn test_selectors_hash_by_value() {
            use std::collections::HashSet;
            let mut set = HashSet::new();
            set.insert(Selector::text("a").enclosing_row());
            assert!(set.contains(&Selector::text("a").enclosing_row()));
        }
    }

    mod nth_tests {
        use super::*;

        #[test]
        fn test_resolve() {
            assert_eq!(Nth::First.resolve(3), Some(0));
            assert_eq!(Nth::Last.resolve(3), Some(2));
            assert_eq!(Nth::Index(1).resolve(3), Some(1));
            assert_eq!(Nth::Index(3).resolve(3), None);
            assert_eq!(Nth::First.resolve(0), None);
            assert_eq!(Nth::Last.resolve(0), None);
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_default_timeout() {
            let locator = Locator::new("button");
            assert_eq!(locator.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
            assert_eq!(locator.selector(), &Selector::css("button"));
        }

        #[test]
        fn test_with_timeout() {
            let locator = Locator::new("button").with_timeout(Duration::from_secs(1));
            assert_eq!(locator.timeout(), Duration::from_secs(1));
        }
    }
}
