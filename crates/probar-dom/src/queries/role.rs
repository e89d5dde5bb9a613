//! Queries by ARIA role.
//!
//! An element's roles are the tokens of its `role` attribute when present,
//! otherwise the implicit role of its tag (`<button>` is a `button`,
//! `<h2>` a `heading`, `<input type="checkbox">` a `checkbox`, ...).
//! Elements hidden from the accessibility tree are skipped unless
//! [`RoleQuery::hidden`] is set.

use crate::config::Config;
use crate::dom::Node;
use crate::matches::{matches_with, normalize, Matcher, Normalizer};
use crate::pretty::pretty_element;
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

use super::label_text::label_text;

/// Separator between roles in the roles listing
const ROLE_DELIMITER: &str = "--------------------------------------------------";

/// Tags that are never rendered
const NEVER_RENDERED: &[&str] = &["head", "script", "style", "template"];

/// Roles whose accessible name comes from their content
const NAME_FROM_CONTENT: &[&str] = &[
    "button",
    "cell",
    "checkbox",
    "columnheader",
    "heading",
    "link",
    "listitem",
    "menuitem",
    "option",
    "radio",
    "row",
    "rowheader",
    "switch",
    "tab",
    "tooltip",
    "treeitem",
];

/// Arguments of the role queries
#[derive(Debug, Clone)]
pub struct RoleQuery {
    /// Role to look for
    pub role: String,
    /// Accessible name filter
    pub name: Option<Matcher>,
    /// Include elements hidden from the accessibility tree
    pub hidden: bool,
    /// Heading level filter
    pub level: Option<u32>,
    /// Checked state filter
    pub checked: Option<bool>,
    /// Selected state filter
    pub selected: Option<bool>,
    /// Pressed state filter
    pub pressed: Option<bool>,
    /// Expanded state filter
    pub expanded: Option<bool>,
    /// Match any token of the `role` attribute, not just the first
    pub query_fallbacks: bool,
}

impl RoleQuery {
    /// Query for `role` with no filters
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: None,
            hidden: false,
            level: None,
            checked: None,
            selected: None,
            pressed: None,
            expanded: None,
            query_fallbacks: false,
        }
    }

    /// Require a matching accessible name
    #[must_use]
    pub fn name(mut self, name: impl Into<Matcher>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Include inaccessible elements
    #[must_use]
    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Require a heading level
    #[must_use]
    pub const fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Require a checked state
    #[must_use]
    pub const fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    /// Require a selected state
    #[must_use]
    pub const fn selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }

    /// Require a pressed state
    #[must_use]
    pub const fn pressed(mut self, pressed: bool) -> Self {
        self.pressed = Some(pressed);
        self
    }

    /// Require an expanded state
    #[must_use]
    pub const fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = Some(expanded);
        self
    }

    /// Match fallback roles too
    #[must_use]
    pub const fn query_fallbacks(mut self, fallbacks: bool) -> Self {
        self.query_fallbacks = fallbacks;
        self
    }

    fn name_hint(&self) -> String {
        match &self.name {
            None => String::new(),
            Some(Matcher::Text(text)) => format!(" and name \"{text}\""),
            Some(other) => format!(" and name `{other}`"),
        }
    }
}

impl From<&str> for RoleQuery {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

impl From<String> for RoleQuery {
    fn from(role: String) -> Self {
        Self::new(role)
    }
}

// =============================================================================
// ROLE COMPUTATION
// =============================================================================

fn input_role(node: &Node) -> Option<&'static str> {
    let kind = node
        .attribute("type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let has_list = node.has_attribute("list");
    match kind.as_str() {
        "button" | "image" | "reset" | "submit" => Some("button"),
        "checkbox" => Some("checkbox"),
        "radio" => Some("radio"),
        "range" => Some("slider"),
        "number" => Some("spinbutton"),
        "search" if has_list => Some("combobox"),
        "search" => Some("searchbox"),
        "" | "email" | "tel" | "text" | "url" if has_list => Some("combobox"),
        "" | "email" | "tel" | "text" | "url" => Some("textbox"),
        _ => None,
    }
}

/// Role implied by an element's tag and attributes
#[must_use]
pub fn implicit_role(node: &Node) -> Option<&'static str> {
    let tag = node.tag_name()?;
    let role = match tag.as_str() {
        "a" | "area" if node.has_attribute("href") => "link",
        "article" => "article",
        "aside" => "complementary",
        "button" => "button",
        "datalist" => "listbox",
        "dd" => "definition",
        "details" | "fieldset" | "optgroup" => "group",
        "dialog" => "dialog",
        "dt" => "term",
        "figure" => "figure",
        "footer" => "contentinfo",
        "form" => "form",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "header" => "banner",
        "hr" => "separator",
        "img" if node.attribute("alt").as_deref() == Some("") => "presentation",
        "img" => "img",
        "input" => return input_role(node),
        "li" => "listitem",
        "main" => "main",
        "menu" | "ol" | "ul" => "list",
        "meter" => "meter",
        "nav" => "navigation",
        "option" => "option",
        "output" => "status",
        "progress" => "progressbar",
        "section" if has_label_attribute(node) => "region",
        "select"
            if node.has_attribute("multiple")
                || node
                    .attribute("size")
                    .and_then(|size| size.parse::<u32>().ok())
                    .is_some_and(|size| size > 1) =>
        {
            "listbox"
        }
        "select" => "combobox",
        "table" => "table",
        "tbody" | "tfoot" | "thead" => "rowgroup",
        "td" => "cell",
        "textarea" => "textbox",
        "th" => "columnheader",
        "tr" => "row",
        _ => return None,
    };
    Some(role)
}

fn has_label_attribute(node: &Node) -> bool {
    node.attribute("aria-label").is_some_and(|l| !l.trim().is_empty())
        || node.has_attribute("aria-labelledby")
}

/// Explicit roles in attribute order, or the implicit role
#[must_use]
pub fn roles_of(node: &Node) -> Vec<String> {
    if let Some(explicit) = node.attribute("role") {
        let tokens: Vec<String> = explicit.split_ascii_whitespace().map(str::to_string).collect();
        if !tokens.is_empty() {
            return tokens;
        }
    }
    implicit_role(node)
        .map(|role| vec![role.to_string()])
        .unwrap_or_default()
}

fn hides_subtree(node: &Node) -> bool {
    if node.has_attribute("hidden") {
        return true;
    }
    if node.attribute("aria-hidden").as_deref() == Some("true") {
        return true;
    }
    if node
        .tag_name()
        .is_some_and(|tag| NEVER_RENDERED.contains(&tag.as_str()))
    {
        return true;
    }
    node.attribute("style").is_some_and(|style| {
        let style: String = style
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        style.split(';').any(|decl| {
            decl == "display:none" || decl == "visibility:hidden" || decl == "visibility:collapse"
        })
    })
}

/// Whether the element or an ancestor removes it from the accessibility tree
#[must_use]
pub fn is_inaccessible(node: &Node) -> bool {
    let mut cursor = Some(node.clone());
    while let Some(current) = cursor {
        if current.is_element() && hides_subtree(&current) {
            return true;
        }
        cursor = current.parent();
    }
    false
}

/// Accessible name, whitespace-collapsed
#[must_use]
pub fn accessible_name(node: &Node) -> String {
    let doc = node.document();
    if let Some(ids) = node.attribute("aria-labelledby") {
        let text = ids
            .split_ascii_whitespace()
            .filter_map(|id| doc.get_element_by_id(id))
            .map(|label| label.text_content())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.trim().is_empty() {
            return normalize(&text, true, true);
        }
    }
    if let Some(label) = node.attribute("aria-label").filter(|l| !l.trim().is_empty()) {
        return normalize(&label, true, true);
    }

    let tag = node.tag_name().unwrap_or_default();
    let kind = node
        .attribute("type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if tag == "input" && matches!(kind.as_str(), "submit" | "reset" | "button") {
        let fallback = match kind.as_str() {
            "submit" => "Submit",
            "reset" => "Reset",
            _ => "",
        };
        return normalize(
            &node
                .attribute("value")
                .unwrap_or_else(|| fallback.to_string()),
            true,
            true,
        );
    }
    if let Some(text) = label_text(node).filter(|t| !t.trim().is_empty()) {
        return normalize(&text, true, true);
    }
    if tag == "img" || tag == "area" || (tag == "input" && kind == "image") {
        if let Some(alt) = node.attribute("alt").filter(|a| !a.trim().is_empty()) {
            return normalize(&alt, true, true);
        }
    }
    let caption = match tag.as_str() {
        "fieldset" => Some("legend"),
        "table" => Some("caption"),
        "figure" => Some("figcaption"),
        _ => None,
    };
    if let Some(caption) = caption {
        if let Some(child) = node
            .element_children()
            .into_iter()
            .find(|child| child.tag_name().as_deref() == Some(caption))
        {
            return normalize(&child.text_content(), true, true);
        }
    }
    let from_content = roles_of(node)
        .first()
        .is_some_and(|role| NAME_FROM_CONTENT.contains(&role.as_str()));
    if from_content {
        let text = normalize(&content_text(node), true, true);
        if !text.is_empty() {
            return text;
        }
    }
    node.attribute("title")
        .or_else(|| node.attribute("placeholder"))
        .map(|text| normalize(&text, true, true))
        .unwrap_or_default()
}

/// Text content where images contribute their alt text
fn content_text(node: &Node) -> String {
    let mut out = String::new();
    for child in node.children() {
        if child.is_element() {
            if is_inaccessible(&child) {
                continue;
            }
            if child.tag_name().as_deref() == Some("img") {
                out.push_str(&child.attribute("alt").unwrap_or_default());
            } else {
                out.push_str(&content_text(&child));
            }
        } else if child.kind() == crate::dom::NodeKind::Text {
            out.push_str(&child.text_content());
        }
    }
    out
}

fn heading_level(node: &Node) -> Option<u32> {
    if let Some(level) = node.attribute("aria-level").and_then(|l| l.parse().ok()) {
        return Some(level);
    }
    let tag = node.tag_name()?;
    tag.strip_prefix('h')?.parse().ok()
}

fn checked_state(node: &Node) -> Option<bool> {
    let tag = node.tag_name()?;
    let kind = node.attribute("type").unwrap_or_default().to_ascii_lowercase();
    if tag == "input" && (kind == "checkbox" || kind == "radio") {
        return Some(node.has_attribute("checked"));
    }
    aria_bool(node, "aria-checked")
}

fn selected_state(node: &Node) -> Option<bool> {
    if node.tag_name().as_deref() == Some("option") {
        return Some(node.has_attribute("selected"));
    }
    aria_bool(node, "aria-selected")
}

fn aria_bool(node: &Node, attribute: &str) -> Option<bool> {
    match node.attribute(attribute)?.as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// =============================================================================
// QUERIES
// =============================================================================

fn has_role(node: &Node, query: &RoleQuery) -> bool {
    let roles = roles_of(node);
    if query.query_fallbacks {
        roles.iter().any(|role| *role == query.role)
    } else {
        roles.first().is_some_and(|role| *role == query.role)
    }
}

fn states_match(node: &Node, query: &RoleQuery) -> bool {
    query.level.map_or(true, |level| heading_level(node) == Some(level))
        && query.checked.map_or(true, |c| checked_state(node) == Some(c))
        && query.selected.map_or(true, |s| selected_state(node) == Some(s))
        && query
            .pressed
            .map_or(true, |p| aria_bool(node, "aria-pressed") == Some(p))
        && query
            .expanded
            .map_or(true, |e| aria_bool(node, "aria-expanded") == Some(e))
}

/// Elements under `container` with the requested role and state
pub fn query_all_by_role(container: &Node, query: &RoleQuery) -> QueryResult<Vec<Node>> {
    let identity = Normalizer::identity();
    Ok(container
        .descendants()
        .into_iter()
        .filter(|node| has_role(node, query))
        .filter(|node| states_match(node, query))
        .filter(|node| query.hidden || !is_inaccessible(node))
        .filter(|node| {
            query.name.as_ref().map_or(true, |name| {
                matches_with(&accessible_name(node), Some(node), name, &identity)
            })
        })
        .collect())
}

/// Elements under `container` (itself included) grouped by first role
///
/// Groups are ordered by first appearance in the tree.
#[must_use]
pub fn get_roles(container: &Node, hidden: bool) -> Vec<(String, Vec<Node>)> {
    let mut nodes = Vec::new();
    if container.is_element() {
        nodes.push(container.clone());
    }
    nodes.extend(container.descendants());

    let mut groups: Vec<(String, Vec<Node>)> = Vec::new();
    for node in nodes {
        if !hidden && is_inaccessible(&node) {
            continue;
        }
        let Some(role) = roles_of(&node).into_iter().next() else {
            continue;
        };
        match groups.iter_mut().find(|(existing, _)| *existing == role) {
            Some((_, members)) => members.push(node),
            None => groups.push((role, vec![node])),
        }
    }
    groups
}

/// Render the role groups of `container` for humans
#[must_use]
pub fn pretty_roles(container: &Node, hidden: bool) -> String {
    get_roles(container, hidden)
        .into_iter()
        .map(|(role, members)| {
            let elements = members
                .iter()
                .map(|node| format!("Name \"{}\":\n{}", accessible_name(node), pretty_element(node)))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("{role}:\n\n{elements}\n\n{ROLE_DELIMITER}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Emit [`pretty_roles`] through `tracing`
pub fn log_roles(container: &Node, hidden: bool) {
    tracing::info!("\n{}", pretty_roles(container, hidden));
}

fn missing_message(container: &Node, query: &RoleQuery) -> String {
    let roles = pretty_roles(container, query.hidden);
    let role_message = if !roles.is_empty() {
        let indented = roles.replace('\n', "\n  ").replace("\n  \n", "\n\n");
        format!(
            "Here are the {} roles:\n\n  {indented}\n",
            if query.hidden { "available" } else { "accessible" }
        )
    } else if query.hidden {
        "There are no available roles.".to_string()
    } else {
        "There are no accessible roles. But there might be some inaccessible roles. If you wish \
         to access them, then set the `hidden` option to `true`."
            .to_string()
    };
    format!(
        "Unable to find an {}element with the role \"{}\"{}\n\n{role_message}",
        if query.hidden { "" } else { "accessible " },
        query.role,
        query.name_hint()
    )
    .trim()
    .to_string()
}

/// The role query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<RoleQuery> {
    build_queries(
        query_all_by_role,
        |_, query: &RoleQuery| {
            format!(
                "Found multiple elements with the role \"{}\"{}",
                query.role,
                query.name_hint()
            )
        },
        missing_message,
    )
    .with_config(config.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use regex::Regex;

    fn all(html: &str, query: RoleQuery) -> Vec<Node> {
        let doc = Document::parse(html);
        family(&Config::default())
            .query_all_by(&doc.body(), &query)
            .unwrap()
    }

    mod role_tests {
        use super::*;

        #[test]
        fn test_implicit_roles() {
            let doc = Document::parse(
                "<a href=\"/\">x</a><a>no</a><h3>t</h3><ul><li>i</li></ul>\
                 <input><input type=\"checkbox\"><input type=\"hidden\"><select></select>\
                 <select multiple></select><img alt=\"\"><textarea></textarea>",
            );
            let roles: Vec<Option<&str>> = doc.body().descendants().iter().map(implicit_role).collect();
            assert_eq!(
                roles,
                vec![
                    Some("link"),
                    None,
                    Some("heading"),
                    Some("list"),
                    Some("listitem"),
                    Some("textbox"),
                    Some("checkbox"),
                    None,
                    Some("combobox"),
                    Some("listbox"),
                    Some("presentation"),
                    Some("textbox"),
                ]
            );
        }

        #[test]
        fn test_explicit_role_first_token() {
            let html = "<div role=\"switch checkbox\"></div>";
            assert_eq!(all(html, "switch".into()).len(), 1);
            assert!(all(html, "checkbox".into()).is_empty());
            assert_eq!(all(html, RoleQuery::new("checkbox").query_fallbacks(true)).len(), 1);
        }

        #[test]
        fn test_explicit_role_overrides_implicit() {
            assert!(all("<button role=\"tab\">A</button>", "button".into()).is_empty());
        }
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn test_hidden_elements_skipped() {
            let html = "<button>Shown</button><div hidden><button>Gone</button></div>\
                        <button aria-hidden=\"true\">Aria</button>\
                        <button style=\"display: none\">Styled</button>";
            assert_eq!(all(html, "button".into()).len(), 1);
            assert_eq!(all(html, RoleQuery::new("button").hidden(true)).len(), 4);
        }

        #[test]
        fn test_name_filter() {
            let html = "<button>Save</button><button aria-label=\"Close dialog\">×</button>";
            assert_eq!(all(html, RoleQuery::new("button").name("Save")).len(), 1);
            assert_eq!(all(html, RoleQuery::new("button").name("Close dialog")).len(), 1);
            let re = Regex::new("^close").unwrap();
            assert!(all(html, RoleQuery::new("button").name(re)).is_empty());
            let re = Regex::new("(?i)^close").unwrap();
            assert_eq!(all(html, RoleQuery::new("button").name(re)).len(), 1);
        }

        #[test]
        fn test_name_from_label() {
            let html = "<label for=\"q\">Search terms</label><input id=\"q\">";
            assert_eq!(
                all(html, RoleQuery::new("textbox").name("Search terms")).len(),
                1
            );
        }

        #[test]
        fn test_level_filter() {
            let html = "<h1>A</h1><h2>B</h2><div role=\"heading\" aria-level=\"2\">C</div>";
            assert_eq!(all(html, RoleQuery::new("heading").level(2)).len(), 2);
        }

        #[test]
        fn test_checked_filter() {
            let html = "<input type=\"checkbox\" checked><input type=\"checkbox\">\
                        <div role=\"checkbox\" aria-checked=\"true\"></div>";
            assert_eq!(all(html, RoleQuery::new("checkbox").checked(true)).len(), 2);
            assert_eq!(all(html, RoleQuery::new("checkbox").checked(false)).len(), 1);
        }

        #[test]
        fn test_pressed_and_expanded() {
            let html = "<button aria-pressed=\"true\">B</button>\
                        <button aria-expanded=\"false\">Menu</button>";
            assert_eq!(all(html, RoleQuery::new("button").pressed(true)).len(), 1);
            assert_eq!(all(html, RoleQuery::new("button").expanded(false)).len(), 1);
        }
    }

    mod name_tests {
        use super::*;

        fn name_of(html: &str, selector: &str) -> String {
            let doc = Document::parse(html);
            accessible_name(&doc.body().query_selector(selector).unwrap().unwrap())
        }

        #[test]
        fn test_content_and_alt() {
            assert_eq!(
                name_of("<button>  Save <img alt=\"draft\"> </button>", "button"),
                "Save draft"
            );
        }

        #[test]
        fn test_labelledby_wins() {
            assert_eq!(
                name_of(
                    "<span id=\"a\">Full</span><span id=\"b\">name</span>\
                     <input aria-labelledby=\"a b\" aria-label=\"ignored\">",
                    "input"
                ),
                "Full name"
            );
        }

        #[test]
        fn test_submit_default() {
            assert_eq!(name_of("<input type=\"submit\">", "input"), "Submit");
        }

        #[test]
        fn test_title_fallback() {
            assert_eq!(name_of("<div role=\"note\" title=\"Tip\"></div>", "div"), "Tip");
        }
    }

    mod message_tests {
        use super::*;

        #[test]
        fn test_missing_lists_accessible_roles() {
            let doc = Document::parse("<h1>Welcome</h1><button>Go</button>");
            let err = family(&Config::default())
                .get_by(&doc.body(), &RoleQuery::new("link").name("Home"))
                .unwrap_err();
            let message = err.to_string();
            assert!(message.starts_with(
                "Unable to find an accessible element with the role \"link\" and name \"Home\"\n\n\
                 Here are the accessible roles:\n\n  heading:\n\n  Name \"Welcome\":\n  <h1 />"
            ));
            assert!(message.contains("  button:\n\n  Name \"Go\":\n  <button />"));
            assert!(message.contains(ROLE_DELIMITER));
        }

        #[test]
        fn test_missing_without_roles() {
            let doc = Document::new();
            let message = missing_message(&doc.body(), &RoleQuery::new("button"));
            assert!(message.starts_with(
                "Unable to find an accessible element with the role \"button\"\n\n\
                 There are no accessible roles."
            ));
            let message = missing_message(&doc.body(), &RoleQuery::new("button").hidden(true));
            assert_eq!(
                message,
                "Unable to find an element with the role \"button\"\n\nThere are no available roles."
            );
        }

        #[test]
        fn test_multiple_message_with_regex_name() {
            let doc = Document::parse("<button>a</button><button>b</button>");
            let query = RoleQuery::new("button").name(Regex::new("^[ab]$").unwrap());
            let err = family(&Config::default())
                .get_by(&doc.body(), &query)
                .unwrap_err();
            assert!(err
                .to_string()
                .starts_with("Found multiple elements with the role \"button\" and name `/^[ab]$/`"));
        }

        #[test]
        fn test_get_roles_groups_in_order() {
            let doc = Document::parse("<button>a</button><h2>t</h2><button>b</button>");
            let groups = get_roles(&doc.body(), false);
            let names: Vec<(&str, usize)> = groups
                .iter()
                .map(|(role, members)| (role.as_str(), members.len()))
                .collect();
            assert_eq!(names, vec![("button", 2), ("heading", 1)]);
        }
    }
}
