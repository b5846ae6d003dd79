//! Filter nodes and chains in the encoder's filtergraph syntax.
//!
//! Values go through two escaping levels, as the encoder parses them twice:
//! once when splitting a filter's `key=value` options ([`escape_text`]), once
//! when splitting the graph into filters and chains (applied by
//! [`FilterSpec::render`]).

use std::fmt;

/// One node of a filter chain: a filter name plus ordered options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub options: Vec<(String, String)>,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Append an option. Values are stored verbatim.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((key.into(), value.to_string()));
        self
    }

    /// Value of the first option named `key`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Filtergraph text for this node, e.g. `pad=w=1280:h=720`.
    pub fn render(&self) -> String {
        if self.options.is_empty() {
            return self.name.clone();
        }
        let options = self
            .options
            .iter()
            .map(|(k, v)| format!("{k}={}", escape_graph_value(v)))
            .collect::<Vec<_>>()
            .join(":");
        format!("{}={options}", self.name)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// An ordered, linear chain of filter nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    nodes: Vec<FilterSpec>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: FilterSpec) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[FilterSpec] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with the given filter name, in chain order.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FilterSpec> {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// Comma-separated chain text suitable for `-vf`.
    pub fn render(&self) -> String {
        self.nodes
            .iter()
            .map(FilterSpec::render)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Chain text wrapped in input/output pad labels, for `-filter_complex`.
    pub fn render_labeled(&self, input: &str, output: &str) -> String {
        format!("[{input}]{}[{output}]", self.render())
    }
}

impl FromIterator<FilterSpec> for FilterChain {
    fn from_iter<I: IntoIterator<Item = FilterSpec>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// Escape free text for embedding as a filter option value.
///
/// Backslash, colon and single quote are the option parser's delimiters.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | ':' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_graph_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_rendering_keeps_option_order() {
        let node = FilterSpec::new("scale")
            .with("w", 1280)
            .with("h", 720)
            .with("force_original_aspect_ratio", "decrease");
        assert_eq!(
            node.render(),
            "scale=w=1280:h=720:force_original_aspect_ratio=decrease"
        );
        assert_eq!(node.option("h"), Some("720"));
        assert_eq!(node.option("missing"), None);
    }

    #[test]
    fn test_node_without_options() {
        assert_eq!(FilterSpec::new("null").render(), "null");
    }

    #[test]
    fn test_chain_rendering() {
        let chain: FilterChain = [
            FilterSpec::new("scale").with("w", 640).with("h", 360),
            FilterSpec::new("setsar").with("sar", 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(chain.render(), "scale=w=640:h=360,setsar=sar=1");
        assert_eq!(
            chain.render_labeled("0:v", "v0"),
            "[0:v]scale=w=640:h=360,setsar=sar=1[v0]"
        );
    }

    #[test]
    fn test_escape_text_delimiters() {
        assert_eq!(escape_text("Due: Rs. 999"), "Due\\: Rs. 999");
        assert_eq!(escape_text("it's"), "it\\'s");
        assert_eq!(escape_text("a\\b"), "a\\\\b");
        assert_eq!(escape_text("₹999.00"), "₹999.00");
    }

    #[test]
    fn test_graph_level_escaping() {
        let node = FilterSpec::new("drawtext")
            .with("text", escape_text("Time: 10, 20"))
            .with("enable", "between(t,0,5)");
        assert_eq!(
            node.render(),
            "drawtext=text=Time\\\\: 10\\, 20:enable=between(t\\,0\\,5)"
        );
    }

    #[test]
    fn test_nodes_named() {
        let chain: FilterChain = [
            FilterSpec::new("scale"),
            FilterSpec::new("drawtext").with("text", "a"),
            FilterSpec::new("drawtext").with("text", "b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(chain.nodes_named("drawtext").count(), 2);
        assert_eq!(chain.len(), 3);
        assert!(!chain.is_empty());
    }
}
