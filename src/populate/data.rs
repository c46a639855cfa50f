/// One node of an externally-parsed XML instance tree.
///
/// The submission intake layer parses the raw payload; the engine only ever
/// sees this tree, whose root corresponds to the form's root element.
#[derive(Debug, Clone, Default)]
pub struct DataNode {
    pub namespace: Option<String>,
    /// Schema version declared on the instance root, when the submission
    /// carries one. Only meaningful on the root node.
    pub version: Option<u32>,
    pub tag: String,
    pub text: Option<String>,
    pub children: Vec<DataNode>,
}

impl DataNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: DataNode) -> Self {
        self.children.push(child);
        self
    }

    /// Tag comparison is case-insensitive; the namespace must match when the
    /// node carries one (nodes without a namespace inherit the form's).
    pub fn matches(&self, namespace: &str, tag: &str) -> bool {
        let ns_ok = match &self.namespace {
            Some(ns) => ns.eq_ignore_ascii_case(namespace),
            None => true,
        };
        ns_ok && self.tag.eq_ignore_ascii_case(tag)
    }

    /// All nodes in this subtree (self included) matching the qualified tag,
    /// in document order.
    pub fn find_matching<'a>(&'a self, namespace: &str, tag: &str) -> Vec<&'a DataNode> {
        let mut found = Vec::new();
        self.collect_matching(namespace, tag, &mut found);
        found
    }

    fn collect_matching<'a>(&'a self, namespace: &str, tag: &str, found: &mut Vec<&'a DataNode>) {
        if self.matches(namespace, tag) {
            found.push(self);
        }
        for child in &self.children {
            child.collect_matching(namespace, tag, found);
        }
    }

    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
