use std::collections::HashMap;

/// One node of the externally-parsed form definition tree.
///
/// Produced by the XML-schema parser that sits outside this crate; the engine
/// treats it as read-only input. A node with `is_repeatable` set always
/// becomes its own table; a non-repeatable group is flattened into its
/// enclosing table.
#[derive(Debug, Clone, Default)]
pub struct ElementDef {
    pub name: String,
    /// Slash-joined path from the form root, used as the stable key for
    /// table registration and lookup.
    pub xpath: String,
    /// Schema-declared type string, e.g. `string`, `integer`, `date`,
    /// `list.<enum>`. `None` when the schema omitted it.
    pub type_name: Option<String>,
    pub is_repeatable: bool,
    pub child_elements: Vec<ElementDef>,
}

impl ElementDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.is_repeatable = true;
        self
    }

    pub fn with_child(mut self, child: ElementDef) -> Self {
        self.child_elements.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.child_elements.is_empty()
    }

    /// Fills in the xpath of every node from its position in the tree.
    /// Idempotent; called once when a form is registered.
    pub fn assign_xpaths(&mut self, parent_xpath: &str) {
        self.xpath = if parent_xpath.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", parent_xpath, self.name)
        };
        let own_xpath = self.xpath.clone();
        for child in &mut self.child_elements {
            child.assign_xpaths(&own_xpath);
        }
    }
}

/// An enumerated simple type declared by the schema; the value space of a
/// multi-select field.
#[derive(Debug, Clone, Default)]
pub struct SimpleType {
    pub multiselect_values: Vec<String>,
}

impl SimpleType {
    pub fn new(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            multiselect_values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A complete form definition: the root element plus form-level identity and
/// the named simple types referenced by `list.<enum>` fields.
#[derive(Debug, Clone, Default)]
pub struct FormDef {
    pub name: String,
    pub target_namespace: String,
    pub version: Option<u32>,
    pub domain: Option<String>,
    pub types: HashMap<String, SimpleType>,
    pub root: ElementDef,
}

impl FormDef {
    pub fn new(name: impl Into<String>, target_namespace: impl Into<String>, root: ElementDef) -> Self {
        let name = name.into();
        let mut root = root;
        root.assign_xpaths("");
        Self {
            name,
            target_namespace: target_namespace.into(),
            version: None,
            domain: None,
            types: HashMap::new(),
            root,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_simple_type(mut self, name: impl Into<String>, simple_type: SimpleType) -> Self {
        self.types.insert(name.into(), simple_type);
        self
    }

    /// Looks up the vocabulary behind a `list.<enum>` type name.
    pub fn multiselect_vocabulary(&self, type_name: &str) -> Option<&SimpleType> {
        self.types.get(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_assignment() {
        let root = ElementDef::new("visit")
            .with_child(ElementDef::new("patient").with_child(ElementDef::new("age").with_type("integer")));
        let form = FormDef::new("visit", "http://example.org/visit", root);
        assert_eq!(form.root.xpath, "visit");
        assert_eq!(form.root.child_elements[0].xpath, "visit/patient");
        assert_eq!(
            form.root.child_elements[0].child_elements[0].xpath,
            "visit/patient/age"
        );
    }
}
