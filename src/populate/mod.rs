//! Data population engine: recursive co-traversal of a parsed XML instance
//! tree and the matching [`ElementDef`] tree, producing a [`Statement`] tree
//! that is executed depth-first so parent ids are known before child inserts.

pub mod data;

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, error};

use crate::core::{Result, StorageError, Value};
use crate::ident::{data_name, sanitize, truncate, TableRegistry};
use crate::schema::{Dialect, ElementDef, FormDef, SchemaType};
use crate::storage::{StorageEngine, PARENT_ID_COLUMN};

pub use data::DataNode;

/// The in-memory plan for one row-and-descendants insert. Built once per
/// population pass, consumed exactly once by depth-first execution.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub table_name: String,
    pub field_values: BTreeMap<String, Value>,
    pub child_statements: Vec<Statement>,
}

impl Statement {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty() && self.child_statements.is_empty()
    }

    /// Renders the INSERT this statement will perform, with the parent id it
    /// would carry. Used for logging; execution goes through the engine.
    pub fn to_sql(&self, parent_id: Option<i64>) -> String {
        let mut columns: Vec<&str> = self.field_values.keys().map(String::as_str).collect();
        let mut literals: Vec<String> = self.field_values.values().map(Value::to_sql_literal).collect();
        if let Some(parent_id) = parent_id {
            columns.push(PARENT_ID_COLUMN);
            literals.push(parent_id.to_string());
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.table_name,
            columns.join(", "),
            literals.join(", ")
        )
    }

    /// Executes the statement tree depth-first, returning the generated id
    /// of this statement's row (None when it carried no fields).
    ///
    /// A child insert only runs after its parent's row exists and its
    /// generated key is known. A field-less statement performs no insert;
    /// its children fall back to the most recent id of this statement's
    /// table (race-prone under concurrent writers, see DESIGN.md).
    pub fn execute(&self, engine: &StorageEngine) -> Result<Option<i64>> {
        self.execute_with_parent(engine, None)
    }

    fn execute_with_parent(&self, engine: &StorageEngine, parent_id: Option<i64>) -> Result<Option<i64>> {
        if !self.field_values.is_empty() {
            let mut values = self.field_values.clone();
            if let Some(parent_id) = parent_id {
                values.insert(PARENT_ID_COLUMN.to_string(), Value::Integer(parent_id));
            }
            debug!("{}", self.to_sql(parent_id));
            let new_id = engine.insert(&self.table_name, &values)?;
            for child in &self.child_statements {
                child.execute_with_parent(engine, Some(new_id))?;
            }
            Ok(Some(new_id))
        } else {
            let fallback = engine.last_id(&self.table_name).unwrap_or(None).or(parent_id);
            for child in &self.child_statements {
                child.execute_with_parent(engine, fallback)?;
            }
            Ok(None)
        }
    }
}

/// Non-fatal problems encountered during one population pass. Missing
/// schema branches are expected (repeatable and conditionally-irrelevant
/// fields legitimately do not appear in every instance); extra elements and
/// bad values are data-quality issues that are logged and skipped.
#[derive(Debug, Default)]
pub struct PopulationErrors {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub bad_type: Vec<String>,
}

impl PopulationErrors {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.bad_type.is_empty()
    }
}

impl fmt::Display for PopulationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Missing fields: ({})", self.missing.join(","))?;
        writeln!(f, "Extra fields: ({})", self.extra.join(","))?;
        write!(f, "Poorly formatted fields: ({})", self.bad_type.join(","))
    }
}

/// Builds the statement tree for one instance of one form.
pub struct Populator<'a> {
    form: &'a FormDef,
    form_id: u64,
    registry: &'a TableRegistry,
    dialect: Dialect,
    pub errors: PopulationErrors,
}

impl<'a> Populator<'a> {
    pub fn new(form: &'a FormDef, form_id: u64, registry: &'a TableRegistry, dialect: Dialect) -> Self {
        Self {
            form,
            form_id,
            registry,
            dialect,
            errors: PopulationErrors::default(),
        }
    }

    /// Co-traverses the data tree against the form's schema tree and returns
    /// the root statement. Unrecognized data elements and malformed values
    /// are absorbed into `self.errors`; only configuration problems (an
    /// unregistered table for a schema element) fail the pass.
    pub fn populate(&mut self, data_tree: &DataNode) -> Result<Statement> {
        let form = self.form;
        self.build_statement(data_tree, &form.root)
    }

    /// One statement for one occurrence of a repeatable (or root) element.
    fn build_statement(&mut self, data_node: &DataNode, element: &ElementDef) -> Result<Statement> {
        let descriptor = self
            .registry
            .resolve_xpath(self.form_id, &element.xpath)
            .ok_or_else(|| StorageError::ElementNotFound(element.xpath.clone()))?;

        let mut statement = Statement::new(descriptor.table_name);
        if element.is_leaf() {
            // a repeatable leaf's table has a single value column
            if let Some(text) = data_node.trimmed_text() {
                self.add_leaf_fields(element, text, &mut statement.field_values);
            }
            return Ok(statement);
        }

        self.collect(data_node, element, &mut statement)?;
        Ok(statement)
    }

    /// Walks one schema level: repeatable children become child statements,
    /// non-repeatable groups are hoisted into the current statement so the
    /// output always matches the compiled (flattened) schema shape.
    fn collect(&mut self, data_node: &DataNode, element: &ElementDef, statement: &mut Statement) -> Result<()> {
        let namespace = &self.form.target_namespace;
        for def_child in &element.child_elements {
            let tag = data_name(&element.name, &def_child.name);
            if def_child.is_repeatable {
                // one statement per occurrence, each a child of the
                // enclosing table's statement
                for occurrence in data_node.find_matching(namespace, &tag) {
                    let child_statement = self.build_statement(occurrence, def_child)?;
                    statement.child_statements.push(child_statement);
                }
            } else {
                let matched = data_node.find_matching(namespace, &tag);
                let child_node = match matched.first() {
                    Some(node) => *node,
                    None => {
                        // not an error: conditionally-irrelevant fields do
                        // not appear in every instance
                        debug!("no values parsed for {{{}}}{}", namespace, def_child.name);
                        self.errors.missing.push(def_child.name.clone());
                        continue;
                    }
                };
                if !def_child.is_leaf() {
                    self.collect(child_node, def_child, statement)?;
                } else if let Some(text) = child_node.trimmed_text() {
                    self.add_leaf_fields(def_child, text, &mut statement.field_values);
                }
            }
        }
        self.note_unrecognized(data_node, element);
        Ok(())
    }

    /// Flags direct data children that match no schema child: unrecognized
    /// elements for this form's namespace are logged and skipped, never
    /// fatal.
    fn note_unrecognized(&mut self, data_node: &DataNode, element: &ElementDef) {
        for data_child in &data_node.children {
            let recognized = element.child_elements.iter().any(|def_child| {
                data_child.matches(&self.form.target_namespace, &def_child.name)
                    || data_child.matches(
                        &self.form.target_namespace,
                        &data_name(&element.name, &def_child.name),
                    )
            });
            if !recognized {
                error!(
                    "unrecognized element '{}' for namespace {}, skipping",
                    data_child.tag, self.form.target_namespace
                );
                self.errors.extra.push(data_child.tag.clone());
            }
        }
    }

    /// Adds the coerced column/value pair(s) for one leaf element with
    /// non-empty text.
    fn add_leaf_fields(&mut self, element: &ElementDef, text: &str, fields: &mut BTreeMap<String, Value>) {
        let schema_type =
            match SchemaType::resolve(element.type_name.as_deref(), &element.name, &self.form.types) {
                Some(schema_type) => schema_type,
                // the field was skipped at compile time too
                None => return,
            };
        let label = truncate(&sanitize(&element.name));
        if schema_type.is_multiselect() {
            for (column, value) in schema_type.multiselect_values(&label, text) {
                fields.insert(column, value);
            }
            return;
        }
        self.note_bad_numeric(&schema_type, &element.name, text);
        if let Some(value) = schema_type.format_value(text, self.dialect) {
            fields.insert(label, value);
        }
    }

    fn note_bad_numeric(&mut self, schema_type: &SchemaType, name: &str, text: &str) {
        let bad = match schema_type {
            SchemaType::Integer | SchemaType::Int | SchemaType::GYear => {
                text.trim().parse::<i64>().is_err()
            }
            SchemaType::Decimal | SchemaType::Double | SchemaType::Float => {
                text.trim().parse::<f64>().is_err()
            }
            _ => false,
        };
        if bad {
            self.errors
                .bad_type
                .push(format!("{}: '{}' is not numeric", name, text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SchemaCompiler;
    use crate::schema::{FormDef, SimpleType};

    const NS: &str = "http://example.org/visit";

    fn visit_form() -> FormDef {
        let root = ElementDef::new("visit")
            .with_child(ElementDef::new("date").with_type("date"))
            .with_child(ElementDef::new("symptoms").with_type("list.symptoms"))
            .with_child(
                ElementDef::new("items")
                    .repeatable()
                    .with_child(ElementDef::new("sku").with_type("string"))
                    .with_child(ElementDef::new("count").with_type("int")),
            );
        FormDef::new("visit", NS, root)
            .with_simple_type("list.symptoms", SimpleType::new(["fever", "cough", "rash"]))
    }

    fn compiled(form: &FormDef, registry: &TableRegistry) {
        SchemaCompiler::new(form, 1, registry, Dialect::MySql)
            .compile()
            .unwrap();
    }

    fn instance() -> DataNode {
        DataNode::new("visit")
            .with_namespace(NS)
            .with_child(DataNode::new("date").with_text("2009-01-02"))
            .with_child(DataNode::new("symptoms").with_text("fever rash"))
            .with_child(
                DataNode::new("items")
                    .with_child(DataNode::new("sku").with_text("AB-1"))
                    .with_child(DataNode::new("count").with_text("3")),
            )
            .with_child(
                DataNode::new("items")
                    .with_child(DataNode::new("sku").with_text("CD-2"))
                    .with_child(DataNode::new("count").with_text("5")),
            )
    }

    #[test]
    fn test_statement_tree_shape() {
        let registry = TableRegistry::new();
        let form = visit_form();
        compiled(&form, &registry);

        let mut populator = Populator::new(&form, 1, &registry, Dialect::MySql);
        let statement = populator.populate(&instance()).unwrap();

        assert_eq!(statement.table_name, "schema_visit");
        assert_eq!(statement.field_values.get("date"), Some(&Value::Text("2009-01-02".into())));
        // multiselect: mentioned members only
        assert_eq!(statement.field_values.get("symptoms_fever"), Some(&Value::Integer(1)));
        assert_eq!(statement.field_values.get("symptoms_rash"), Some(&Value::Integer(1)));
        assert!(!statement.field_values.contains_key("symptoms_cough"));
        // one child statement per repeat occurrence
        assert_eq!(statement.child_statements.len(), 2);
        assert!(statement
            .child_statements
            .iter()
            .all(|s| s.table_name == "schema_visit_items"));
    }

    #[test]
    fn test_missing_schema_branch_is_not_an_error() {
        let registry = TableRegistry::new();
        let form = visit_form();
        compiled(&form, &registry);

        let sparse = DataNode::new("visit").with_namespace(NS);
        let mut populator = Populator::new(&form, 1, &registry, Dialect::MySql);
        let statement = populator.populate(&sparse).unwrap();

        assert!(statement.field_values.is_empty());
        assert!(statement.child_statements.is_empty());
        assert!(!populator.errors.missing.is_empty());
        assert!(populator.errors.extra.is_empty());
    }

    #[test]
    fn test_unrecognized_element_is_skipped_and_recorded() {
        let registry = TableRegistry::new();
        let form = visit_form();
        compiled(&form, &registry);

        let data = DataNode::new("visit")
            .with_namespace(NS)
            .with_child(DataNode::new("date").with_text("2009-01-02"))
            .with_child(DataNode::new("bogus").with_text("zzz"));
        let mut populator = Populator::new(&form, 1, &registry, Dialect::MySql);
        let statement = populator.populate(&data).unwrap();

        // the valid field still populated
        assert!(statement.field_values.contains_key("date"));
        assert!(!statement.field_values.contains_key("bogus"));
        assert_eq!(populator.errors.extra, vec!["bogus".to_string()]);
    }

    #[test]
    fn test_bad_numeric_value_is_recorded_and_defaulted() {
        let registry = TableRegistry::new();
        let form = visit_form();
        compiled(&form, &registry);

        let data = DataNode::new("visit").with_namespace(NS).with_child(
            DataNode::new("items").with_child(DataNode::new("count").with_text("three")),
        );
        let mut populator = Populator::new(&form, 1, &registry, Dialect::MySql);
        let statement = populator.populate(&data).unwrap();

        let item = &statement.child_statements[0];
        assert_eq!(item.field_values.get("count"), Some(&Value::Integer(0)));
        assert_eq!(populator.errors.bad_type.len(), 1);
    }

    #[test]
    fn test_insert_sql_rendering() {
        let mut statement = Statement::new("schema_visit_items");
        statement.field_values.insert("count".into(), Value::Integer(3));
        statement.field_values.insert("sku".into(), Value::Text("AB-1".into()));
        assert_eq!(
            statement.to_sql(Some(7)),
            "INSERT INTO schema_visit_items (count, sku, parent_id) VALUES (3, 'AB-1', 7);"
        );
    }
}
