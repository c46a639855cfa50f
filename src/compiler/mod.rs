//! Schema compiler: walks an [`ElementDef`] tree depth-first and emits one
//! CREATE TABLE per repeatable group, parents strictly before children so a
//! child's parent-id foreign key always references an existing table.

use log::{debug, warn};

use crate::core::{Column, DataType, Result, StorageError};
use crate::ident::{
    derive_table_name, formatted_join, sanitize, truncate, NamingContext, TableDescriptor,
    TableRegistry,
};
use crate::schema::{Dialect, ElementDef, FormDef, SchemaType};
use crate::storage::{TableSchema, ID_COLUMN, PARENT_ID_COLUMN};

/// One column of a generated table, carrying both the emitted SQL type and
/// the backend type of the values the population engine will produce.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub data_type: DataType,
}

/// One table-creation statement, in structured form. `to_sql` renders the
/// dialect-specific DDL text; `table_schema` yields the backend schema.
#[derive(Debug, Clone)]
pub struct CreateTable {
    pub table_name: String,
    pub parent_table_name: Option<String>,
    pub xpath: String,
    pub columns: Vec<ColumnDef>,
}

impl CreateTable {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.table_name);
        match dialect {
            Dialect::MySql => sql.push_str(" ( id INT(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"),
            Dialect::Sqlite => sql.push_str(" ( id INTEGER PRIMARY KEY"),
        }
        for column in &self.columns {
            sql.push_str(&format!(", {} {}", column.name, column.sql_type));
        }
        if let Some(parent) = &self.parent_table_name {
            match dialect {
                Dialect::MySql => sql.push_str(&format!(
                    ", parent_id INT(11), FOREIGN KEY (parent_id) REFERENCES {}(id) ON DELETE SET NULL",
                    parent
                )),
                Dialect::Sqlite => sql.push_str(&format!(
                    ", parent_id REFERENCES {}(id) ON DELETE SET NULL",
                    parent
                )),
            }
        }
        sql.push_str(" );");
        sql
    }

    pub fn table_schema(&self) -> TableSchema {
        let mut columns = vec![Column::new(ID_COLUMN, DataType::Integer).not_null()];
        for column in &self.columns {
            columns.push(Column::new(column.name.clone(), column.data_type.clone()));
        }
        if self.parent_table_name.is_some() {
            // nullable: parent deletion sets the link to NULL rather than
            // cascading, orphan detection happens elsewhere
            columns.push(Column::new(PARENT_ID_COLUMN, DataType::Integer));
        }
        TableSchema::new(self.table_name.clone(), columns)
    }

    fn descriptor(&self, form_id: u64) -> TableDescriptor {
        TableDescriptor {
            table_name: self.table_name.clone(),
            parent_table_name: self.parent_table_name.clone(),
            form_id,
            xpath: self.xpath.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.sql_type.clone()))
                .collect(),
        }
    }
}

pub struct SchemaCompiler<'a> {
    form: &'a FormDef,
    form_id: u64,
    registry: &'a TableRegistry,
    dialect: Dialect,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(form: &'a FormDef, form_id: u64, registry: &'a TableRegistry, dialect: Dialect) -> Self {
        Self {
            form,
            form_id,
            registry,
            dialect,
        }
    }

    fn naming_context(&self) -> NamingContext<'_> {
        NamingContext {
            domain: self.form.domain.as_deref(),
            version: self.form.version,
        }
    }

    /// Compiles the whole form, registering a descriptor for every emitted
    /// table. On any failure every registration made by this pass is undone.
    pub fn compile(&self) -> Result<Vec<CreateTable>> {
        let mut out = Vec::new();
        self.compile_element_table(&self.form.root, "", None, &mut out)?;

        if out.is_empty() || (out.len() == 1 && out[0].columns.is_empty()) {
            return Err(StorageError::EmptyForm(self.form.name.clone()));
        }

        let mut registered: Vec<String> = Vec::new();
        for create in &out {
            debug!("{}", create.to_sql(self.dialect));
            if let Err(err) = self.registry.register(create.descriptor(self.form_id)) {
                for name in registered.iter().rev() {
                    let _ = self.registry.remove(name);
                }
                return Err(err);
            }
            registered.push(create.table_name.clone());
        }
        Ok(out)
    }

    /// Emits the table for one repeatable (or root) element: its own CREATE
    /// first, then its descendant tables, preserving topological order.
    fn compile_element_table(
        &self,
        element: &ElementDef,
        enclosing_path: &str,
        parent_table: Option<&str>,
        out: &mut Vec<CreateTable>,
    ) -> Result<()> {
        let path = formatted_join(enclosing_path, &element.name);
        let table_name = derive_table_name(&path, &self.naming_context());

        let mut descendants = Vec::new();
        let fields = if element.is_repeatable && element.is_leaf() {
            // a repeatable leaf is its own table with a single value column
            self.field_columns(element)
        } else {
            self.collect_fields(element, &path, &table_name, &mut descendants)?
        };

        out.push(CreateTable {
            table_name,
            parent_table_name: parent_table.map(str::to_string),
            xpath: element.xpath.clone(),
            columns: fields,
        });
        out.extend(descendants);
        Ok(())
    }

    /// Gathers the column list for `element`'s table while emitting tables
    /// for any repeatable descendants. Non-repeatable groups are flattened:
    /// their children's columns are hoisted into the enclosing table.
    fn collect_fields(
        &self,
        element: &ElementDef,
        path: &str,
        own_table: &str,
        descendants: &mut Vec<CreateTable>,
    ) -> Result<Vec<ColumnDef>> {
        let mut local_fields = Vec::new();
        for child in &element.child_elements {
            if child.is_repeatable {
                self.compile_element_table(child, path, Some(own_table), descendants)?;
            } else if !child.is_leaf() {
                let child_path = formatted_join(path, &child.name);
                let hoisted = self.collect_fields(child, &child_path, own_table, descendants)?;
                for column in hoisted {
                    self.push_field(&mut local_fields, column);
                }
            } else {
                for column in self.field_columns(child) {
                    self.push_field(&mut local_fields, column);
                }
            }
        }
        Ok(local_fields)
    }

    fn push_field(&self, fields: &mut Vec<ColumnDef>, column: ColumnDef) {
        if fields.iter().any(|existing| existing.name == column.name) {
            // truncation can fold two long names onto one identifier; this
            // is a preserved limitation, never silently corrected
            warn!(
                "column name collision '{}' in generated table, keeping both definitions",
                column.name
            );
        }
        fields.push(column);
    }

    /// The column definition(s) one leaf element contributes. A multiselect
    /// expands to one boolean column per vocabulary member; an element whose
    /// multiselect vocabulary cannot be resolved contributes nothing.
    fn field_columns(&self, element: &ElementDef) -> Vec<ColumnDef> {
        let schema_type =
            match SchemaType::resolve(element.type_name.as_deref(), &element.name, &self.form.types) {
                Some(schema_type) => schema_type,
                None => return Vec::new(),
            };
        let label = truncate(&sanitize(&element.name));
        match &schema_type {
            SchemaType::MultiSelect(vocabulary) => vocabulary
                .iter()
                .map(|value| ColumnDef {
                    name: truncate(&format!("{}_{}", label, sanitize(value))),
                    sql_type: schema_type.column_type(self.dialect).to_string(),
                    data_type: schema_type.data_type(),
                })
                .collect(),
            _ => vec![ColumnDef {
                name: label,
                sql_type: schema_type.column_type(self.dialect).to_string(),
                data_type: schema_type.data_type(),
            }],
        }
    }
}
