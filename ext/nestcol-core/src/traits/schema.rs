use crate::schema::{Field, LogicalType, RecordType};

/// Trait for schema introspection
///
/// This trait provides methods for examining and querying schemas
/// without modifying them.
pub trait SchemaInspector {
    /// Get the total number of fields (including nested)
    fn field_count(&self) -> usize;

    /// Get field by path (e.g., "person.emails")
    fn get_field_by_path(&self, path: &str) -> Option<&Field>;

    /// Check if schema contains a specific field
    fn has_field(&self, name: &str) -> bool;

    /// Get all field paths in depth-first order
    fn all_field_paths(&self) -> Vec<String>;
}

impl SchemaInspector for RecordType {
    fn field_count(&self) -> usize {
        self.fields().iter().map(count_fields).sum()
    }

    fn get_field_by_path(&self, path: &str) -> Option<&Field> {
        let parts: Vec<&str> = path.split('.').collect();
        get_field_by_path_parts(self.fields(), &parts)
    }

    fn has_field(&self, name: &str) -> bool {
        self.get_field_by_path(name).is_some()
    }

    fn all_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for field in self.fields() {
            collect_field_paths(field, String::new(), &mut paths);
        }
        paths
    }
}

/// Record fields reachable below a type, looking through list elements
fn nested_fields(ty: &LogicalType) -> &[Field] {
    match ty {
        LogicalType::Record(fields) => fields,
        LogicalType::List(element) => nested_fields(element),
        LogicalType::Scalar(_) => &[],
    }
}

fn count_fields(field: &Field) -> usize {
    1 + nested_fields(&field.logical_type)
        .iter()
        .map(count_fields)
        .sum::<usize>()
}

fn get_field_by_path_parts<'a>(fields: &'a [Field], parts: &[&str]) -> Option<&'a Field> {
    let (first, rest) = parts.split_first()?;
    let field = fields.iter().find(|f| f.name == *first)?;
    if rest.is_empty() {
        Some(field)
    } else {
        get_field_by_path_parts(nested_fields(&field.logical_type), rest)
    }
}

fn collect_field_paths(field: &Field, prefix: String, paths: &mut Vec<String>) {
    let current_path = if prefix.is_empty() {
        field.name.clone()
    } else {
        format!("{}.{}", prefix, field.name)
    };

    paths.push(current_path.clone());

    for child in nested_fields(&field.logical_type) {
        collect_field_paths(child, current_path.clone(), paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, ScalarKind};

    #[test]
    fn test_schema_inspector() {
        let address = RecordType::builder()
            .add_string_field("city")
            .unwrap()
            .build()
            .unwrap();
        let contact = RecordType::builder()
            .add_string_field("kind")
            .unwrap()
            .build()
            .unwrap();
        let schema = RecordType::builder()
            .add_scalar_field("id", ScalarKind::Int64, Cardinality::Required)
            .unwrap()
            .add_record_field("address", address, Cardinality::Optional)
            .unwrap()
            .add_list_field("contacts", contact.to_logical_type())
            .unwrap()
            .build()
            .unwrap();

        // id, address, city, contacts, kind
        assert_eq!(schema.field_count(), 5);

        assert!(schema.has_field("id"));
        assert!(schema.has_field("address.city"));
        assert!(schema.has_field("contacts.kind"));
        assert!(!schema.has_field("missing"));
        assert!(!schema.has_field("id.nested"));

        let city = schema.get_field_by_path("address.city").unwrap();
        assert_eq!(city.name, "city");

        assert_eq!(
            schema.all_field_paths(),
            vec!["id", "address", "address.city", "contacts", "contacts.kind"]
        );
    }
}
