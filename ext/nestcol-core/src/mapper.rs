//! Flattening of a nested [`RecordType`] into physical leaf columns
//!
//! Each scalar leaf becomes one [`PhysicalColumn`]. While walking down to a
//! leaf the mapper counts repeated ancestors (maximum repetition depth) and
//! optional-or-repeated ancestors (maximum definition depth). The walk also
//! records the [`Step`]s taken, which the record codec follows to find a
//! column's values in a [`crate::RecordValue`] and to rebuild them.

use crate::schema::{Cardinality, Field, LogicalType, RecordType, ScalarKind};
use crate::{NestcolError, Result};
use std::fmt;

/// Field names from the root record down to a leaf scalar
///
/// List elements contribute no name of their own, so a `List<List<Int64>>`
/// field `matrix` maps to the single-segment path `matrix`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnPath(Vec<String>);

/// A flattened, independently storable leaf column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalColumn {
    pub path: ColumnPath,
    pub scalar_kind: ScalarKind,
    pub max_repetition_depth: u16,
    pub max_definition_depth: u16,
}

/// One hop on the way from the root record to a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Enter a named field of the current record
    Field {
        name: String,
        cardinality: Cardinality,
    },
    /// Iterate the current value, which is itself a list element holding a list
    Element,
}

/// A physical column plus the structural route back into the record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    column: PhysicalColumn,
    steps: Vec<Step>,
}

/// Ordered physical columns derived from one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    descriptors: Vec<ColumnDescriptor>,
}

impl ColumnPath {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl ColumnDescriptor {
    pub fn column(&self) -> &PhysicalColumn {
        &self.column
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn path(&self) -> &ColumnPath {
        &self.column.path
    }

    pub fn max_repetition_depth(&self) -> u16 {
        self.column.max_repetition_depth
    }

    pub fn max_definition_depth(&self) -> u16 {
        self.column.max_definition_depth
    }
}

impl ColumnSchema {
    /// Derive the physical columns of a record type in depth-first field order
    pub fn new(record_type: &RecordType) -> Result<Self> {
        let mut walker = Walker::default();
        for field in record_type.fields() {
            walker.visit_field(field, 0, 0)?;
        }
        if walker.out.is_empty() {
            return Err(NestcolError::empty_schema("record type yields no columns"));
        }
        Ok(Self {
            descriptors: walker.out,
        })
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    pub fn columns(&self) -> impl Iterator<Item = &PhysicalColumn> {
        self.descriptors.iter().map(|d| &d.column)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Map a record type to its ordered physical columns
pub fn map_record_type(record_type: &RecordType) -> Result<Vec<PhysicalColumn>> {
    Ok(ColumnSchema::new(record_type)?.columns().cloned().collect())
}

#[derive(Default)]
struct Walker {
    path: Vec<String>,
    steps: Vec<Step>,
    out: Vec<ColumnDescriptor>,
}

impl Walker {
    fn visit_field(&mut self, field: &Field, rep: u16, def: u16) -> Result<()> {
        let (rep, def, inner) = match (&field.logical_type, field.cardinality) {
            (LogicalType::List(element), Cardinality::Repeated) => {
                (deeper(rep, field)?, deeper(def, field)?, element.as_ref())
            }
            (LogicalType::List(_), _) | (_, Cardinality::Repeated) => {
                return Err(NestcolError::unsupported(format!(
                    "field '{}' mixes {} with {:?} cardinality",
                    field.name,
                    field.logical_type.type_name(),
                    field.cardinality
                )))
            }
            (ty, Cardinality::Optional) => (rep, deeper(def, field)?, ty),
            (ty, Cardinality::Required) => (rep, def, ty),
        };

        self.path.push(field.name.clone());
        self.steps.push(Step::Field {
            name: field.name.clone(),
            cardinality: field.cardinality,
        });
        let result = self.visit_type(inner, rep, def);
        self.steps.pop();
        self.path.pop();
        result
    }

    fn visit_type(&mut self, ty: &LogicalType, rep: u16, def: u16) -> Result<()> {
        match ty {
            LogicalType::Scalar(kind) => {
                self.out.push(ColumnDescriptor {
                    column: PhysicalColumn {
                        path: ColumnPath(self.path.clone()),
                        scalar_kind: *kind,
                        max_repetition_depth: rep,
                        max_definition_depth: def,
                    },
                    steps: self.steps.clone(),
                });
                Ok(())
            }
            LogicalType::Record(fields) => {
                if fields.is_empty() {
                    return Err(NestcolError::empty_schema(format!(
                        "record at {} has no fields",
                        self.path.join(".")
                    )));
                }
                for field in fields {
                    self.visit_field(field, rep, def)?;
                }
                Ok(())
            }
            LogicalType::List(element) => {
                let overflow = || NestcolError::unsupported("list nesting is too deep");
                let rep = rep.checked_add(1).ok_or_else(overflow)?;
                let def = def.checked_add(1).ok_or_else(overflow)?;
                self.steps.push(Step::Element);
                let result = self.visit_type(element, rep, def);
                self.steps.pop();
                result
            }
        }
    }
}

fn deeper(level: u16, field: &Field) -> Result<u16> {
    level
        .checked_add(1)
        .ok_or_else(|| NestcolError::unsupported(format!("field '{}' is nested too deeply", field.name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_schema() -> RecordType {
        let person = RecordType::builder()
            .add_scalar_field("name", ScalarKind::Utf8String, Cardinality::Required)
            .unwrap()
            .add_list_field("emails", LogicalType::Scalar(ScalarKind::Utf8String))
            .unwrap()
            .build()
            .unwrap();
        RecordType::builder()
            .add_scalar_field("id", ScalarKind::Int64, Cardinality::Required)
            .unwrap()
            .add_record_field("person", person, Cardinality::Optional)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_nested_depths() {
        let columns = map_record_type(&person_schema()).unwrap();
        let summary: Vec<(String, u16, u16)> = columns
            .iter()
            .map(|c| (c.path.to_string(), c.max_repetition_depth, c.max_definition_depth))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("id".to_string(), 0, 0),
                ("person.name".to_string(), 0, 1),
                ("person.emails".to_string(), 1, 2),
            ]
        );
        assert_eq!(columns[2].scalar_kind, ScalarKind::Utf8String);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let schema = person_schema();
        assert_eq!(
            ColumnSchema::new(&schema).unwrap(),
            ColumnSchema::new(&schema).unwrap()
        );
    }

    #[test]
    fn test_nested_list_steps() {
        let schema = RecordType::builder()
            .add_list_field(
                "matrix",
                LogicalType::List(Box::new(LogicalType::Scalar(ScalarKind::Double))),
            )
            .unwrap()
            .build()
            .unwrap();
        let mapped = ColumnSchema::new(&schema).unwrap();
        let descriptor = &mapped.descriptors()[0];

        assert_eq!(descriptor.path().parts(), ["matrix".to_string()]);
        assert_eq!(descriptor.max_repetition_depth(), 2);
        assert_eq!(descriptor.max_definition_depth(), 2);
        assert_eq!(
            descriptor.steps(),
            &[
                Step::Field {
                    name: "matrix".to_string(),
                    cardinality: Cardinality::Repeated
                },
                Step::Element
            ]
        );
    }

    #[test]
    fn test_list_of_records() {
        let item = RecordType::builder()
            .add_scalar_field("sku", ScalarKind::Utf8String, Cardinality::Required)
            .unwrap()
            .add_scalar_field("qty", ScalarKind::Int64, Cardinality::Optional)
            .unwrap()
            .build()
            .unwrap();
        let schema = RecordType::builder()
            .add_list_field("items", item.to_logical_type())
            .unwrap()
            .build()
            .unwrap();

        let columns = map_record_type(&schema).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].path.to_string(), "items.sku");
        assert_eq!((columns[0].max_repetition_depth, columns[0].max_definition_depth), (1, 1));
        assert_eq!(columns[1].path.to_string(), "items.qty");
        assert_eq!((columns[1].max_repetition_depth, columns[1].max_definition_depth), (1, 2));
    }
}
