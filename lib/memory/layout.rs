//! Sizes and field offsets of types.

use crate::ast::{AggregateKind, Program, Type};
use crate::config::{Config, DataModel, Packing};
use crate::error::*;
use std::collections::{BTreeMap, BTreeSet};

/// The placement of one field in a struct or union.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldLayout {
    name: String,
    offset: u64,
    type_: Type,
}

impl FieldLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateLayout {
    kind: AggregateKind,
    size: Option<u64>,
    align: u64,
    fields: Vec<FieldLayout>,
}

impl AggregateLayout {
    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    /// The size of the aggregate, `None` when a field has no static size.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn align(&self) -> u64 {
        self.align
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Type layouts for a program.
///
/// Struct fields are placed in declaration order at increasing offsets.
/// Union fields all start at offset zero, and a union is as large as its
/// largest field.
#[derive(Clone, Debug)]
pub struct Layout {
    packing: Packing,
    data_model: DataModel,
    aggregates: BTreeMap<String, AggregateLayout>,
}

impl Layout {
    pub fn new(program: &Program, config: &Config) -> Result<Layout, Error> {
        let mut layout = Layout {
            packing: config.packing(),
            data_model: config.data_model(),
            aggregates: BTreeMap::new(),
        };
        let mut visiting = BTreeSet::new();
        for name in program.aggregates().keys() {
            layout.compute(program, name, &mut visiting)?;
        }
        Ok(layout)
    }

    fn compute(
        &mut self,
        program: &Program,
        name: &str,
        visiting: &mut BTreeSet<String>,
    ) -> Result<(), Error> {
        if self.aggregates.contains_key(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(Error::Layout(format!("`{}` contains itself", name)));
        }
        let aggregate = program
            .aggregate_by_name(name)
            .ok_or_else(|| Error::UnknownAggregate(name.to_string()))?;

        for field in aggregate.fields() {
            if let Some(inner) = aggregate_name(field.type_()) {
                self.compute(program, inner, visiting)?;
            }
        }

        let mut fields = Vec::new();
        let mut offset = 0;
        let mut size = Some(0);
        let mut align = 1;
        for field in aggregate.fields() {
            let field_size = self.size_of(field.type_())?;
            let field_align = self.align_of(field.type_())?;
            align = align.max(field_align);
            let field_offset = match aggregate.kind() {
                AggregateKind::Struct => align_up(offset, field_align),
                AggregateKind::Union => 0,
            };
            fields.push(FieldLayout {
                name: field.name().to_string(),
                offset: field_offset,
                type_: field.type_().clone(),
            });
            match (aggregate.kind(), field_size) {
                (AggregateKind::Struct, Some(field_size)) => {
                    offset = field_offset.checked_add(field_size).ok_or_else(|| {
                        Error::Layout(format!("`{}` is too large", name))
                    })?;
                    size = size.map(|_| offset);
                }
                (AggregateKind::Union, Some(field_size)) => {
                    size = size.map(|size: u64| size.max(field_size));
                }
                (_, None) => size = None,
            }
        }
        let size = size.map(|size| align_up(size, align));

        visiting.remove(name);
        self.aggregates.insert(
            name.to_string(),
            AggregateLayout {
                kind: aggregate.kind(),
                size,
                align,
                fields,
            },
        );
        Ok(())
    }

    fn pointer_size(&self) -> u64 {
        match self.data_model {
            DataModel::Lp64 => 8,
            DataModel::Ilp32 => 4,
        }
    }

    /// The size of a type in bytes. Arrays without a static length have no
    /// size.
    pub fn size_of(&self, type_: &Type) -> Result<Option<u64>, Error> {
        Ok(Some(match type_ {
            Type::Void | Type::Bool | Type::Char | Type::Function(_) => 1,
            Type::Short => 2,
            Type::Int | Type::Enum(_) | Type::Float => 4,
            Type::Long => self.pointer_size(),
            Type::LongLong | Type::Double => 8,
            Type::LongDouble => match self.data_model {
                DataModel::Lp64 => 16,
                DataModel::Ilp32 => 12,
            },
            Type::Pointer(_) => self.pointer_size(),
            Type::Array(element, Some(length)) => match self.size_of(element)? {
                Some(size) => size
                    .checked_mul(*length)
                    .ok_or_else(|| Error::Layout(format!("`{}` is too large", type_)))?,
                None => return Ok(None),
            },
            Type::Array(_, None) => return Ok(None),
            Type::Struct(name) | Type::Union(name) => return Ok(self.aggregate(name)?.size()),
        }))
    }

    /// The size of a type, for types which must have one, such as the
    /// target of a scalar access.
    pub fn width_of(&self, type_: &Type) -> Result<u64, Error> {
        self.size_of(type_)?
            .ok_or_else(|| Error::Layout(format!("`{}` has no static size", type_)))
    }

    pub fn align_of(&self, type_: &Type) -> Result<u64, Error> {
        if self.packing == Packing::Compact {
            return Ok(1);
        }
        Ok(match type_ {
            Type::Array(element, _) => self.align_of(element)?,
            Type::Struct(name) | Type::Union(name) => self.aggregate(name)?.align(),
            Type::LongDouble => 16.min(self.size_of(type_)?.unwrap_or(1)),
            scalar => self.size_of(scalar)?.unwrap_or(1),
        })
    }

    pub fn aggregate(&self, name: &str) -> Result<&AggregateLayout, Error> {
        self.aggregates
            .get(name)
            .ok_or_else(|| Error::UnknownAggregate(name.to_string()))
    }

    /// The offset and type of a field of a struct or union type.
    pub fn field(&self, type_: &Type, field: &str) -> Result<(u64, Type), Error> {
        let name = aggregate_name(type_)
            .ok_or_else(|| Error::UnknownField(type_.to_string(), field.to_string()))?;
        let layout = self
            .aggregate(name)?
            .field(field)
            .ok_or_else(|| Error::UnknownField(name.to_string(), field.to_string()))?;
        Ok((layout.offset(), layout.type_().clone()))
    }

    /// The size of the objects a pointer of this type steps over.
    pub fn element_size(&self, pointer: &Type) -> Result<Option<u64>, Error> {
        match pointer.pointee() {
            Some(pointee) => self.size_of(pointee),
            None => Ok(Some(1)),
        }
    }
}

fn aggregate_name(type_: &Type) -> Option<&str> {
    match type_ {
        Type::Struct(name) | Type::Union(name) => Some(name),
        Type::Array(element, _) => aggregate_name(element),
        _ => None,
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.saturating_add(align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn program() -> Program {
        Program::new("main")
            .aggregate(structure("S", vec![("a", Type::Long), ("b", Type::Int)]))
            .aggregate(structure(
                "T",
                vec![("c", Type::Char), ("s", Type::Struct("S".into())), ("d", Type::Short)],
            ))
            .aggregate(union_(
                "U",
                vec![("i", Type::Int), ("c", Type::Char.array_of(Some(6))), ("l", Type::Long)],
            ))
    }

    #[test]
    fn compact_struct() {
        let layout = Layout::new(&program(), &Config::default()).unwrap();
        let s = layout.aggregate("S").unwrap();
        assert_eq!(s.size(), Some(12));
        assert_eq!(s.field("a").unwrap().offset(), 0);
        assert_eq!(s.field("b").unwrap().offset(), 8);

        let t = layout.aggregate("T").unwrap();
        assert_eq!(t.size(), Some(15));
        let offsets: Vec<u64> = t.fields().iter().map(|f| f.offset()).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        for pair in t.fields().windows(2) {
            let size = layout.size_of(pair[0].type_()).unwrap().unwrap();
            assert!(pair[0].offset() + size <= pair[1].offset());
        }
    }

    #[test]
    fn oversized_types() {
        let layout = Layout::new(&Program::new("main"), &Config::default()).unwrap();
        let huge = Type::Long.array_of(Some(u64::MAX / 4));
        assert!(matches!(layout.size_of(&huge), Err(Error::Layout(_))));

        let program = Program::new("main").aggregate(structure(
            "Big",
            vec![
                ("a", Type::Char.array_of(Some(u64::MAX - 1))),
                ("b", Type::Int),
            ],
        ));
        assert!(matches!(
            Layout::new(&program, &Config::default()),
            Err(Error::Layout(_))
        ));
    }

    #[test]
    fn aligned_struct() {
        let config = Config::default().with_packing(Packing::Aligned);
        let layout = Layout::new(&program(), &config).unwrap();
        assert_eq!(layout.aggregate("S").unwrap().size(), Some(16));
        let t = layout.aggregate("T").unwrap();
        assert_eq!(t.field("s").unwrap().offset(), 8);
        assert_eq!(t.field("d").unwrap().offset(), 24);
        assert_eq!(t.size(), Some(32));
    }

    #[test]
    fn union_fields_overlap() {
        let layout = Layout::new(&program(), &Config::default()).unwrap();
        let u = layout.aggregate("U").unwrap();
        assert!(u.fields().iter().all(|field| field.offset() == 0));
        assert_eq!(u.size(), Some(8));
    }

    #[test]
    fn recursive_aggregate() {
        let program = Program::new("main")
            .aggregate(structure("A", vec![("b", Type::Struct("B".into()))]))
            .aggregate(structure("B", vec![("a", Type::Struct("A".into()))]));
        assert!(Layout::new(&program, &Config::default()).is_err());

        let list = Program::new("main").aggregate(structure(
            "Node",
            vec![("next", Type::Struct("Node".into()).pointer_to())],
        ));
        assert!(Layout::new(&list, &Config::default()).is_ok());
    }
}
