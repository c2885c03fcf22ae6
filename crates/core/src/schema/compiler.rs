use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::converter::{AttributeConverter, ConverterRegistry};
use crate::error::{MappingError, Result};
use crate::schema::cache::SchemaCache;
use crate::schema::descriptor::{FieldDescriptor, FieldType, KeyRole, Record, RecordDescriptor, RecordRef};
use crate::schema::table::{
    AttributeMapping, Encoder, FieldMapping, FlattenedField, IndexDefinition, KeyAttribute,
    Layouts, RecordLayout, TableSchema,
};

/// Compiles record descriptors into table schemas.
///
/// Compilation happens once per root record type; later calls are served from the cache,
/// including failed compilations.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    cache: Arc<SchemaCache>,
    registry: ConverterRegistry,
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new(Arc::new(SchemaCache::new()), ConverterRegistry::default())
    }
}

impl SchemaCompiler {
    pub fn new(cache: Arc<SchemaCache>, registry: ConverterRegistry) -> Self {
        Self { cache, registry }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn compile<T: Record>(&self) -> Result<Arc<TableSchema<T>>> {
        self.cache.get_or_compile((TypeId::of::<T>(), self.registry.identity()), || {
            Session::new(&self.registry).compile::<T>()
        })
    }
}

/// One compilation: an arena of layouts for every record type reachable from the root.
///
/// A slot is allocated before the record's fields are compiled, so a record reached again while
/// still in progress resolves to its slot index instead of recursing.
struct Session<'a> {
    registry: &'a ConverterRegistry,
    slots: Vec<Option<RecordLayout>>,
    index: HashMap<TypeId, usize>,
}

impl<'a> Session<'a> {
    fn new(registry: &'a ConverterRegistry) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn compile<T: Record>(mut self) -> Result<TableSchema<T>> {
        let descriptor = T::descriptor();
        let root = self.allocate(TypeId::of::<T>(), &descriptor)?;
        debug_assert_eq!(root, Layouts::ROOT);

        let layouts = self
            .slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(Layouts)
            .ok_or_else(|| MappingError::config(descriptor.name, "compilation left an empty slot"))?;

        let keys = collect_keys(&layouts, descriptor.name)?;

        Ok(TableSchema {
            record_name: descriptor.name,
            table_name: descriptor
                .table_name
                .clone()
                .unwrap_or_else(|| descriptor.name.to_string()),
            layouts,
            partition_key: keys.partition,
            sort_key: keys.sort,
            indices: keys.indices,
            _record: PhantomData,
        })
    }

    fn layout(&mut self, record: &RecordRef) -> Result<usize> {
        match self.index.get(&record.type_id) {
            Some(&slot) => Ok(slot),
            None => self.allocate(record.type_id, &(record.descriptor)()),
        }
    }

    fn allocate(&mut self, type_id: TypeId, descriptor: &RecordDescriptor) -> Result<usize> {
        let slot = self.slots.len();
        self.slots.push(None);
        self.index.insert(type_id, slot);

        let layout = self.compile_layout(descriptor)?;
        self.slots[slot] = Some(layout);
        Ok(slot)
    }

    fn compile_layout(&mut self, descriptor: &RecordDescriptor) -> Result<RecordLayout> {
        let record = descriptor.name;
        let parameters = descriptor.constructor.as_ref().ok_or_else(|| {
            MappingError::config(record, "no designated constructor is declared")
        })?;

        let mut declared = HashSet::new();
        for field in &descriptor.fields {
            if !declared.insert(field.name.as_str()) {
                return Err(MappingError::config(
                    record,
                    format!("field `{}` is declared more than once", field.name),
                ));
            }
        }

        let mapped: Vec<&FieldDescriptor> = descriptor.fields.iter().filter(|f| !f.ignore).collect();
        if parameters.len() != mapped.len() {
            return Err(MappingError::config(
                record,
                format!(
                    "constructor takes {} parameters but {} fields are mapped",
                    parameters.len(),
                    mapped.len()
                ),
            ));
        }

        let mut fields = Vec::with_capacity(mapped.len());
        let mut bound = HashSet::new();
        for parameter in parameters {
            let field = mapped
                .iter()
                .find(|f| f.name == *parameter)
                .filter(|_| bound.insert(parameter.as_str()))
                .ok_or_else(|| {
                    MappingError::config(
                        record,
                        format!("constructor parameter `{parameter}` does not match a mapped field"),
                    )
                })?;
            fields.push(self.compile_field(record, field)?);
        }

        let layout = RecordLayout {
            name: record,
            fields,
            preserve_empty_object: descriptor.preserve_empty_object,
        };
        self.check_attribute_names(&layout)?;
        Ok(layout)
    }

    fn compile_field(&mut self, record: &'static str, field: &FieldDescriptor) -> Result<FieldMapping> {
        let name = field.name.as_str();

        if field.flatten {
            let FieldType::Record(target) = &field.field_type else {
                return Err(MappingError::config(
                    record,
                    format!("flattened field `{name}` is not a record"),
                ));
            };
            if field.converter.is_some() || !field.roles.is_empty() || field.attribute_name.is_some() {
                return Err(MappingError::config(
                    record,
                    format!("flattened field `{name}` cannot declare a converter, key role or rename"),
                ));
            }
            let layout = self.layout(target)?;
            if self.slots[layout].is_none() {
                return Err(MappingError::config(
                    record,
                    format!("field `{name}` flattens {} recursively", target.type_name),
                ));
            }
            return Ok(FieldMapping::Flattened(FlattenedField {
                field: field.name.clone(),
                layout,
                nullable: field.nullable,
            }));
        }

        let encoder = match self.encoder(record, name, &field.field_type, field.converter.clone())? {
            Encoder::Record { layout, .. } => Encoder::Record {
                layout,
                preserve_empty_object: field.preserve_empty_object,
            },
            _ if field.preserve_empty_object => {
                return Err(MappingError::config(
                    record,
                    format!("preserve-empty-object on `{name}` requires a record field"),
                ));
            }
            other => other,
        };

        if !field.roles.is_empty() {
            match &encoder {
                Encoder::Converter(c) if c.attribute_kind().is_key_kind() => {}
                _ => {
                    return Err(MappingError::config(
                        record,
                        format!("key attribute `{name}` must be a string, number or binary scalar"),
                    ))
                }
            }
        }

        if field.atomic_counter.is_some() && field.field_type != FieldType::Int {
            return Err(MappingError::config(
                record,
                format!("atomic counter `{name}` must be an Int field"),
            ));
        }

        if let Some(counter) = field.atomic_counter {
            if counter.start.checked_sub(counter.delta).is_none() {
                return Err(MappingError::config(
                    record,
                    format!(
                        "atomic counter `{name}`: start {} minus delta {} overflows a 64-bit integer",
                        counter.start, counter.delta
                    ),
                ));
            }
        }

        Ok(FieldMapping::Attribute(AttributeMapping {
            field: field.name.clone(),
            attribute: field.attribute_name.clone().unwrap_or_else(|| field.name.clone()),
            field_type: field.field_type.clone(),
            nullable: field.nullable,
            roles: field.roles.clone(),
            update_behavior: field.update_behavior,
            atomic_counter: field.atomic_counter,
            encoder,
        }))
    }

    /// Explicit converter first, else resolution by declared type.
    fn encoder(
        &mut self,
        record: &'static str,
        field: &str,
        field_type: &FieldType,
        converter: Option<Arc<dyn AttributeConverter>>,
    ) -> Result<Encoder> {
        if let Some(converter) = converter {
            if converter.native_type() != *field_type {
                return Err(MappingError::config(
                    record,
                    format!(
                        "converter for `{field}` handles {} but the field is declared as {field_type}",
                        converter.native_type()
                    ),
                ));
            }
            return Ok(Encoder::Converter(converter));
        }

        match field_type {
            FieldType::List(element) => Ok(Encoder::List(Box::new(
                self.encoder(record, field, element, None)?,
            ))),
            FieldType::Map(value) => Ok(Encoder::Map(Box::new(
                self.encoder(record, field, value, None)?,
            ))),
            FieldType::Set(element) => match self.encoder(record, field, element, None)? {
                Encoder::Converter(c) if c.attribute_kind().is_key_kind() => Ok(Encoder::Set(c)),
                _ => Err(MappingError::config(
                    record,
                    format!("set `{field}` must hold strings, numbers or binaries, not {element}"),
                )),
            },
            FieldType::Record(target) => Ok(Encoder::Record {
                layout: self.layout(target)?,
                preserve_empty_object: false,
            }),
            scalar => self
                .registry
                .resolve(record, field, scalar)?
                .map(Encoder::Converter)
                .ok_or_else(|| {
                    MappingError::config(record, format!("no converter handles {scalar} for `{field}`"))
                }),
        }
    }

    fn check_attribute_names(&self, layout: &RecordLayout) -> Result<()> {
        let mut names = Vec::new();
        self.collect_names(layout, &mut names);

        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                return Err(MappingError::config(
                    layout.name,
                    format!("attribute `{name}` is mapped more than once"),
                ));
            }
        }
        Ok(())
    }

    fn collect_names<'s>(&'s self, layout: &'s RecordLayout, names: &mut Vec<&'s str>) {
        for mapping in &layout.fields {
            match mapping {
                FieldMapping::Attribute(a) => names.push(a.attribute.as_str()),
                FieldMapping::Flattened(f) => {
                    if let Some(child) = self.slots[f.layout].as_ref() {
                        self.collect_names(child, names);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct Keys {
    partition: Option<KeyAttribute>,
    sort: Option<KeyAttribute>,
    indices: Vec<IndexDefinition>,
}

#[derive(Default)]
struct KeyCandidates {
    partition: Vec<KeyAttribute>,
    sort: Vec<KeyAttribute>,
    indices: BTreeMap<String, (Vec<KeyAttribute>, Vec<KeyAttribute>)>,
}

impl KeyCandidates {
    fn gather(&mut self, layouts: &Layouts, index: usize, path: &[String]) {
        for mapping in &layouts.get(index).fields {
            match mapping {
                FieldMapping::Attribute(a) => {
                    let Encoder::Converter(converter) = &a.encoder else {
                        continue;
                    };
                    let mut field_path = path.to_vec();
                    field_path.push(a.field.clone());
                    let key = KeyAttribute {
                        attribute: a.attribute.clone(),
                        path: field_path,
                        converter: Arc::clone(converter),
                    };
                    for role in &a.roles {
                        match role {
                            KeyRole::Partition => self.partition.push(key.clone()),
                            KeyRole::Sort => self.sort.push(key.clone()),
                            KeyRole::SecondaryPartition(names) => {
                                for name in names {
                                    self.indices.entry(name.clone()).or_default().0.push(key.clone());
                                }
                            }
                            KeyRole::SecondarySort(names) => {
                                for name in names {
                                    self.indices.entry(name.clone()).or_default().1.push(key.clone());
                                }
                            }
                        }
                    }
                }
                FieldMapping::Flattened(f) => {
                    let mut child_path = path.to_vec();
                    child_path.push(f.field.clone());
                    self.gather(layouts, f.layout, &child_path);
                }
            }
        }
    }
}

/// Primary and index keys of the root record, flattened records included.
fn collect_keys(layouts: &Layouts, record: &'static str) -> Result<Keys> {
    let mut candidates = KeyCandidates::default();
    candidates.gather(layouts, Layouts::ROOT, &[]);

    let partition = single(candidates.partition, || {
        MappingError::config(record, "more than one partition key is declared")
    })?;
    let sort = single(candidates.sort, || {
        MappingError::config(record, "more than one sort key is declared")
    })?;
    if sort.is_some() && partition.is_none() {
        return Err(MappingError::config(
            record,
            "a sort key is declared without a partition key",
        ));
    }

    let mut indices = Vec::with_capacity(candidates.indices.len());
    for (name, (partitions, sorts)) in candidates.indices {
        let index_partition = single(partitions, || {
            MappingError::config(record, format!("index `{name}` declares more than one partition key"))
        })?;
        let index_sort = single(sorts, || {
            MappingError::config(record, format!("index `{name}` declares more than one sort key"))
        })?;
        let partition_key = index_partition
            .or_else(|| partition.clone())
            .ok_or_else(|| MappingError::config(record, format!("index `{name}` has no partition key")))?;
        let global = partition
            .as_ref()
            .is_none_or(|table| table.attribute != partition_key.attribute);
        indices.push(IndexDefinition {
            name,
            partition_key,
            sort_key: index_sort,
            global,
        });
    }

    Ok(Keys {
        partition,
        sort,
        indices,
    })
}

fn single<F>(mut keys: Vec<KeyAttribute>, too_many: F) -> Result<Option<KeyAttribute>>
where
    F: FnOnce() -> MappingError,
{
    if keys.len() > 1 {
        return Err(too_many());
    }
    Ok(keys.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{AttributeKind, CompressionConverter};
    use crate::schema::fixtures::*;
    use crate::schema::ConstructorArgs;
    use crate::value::{Fields, Value};
    use std::thread;

    fn compile<T: Record>() -> Result<Arc<TableSchema<T>>> {
        SchemaCompiler::default().compile::<T>()
    }

    fn config_reason<T: Record>() -> String {
        match compile::<T>() {
            Err(MappingError::SchemaConfiguration { reason, .. }) => reason,
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_compile_keys_and_indices() {
        let schema = compile::<MessageThread>().unwrap();

        assert_eq!(schema.table_name(), "MessageThread");
        assert_eq!(schema.partition_key().unwrap().attribute_name(), "pk");
        assert_eq!(schema.sort_key().unwrap().attribute_name(), "threadNo");
        assert_eq!(schema.sort_key().unwrap().kind(), AttributeKind::N);

        let by_author = schema.index("by-author").unwrap();
        assert!(by_author.is_global());
        assert_eq!(by_author.partition_key().attribute_name(), "author");
        assert_eq!(by_author.sort_key().unwrap().attribute_name(), "threadNo");

        let by_subject = schema.index("by-subject").unwrap();
        assert!(!by_subject.is_global());
        assert_eq!(by_subject.partition_key().attribute_name(), "pk");
    }

    #[test]
    fn test_compile_is_cached() {
        let compiler = SchemaCompiler::default();

        let first = compiler.compile::<MessageThread>().unwrap();
        let second = compiler.compile::<MessageThread>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.cache().compilations(), 1);
    }

    #[test]
    fn test_concurrent_compile_is_idempotent() {
        let compiler = SchemaCompiler::default();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| compiler.compile::<Node>().unwrap());
                scope.spawn(|| compiler.compile::<MessageThread>().unwrap());
            }
        });

        assert_eq!(compiler.cache().compilations(), 2);
    }

    #[test]
    fn test_nested_types_are_not_published() {
        let compiler = SchemaCompiler::default();

        compiler.compile::<Container>().unwrap();

        assert_eq!(compiler.cache().len(), 1);
    }

    #[test]
    fn test_recursive_record_round_trip() {
        let schema = compile::<Node>().unwrap();
        let tree = Node::new(
            "root",
            vec![
                Node::new("a", vec![Node::new("a1", vec![Node::leaf("a1x")])]),
                Node::leaf("b"),
            ],
        );

        let item = schema.to_item(&tree).unwrap();
        let decoded = schema.from_item(&item).unwrap();

        assert_eq!(decoded, tree);
        assert_eq!(decoded.children[0].children[0].children[0].name, "a1x");
    }

    #[test]
    fn test_mutually_recursive_records() {
        let schema = compile::<Employee>().unwrap();
        let employee = Employee {
            id: "e1".to_string(),
            team: Some(Team {
                name: "core".to_string(),
                lead: Some(Box::new(Employee {
                    id: "e0".to_string(),
                    team: None,
                })),
            }),
        };

        let decoded = schema.from_item(&schema.to_item(&employee).unwrap()).unwrap();

        assert_eq!(decoded, employee);
    }

    #[test]
    fn test_flatten_splices_attributes() {
        let schema = compile::<Customer>().unwrap();
        let customer = Customer {
            id: "c1".to_string(),
            address: Some(Address {
                street: "Main".to_string(),
                city: Some("Montevideo".to_string()),
            }),
        };

        let item = schema.to_item(&customer).unwrap();

        let mut names: Vec<_> = item.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["city", "id", "street"]);
        assert_eq!(schema.from_item(&item).unwrap(), customer);
    }

    #[test]
    fn test_flattened_record_absent_decodes_as_none() {
        let schema = compile::<Customer>().unwrap();
        let customer = Customer {
            id: "c2".to_string(),
            address: None,
        };

        let item = schema.to_item(&customer).unwrap();

        assert_eq!(item.len(), 1);
        assert_eq!(schema.from_item(&item).unwrap(), customer);
    }

    #[test]
    fn test_flattened_non_nullable_all_null_round_trip() {
        let schema = compile::<Annotated>().unwrap();
        let record = Annotated {
            id: "x".to_string(),
            meta: Nested { note: None },
        };

        let item = schema.to_item(&record).unwrap();

        assert_eq!(item.len(), 1);
        assert_eq!(schema.from_item(&item).unwrap(), record);
    }

    #[test]
    fn test_flatten_collision_fails() {
        let reason = config_reason::<Clashing>();

        assert!(reason.contains("`street` is mapped more than once"), "{reason}");
    }

    #[test]
    fn test_flattened_key_counts_as_parent_key() {
        let schema = compile::<Tenanted>().unwrap();
        let record = Tenanted {
            tenant: TenantKey {
                tenant_id: "t1".to_string(),
            },
            body: "hello".to_string(),
        };

        let key = schema.key_of(&record).unwrap();

        assert_eq!(schema.partition_key().unwrap().field_path(), ["tenant", "tenant_id"]);
        assert_eq!(key, crate::Key::new("t1"));
    }

    #[test]
    fn test_recursive_flatten_fails() {
        let reason = config_reason::<SelfFlattening>();

        assert!(reason.contains("recursively"), "{reason}");
    }

    #[test]
    fn test_constructor_arity_mismatch_fails() {
        let reason = config_reason::<WrongArity>();

        assert_eq!(reason, "constructor takes 1 parameters but 2 fields are mapped");
    }

    #[test]
    fn test_missing_constructor_fails() {
        let reason = config_reason::<NoConstructor>();

        assert_eq!(reason, "no designated constructor is declared");
    }

    #[test]
    fn test_configuration_error_is_cached() {
        let compiler = SchemaCompiler::default();

        let first = compiler.compile::<NoConstructor>().unwrap_err();
        let second = compiler.compile::<NoConstructor>().unwrap_err();

        assert_eq!(first, second);
        assert_eq!(compiler.cache().compilations(), 1);
    }

    #[test]
    fn test_invalid_key_kind_fails() {
        let reason = config_reason::<BoolKey>();

        assert!(reason.contains("must be a string, number or binary scalar"), "{reason}");
    }

    #[test]
    fn test_two_partition_keys_fail() {
        let reason = config_reason::<TwoPartitionKeys>();

        assert_eq!(reason, "more than one partition key is declared");
    }

    #[test]
    fn test_converter_type_mismatch_fails() {
        let reason = config_reason::<MismatchedConverter>();

        assert!(reason.contains("handles Bytes but the field is declared as String"), "{reason}");
    }

    #[test]
    fn test_ignored_field_is_not_mapped() {
        let schema = compile::<WithIgnored>().unwrap();
        let record = WithIgnored {
            id: "w1".to_string(),
            cached: 99,
        };

        let item = schema.to_item(&record).unwrap();
        let decoded = schema.from_item(&item).unwrap();

        assert_eq!(schema.attribute_names(), vec!["id"]);
        assert_eq!(decoded.cached, 0);
    }

    #[test]
    fn test_custom_registry_converter_is_used() {
        let compiler = SchemaCompiler::new(
            Arc::new(SchemaCache::new()),
            ConverterRegistry::new().with(Arc::new(CompressionConverter::default())),
        );
        let schema = compiler.compile::<Blobby>().unwrap();
        let record = Blobby {
            id: "b".to_string(),
            payload: vec![7; 512],
        };

        let item = schema.to_item(&record).unwrap();

        assert!(item["payload"].as_b().unwrap().as_ref().len() < 512);
        assert_eq!(schema.from_item(&item).unwrap(), record);
    }

    #[test]
    fn test_shared_cache_keeps_registries_apart() {
        let cache = Arc::new(SchemaCache::new());
        let plain = SchemaCompiler::new(Arc::clone(&cache), ConverterRegistry::default());
        let zstd = SchemaCompiler::new(
            Arc::clone(&cache),
            ConverterRegistry::new().with(Arc::new(CompressionConverter::default())),
        );
        let record = Blobby {
            id: "b".to_string(),
            payload: vec![7; 512],
        };

        let raw = plain.compile::<Blobby>().unwrap().to_item(&record).unwrap();
        let compressed = zstd.compile::<Blobby>().unwrap().to_item(&record).unwrap();

        assert_eq!(raw["payload"].as_b().unwrap().as_ref().len(), 512);
        assert!(compressed["payload"].as_b().unwrap().as_ref().len() < 512);
        assert_eq!(cache.compilations(), 2);
        assert!(Arc::ptr_eq(
            &plain.compile::<Blobby>().unwrap(),
            &plain.clone().compile::<Blobby>().unwrap()
        ));
    }

    #[test]
    fn test_counter_base_overflow_fails() {
        let reason = config_reason::<OverflowingCounter>();

        assert!(reason.contains("atomic counter `hits`"), "{reason}");
        assert!(reason.contains("overflows"), "{reason}");
    }

    #[test]
    fn test_builder_requires_non_nullable_fields() {
        let schema = compile::<Customer>().unwrap();

        let mut builder = schema.new_builder();
        builder.set("address", Value::Null);
        let result = builder.build();

        assert!(matches!(
            result,
            Err(MappingError::SchemaConfiguration { record: "Customer", reason })
                if reason == "required field `id` was never populated"
        ));
    }

    #[test]
    fn test_builder_builds_record() {
        let schema = compile::<Customer>().unwrap();

        let mut builder = schema.new_builder();
        builder.set("id", "c9");
        let customer = builder.build().unwrap();

        assert_eq!(
            customer,
            Customer {
                id: "c9".to_string(),
                address: None
            }
        );
    }

    #[test]
    fn test_construct_uses_declared_parameters() {
        let mut args = ConstructorArgs::new("Address", Fields::new().with("street", "s").with("city", Value::Null));

        let address = Address::construct(&mut args).unwrap();

        assert_eq!(address.city, None);
    }
}
