//! Schema registry: type name -> ordered child definitions.
//!
//! Each [`ChildDefinition`] carries the capability objects used to read and
//! write that child on an [`Element`]. Code that walks resources generically
//! (the binary codec, JSON conversion, meta stamping) dispatches through
//! these descriptors instead of matching on concrete value types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::fhir::FhirVersion;

use super::element::{Base, Element, Primitive};

/// Name of the child that maps onto the element's own identity.
pub const ID_CHILD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Composite,
    Resource,
}

/// Upper bound of a child's cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Bounded(u32),
    Unbounded,
}

impl Cardinality {
    pub fn max(&self) -> Option<u32> {
        match self {
            Cardinality::Single => Some(1),
            Cardinality::Bounded(n) => Some(*n),
            Cardinality::Unbounded => None,
        }
    }

    pub fn is_repeated(&self) -> bool {
        self.max() != Some(1)
    }
}

/// Reads the values of one child.
pub trait ChildAccessor: Send + Sync {
    fn values(&self, element: &Element) -> Vec<Base>;

    fn first_value_or_none(&self, element: &Element) -> Option<Base> {
        self.values(element).into_iter().next()
    }
}

/// Writes the values of one child.
pub trait ChildMutator: Send + Sync {
    /// Replaces the child's value; `None` clears it.
    fn set_value(&self, element: &mut Element, value: Option<Base>);

    fn add_value(&self, element: &mut Element, value: Base);
}

/// Accessor backed by the element's field map.
#[derive(Debug, Clone)]
pub struct FieldChild {
    name: String,
}

impl FieldChild {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ChildAccessor for FieldChild {
    fn values(&self, element: &Element) -> Vec<Base> {
        element.field(&self.name).to_vec()
    }
}

impl ChildMutator for FieldChild {
    fn set_value(&self, element: &mut Element, value: Option<Base>) {
        match value {
            Some(value) => element.set_field(&self.name, value),
            None => {
                element.remove_field(&self.name);
            }
        }
    }

    fn add_value(&self, element: &mut Element, value: Base) {
        element.push_field(&self.name, value);
    }
}

/// Accessor bound to [`Element::id_base`].
#[derive(Debug, Clone)]
pub struct IdChild {
    type_name: String,
}

impl ChildAccessor for IdChild {
    fn values(&self, element: &Element) -> Vec<Base> {
        element
            .id_base()
            .map(|id| vec![Base::Primitive(Primitive::with_value(&self.type_name, id))])
            .unwrap_or_default()
    }
}

impl ChildMutator for IdChild {
    fn set_value(&self, element: &mut Element, value: Option<Base>) {
        let id = value.and_then(|v| v.as_primitive()?.value_as_string().map(str::to_string));
        element.set_id_base(id);
    }

    fn add_value(&self, element: &mut Element, value: Base) {
        self.set_value(element, Some(value));
    }
}

/// One declared child of a type.
#[derive(Clone)]
pub struct ChildDefinition {
    name: String,
    min: u32,
    max: Cardinality,
    types: Vec<String>,
    accessor: Arc<dyn ChildAccessor>,
    mutator: Arc<dyn ChildMutator>,
}

impl ChildDefinition {
    pub fn new(name: impl Into<String>, types: Vec<String>, min: u32, max: Cardinality) -> Self {
        let name = name.into();
        let field = Arc::new(FieldChild::new(name.clone()));
        Self {
            name,
            min,
            max,
            types,
            accessor: field.clone(),
            mutator: field,
        }
    }

    fn identity(type_name: &str) -> Self {
        let id = Arc::new(IdChild {
            type_name: type_name.to_string(),
        });
        Self {
            name: ID_CHILD.to_string(),
            min: 0,
            max: Cardinality::Single,
            types: vec![type_name.to_string()],
            accessor: id.clone(),
            mutator: id,
        }
    }

    /// Overrides the capability objects, e.g. for computed children.
    pub fn with_capabilities(
        mut self,
        accessor: Arc<dyn ChildAccessor>,
        mutator: Arc<dyn ChildMutator>,
    ) -> Self {
        self.accessor = accessor;
        self.mutator = mutator;
        self
    }

    pub fn element_name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> Cardinality {
        self.max
    }

    pub fn is_repeated(&self) -> bool {
        self.max.is_repeated()
    }

    /// Declared type codes. More than one means a choice child (`value[x]`).
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_choice(&self) -> bool {
        self.types.len() > 1
    }

    pub fn type_code(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    pub fn accessor(&self) -> &dyn ChildAccessor {
        self.accessor.as_ref()
    }

    pub fn mutator(&self) -> &dyn ChildMutator {
        self.mutator.as_ref()
    }
}

impl fmt::Debug for ChildDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildDefinition")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("types", &self.types)
            .finish()
    }
}

/// A named type and its children in declared order.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    name: String,
    kind: TypeKind,
    children: Vec<ChildDefinition>,
    index: HashMap<String, usize>,
}

impl TypeDefinition {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Primitive,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// A datatype; gets the `id` child (type `string`) automatically.
    pub fn composite(name: impl Into<String>) -> Self {
        Self::with_identity(name.into(), TypeKind::Composite, "string")
    }

    /// A resource; gets the `id` child (type `id`) automatically.
    pub fn resource(name: impl Into<String>) -> Self {
        Self::with_identity(name.into(), TypeKind::Resource, "id")
    }

    fn with_identity(name: String, kind: TypeKind, id_type: &str) -> Self {
        let mut def = Self {
            name,
            kind,
            children: Vec::new(),
            index: HashMap::new(),
        };
        def.push(ChildDefinition::identity(id_type));
        def
    }

    fn push(&mut self, child: ChildDefinition) {
        self.index.insert(child.name.clone(), self.children.len());
        self.children.push(child);
    }

    pub fn child(mut self, child: ChildDefinition) -> Self {
        self.push(child);
        self
    }

    /// `0..1` child of a single type.
    pub fn single(self, name: &str, type_code: &str) -> Self {
        self.child(ChildDefinition::new(
            name,
            vec![type_code.to_string()],
            0,
            Cardinality::Single,
        ))
    }

    /// `0..*` child of a single type.
    pub fn repeated(self, name: &str, type_code: &str) -> Self {
        self.child(ChildDefinition::new(
            name,
            vec![type_code.to_string()],
            0,
            Cardinality::Unbounded,
        ))
    }

    /// `0..1` choice child (`value[x]`), declared without the `[x]` suffix.
    pub fn choice(self, name: &str, type_codes: &[&str]) -> Self {
        self.child(ChildDefinition::new(
            name,
            type_codes.iter().map(|t| t.to_string()).collect(),
            0,
            Cardinality::Single,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn children(&self) -> &[ChildDefinition] {
        &self.children
    }

    pub fn child_by_name(&self, name: &str) -> Option<&ChildDefinition> {
        self.index.get(name).map(|i| &self.children[*i])
    }
}

/// Registry of all known types for one FHIR version.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    version: FhirVersion,
    types: HashMap<String, Arc<TypeDefinition>>,
}

impl SchemaContext {
    pub fn builder(version: FhirVersion) -> SchemaContextBuilder {
        SchemaContextBuilder {
            version,
            types: HashMap::new(),
        }
    }

    pub fn version(&self) -> FhirVersion {
        self.version
    }

    pub fn definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.types.get(type_name).map(Arc::as_ref)
    }

    /// Definition of a composite datatype; `None` for unknown or primitive types.
    pub fn element_definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.definition(type_name)
            .filter(|def| def.kind() != TypeKind::Primitive)
    }

    /// Definition of a resource type. Unknown types are a configuration
    /// defect: stores are only ever opened for types the schema declares.
    pub fn resource_definition(&self, resource_type: &str) -> Result<&TypeDefinition> {
        self.definition(resource_type)
            .filter(|def| def.kind() == TypeKind::Resource)
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "Unknown resource type '{resource_type}' for FHIR {}",
                    self.version
                ))
            })
    }

    pub fn is_primitive(&self, type_name: &str) -> bool {
        self.definition(type_name)
            .is_some_and(|def| def.kind() == TypeKind::Primitive)
    }

    pub fn has_resource(&self, resource_type: &str) -> bool {
        self.resource_definition(resource_type).is_ok()
    }

    /// Creates an empty value of `type_name`.
    pub fn new_instance(&self, type_name: &str) -> Option<Base> {
        let def = self.definition(type_name)?;
        Some(match def.kind() {
            TypeKind::Primitive => Base::Primitive(Primitive::new(type_name)),
            TypeKind::Composite | TypeKind::Resource => Base::Composite(Element::new(type_name)),
        })
    }

    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .values()
            .filter(|def| def.kind() == TypeKind::Resource)
            .map(|def| def.name())
            .collect();
        names.sort_unstable();
        names
    }
}

pub struct SchemaContextBuilder {
    version: FhirVersion,
    types: HashMap<String, Arc<TypeDefinition>>,
}

impl SchemaContextBuilder {
    pub fn primitives(mut self, names: &[&str]) -> Self {
        for name in names {
            self.types
                .insert(name.to_string(), Arc::new(TypeDefinition::primitive(*name)));
        }
        self
    }

    pub fn define(mut self, def: TypeDefinition) -> Self {
        self.types.insert(def.name().to_string(), Arc::new(def));
        self
    }

    pub fn build(self) -> SchemaContext {
        SchemaContext {
            version: self.version,
            types: self.types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaContext {
        SchemaContext::builder(FhirVersion::R4)
            .primitives(&["string", "id", "boolean"])
            .define(
                TypeDefinition::composite("HumanName")
                    .single("family", "string")
                    .repeated("given", "string"),
            )
            .define(
                TypeDefinition::resource("Patient")
                    .single("active", "boolean")
                    .repeated("name", "HumanName"),
            )
            .build()
    }

    #[test]
    fn test_children_keep_declared_order() {
        let schema = schema();
        let patient = schema.resource_definition("Patient").unwrap();
        let names: Vec<_> = patient.children().iter().map(|c| c.element_name()).collect();
        assert_eq!(names, vec!["id", "active", "name"]);
        assert!(patient.child_by_name("name").unwrap().is_repeated());
        assert!(!patient.child_by_name("active").unwrap().is_repeated());
    }

    #[test]
    fn test_unknown_resource_is_configuration_error() {
        let schema = schema();
        assert!(matches!(
            schema.resource_definition("Encounter"),
            Err(CoreError::Configuration(_))
        ));
        assert!(schema.resource_definition("HumanName").is_err());
    }

    #[test]
    fn test_field_child_capabilities() {
        let schema = schema();
        let name_def = schema.element_definition("HumanName").unwrap();
        let given = name_def.child_by_name("given").unwrap();

        let mut name = Element::new("HumanName");
        given
            .mutator()
            .add_value(&mut name, Base::Primitive(Primitive::with_value("string", "A")));
        given
            .mutator()
            .add_value(&mut name, Base::Primitive(Primitive::with_value("string", "B")));
        assert_eq!(given.accessor().values(&name).len(), 2);

        given.mutator().set_value(&mut name, None);
        assert!(given.accessor().first_value_or_none(&name).is_none());
    }

    #[test]
    fn test_id_child_maps_to_identity() {
        let schema = schema();
        let id_child = schema
            .resource_definition("Patient")
            .unwrap()
            .child_by_name(ID_CHILD)
            .unwrap();

        let mut patient = Element::new("Patient");
        id_child.mutator().set_value(
            &mut patient,
            Some(Base::Primitive(Primitive::with_value("id", "Patient/1/_history/2"))),
        );
        assert_eq!(patient.id_base(), Some("Patient/1/_history/2"));
        let values = id_child.accessor().values(&patient);
        assert_eq!(
            values[0].as_primitive().unwrap().value_as_string(),
            Some("Patient/1/_history/2")
        );
    }

    #[test]
    fn test_new_instance() {
        let schema = schema();
        assert!(matches!(schema.new_instance("string"), Some(Base::Primitive(_))));
        assert!(matches!(schema.new_instance("HumanName"), Some(Base::Composite(_))));
        assert!(schema.new_instance("Unknown").is_none());
    }
}
