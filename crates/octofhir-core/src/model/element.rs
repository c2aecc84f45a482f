//! Dynamic FHIR value tree.
//!
//! Values are untyped trees: a [`Primitive`] leaf holds a string-convertible
//! scalar, an [`Element`] holds named, possibly repeated children. The shape
//! of a type is described by the [`SchemaContext`](super::SchemaContext),
//! never by the value itself.

use indexmap::IndexMap;

use crate::id::IdType;

/// Named children of a composite, in insertion order.
pub type FieldMap = IndexMap<String, Vec<Base>>;

/// A primitive leaf (`string`, `boolean`, `dateTime`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    type_name: String,
    value: Option<String>,
}

impl Primitive {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: None,
        }
    }

    pub fn with_value(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: Some(value.into()),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value_as_string(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value_as_string(&mut self, value: Option<String>) {
        self.value = value;
    }
}

/// A composite value: a datatype instance or the root of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    type_name: String,
    id: Option<String>,
    fields: FieldMap,
}

impl Element {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            fields: FieldMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The element's own identity. For a resource root this is the full
    /// identifier value (`Type/id/_history/v`) or just the logical id.
    pub fn id_base(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id_base(&mut self, id: Option<String>) {
        self.id = id.filter(|s| !s.is_empty());
    }

    pub fn field(&self, name: &str) -> &[Base] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_mut(&mut self, name: &str) -> &mut Vec<Base> {
        self.fields.entry(name.to_string()).or_default()
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Replaces the values of `name` with a single value.
    pub fn set_field(&mut self, name: &str, value: Base) {
        self.fields.insert(name.to_string(), vec![value]);
    }

    pub fn push_field(&mut self, name: &str, value: Base) {
        self.field_mut(name).push(value);
    }

    pub fn remove_field(&mut self, name: &str) -> Vec<Base> {
        self.fields.shift_remove(name).unwrap_or_default()
    }

    /// True when no child carries a value and no identity is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fields.values().all(|values| values.iter().all(Base::is_empty))
    }

    /// Convenience builder used by tests and the CLI.
    pub fn with_primitive(
        mut self,
        name: &str,
        type_name: &str,
        value: impl Into<String>,
    ) -> Self {
        self.push_field(name, Base::Primitive(Primitive::with_value(type_name, value)));
        self
    }

    pub fn with_element(mut self, name: &str, element: Element) -> Self {
        self.push_field(name, Base::Composite(element));
        self
    }
}

/// Any node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    Primitive(Primitive),
    Composite(Element),
}

impl Base {
    pub fn type_name(&self) -> &str {
        match self {
            Base::Primitive(p) => p.type_name(),
            Base::Composite(e) => e.type_name(),
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Base::Primitive(p) => Some(p),
            Base::Composite(_) => None,
        }
    }

    pub fn as_primitive_mut(&mut self) -> Option<&mut Primitive> {
        match self {
            Base::Primitive(p) => Some(p),
            Base::Composite(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Base::Composite(e) => Some(e),
            Base::Primitive(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Base::Composite(e) => Some(e),
            Base::Primitive(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Base::Primitive(p) => !p.has_value(),
            Base::Composite(e) => e.is_empty(),
        }
    }
}

/// A resource: a root [`Element`] whose type is a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    root: Element,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            root: Element::new(resource_type),
        }
    }

    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    pub fn resource_type(&self) -> &str {
        self.root.type_name()
    }

    /// The resource identity. The resource type is filled in from the
    /// resource itself when the stored id is a bare logical id.
    pub fn id_element(&self) -> IdType {
        let mut id = self
            .root
            .id_base()
            .map(IdType::parse)
            .unwrap_or_default();
        if id.resource_type.is_none() && id.has_id_part() {
            id.resource_type = Some(self.resource_type().to_string());
        }
        id
    }

    pub fn set_id(&mut self, id: &IdType) {
        self.root.set_id_base(Some(id.value()));
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.root.set_id_base(Some(id.into()));
        self
    }

    pub fn element(&self) -> &Element {
        &self.root
    }

    pub fn element_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_element(self) -> Element {
        self.root
    }
}

impl std::ops::Deref for Resource {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.root
    }
}

impl std::ops::DerefMut for Resource {
    fn deref_mut(&mut self) -> &mut Element {
        &mut self.root
    }
}
