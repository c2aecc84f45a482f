//! FHIR JSON <-> value tree conversion driven by the schema.

use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};

use super::element::{Base, Element, Primitive, Resource};
use super::schema::{ChildDefinition, ID_CHILD, SchemaContext, TypeDefinition};

const RESOURCE_TYPE_KEY: &str = "resourceType";

/// Parses a FHIR JSON resource.
pub fn resource_from_json(schema: &SchemaContext, value: &Value) -> Result<Resource> {
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::invalid_resource("Resource must be a JSON object"))?;
    let resource_type = obj
        .get(RESOURCE_TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::invalid_resource("Missing resourceType field"))?;
    let def = schema
        .resource_definition(resource_type)
        .map_err(|_| CoreError::invalid_resource(format!("Unknown resource type: {resource_type}")))?;

    let mut root = Element::new(resource_type);
    read_object(schema, def, obj, &mut root)?;
    Ok(Resource::from_element(root))
}

/// Renders a resource as FHIR JSON. The `id` is the logical id only.
pub fn resource_to_json(schema: &SchemaContext, resource: &Resource) -> Value {
    let mut obj = Map::new();
    obj.insert(
        RESOURCE_TYPE_KEY.to_string(),
        Value::String(resource.resource_type().to_string()),
    );
    if let Some(id) = resource.id_element().id_part() {
        obj.insert(ID_CHILD.to_string(), Value::String(id.to_string()));
    }
    if let Ok(def) = schema.resource_definition(resource.resource_type()) {
        write_children(schema, def, resource.element(), &mut obj);
    }
    Value::Object(obj)
}

fn read_object(
    schema: &SchemaContext,
    def: &TypeDefinition,
    obj: &Map<String, Value>,
    target: &mut Element,
) -> Result<()> {
    for (key, value) in obj {
        // Primitive extensions (`_given`) are not modelled.
        if key == RESOURCE_TYPE_KEY || key.starts_with('_') {
            continue;
        }
        if key == ID_CHILD {
            let id = value
                .as_str()
                .ok_or_else(|| CoreError::invalid_resource(format!("{}.id must be a string", def.name())))?;
            target.set_id_base(Some(id.to_string()));
            continue;
        }

        let (child, type_code) = resolve_child(def, key).ok_or_else(|| {
            CoreError::invalid_resource(format!("Unknown element '{key}' in {}", def.name()))
        })?;

        match (child.is_repeated(), value) {
            (true, Value::Array(items)) => {
                for item in items {
                    let base = read_value(schema, type_code, item)?;
                    child.mutator().add_value(target, base);
                }
            }
            (false, Value::Array(_)) => {
                return Err(CoreError::invalid_resource(format!(
                    "{}.{key} must not be an array",
                    def.name()
                )));
            }
            (true, _) => {
                return Err(CoreError::invalid_resource(format!(
                    "{}.{key} must be an array",
                    def.name()
                )));
            }
            (false, single) => {
                let base = read_value(schema, type_code, single)?;
                child.mutator().set_value(target, Some(base));
            }
        }
    }
    Ok(())
}

fn read_value(schema: &SchemaContext, type_code: &str, value: &Value) -> Result<Base> {
    if schema.is_primitive(type_code) {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(CoreError::invalid_resource(format!(
                    "Expected a {type_code} value, found {other}"
                )));
            }
        };
        return Ok(Base::Primitive(Primitive::with_value(type_code, text)));
    }

    let def = schema
        .element_definition(type_code)
        .ok_or_else(|| CoreError::invalid_resource(format!("Unknown datatype: {type_code}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::invalid_resource(format!("Expected a {type_code} object")))?;
    let mut element = Element::new(type_code);
    read_object(schema, def, obj, &mut element)?;
    Ok(Base::Composite(element))
}

/// Finds the child for a JSON key, resolving `valueQuantity` style choice names.
fn resolve_child<'a>(def: &'a TypeDefinition, key: &str) -> Option<(&'a ChildDefinition, &'a str)> {
    if let Some(child) = def.child_by_name(key).filter(|c| !c.is_choice()) {
        return child.type_code().map(|t| (child, t));
    }
    def.children()
        .iter()
        .filter(|c| c.is_choice())
        .find_map(|child| {
            let suffix = key.strip_prefix(child.element_name())?;
            child
                .types()
                .iter()
                .find(|t| upper_first(t) == suffix)
                .map(|t| (child, t.as_str()))
        })
}

fn write_children(
    schema: &SchemaContext,
    def: &TypeDefinition,
    element: &Element,
    obj: &mut Map<String, Value>,
) {
    for child in def.children() {
        if child.element_name() == ID_CHILD {
            continue;
        }
        let values = child.accessor().values(element);
        if values.is_empty() {
            continue;
        }

        if child.is_repeated() {
            let items: Vec<Value> = values
                .iter()
                .filter_map(|v| write_value(schema, v))
                .collect();
            if !items.is_empty() {
                obj.insert(child.element_name().to_string(), Value::Array(items));
            }
        } else if let Some(value) = values.first() {
            let key = if child.is_choice() {
                format!("{}{}", child.element_name(), upper_first(value.type_name()))
            } else {
                child.element_name().to_string()
            };
            if let Some(json) = write_value(schema, value) {
                obj.insert(key, json);
            }
        }
    }
}

fn write_value(schema: &SchemaContext, value: &Base) -> Option<Value> {
    match value {
        Base::Primitive(p) => p.value_as_string().map(|s| primitive_json(p.type_name(), s)),
        Base::Composite(element) => {
            let mut obj = Map::new();
            if let Some(id) = element.id_base() {
                obj.insert(ID_CHILD.to_string(), Value::String(id.to_string()));
            }
            if let Some(def) = schema.element_definition(element.type_name()) {
                write_children(schema, def, element, &mut obj);
            }
            Some(Value::Object(obj))
        }
    }
}

fn primitive_json(type_name: &str, text: &str) -> Value {
    match type_name {
        "boolean" => text
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "integer" | "positiveInt" | "unsignedInt" => text
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        "decimal" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
