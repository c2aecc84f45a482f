//! Schema-driven conversion between resources and binary records.

use octofhir_core::model::{Base, ChildDefinition, Element, ID_CHILD, Primitive, Resource, SchemaContext};
use tracing::trace;

use crate::error::{CodecError, CodecResult};
use crate::record::{BinaryRecord, RecordBody, RecordValue};

/// Converts value trees into [`BinaryRecord`]s and back by walking the
/// children each type declares in the schema.
///
/// Encoding rules per declared child:
///
/// - repeated: a list of nested records, one per value
/// - single, non-choice primitive: flattened to a string (or null)
/// - single, anything else: a nested record
/// - absent: null
///
/// Decoding reverses this. Scalars found for a composite's child are
/// written through the child's string setter, creating the primitive when
/// needed; a scalar for `id` sets the element's identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct FhirBinaryCodec;

impl FhirBinaryCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, schema: &SchemaContext, value: &Base) -> BinaryRecord {
        match value {
            Base::Primitive(p) => encode_primitive(p),
            Base::Composite(element) => encode_element(schema, element),
        }
    }

    pub fn encode_resource(&self, schema: &SchemaContext, resource: &Resource) -> CodecResult<BinaryRecord> {
        check_resource_type(schema, resource.resource_type())?;
        Ok(encode_element(schema, resource.element()))
    }

    pub fn decode(&self, schema: &SchemaContext, target: &mut Base, record: &BinaryRecord) {
        match target {
            Base::Primitive(p) => decode_primitive(p, record),
            Base::Composite(element) => decode_element(schema, element, record),
        }
    }

    pub fn decode_resource(
        &self,
        schema: &SchemaContext,
        target: &mut Resource,
        record: &BinaryRecord,
    ) -> CodecResult<()> {
        check_resource_type(schema, target.resource_type())?;
        if record.type_name != target.resource_type() {
            return Err(CodecError::TypeMismatch {
                expected: target.resource_type().to_string(),
                found: record.type_name.clone(),
            });
        }
        decode_element(schema, target.element_mut(), record);
        Ok(())
    }
}

fn check_resource_type(schema: &SchemaContext, resource_type: &str) -> CodecResult<()> {
    if schema.has_resource(resource_type) {
        Ok(())
    } else {
        Err(CodecError::UnknownResourceType(resource_type.to_string()))
    }
}

fn encode_primitive(p: &Primitive) -> BinaryRecord {
    BinaryRecord::raw(p.type_name(), p.value_as_string().map(str::to_string))
}

fn encode_element(schema: &SchemaContext, element: &Element) -> BinaryRecord {
    let mut record = BinaryRecord::fields(element.type_name());
    let Some(def) = schema.element_definition(element.type_name()) else {
        trace!(type_name = %element.type_name(), "No definition, encoding empty record");
        return record;
    };

    for child in def.children() {
        let value = if child.is_repeated() {
            let items = child
                .accessor()
                .values(element)
                .iter()
                .map(|v| RecordValue::Record(encode_base(schema, v)))
                .collect();
            RecordValue::List(items)
        } else {
            match child.accessor().first_value_or_none(element) {
                None => RecordValue::Null,
                Some(Base::Primitive(p)) if !child.is_choice() => p.value_as_string().into(),
                Some(other) => RecordValue::Record(encode_base(schema, &other)),
            }
        };
        record.set_field(child.element_name(), value);
    }
    record
}

fn encode_base(schema: &SchemaContext, value: &Base) -> BinaryRecord {
    match value {
        Base::Primitive(p) => encode_primitive(p),
        Base::Composite(element) => encode_element(schema, element),
    }
}

fn decode_primitive(target: &mut Primitive, record: &BinaryRecord) {
    if let RecordBody::Raw(value) = &record.body {
        target.set_value_as_string(value.clone());
    }
}

fn decode_element(schema: &SchemaContext, target: &mut Element, record: &BinaryRecord) {
    let Some(def) = schema.element_definition(target.type_name()) else {
        return;
    };

    for child in def.children() {
        let Some(value) = record.field(child.element_name()) else {
            continue;
        };

        if child.is_repeated() {
            if let RecordValue::List(items) = value {
                for item in items {
                    if let Some(decoded) = decode_item(schema, child, item) {
                        child.mutator().add_value(target, decoded);
                    }
                }
            }
            continue;
        }

        match value {
            RecordValue::Null | RecordValue::List(_) => {}
            RecordValue::Record(nested) => {
                if let Some(decoded) = decode_record(schema, nested) {
                    child.mutator().set_value(target, Some(decoded));
                }
            }
            scalar => {
                let text = scalar.scalar_as_string();
                if child.element_name() == ID_CHILD {
                    target.set_id_base(text);
                } else {
                    set_scalar(schema, child, target, text);
                }
            }
        }
    }
}

/// Decodes a record into a fresh instance of the record's own type.
fn decode_record(schema: &SchemaContext, record: &BinaryRecord) -> Option<Base> {
    let Some(mut instance) = schema.new_instance(&record.type_name) else {
        trace!(type_name = %record.type_name, "Skipping record of unknown type");
        return None;
    };
    match &mut instance {
        Base::Primitive(p) => decode_primitive(p, record),
        Base::Composite(element) => decode_element(schema, element, record),
    }
    Some(instance)
}

fn decode_item(schema: &SchemaContext, child: &ChildDefinition, item: &RecordValue) -> Option<Base> {
    match item {
        RecordValue::Record(record) => decode_record(schema, record),
        RecordValue::Null | RecordValue::List(_) => None,
        scalar => {
            let type_code = child.type_code()?;
            let mut p = Primitive::new(type_code);
            p.set_value_as_string(scalar.scalar_as_string());
            Some(Base::Primitive(p))
        }
    }
}

/// Resolve-or-create the child's primitive and assign its string value.
fn set_scalar(schema: &SchemaContext, child: &ChildDefinition, target: &mut Element, text: Option<String>) {
    let existing = child
        .accessor()
        .first_value_or_none(target)
        .filter(|v| v.as_primitive().is_some());

    let instance = existing.or_else(|| child.type_code().and_then(|t| schema.new_instance(t)));
    let Some(mut instance) = instance else {
        return;
    };
    let Some(p) = instance.as_primitive_mut() else {
        return;
    };
    p.set_value_as_string(text);
    child.mutator().set_value(target, Some(instance));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{from_bytes, record_to_bytes};
    use octofhir_core::IdType;
    use octofhir_core::model::json::{resource_from_json, resource_to_json};
    use serde_json::json;

    fn patient(schema: &SchemaContext) -> Resource {
        let mut resource = resource_from_json(
            schema,
            &json!({
                "resourceType": "Patient",
                "meta": {"versionId": "7"},
                "active": true,
                "gender": "female",
                "name": [
                    {"family": "Chalmers", "given": ["Peter", "James"]},
                    {"use": "nickname", "given": ["Jim"]}
                ],
                "deceasedDateTime": "2020-01-01T00:00:00Z",
                "managingOrganization": {"reference": "Organization/1"}
            }),
        )
        .unwrap();
        resource.set_id(&IdType::versioned("Patient", "1", 7));
        resource
    }

    #[test]
    fn test_encode_flattens_simple_primitives() {
        let schema = SchemaContext::r4();
        let record = FhirBinaryCodec
            .encode_resource(&schema, &patient(&schema))
            .unwrap();

        assert_eq!(record.type_name, "Patient");
        assert_eq!(
            record.field("id"),
            Some(&RecordValue::String("Patient/1/_history/7".into()))
        );
        assert_eq!(record.field("gender"), Some(&RecordValue::String("female".into())));
        assert_eq!(record.field("birthDate"), Some(&RecordValue::Null));

        // Choice children keep their concrete type as a nested record.
        let deceased = record.field("deceased").and_then(RecordValue::as_record).unwrap();
        assert_eq!(deceased.type_name, "dateTime");
        assert_eq!(deceased.raw_value(), Some("2020-01-01T00:00:00Z"));

        let Some(RecordValue::List(names)) = record.field("name") else {
            panic!("name must be a list");
        };
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_decode_restores_resource() {
        let schema = SchemaContext::r4();
        let original = patient(&schema);
        let bytes = record_to_bytes(&FhirBinaryCodec.encode_resource(&schema, &original).unwrap()).unwrap();

        let RecordValue::Record(record) = from_bytes(&bytes).unwrap() else {
            panic!("expected a record");
        };
        let mut decoded = Resource::new("Patient");
        FhirBinaryCodec
            .decode_resource(&schema, &mut decoded, &record)
            .unwrap();

        assert_eq!(decoded.id_element(), original.id_element());
        assert_eq!(resource_to_json(&schema, &decoded), resource_to_json(&schema, &original));
    }

    #[test]
    fn test_scalar_coercion_on_decode() {
        let schema = SchemaContext::r4();
        let record = BinaryRecord::fields("Patient")
            .with_field("id", RecordValue::Long(42))
            .with_field("active", RecordValue::Bool(false))
            .with_field("birthDate", RecordValue::String("1970-01-01".into()));

        let mut decoded = Resource::new("Patient");
        FhirBinaryCodec
            .decode_resource(&schema, &mut decoded, &record)
            .unwrap();

        assert_eq!(decoded.id_element().id_part(), Some("42"));
        let active = decoded.field("active")[0].as_primitive().unwrap();
        assert_eq!(active.type_name(), "boolean");
        assert_eq!(active.value_as_string(), Some("false"));
        assert_eq!(
            resource_to_json(&schema, &decoded)["birthDate"],
            json!("1970-01-01")
        );
    }

    #[test]
    fn test_unknown_resource_type() {
        let schema = SchemaContext::r4();
        let err = FhirBinaryCodec
            .encode_resource(&schema, &Resource::new("Spaceship"))
            .unwrap_err();
        assert_eq!(err, CodecError::UnknownResourceType("Spaceship".into()));

        let mut target = Resource::new("Patient");
        let err = FhirBinaryCodec
            .decode_resource(&schema, &mut target, &BinaryRecord::fields("Observation"))
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_element_type_encodes_empty() {
        let schema = SchemaContext::r4();
        let value = Base::Composite(Element::new("Extension").with_primitive("url", "uri", "x"));
        let record = FhirBinaryCodec.encode(&schema, &value);
        assert_eq!(record.type_name, "Extension");
        assert!(record.field_names().is_empty());
    }

    #[test]
    fn test_primitive_round_trip() {
        let schema = SchemaContext::r4();
        let value = Base::Primitive(Primitive::with_value("code", "final"));
        let record = FhirBinaryCodec.encode(&schema, &value);

        let mut target = Base::Primitive(Primitive::new("code"));
        FhirBinaryCodec.decode(&schema, &mut target, &record);
        assert_eq!(target, value);
    }
}
