//! Built-in subset of the FHIR R4 schema.
//!
//! Covers the datatypes and resources the grid store ships caches for. A
//! deployment with a full package loader registers its own
//! [`SchemaContext`] instead.

use crate::fhir::FhirVersion;

use super::schema::{SchemaContext, TypeDefinition};

pub const PRIMITIVE_TYPES: &[&str] = &[
    "boolean",
    "integer",
    "decimal",
    "positiveInt",
    "unsignedInt",
    "string",
    "code",
    "id",
    "uri",
    "url",
    "canonical",
    "markdown",
    "instant",
    "date",
    "dateTime",
    "time",
];

impl SchemaContext {
    pub fn r4() -> Self {
        SchemaContext::builder(FhirVersion::R4)
            .primitives(PRIMITIVE_TYPES)
            .define(
                TypeDefinition::composite("Meta")
                    .single("versionId", "id")
                    .single("lastUpdated", "instant")
                    .single("source", "uri")
                    .repeated("profile", "canonical")
                    .repeated("tag", "Coding"),
            )
            .define(
                TypeDefinition::composite("Coding")
                    .single("system", "uri")
                    .single("version", "string")
                    .single("code", "code")
                    .single("display", "string")
                    .single("userSelected", "boolean"),
            )
            .define(
                TypeDefinition::composite("CodeableConcept")
                    .repeated("coding", "Coding")
                    .single("text", "string"),
            )
            .define(
                TypeDefinition::composite("Identifier")
                    .single("use", "code")
                    .single("type", "CodeableConcept")
                    .single("system", "uri")
                    .single("value", "string")
                    .single("period", "Period"),
            )
            .define(
                TypeDefinition::composite("HumanName")
                    .single("use", "code")
                    .single("text", "string")
                    .single("family", "string")
                    .repeated("given", "string")
                    .repeated("prefix", "string")
                    .single("period", "Period"),
            )
            .define(
                TypeDefinition::composite("ContactPoint")
                    .single("system", "code")
                    .single("value", "string")
                    .single("use", "code")
                    .single("rank", "positiveInt"),
            )
            .define(
                TypeDefinition::composite("Reference")
                    .single("reference", "string")
                    .single("type", "uri")
                    .single("display", "string"),
            )
            .define(
                TypeDefinition::composite("Period")
                    .single("start", "dateTime")
                    .single("end", "dateTime"),
            )
            .define(
                TypeDefinition::composite("Quantity")
                    .single("value", "decimal")
                    .single("comparator", "code")
                    .single("unit", "string")
                    .single("system", "uri")
                    .single("code", "code"),
            )
            .define(
                TypeDefinition::composite("Annotation")
                    .choice("author", &["Reference", "string"])
                    .single("time", "dateTime")
                    .single("text", "markdown"),
            )
            .define(
                TypeDefinition::resource("Patient")
                    .single("meta", "Meta")
                    .repeated("identifier", "Identifier")
                    .single("active", "boolean")
                    .repeated("name", "HumanName")
                    .repeated("telecom", "ContactPoint")
                    .single("gender", "code")
                    .single("birthDate", "date")
                    .choice("deceased", &["boolean", "dateTime"])
                    .single("managingOrganization", "Reference"),
            )
            .define(
                TypeDefinition::resource("Observation")
                    .single("meta", "Meta")
                    .repeated("identifier", "Identifier")
                    .single("status", "code")
                    .repeated("category", "CodeableConcept")
                    .single("code", "CodeableConcept")
                    .single("subject", "Reference")
                    .choice("effective", &["dateTime", "Period"])
                    .single("issued", "instant")
                    .choice(
                        "value",
                        &["Quantity", "CodeableConcept", "string", "boolean", "integer"],
                    )
                    .repeated("note", "Annotation"),
            )
            .define(
                TypeDefinition::resource("Account")
                    .single("meta", "Meta")
                    .repeated("identifier", "Identifier")
                    .single("status", "code")
                    .single("type", "CodeableConcept")
                    .single("name", "string")
                    .repeated("subject", "Reference")
                    .single("servicePeriod", "Period")
                    .single("owner", "Reference")
                    .single("description", "string"),
            )
            .define(
                TypeDefinition::resource("Organization")
                    .single("meta", "Meta")
                    .repeated("identifier", "Identifier")
                    .single("active", "boolean")
                    .repeated("type", "CodeableConcept")
                    .single("name", "string")
                    .repeated("alias", "string")
                    .repeated("telecom", "ContactPoint")
                    .single("partOf", "Reference"),
            )
            .build()
    }
}
