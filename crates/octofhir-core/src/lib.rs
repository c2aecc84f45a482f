pub mod error;
pub mod fhir;
pub mod id;
pub mod interceptor;
pub mod model;

pub use error::{CoreError, ErrorCategory, Result};
pub use fhir::FhirVersion;
pub use id::{IdType, validate_id};
pub use interceptor::{
    HookError, HookParams, Interceptor, InterceptorBroadcaster, InterceptorRegistry, Pointcut,
    RequestDetails, TransactionDetails,
};
pub use model::{Base, Element, Primitive, Resource, SchemaContext};
