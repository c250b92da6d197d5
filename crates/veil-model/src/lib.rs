//! # veil-model
//!
//! Descriptor model and interception contracts for the Veil proxy toolkit:
//! structural type references, tagged runtime values, the fixed-length
//! argument buffer, asynchronous result handles, immutable member/type
//! descriptors, shape registration (capability sets and classes), member
//! discovery with marker inheritance, and the interceptor chain contract.
//!
//! This crate is pure data plus contracts; lowering and evaluation live in
//! `veil-core`.

pub mod descriptor;
pub mod discover;
pub mod error;
pub mod intercept;
pub mod shape;
pub mod task;
pub mod ty;
pub mod value;

pub use descriptor::{
    BodyPlan, ConstructorDescriptor, FieldDescriptor, GenericParamDescriptor, MethodDescriptor,
    MethodPlan, ParameterDescriptor, TypeDescriptor, TypeKind,
};
pub use discover::{capability_closure, discover_capability, discover_class};
pub use error::{InvokeError, ModelError};
pub use intercept::{
    AttachmentPoint, InterceptChain, InterceptContext, Interceptor, InterceptorDescriptor,
    Invocation, InvokeMode, ProxyTarget,
};
pub use shape::{
    CapabilitySet, CapabilitySetBuilder, ClassShape, ClassShapeBuilder, ConstructFn, MethodSig,
};
pub use task::{TaskHandle, TaskResult};
pub use ty::{GenericConstraint, Literal, TypeRef};
pub use value::{ObjRef, Timestamp, Value, ValueArray};
