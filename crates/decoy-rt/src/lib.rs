#![doc = include_str!("../README.md")]

mod context;
mod contract;
mod ctor;
mod double;
mod engine;
mod error;
mod factory;
mod injector;
mod member;
mod policy;
mod recorder;
mod registry;
mod resolve;
mod sieve;
mod stubs;
mod types;

pub use decoy_macros::{autowired, contract, inject, resource, subject, wired};

pub use context::{
    Assumption, Stubbing, TestContext, TestHandle, clear, current, given, given_literal, publish,
};
pub use contract::Contract;
pub use ctor::{ConstructorChoice, select_constructor};
pub use double::{DescriptorBuilder, Double, DoubleDescriptor, Instance, supplied};
pub use engine::{InjectionEngine, SubjectInstantiation};
pub use error::{AccessError, BoxError, InjectError};
pub use factory::{DoubleFactory, StubFactory};
pub use injector::{Injector, InjectorBuilder};
pub use member::{
    AccessResult, AccessScope, Accessible, Args, Constructor, ConstructorDef, ConstructorSignature,
    Field, FieldDef, Member, MemberKind, Method, MethodDef, MethodSignature, Subject, Visibility,
};
pub use policy::{InjectionPoint, MarkedInjectionPoint, MarkerEnvironment, WELL_KNOWN_MARKERS};
pub use recorder::{BehaviorRecorder, record_behavior};
pub use registry::{MemberEnumerator, Registry, TypeInfo};
pub use resolve::{DoubleRepository, InjectionSlot, SetterConvention, SlotKind};
pub use sieve::{IDENTITY_METHODS, MethodSieve, ReturnSieve, is_identity_method, methods_of};
pub use stubs::{ArgMatcher, Stubs};
pub use types::{Object, Primitive, Type, TypeLiteral};
