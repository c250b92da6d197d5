//! Member discovery
//!
//! Discovery walks a declared shape's transitive closure (extended
//! capability sets, base classes), freezes the member list into immutable
//! [`MethodDescriptor`]s, and attaches inherited interception markers:
//! type-level markers of every shape in the closure first (base-most
//! first), then the member-level markers of the declaring signature.
//! Members with unsupported shapes are reported here, never at call time.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::descriptor::{GenericParamDescriptor, MethodDescriptor};
use crate::error::ModelError;
use crate::intercept::{AttachmentPoint, Interceptor, InterceptorDescriptor};
use crate::shape::{CapabilitySet, ClassShape, MethodSig};
use crate::ty::TypeRef;
use crate::value::Value;

/// Transitive extends-closure of a capability set, base-most first, the
/// requested set last. Cycles are reported as [`ModelError::CyclicCapability`].
pub fn capability_closure(
    set: &Arc<CapabilitySet>,
) -> Result<Vec<Arc<CapabilitySet>>, ModelError> {
    fn visit(
        set: &Arc<CapabilitySet>,
        order: &mut Vec<Arc<CapabilitySet>>,
        visited: &mut FxHashSet<Arc<str>>,
        visiting: &mut FxHashSet<Arc<str>>,
    ) -> Result<(), ModelError> {
        if visited.contains(set.name()) {
            return Ok(());
        }
        if !visiting.insert(set.name().clone()) {
            return Err(ModelError::CyclicCapability {
                name: set.name().to_string(),
            });
        }
        for extended in set.extends() {
            visit(extended, order, visited, visiting)?;
        }
        visiting.remove(set.name());
        visited.insert(set.name().clone());
        order.push(set.clone());
        Ok(())
    }

    let mut order = Vec::new();
    visit(
        set,
        &mut order,
        &mut FxHashSet::default(),
        &mut FxHashSet::default(),
    )?;
    Ok(order)
}

/// Discover the full member set of a capability target.
pub fn discover_capability(
    set: &Arc<CapabilitySet>,
) -> Result<Vec<Arc<MethodDescriptor>>, ModelError> {
    let closure = capability_closure(set)?;
    let type_markers: Vec<Arc<dyn Interceptor>> = closure
        .iter()
        .flat_map(|s| s.markers.iter().cloned())
        .collect();

    let mut members: Vec<Arc<MethodDescriptor>> = Vec::new();
    let mut index: FxHashMap<Arc<str>, usize> = FxHashMap::default();

    for declaring in &closure {
        for sig in &declaring.methods {
            match index.get(&sig.name) {
                Some(&slot) => {
                    let existing = &members[slot];
                    if existing.declaring_type == *declaring.name() || !sig_matches(sig, existing)
                    {
                        return Err(ModelError::DuplicateMember {
                            name: sig.name.to_string(),
                            declaring: declaring.name().to_string(),
                        });
                    }
                    // Redeclaration of an inherited member keeps the base
                    // declaration but still contributes its own
                    // member-level markers.
                    if !sig.markers.is_empty() {
                        let merged: Box<[InterceptorDescriptor]> = existing
                            .interceptors
                            .iter()
                            .cloned()
                            .chain(sig.markers.iter().map(|hook| {
                                InterceptorDescriptor::new(
                                    AttachmentPoint::Member,
                                    hook.clone(),
                                )
                            }))
                            .collect();
                        let mut redeclared = (**existing).clone();
                        redeclared.interceptors = merged;
                        members[slot] = Arc::new(redeclared);
                    }
                }
                None => {
                    let descriptor = build_descriptor(sig, declaring.name(), &type_markers)?;
                    index.insert(sig.name.clone(), members.len());
                    members.push(descriptor);
                }
            }
        }
    }
    Ok(members)
}

/// Discover the full member set of a class target, applying overrides along
/// the base chain (most-derived declaration wins).
pub fn discover_class(shape: &Arc<ClassShape>) -> Result<Vec<Arc<MethodDescriptor>>, ModelError> {
    let mut chain = Vec::new();
    let mut current = Some(shape.clone());
    while let Some(class) = current {
        current = class.base().cloned();
        chain.push(class);
    }
    chain.reverse();

    let type_markers: Vec<Arc<dyn Interceptor>> = chain
        .iter()
        .flat_map(|c| c.markers.iter().cloned())
        .collect();

    let mut members: Vec<Arc<MethodDescriptor>> = Vec::new();
    let mut index: FxHashMap<Arc<str>, usize> = FxHashMap::default();

    for declaring in &chain {
        for sig in &declaring.methods {
            match index.get(&sig.name) {
                Some(&slot) => {
                    let existing = &members[slot];
                    if existing.declaring_type == *declaring.name() || !sig_matches(sig, existing)
                    {
                        return Err(ModelError::DuplicateMember {
                            name: sig.name.to_string(),
                            declaring: declaring.name().to_string(),
                        });
                    }
                    // Override: the derived declaration replaces the base
                    // one, contributing its own member-level markers.
                    members[slot] = build_descriptor(sig, declaring.name(), &type_markers)?;
                }
                None => {
                    let descriptor = build_descriptor(sig, declaring.name(), &type_markers)?;
                    index.insert(sig.name.clone(), members.len());
                    members.push(descriptor);
                }
            }
        }
    }
    Ok(members)
}

/// Check that a redeclared signature structurally matches the frozen one.
fn sig_matches(sig: &MethodSig, existing: &MethodDescriptor) -> bool {
    sig.ret == existing.ret
        && sig.params.len() == existing.params.len()
        && sig
            .params
            .iter()
            .zip(existing.params.iter())
            .all(|(a, b)| a.ty == b.ty && a.by_ref == b.by_ref)
        && sig.generics.len() == existing.generics.len()
        && sig
            .generics
            .iter()
            .zip(existing.generics.iter())
            .all(|((_, c), g)| *c == g.constraint)
}

fn build_descriptor(
    sig: &MethodSig,
    declaring: &Arc<str>,
    type_markers: &[Arc<dyn Interceptor>],
) -> Result<Arc<MethodDescriptor>, ModelError> {
    let unsupported = |reason: &str| ModelError::UnsupportedMember {
        name: sig.name.to_string(),
        declaring: declaring.to_string(),
        reason: reason.to_string(),
    };

    let generic_count = sig.generics.len();
    check_vars(&sig.ret, generic_count).map_err(|r| unsupported(&r))?;
    let mut defaults_started = false;
    for param in &sig.params {
        check_vars(&param.ty, generic_count).map_err(|r| unsupported(&r))?;
        match &param.default {
            Some(default) => {
                if param.by_ref {
                    return Err(unsupported("default value on a by-reference parameter"));
                }
                if !Value::from(default).conforms_to(&param.ty) {
                    return Err(unsupported("default value does not conform to the parameter type"));
                }
                defaults_started = true;
            }
            None => {
                if defaults_started {
                    return Err(unsupported("defaulted parameter followed by a required one"));
                }
            }
        }
    }

    let interceptors = type_markers
        .iter()
        .map(|hook| InterceptorDescriptor::new(AttachmentPoint::Type, hook.clone()))
        .chain(
            sig.markers
                .iter()
                .map(|hook| InterceptorDescriptor::new(AttachmentPoint::Member, hook.clone())),
        )
        .collect();

    Ok(Arc::new(MethodDescriptor {
        name: sig.name.clone(),
        declaring_type: declaring.clone(),
        params: sig.params.clone().into_boxed_slice(),
        ret: sig.ret.clone(),
        generics: sig
            .generics
            .iter()
            .map(|(name, constraint)| GenericParamDescriptor {
                name: name.clone(),
                constraint: *constraint,
            })
            .collect(),
        interceptors,
        type_args: Box::new([]),
    }))
}

fn check_vars(ty: &TypeRef, generic_count: usize) -> Result<(), String> {
    match ty {
        TypeRef::Var(index) if *index as usize >= generic_count => Err(format!(
            "generic variable ${index} out of range ({generic_count} declared)"
        )),
        TypeRef::Task(inner) | TypeRef::Nullable(inner) => check_vars(inner, generic_count),
        _ => Ok(()),
    }
}
