use std::{any::type_name, sync::Arc};

use crate::{
    errors::ResolveError,
    resolver::{Argument, Dependency},
    types::{DependencyInfo, Injectable, Instance, TypeInfo},
};

impl<S: Injectable + ?Sized> Dependency for Arc<S> {
    fn dependency_info() -> DependencyInfo {
        DependencyInfo {
            type_info: TypeInfo::of::<S>(),
            optional: false,
            lazy: false,
        }
    }

    fn from_argument(argument: Argument) -> Result<Self, ResolveError> {
        match argument {
            Argument::Resolved(instance) => downcast_instance(&instance),
            other => Err(ResolveError::DowncastFailed {
                required_type: type_name::<S>(),
                actual_type: other.describe(),
            }),
        }
    }
}

pub(crate) fn downcast_instance<S: Injectable + ?Sized>(
    instance: &Instance,
) -> Result<Arc<S>, ResolveError> {
    instance
        .downcast::<S>()
        .map_err(|actual_type| ResolveError::DowncastFailed {
            required_type: type_name::<S>(),
            actual_type,
        })
}
