//! Method tables for the UNO interfaces on the conversion path.
//!
//! URP addresses methods by absolute index across the inheritance chain.
//! `XInterface` owns 0..=2 (queryInterface, acquire, release), so an interface
//! deriving directly from it starts at 3. `acquire` is never sent over the wire.

use crate::types::{type_names, Type};

/// Signature of one remote method.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: &'static str,
    pub index: u16,
    pub params: &'static [ParamType],
    pub return_type: Type,
    /// One-way calls get no reply.
    pub one_way: bool,
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy)]
pub enum ParamType {
    Type,
    String,
    Long,
    Bool,
    Interface(&'static str),
    SequenceOfPropertyValue,
}

impl ParamType {
    pub fn to_type(&self) -> Type {
        match self {
            ParamType::Type => Type::r#type(),
            ParamType::String => Type::string(),
            ParamType::Long => Type::long(),
            ParamType::Bool => Type::boolean(),
            ParamType::Interface(name) => Type::interface(*name),
            ParamType::SequenceOfPropertyValue => Type::sequence(type_names::PROPERTY_VALUE),
        }
    }
}

// XInterface: queryInterface(0), acquire(1), release(2)

pub fn query_interface() -> MethodDef {
    MethodDef {
        name: "queryInterface",
        index: 0,
        params: &[ParamType::Type],
        return_type: Type::any(),
        one_way: false,
    }
}

// XComponentContext: getValueByName(3), getServiceManager(4)

pub fn get_service_manager() -> MethodDef {
    MethodDef {
        name: "getServiceManager",
        index: 4,
        params: &[],
        return_type: Type::interface(type_names::X_MULTI_COMPONENT_FACTORY),
        one_way: false,
    }
}

// XMultiComponentFactory: createInstanceWithContext(3), ...

pub fn create_instance_with_context() -> MethodDef {
    MethodDef {
        name: "createInstanceWithContext",
        index: 3,
        params: &[
            ParamType::String,
            ParamType::Interface(type_names::X_COMPONENT_CONTEXT),
        ],
        return_type: Type::interface(type_names::X_INTERFACE),
        one_way: false,
    }
}

// XComponentLoader: loadComponentFromURL(3)

pub fn load_component_from_url() -> MethodDef {
    MethodDef {
        name: "loadComponentFromURL",
        index: 3,
        params: &[
            ParamType::String,                  // URL
            ParamType::String,                  // target frame
            ParamType::Long,                    // search flags
            ParamType::SequenceOfPropertyValue, // media descriptor
        ],
        return_type: Type::interface(type_names::X_COMPONENT),
        one_way: false,
    }
}

// XDesktop: terminate(3), addTerminateListener(4), ...

pub fn desktop_terminate() -> MethodDef {
    MethodDef {
        name: "terminate",
        index: 3,
        params: &[],
        return_type: Type::boolean(),
        one_way: false,
    }
}

// XComponent: dispose(3), addEventListener(4), removeEventListener(5)

pub fn component_dispose() -> MethodDef {
    MethodDef {
        name: "dispose",
        index: 3,
        params: &[],
        return_type: Type::void(),
        one_way: false,
    }
}

// XStorable: hasLocation(3), getLocation(4), isReadonly(5), store(6),
// storeAsURL(7), storeToURL(8)

pub fn store_to_url() -> MethodDef {
    MethodDef {
        name: "storeToURL",
        index: 8,
        params: &[ParamType::String, ParamType::SequenceOfPropertyValue],
        return_type: Type::void(),
        one_way: false,
    }
}

// XCloseable extends XCloseBroadcaster(3, 4): close(5)

pub fn closeable_close() -> MethodDef {
    MethodDef {
        name: "close",
        index: 5,
        params: &[ParamType::Bool], // deliver ownership
        return_type: Type::void(),
        one_way: false,
    }
}
