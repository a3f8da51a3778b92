//! Media descriptors: registry properties as `PropertyValue` sequences.

use libreoffice_urp::types::type_names;
use libreoffice_urp::{Type, UnoValue};
use sheets_pdf::{OptionValue, PropertyMap};

/// `com.sun.star.document.UpdateDocMode::QUIET_UPDATE`
const QUIET_UPDATE: i16 = 1;

/// `com.sun.star.beans.PropertyValue { Name, Handle, Value, State }`
pub fn property_value(name: &str, value: UnoValue, type_desc: Type) -> UnoValue {
    UnoValue::Struct(vec![
        UnoValue::String(name.to_string()),
        UnoValue::Long(0),
        UnoValue::any(type_desc, value),
        UnoValue::Enum(0), // DIRECT_VALUE
    ])
}

/// An option value with the UNO type it is sent as.
///
/// Nested maps become `[]com.sun.star.beans.PropertyValue`, which is what
/// filters expect under `FilterData`.
pub fn option_to_uno(value: &OptionValue) -> (UnoValue, Type) {
    match value {
        OptionValue::Bool(b) => (UnoValue::Bool(*b), Type::boolean()),
        OptionValue::Int(n) => (UnoValue::Long(*n), Type::long()),
        OptionValue::Double(d) => (UnoValue::Double(*d), Type::double()),
        OptionValue::String(s) => (UnoValue::String(s.clone()), Type::string()),
        OptionValue::Map(map) => (
            UnoValue::Sequence(property_sequence(map)),
            Type::sequence(type_names::PROPERTY_VALUE),
        ),
    }
}

pub fn property_sequence(properties: &PropertyMap) -> Vec<UnoValue> {
    properties
        .iter()
        .map(|(name, value)| {
            let (value, type_desc) = option_to_uno(value);
            property_value(name, value, type_desc)
        })
        .collect()
}

/// Descriptor for `loadComponentFromURL`: hidden, read-only, no macro or
/// link update prompts, followed by the input format's own properties.
pub fn load_descriptor(format_properties: &PropertyMap) -> UnoValue {
    let defaults = [
        ("Hidden", UnoValue::Bool(true), Type::boolean()),
        ("ReadOnly", UnoValue::Bool(true), Type::boolean()),
        ("UpdateDocMode", UnoValue::Short(QUIET_UPDATE), Type::short()),
    ];
    let mut props: Vec<UnoValue> = defaults
        .into_iter()
        .filter(|(name, _, _)| !format_properties.contains_key(*name))
        .map(|(name, value, ty)| property_value(name, value, ty))
        .collect();
    props.extend(property_sequence(format_properties));
    UnoValue::Sequence(props)
}

/// Descriptor for `storeToURL`: the output format's properties plus
/// `Overwrite`.
pub fn store_descriptor(format_properties: &PropertyMap) -> UnoValue {
    let mut props = property_sequence(format_properties);
    if !format_properties.contains_key("Overwrite") {
        props.push(property_value("Overwrite", UnoValue::Bool(true), Type::boolean()));
    }
    UnoValue::Sequence(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(seq: &UnoValue) -> Vec<String> {
        match seq {
            UnoValue::Sequence(items) => items
                .iter()
                .map(|pv| match pv {
                    UnoValue::Struct(fields) => fields[0].as_string().unwrap().to_string(),
                    other => panic!("expected PropertyValue, got {other:?}"),
                })
                .collect(),
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn property_value_layout() {
        let pv = property_value("FilterName", UnoValue::String("calc_pdf_Export".into()), Type::string());
        match pv {
            UnoValue::Struct(fields) => {
                assert_eq!(fields.len(), 4);
                assert_eq!(fields[0], UnoValue::String("FilterName".to_string()));
                assert_eq!(fields[1], UnoValue::Long(0));
                assert_eq!(
                    fields[2],
                    UnoValue::any(Type::string(), UnoValue::String("calc_pdf_Export".into()))
                );
                assert_eq!(fields[3], UnoValue::Enum(0));
            }
            _ => panic!("Expected Struct"),
        }
    }

    #[test]
    fn filter_data_becomes_a_property_sequence() {
        let mut options = PropertyMap::new();
        options.insert("PermissionPassword".into(), OptionValue::from("pass"));
        options.insert("Printing".into(), OptionValue::Int(0));
        let mut store = PropertyMap::new();
        store.insert("FilterName".into(), OptionValue::from("calc_pdf_Export"));
        store.insert("FilterData".into(), OptionValue::Map(options));

        let descriptor = store_descriptor(&store);
        assert_eq!(names(&descriptor), vec!["FilterName", "FilterData", "Overwrite"]);

        let UnoValue::Sequence(items) = descriptor else { unreachable!() };
        let UnoValue::Struct(fields) = &items[1] else { unreachable!() };
        let UnoValue::Any(any) = &fields[2] else { panic!("value should be an any") };
        assert_eq!(any.type_desc.name, "[]com.sun.star.beans.PropertyValue");
        assert_eq!(names(&any.value), vec!["PermissionPassword", "Printing"]);
    }

    #[test]
    fn load_defaults_yield_to_format_properties() {
        let mut csv = PropertyMap::new();
        csv.insert("FilterName".into(), OptionValue::from("Text - txt - csv (StarCalc)"));
        csv.insert("ReadOnly".into(), OptionValue::Bool(false));

        let descriptor = load_descriptor(&csv);
        assert_eq!(
            names(&descriptor),
            vec!["Hidden", "UpdateDocMode", "FilterName", "ReadOnly"]
        );
    }

    #[test]
    fn update_doc_mode_is_a_short() {
        let descriptor = load_descriptor(&PropertyMap::new());
        let UnoValue::Sequence(items) = descriptor else { unreachable!() };
        let UnoValue::Struct(fields) = &items[2] else { unreachable!() };
        assert_eq!(fields[2], UnoValue::any(Type::short(), UnoValue::Short(1)));
    }
}
