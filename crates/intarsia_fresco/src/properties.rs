//! Reactive property core.
//!
//! Property declarations are an explicit registration step processed once
//! per component type; each instance then tracks current values, a pending
//! change set and the values they replaced, and the invalidate/flush flags
//! that drive batched change delivery.

use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::value::Value;

/// Deserialization type for a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Attribute presence is the value.
    Boolean,
    /// Attribute text parses numerically.
    Number,
    /// Attribute text passes through.
    String,
    /// Structured values; attribute text passes through unparsed.
    List,
    /// No declared type; attribute text passes through.
    Untyped,
}

/// The declared property set of a component type, with the derived
/// attribute name mapping (attribute names are the lowercased property
/// names).
#[derive(Debug, Default)]
pub struct PropertyDeclarations {
    entries: Vec<(CompactString, PropertyType)>,
    attribute_map: FxHashMap<CompactString, CompactString>,
}

impl PropertyDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property. Later declarations of the same name win.
    pub fn declare(mut self, name: impl Into<CompactString>, ty: PropertyType) -> Self {
        let name = name.into();
        let attribute = CompactString::from(name.to_ascii_lowercase());
        self.entries.retain(|(existing, _)| *existing != name);
        self.attribute_map.insert(attribute, name.clone());
        self.entries.push((name, ty));
        self
    }

    /// Declared type for a property.
    pub fn type_of(&self, name: &str) -> Option<PropertyType> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, ty)| *ty)
    }

    /// Whether the property is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.type_of(name).is_some()
    }

    /// Property name mapped from an attribute name.
    pub fn property_for_attribute(&self, attribute: &str) -> Option<&str> {
        self.attribute_map.get(attribute).map(|name| name.as_str())
    }

    /// Attribute name for a property.
    pub fn attribute_for_property(&self, name: &str) -> CompactString {
        CompactString::from(name.to_ascii_lowercase())
    }

    /// The attribute names the host should observe.
    pub fn observed_attributes(&self) -> Vec<CompactString> {
        self.entries
            .iter()
            .map(|(name, _)| self.attribute_for_property(name))
            .collect()
    }

    /// Declared property names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

/// Convert an attribute string into a property value per the declared type.
pub fn deserialize_attribute(value: Option<&str>, ty: PropertyType) -> Value {
    match ty {
        PropertyType::Boolean => Value::Bool(value.is_some()),
        PropertyType::Number => match value {
            None => Value::Float(0.0),
            Some(text) => Value::Float(text.trim().parse::<f64>().unwrap_or_else(|_| {
                if text.trim().is_empty() {
                    0.0
                } else {
                    f64::NAN
                }
            })),
        },
        PropertyType::String | PropertyType::List | PropertyType::Untyped => match value {
            None => Value::Null,
            Some(text) => Value::Str(CompactString::from(text)),
        },
    }
}

/// Convert a property value into its attribute form. `None` means the
/// attribute should be removed (booleans serialize to presence/absence).
pub fn serialize_attribute(value: &Value) -> Option<CompactString> {
    match value {
        Value::Bool(true) => Some(CompactString::default()),
        Value::Bool(false) | Value::Null => None,
        other => Some(other.to_text()),
    }
}

/// Per-instance reactive state.
///
/// The pending and old maps are either both unset or both set; a property in
/// the pending map always differs from the value it replaced per the change
/// predicate. The old map keeps the value a property held before the first
/// write of the cycle, not intermediate values.
pub struct ReactiveProperties {
    declarations: Rc<PropertyDeclarations>,
    data: FxHashMap<CompactString, Value>,
    pending: Option<FxHashMap<CompactString, Value>>,
    old: Option<FxHashMap<CompactString, Value>>,
    ready: bool,
    enabled: bool,
    invalid: bool,
    serializing: bool,
    changing: bool,
}

impl ReactiveProperties {
    pub fn new(declarations: Rc<PropertyDeclarations>) -> Self {
        Self {
            declarations,
            data: FxHashMap::default(),
            pending: None,
            old: None,
            ready: false,
            enabled: false,
            invalid: false,
            serializing: false,
            changing: false,
        }
    }

    pub fn declarations(&self) -> &Rc<PropertyDeclarations> {
        &self.declarations
    }

    /// Current value of a property (null when never set).
    pub fn get(&self, name: &str) -> Value {
        self.data.get(name).cloned().unwrap_or(Value::Null)
    }

    /// All current values.
    pub fn data(&self) -> &FxHashMap<CompactString, Value> {
        &self.data
    }

    /// The change predicate: changed unless identical, where NaN counts as
    /// identical to NaN.
    pub fn should_change(old: &Value, new: &Value) -> bool {
        !old.same(new)
    }

    /// Record a property write. Returns whether the value changed; on
    /// change the old value is recorded once per flush cycle (the first
    /// write wins) and the new value joins the pending set.
    pub fn set_pending(&mut self, name: impl Into<CompactString>, value: Value) -> bool {
        let name = name.into();
        let old = self.get(&name);
        if !Self::should_change(&old, &value) {
            return false;
        }
        if self.changing {
            tracing::warn!(
                property = name.as_str(),
                "property written while a flush is committing; the change \
                 lands in a later flush"
            );
        }
        if self.pending.is_none() {
            self.pending = Some(FxHashMap::default());
            self.old = Some(FxHashMap::default());
        }
        if let Some(old_map) = &mut self.old {
            old_map.entry(name.clone()).or_insert(old);
        }
        self.data.insert(name.clone(), value.clone());
        if let Some(pending) = &mut self.pending {
            pending.insert(name, value);
        }
        true
    }

    /// Whether a flush has anything to deliver.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Snapshot and clear the pending/old maps. The data is discarded by the
    /// caller when its gate vetoes the flush; a suppressed flush does not
    /// replay.
    pub fn take_changes(
        &mut self,
    ) -> Option<(
        FxHashMap<CompactString, Value>,
        FxHashMap<CompactString, Value>,
    )> {
        match (self.pending.take(), self.old.take()) {
            (Some(pending), Some(old)) => Some((pending, old)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mark_enabled(&mut self) {
        self.enabled = true;
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn set_invalid(&mut self, invalid: bool) {
        self.invalid = invalid;
    }

    pub fn is_serializing(&self) -> bool {
        self.serializing
    }

    pub fn set_serializing(&mut self, serializing: bool) {
        self.serializing = serializing;
    }

    pub fn set_changing(&mut self, changing: bool) {
        self.changing = changing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations() -> Rc<PropertyDeclarations> {
        Rc::new(
            PropertyDeclarations::new()
                .declare("checked", PropertyType::Boolean)
                .declare("total", PropertyType::Number)
                .declare("someLabel", PropertyType::String),
        )
    }

    #[test]
    fn test_attribute_map_is_lowercased() {
        let declarations = declarations();
        assert_eq!(declarations.property_for_attribute("somelabel"), Some("someLabel"));
        assert_eq!(
            declarations.attribute_for_property("someLabel").as_str(),
            "somelabel"
        );
        assert!(declarations
            .observed_attributes()
            .contains(&CompactString::from("somelabel")));
    }

    #[test]
    fn test_boolean_roundtrip() {
        assert!(matches!(
            deserialize_attribute(Some(""), PropertyType::Boolean),
            Value::Bool(true)
        ));
        assert!(matches!(
            deserialize_attribute(Some("anything"), PropertyType::Boolean),
            Value::Bool(true)
        ));
        assert!(matches!(
            deserialize_attribute(None, PropertyType::Boolean),
            Value::Bool(false)
        ));
        assert_eq!(serialize_attribute(&Value::Bool(true)).unwrap().as_str(), "");
        assert_eq!(serialize_attribute(&Value::Bool(false)), None);
    }

    #[test]
    fn test_number_roundtrip() {
        assert_eq!(
            serialize_attribute(&Value::Float(42.0)).unwrap().as_str(),
            "42"
        );
        let value = deserialize_attribute(Some("42"), PropertyType::Number);
        assert!(value.same(&Value::Float(42.0)));
    }

    #[test]
    fn test_pending_first_old_wins() {
        let mut props = ReactiveProperties::new(declarations());
        assert!(props.set_pending("total", Value::Float(1.0)));
        assert!(props.set_pending("total", Value::Float(2.0)));
        let (changed, old) = props.take_changes().unwrap();
        assert!(changed["total"].same(&Value::Float(2.0)));
        assert!(old["total"].same(&Value::Null));
        assert!(!props.has_pending());
    }

    #[test]
    fn test_nan_not_a_change() {
        let mut props = ReactiveProperties::new(declarations());
        assert!(props.set_pending("total", Value::Float(f64::NAN)));
        props.take_changes();
        assert!(!props.set_pending("total", Value::Float(f64::NAN)));
        assert!(props.set_pending("total", Value::Float(7.0)));
    }

    #[test]
    fn test_unchanged_write_records_nothing() {
        let mut props = ReactiveProperties::new(declarations());
        props.set_pending("checked", Value::Bool(true));
        props.take_changes();
        assert!(!props.set_pending("checked", Value::Bool(true)));
        assert!(props.take_changes().is_none());
    }
}
