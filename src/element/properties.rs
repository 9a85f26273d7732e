// ============================================================================
// spark-element - Reactive Property Declarations
// Explicit per-class property lists and the per-cycle changed-set
// ============================================================================
//
// Reactive properties are declared up front on the element definition; each
// instance gets one signal-backed storage slot per declaration. There is no
// runtime reflection: the declaration list IS the property surface.
// ============================================================================

use indexmap::IndexMap;

use crate::types::{TypeTag, Value};

/// Name of a declared reactive property.
pub type PropName = &'static str;

/// Change predicate: `(old, new) -> true` when the write counts as a change.
pub type HasChangedFn = fn(&Value, &Value) -> bool;

fn default_has_changed(old: &Value, new: &Value) -> bool {
    old != new
}

// =============================================================================
// ATTRIBUTE BINDING
// =============================================================================

/// How a property maps to an observed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeMode {
    /// Observe the lowercased property name.
    Auto,
    /// Observe a specific attribute name.
    Named(String),
    /// No attribute for this property.
    Off,
}

// =============================================================================
// DECLARATION
// =============================================================================

/// One reactive property on an element class.
#[derive(Debug, Clone)]
pub struct PropertyDeclaration {
    pub name: PropName,
    pub type_tag: TypeTag,
    pub attribute: AttributeMode,
    /// Write the property back to its attribute after each render.
    pub reflect: bool,
    /// Initial value of the instance storage slot.
    pub default: Value,
    /// Change predicate; `None` means value inequality.
    pub has_changed: Option<HasChangedFn>,
}

impl PropertyDeclaration {
    pub fn new(name: PropName, type_tag: TypeTag) -> Self {
        let default = match type_tag {
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Number => Value::Number(0.0),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Object => Value::Null,
        };
        Self {
            name,
            type_tag,
            attribute: AttributeMode::Auto,
            reflect: false,
            default,
            has_changed: None,
        }
    }

    /// Observe a specific attribute name instead of the lowercased property
    /// name.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = AttributeMode::Named(name.into());
        self
    }

    /// Detach the property from attributes entirely.
    pub fn no_attribute(mut self) -> Self {
        self.attribute = AttributeMode::Off;
        self
    }

    /// Reflect the property back to its attribute after each render.
    pub fn reflect(mut self) -> Self {
        self.reflect = true;
        self
    }

    /// Override the initial value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Override the change predicate.
    pub fn has_changed(mut self, predicate: HasChangedFn) -> Self {
        self.has_changed = Some(predicate);
        self
    }

    /// The attribute this property observes, if any.
    pub fn attribute_name(&self) -> Option<String> {
        match &self.attribute {
            AttributeMode::Auto => Some(self.name.to_ascii_lowercase()),
            AttributeMode::Named(name) => Some(name.clone()),
            AttributeMode::Off => None,
        }
    }

    /// Whether a write from `old` to `new` counts as a change.
    pub fn changed(&self, old: &Value, new: &Value) -> bool {
        self.has_changed.unwrap_or(default_has_changed)(old, new)
    }
}

// =============================================================================
// CHANGED PROPERTIES
// =============================================================================

/// The per-cycle changed-set: property name → value before this cycle.
///
/// A property appears at most once per cycle, keyed to its pre-cycle value;
/// intermediate values inside one cycle are never recorded. Read-only for
/// hooks; the pipeline clears it at settle.
#[derive(Debug, Clone, Default)]
pub struct ChangedProperties {
    entries: IndexMap<PropName, Value>,
}

impl ChangedProperties {
    pub(crate) fn from_map(entries: IndexMap<PropName, Value>) -> Self {
        Self { entries }
    }

    /// The value `name` held before this cycle, if it changed.
    pub fn previous(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Changed names with their pre-cycle values, in change order.
    pub fn iter(&self) -> impl Iterator<Item = (PropName, &Value)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }
}

// =============================================================================
// TESTS
// =============================================================================
