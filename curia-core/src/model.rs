//! Declarative model definition types.
//!
//! These are the structures the (out-of-scope) model-definition loader and
//! form/validation-set compiler are expected to produce; this crate only
//! consumes them.

use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The kind of an [`ElementDescriptor`], classified with precedence
/// `owner > relation > state > scalar`. An element with no `field` is not
/// classified at all and is dropped from every filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Scalar,
    Relation,
    Owner,
    State,
    IdSequence,
    Datetime,
}

/// A default value for an element: a literal, or a named enum member that
/// must be resolved against [`ModelDefinition::enums`].
#[derive(Debug, Clone, PartialEq)]
pub enum ElementDefault {
    Literal(JsonValue),
    Enum { name: String, key: String },
}

/// One declarative field descriptor.
#[derive(Debug, Clone)]
pub struct ElementDescriptor {
    /// The field name. Elements with `field: None` are ignored entirely.
    pub field: Option<String>,
    pub kind: ElementKind,
    /// Target type name for relation/owner elements.
    pub target_type: Option<String>,
    /// Whether this field may be supplied on `create`/`update` input.
    /// Defaults to `true`; the allowed-input-field view is every element
    /// with a field whose `input` is not explicitly `false`.
    pub input: bool,
    pub listing_filter: bool,
    pub listing_filter_multiple: bool,
    pub listing_sortable: bool,
    pub default: Option<ElementDefault>,
    /// Join column for owner/relation elements (stores the owning subject's
    /// id, or the related entity's id).
    pub join_field: Option<String>,
    /// Sequence name for `IdSequence` elements.
    pub id_sequence: Option<String>,
    /// Dotted eager-path hint appended when this relation is requested
    /// without further sub-selection.
    pub default_eager: Option<String>,
}

impl ElementDescriptor {
    pub fn scalar(field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            kind: ElementKind::Scalar,
            target_type: None,
            input: true,
            listing_filter: false,
            listing_filter_multiple: false,
            listing_sortable: false,
            default: None,
            join_field: None,
            id_sequence: None,
            default_eager: None,
        }
    }

    pub fn relation(field: &str, target_type: &str) -> Self {
        Self {
            target_type: Some(target_type.to_string()),
            kind: ElementKind::Relation,
            ..Self::scalar(field)
        }
    }

    pub fn owner(field: &str, target_type: &str, join_field: &str) -> Self {
        Self {
            target_type: Some(target_type.to_string()),
            kind: ElementKind::Owner,
            join_field: Some(join_field.to_string()),
            ..Self::scalar(field)
        }
    }

    pub fn state(field: &str) -> Self {
        Self {
            kind: ElementKind::State,
            ..Self::scalar(field)
        }
    }

    pub fn id_sequence(field: &str, sequence_name: &str) -> Self {
        Self {
            kind: ElementKind::IdSequence,
            id_sequence: Some(sequence_name.to_string()),
            ..Self::scalar(field)
        }
    }

    pub fn datetime(field: &str) -> Self {
        Self {
            kind: ElementKind::Datetime,
            ..Self::scalar(field)
        }
    }

    pub fn with_input(mut self, input: bool) -> Self {
        self.input = input;
        self
    }

    pub fn with_listing_filter(mut self, multiple: bool) -> Self {
        self.listing_filter = true;
        self.listing_filter_multiple = multiple;
        self
    }

    pub fn with_listing_sortable(mut self) -> Self {
        self.listing_sortable = true;
        self
    }

    pub fn with_default_eager(mut self, path: &str) -> Self {
        self.default_eager = Some(path.to_string());
        self
    }

    pub fn with_default(mut self, default: ElementDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// A forced state overlay entry on an [`OutcomeDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStateValue {
    /// `{type:'enum', value:'E.K'}` — resolved against `enums[E].values[K]`.
    Enum { enum_name: String, key: String },
    /// `{type:'simple', value:v}` — the literal value, forwarded verbatim.
    Simple(JsonValue),
}

/// The terminal result a form outcome can carry. Only `Complete` proceeds
/// through the task-completion pipeline; anything else is a logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeResult {
    Complete,
    Other,
}

/// One named terminal branch of a form completion.
#[derive(Debug, Clone)]
pub struct OutcomeDescriptor {
    pub r#type: String,
    pub result: OutcomeResult,
    pub requires_validated_submitter: bool,
    pub skip_validations: bool,
    pub state: HashMap<String, OutcomeStateValue>,
    pub sequence_assignment: Vec<String>,
    pub date_assignments: Vec<String>,
}

impl OutcomeDescriptor {
    pub fn new(r#type: &str, result: OutcomeResult) -> Self {
        Self {
            r#type: r#type.to_string(),
            result,
            requires_validated_submitter: false,
            skip_validations: false,
            state: HashMap::new(),
            sequence_assignment: Vec::new(),
            date_assignments: Vec::new(),
        }
    }
}

/// A form and the outcomes it may resolve to.
#[derive(Debug, Clone)]
pub struct FormDescriptor {
    pub form: String,
    pub outcomes: Vec<OutcomeDescriptor>,
}

/// One named enum's key → value table, referenced by `OutcomeStateValue::Enum`.
#[derive(Debug, Clone, Default)]
pub struct EnumDefinition {
    pub values: HashMap<String, JsonValue>,
}

/// The immutable declarative model definition consumed by an
/// `InstanceResolver`. Produced by the (out-of-scope) model loader.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub name: String,
    pub input: bool,
    pub elements: Vec<ElementDescriptor>,
    pub process_key: Option<String>,
    pub forms: Vec<FormDescriptor>,
    pub enums: HashMap<String, EnumDefinition>,
}

impl ModelDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            input: true,
            elements: Vec::new(),
            process_key: None,
            forms: Vec::new(),
            enums: HashMap::new(),
        }
    }

    pub fn with_element(mut self, element: ElementDescriptor) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_form(mut self, form: FormDescriptor) -> Self {
        self.forms.push(form);
        self
    }

    pub fn with_enum(mut self, name: &str, values: HashMap<String, JsonValue>) -> Self {
        self.enums.insert(name.to_string(), EnumDefinition { values });
        self
    }

    pub fn find_form(&self, form: &str) -> Option<&FormDescriptor> {
        self.forms.iter().find(|f| f.form == form)
    }

    /// Resolve an `{enum_name}.{key}` style enum overlay against `self.enums`.
    pub fn resolve_enum(&self, enum_name: &str, key: &str) -> Option<JsonValue> {
        self.enums.get(enum_name)?.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> ModelDefinition {
        ModelDefinition::new("Manuscript")
            .with_element(ElementDescriptor::scalar("title").with_listing_sortable())
            .with_element(ElementDescriptor::owner("submitter", "User", "submitterId"))
            .with_element(ElementDescriptor::state("phase").with_listing_filter(false))
            .with_element(ElementDescriptor::id_sequence("manuscriptId", "manuscript_seq"))
            .with_enum(
                "Phase",
                HashMap::from([("Published".to_string(), JsonValue::String("published".into()))]),
            )
    }

    #[test]
    fn resolves_enum_overlay() {
        let model = sample_model();
        assert_eq!(
            model.resolve_enum("Phase", "Published"),
            Some(JsonValue::String("published".into()))
        );
        assert_eq!(model.resolve_enum("Phase", "Missing"), None);
    }

    #[test]
    fn finds_form_by_name() {
        let model = sample_model().with_form(FormDescriptor {
            form: "curate".to_string(),
            outcomes: vec![OutcomeDescriptor::new("accept", OutcomeResult::Complete)],
        });
        assert!(model.find_form("curate").is_some());
        assert!(model.find_form("missing").is_none());
    }
}
