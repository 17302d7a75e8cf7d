//! The model introspector: a pure function over a `ModelDefinition`
//! producing six filtered, immutable views, computed once per resolver
//! construction — no runtime reflection, matching the same one-time
//! memoization pattern as cached relation metadata computed once at
//! construction and never recomputed per request.

use curia_core::{ElementDescriptor, ElementKind, ModelDefinition};

/// The six filtered views over a model's declared elements. Built once in
/// `InstanceResolver::new` and never mutated afterward.
#[derive(Debug, Clone, Default)]
pub struct ModelIntrospection {
    pub relations: Vec<ElementDescriptor>,
    pub owners: Vec<ElementDescriptor>,
    pub state_fields: Vec<ElementDescriptor>,
    pub filterable: Vec<ElementDescriptor>,
    pub sortable: Vec<ElementDescriptor>,
    pub id_sequences: Vec<ElementDescriptor>,
    pub datetimes: Vec<ElementDescriptor>,
    pub readable_fields: Vec<String>,
    pub writable_fields: Vec<String>,
}

/// Classify one element by the precedence rule `owner > relation > state >
/// scalar`. Elements whose `kind` was already set to one of the
/// non-scalar kinds by their constructor are classified as themselves;
/// this function exists for descriptors assembled ad hoc (e.g. by a model
/// loader that only sets `field`/`target_type`/`join_field`).
fn classify(element: &ElementDescriptor) -> ElementKind {
    if element.join_field.is_some() && element.target_type.is_some() {
        ElementKind::Owner
    } else if element.target_type.is_some() {
        ElementKind::Relation
    } else {
        element.kind
    }
}

impl ModelIntrospection {
    pub fn build(model: &ModelDefinition) -> Self {
        let elements: Vec<&ElementDescriptor> = model
            .elements
            .iter()
            .filter(|e| e.field.is_some())
            .collect();

        let mut introspection = Self::default();

        for element in &elements {
            match classify(element) {
                ElementKind::Owner => introspection.owners.push((*element).clone()),
                ElementKind::Relation => introspection.relations.push((*element).clone()),
                ElementKind::State => introspection.state_fields.push((*element).clone()),
                ElementKind::IdSequence => introspection.id_sequences.push((*element).clone()),
                ElementKind::Datetime => introspection.datetimes.push((*element).clone()),
                ElementKind::Scalar => {}
            }

            if element.listing_filter {
                introspection.filterable.push((*element).clone());
            }
            if element.listing_sortable {
                introspection.sortable.push((*element).clone());
            }

            let field = element.field.clone().expect("filtered above");
            introspection.readable_fields.push(field.clone());
            if element.input {
                introspection.writable_fields.push(field);
            }
        }

        introspection
    }

    pub fn is_readable(&self, field: &str) -> bool {
        self.readable_fields.iter().any(|f| f == field)
    }

    pub fn is_writable(&self, field: &str) -> bool {
        self.writable_fields.iter().any(|f| f == field)
    }

    pub fn find_relation(&self, field: &str) -> Option<&ElementDescriptor> {
        self.relations.iter().find(|e| e.field.as_deref() == Some(field))
    }

    pub fn find_filterable(&self, field: &str) -> Option<&ElementDescriptor> {
        self.filterable.iter().find(|e| e.field.as_deref() == Some(field))
    }

    pub fn find_sortable(&self, field: &str) -> Option<&ElementDescriptor> {
        self.sortable.iter().find(|e| e.field.as_deref() == Some(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curia_core::{ElementDefault, FormDescriptor, OutcomeDescriptor, OutcomeResult};

    fn sample_model() -> ModelDefinition {
        ModelDefinition::new("Manuscript")
            .with_element(ElementDescriptor::scalar("title").with_listing_sortable())
            .with_element(
                ElementDescriptor::owner("submitter", "User", "submitterId").with_input(false),
            )
            .with_element(ElementDescriptor::state("phase").with_listing_filter(false))
            .with_element(ElementDescriptor::id_sequence("manuscriptId", "manuscript_seq"))
            .with_element(ElementDescriptor::datetime("publishedAt"))
            .with_element(ElementDescriptor::relation("reviewer", "User"))
            .with_form(FormDescriptor {
                form: "curate".to_string(),
                outcomes: vec![OutcomeDescriptor::new("accept", OutcomeResult::Complete)],
            })
    }

    #[test]
    fn classifies_each_element_into_exactly_one_view() {
        let model = sample_model();
        let introspection = ModelIntrospection::build(&model);

        assert_eq!(introspection.owners.len(), 1);
        assert_eq!(introspection.relations.len(), 1);
        assert_eq!(introspection.state_fields.len(), 1);
        assert_eq!(introspection.id_sequences.len(), 1);
        assert_eq!(introspection.datetimes.len(), 1);
    }

    #[test]
    fn owner_field_excluded_from_writable_when_input_false() {
        let model = sample_model();
        let introspection = ModelIntrospection::build(&model);

        assert!(introspection.is_readable("submitter"));
        assert!(!introspection.is_writable("submitter"));
        assert!(introspection.is_writable("title"));
    }

    #[test]
    fn ignores_elements_with_no_field() {
        let model = sample_model().with_element(ElementDescriptor {
            field: None,
            kind: ElementKind::Scalar,
            target_type: None,
            input: true,
            listing_filter: false,
            listing_filter_multiple: false,
            listing_sortable: false,
            default: Some(ElementDefault::Literal(serde_json::Value::Null)),
            join_field: None,
            id_sequence: None,
            default_eager: None,
        });
        let introspection = ModelIntrospection::build(&model);
        assert_eq!(introspection.readable_fields.len(), 6);
    }
}
