//! ACL types and the pluggable evaluator contract.

use crate::entity::Entity;
use crate::ids::EntityId;
use std::collections::HashSet;

/// The actions an ACL rule can be evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Access,
    Read,
    Write,
    Create,
    Destroy,
    Task,
}

/// A role-like tag attached to a subject for policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Anonymous,
    User,
    Administrator,
    Owner,
}

/// The subject's tag set for one evaluation. Always contains `Anonymous`;
/// `Administrator`/`User`/`Owner` are added based on identity presence and
/// owner-field match.
#[derive(Debug, Clone, Default)]
pub struct TargetSet(HashSet<Target>);

impl TargetSet {
    pub fn anonymous() -> Self {
        let mut set = HashSet::new();
        set.insert(Target::Anonymous);
        Self(set)
    }

    /// Build the target set for an authenticated subject, optionally
    /// marking them as owner of the entity under evaluation.
    ///
    /// `administrator` is *not* granted unconditionally here — callers pass
    /// `is_administrator: true` explicitly based on their own identity
    /// resolution (see DESIGN.md for this decision).
    pub fn for_subject(is_administrator: bool, is_owner: bool) -> Self {
        let mut set = HashSet::new();
        set.insert(Target::Anonymous);
        set.insert(Target::User);
        if is_administrator {
            set.insert(Target::Administrator);
        }
        if is_owner {
            set.insert(Target::Owner);
        }
        Self(set)
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.0.contains(target)
    }

    pub fn is_owner(&self) -> bool {
        self.contains(&Target::Owner)
    }
}

/// Coarse row-level visibility granted by a matching ACL rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Restriction {
    /// Cross-entity visibility.
    All,
    /// Only entities the subject owns.
    Owner,
}

/// The outcome of evaluating an ACL policy for one `(targets, action)` pair.
#[derive(Debug, Clone, Default)]
pub struct AclMatch {
    pub allow: bool,
    pub allowed_fields: Option<Vec<String>>,
    pub allowed_restrictions: Option<Vec<Restriction>>,
    pub allowed_tasks: Option<Vec<String>>,
    pub matching_rules: Vec<String>,
}

impl AclMatch {
    /// The permissive default used when a model's `acl` is absent.
    pub fn permissive() -> Self {
        Self {
            allow: true,
            allowed_fields: None,
            allowed_restrictions: Some(vec![Restriction::All]),
            allowed_tasks: None,
            matching_rules: vec!["<no acl: permissive>".to_string()],
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            ..Default::default()
        }
    }

    /// Whether this match's `allowedRestrictions` grants cross-entity
    /// visibility, bypassing ownership scoping.
    pub fn allows_all_rows(&self) -> bool {
        self.allowed_restrictions
            .as_ref()
            .is_some_and(|r| r.contains(&Restriction::All))
    }
}

/// The pluggable ACL contract: `access` gating precedes any field-level
/// checks, and callers re-evaluate per entity for row-level checks.
pub trait AclEvaluator: Send + Sync {
    fn evaluate(&self, targets: &TargetSet, action: Action, entity: Option<&Entity>) -> AclMatch;
}

/// A permissive evaluator used when a model's `acl` is absent.
pub struct PermissiveAcl;

impl AclEvaluator for PermissiveAcl {
    fn evaluate(&self, _targets: &TargetSet, _action: Action, _entity: Option<&Entity>) -> AclMatch {
        AclMatch::permissive()
    }
}

/// One ordered rule in a [`RuleListAcl`]: matches a target predicate and an
/// action, and if selected, yields its match verbatim.
pub struct AclRule {
    pub description: String,
    pub action: Action,
    pub targets: Vec<Target>,
    pub result: AclMatch,
}

impl AclRule {
    fn matches(&self, targets: &TargetSet, action: Action) -> bool {
        self.action == action && self.targets.iter().any(|t| targets.contains(t))
    }
}

/// Reference `AclEvaluator` implementation: an ordered rule list, first
/// match wins, falling through to `default` when nothing matches.
pub struct RuleListAcl {
    pub rules: Vec<AclRule>,
    pub default: AclMatch,
}

impl RuleListAcl {
    pub fn new(default: AclMatch) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    pub fn with_rule(mut self, rule: AclRule) -> Self {
        self.rules.push(rule);
        self
    }
}

impl AclEvaluator for RuleListAcl {
    fn evaluate(&self, targets: &TargetSet, action: Action, _entity: Option<&Entity>) -> AclMatch {
        for rule in &self.rules {
            if rule.matches(targets, action) {
                let mut result = rule.result.clone();
                result.matching_rules = vec![rule.description.clone()];
                return result;
            }
        }
        self.default.clone()
    }
}

/// Debug hook: when ACL tracing is enabled, every evaluation is
/// reported through this pluggable sink instead of a bare stdout write.
pub trait AclTraceSink: Send + Sync {
    fn trace(&self, entity_id: Option<EntityId>, action: Action, targets: &TargetSet, owner: bool, result: &AclMatch);
}

/// A no-op sink, the default when ACL tracing is disabled.
pub struct NoopAclTraceSink;

impl AclTraceSink for NoopAclTraceSink {
    fn trace(&self, _entity_id: Option<EntityId>, _action: Action, _targets: &TargetSet, _owner: bool, _result: &AclMatch) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_list_first_match_wins() {
        let acl = RuleListAcl::new(AclMatch::deny())
            .with_rule(AclRule {
                description: "owner may read".to_string(),
                action: Action::Read,
                targets: vec![Target::Owner],
                result: AclMatch {
                    allow: true,
                    ..Default::default()
                },
            })
            .with_rule(AclRule {
                description: "anyone may read title only".to_string(),
                action: Action::Read,
                targets: vec![Target::Anonymous],
                result: AclMatch {
                    allow: true,
                    allowed_fields: Some(vec!["title".to_string()]),
                    ..Default::default()
                },
            });

        let owner_targets = TargetSet::for_subject(false, true);
        let owner_match = acl.evaluate(&owner_targets, Action::Read, None);
        assert!(owner_match.allow);
        assert_eq!(owner_match.allowed_fields, None);

        let anon_targets = TargetSet::anonymous();
        let anon_match = acl.evaluate(&anon_targets, Action::Read, None);
        assert!(anon_match.allow);
        assert_eq!(anon_match.allowed_fields, Some(vec!["title".to_string()]));
    }

    #[test]
    fn falls_through_to_default_when_no_rule_matches() {
        let acl = RuleListAcl::new(AclMatch::deny());
        let targets = TargetSet::anonymous();
        let result = acl.evaluate(&targets, Action::Write, None);
        assert!(!result.allow);
    }

    #[test]
    fn permissive_acl_allows_everything() {
        let acl = PermissiveAcl;
        let targets = TargetSet::anonymous();
        let result = acl.evaluate(&targets, Action::Destroy, None);
        assert!(result.allow);
        assert!(result.allows_all_rows());
    }
}
