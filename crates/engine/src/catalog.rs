//! Recipe catalog: the fixed set of automation recipes and pure queries
//! over it.
//!
//! Validation rules:
//! 1. Recipe names are unique within the catalog.
//! 2. `trigger_events` is non-empty and every entry is `<word>.<word>[...]`.
//! 3. `actions` is non-empty.
//! 4. Either/or action fields (`to` / `to_path`, ...) are set exactly once.
//! 5. Every template parses.
//! 6. Every filter condition is well-formed (see [`crate::filter::Condition::problem`]).
//!
//! [`Catalog::validate_against`] additionally checks placeholders and paths
//! against an [`EventTaxonomy`].

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{Category, Recipe};
use crate::seed::builtin_recipes;
use crate::taxonomy::EventTaxonomy;
use crate::template::placeholders;
use crate::EngineError;

static EVENT_NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Is `name` a dot-namespaced event name such as `donation.created`?
pub fn is_valid_event_name(name: &str) -> bool {
    EVENT_NAME_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)+$").unwrap())
        .is_match(name)
}

/// A single rule violation found by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIssue {
    pub recipe: String,
    pub problem: String,
}

impl std::fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.recipe, self.problem)
    }
}

/// An ordered collection of recipes.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    recipes: Vec<Recipe>,
}

impl Catalog {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    /// The recipes shipped with the product.
    pub fn builtin() -> Self {
        Self::new(builtin_recipes())
    }

    /// Decode a JSON array of recipes and validate it.
    ///
    /// # Errors
    /// - [`EngineError::CatalogParse`] if the document does not decode.
    /// - [`EngineError::InvalidCatalog`] if any recipe breaks a rule.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let catalog = Self::new(serde_json::from_str(json)?);
        let issues = catalog.validate();
        if !issues.is_empty() {
            return Err(EngineError::InvalidCatalog(issues));
        }
        Ok(catalog)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name == name)
    }

    /// All recipes in `category`, in catalog order. Empty when none match.
    pub fn recipes_by_category(&self, category: Category) -> Vec<&Recipe> {
        self.recipes.iter().filter(|r| r.category == category).collect()
    }

    /// Every event name referenced by any recipe, deduplicated and sorted.
    pub fn all_trigger_events(&self) -> Vec<&str> {
        self.recipes
            .iter()
            .flat_map(|r| r.trigger_events.iter().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Check the structural rules. Returns every issue found, in catalog
    /// order; an empty list means the catalog is valid.
    pub fn validate(&self) -> Vec<CatalogIssue> {
        let mut issues = Vec::new();
        let mut push = |recipe: &Recipe, problem: String| {
            issues.push(CatalogIssue { recipe: recipe.name.clone(), problem });
        };

        let mut seen: HashSet<&str> = HashSet::new();
        for recipe in &self.recipes {
            // -----------------------------------------------------------------
            // 1. Unique names
            // -----------------------------------------------------------------
            if !seen.insert(recipe.name.as_str()) {
                push(recipe, "duplicate recipe name".into());
            }

            // -----------------------------------------------------------------
            // 2. Triggers
            // -----------------------------------------------------------------
            if recipe.trigger_events.is_empty() {
                push(recipe, "trigger_events is empty".into());
            }
            for event in &recipe.trigger_events {
                if !is_valid_event_name(event) {
                    push(recipe, format!("malformed trigger event '{event}'"));
                }
            }

            // -----------------------------------------------------------------
            // 3. Actions
            // -----------------------------------------------------------------
            if recipe.actions.is_empty() {
                push(recipe, "actions is empty".into());
            }

            for (index, action) in recipe.actions.iter().enumerate() {
                // 4. Either/or fields
                if let Some(pair) = action.ambiguous_source() {
                    push(
                        recipe,
                        format!("action #{index} ({}) must set exactly one of {pair}", action.kind()),
                    );
                }
                // 5. Templates parse
                for (field, template) in action.templates() {
                    if let Err(e) = placeholders(template) {
                        push(recipe, format!("action #{index} {field}: {e}"));
                    }
                }
            }

            // -----------------------------------------------------------------
            // 6. Filters
            // -----------------------------------------------------------------
            for (path, condition) in recipe.filters.iter().flatten() {
                if let Some(problem) = condition.problem() {
                    push(recipe, format!("filter '{path}': {problem}"));
                }
            }
        }

        issues
    }

    /// Check that every trigger event is declared in `taxonomy` and that
    /// every placeholder and `*_path` resolves on each trigger event.
    /// Includes the structural issues from [`Catalog::validate`].
    pub fn validate_against(&self, taxonomy: &EventTaxonomy) -> Vec<CatalogIssue> {
        let mut issues = self.validate();

        for recipe in &self.recipes {
            let mut push = |problem: String| {
                issues.push(CatalogIssue { recipe: recipe.name.clone(), problem });
            };

            for event in &recipe.trigger_events {
                if !taxonomy.contains(event) {
                    push(format!("trigger event '{event}' is not in the event taxonomy"));
                    continue;
                }

                if let Some(filters) = &recipe.filters {
                    for path in filters.keys() {
                        if !taxonomy.has_path(event, path) {
                            push(format!("filter field '{path}' is not on '{event}'"));
                        }
                    }
                }

                for (index, action) in recipe.actions.iter().enumerate() {
                    for (field, template) in action.templates() {
                        let Ok(tokens) = placeholders(template) else {
                            continue;
                        };
                        for token in tokens {
                            if !taxonomy.has_path(event, token.path) {
                                push(format!(
                                    "action #{index} {field}: '{{{{{}}}}}' is not on '{event}'",
                                    token.path
                                ));
                            }
                        }
                    }
                    for (field, path) in action.paths() {
                        if !taxonomy.has_path(event, path) {
                            push(format!("action #{index} {field}: '{path}' is not on '{event}'"));
                        }
                    }
                }
            }
        }

        issues
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;
    use serde_json::json;

    fn slack_recipe(name: &str, category: Category, triggers: &[&str]) -> Recipe {
        Recipe {
            name: name.into(),
            description: String::new(),
            trigger_events: triggers.iter().map(|s| (*s).to_owned()).collect(),
            filters: None,
            actions: vec![Action::SlackNotify {
                channel: "#ops".into(),
                message_template: "{{title}}".into(),
            }],
            is_active: true,
            stop_on_error: false,
            category,
        }
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert!(catalog.validate().is_empty(), "{:#?}", catalog.validate());
    }

    #[test]
    fn builtin_catalog_matches_builtin_taxonomy() {
        let issues = Catalog::builtin().validate_against(&EventTaxonomy::builtin());
        assert!(issues.is_empty(), "{issues:#?}");
    }

    #[test]
    fn every_builtin_recipe_has_well_formed_triggers_and_actions() {
        for recipe in Catalog::builtin().recipes() {
            assert!(!recipe.trigger_events.is_empty(), "{}", recipe.name);
            assert!(!recipe.actions.is_empty(), "{}", recipe.name);
            for event in &recipe.trigger_events {
                assert!(is_valid_event_name(event), "{}: {event}", recipe.name);
            }
        }
    }

    #[test]
    fn builtin_catalog_covers_every_category_and_action_kind() {
        let catalog = Catalog::builtin();
        for category in Category::ALL {
            assert!(!catalog.recipes_by_category(category).is_empty(), "{category}");
        }

        let kinds: BTreeSet<&str> = catalog
            .recipes()
            .iter()
            .flat_map(|r| r.actions.iter().map(Action::kind))
            .collect();
        for kind in [
            "send_email",
            "create_work_item",
            "create_task",
            "slack_notify",
            "add_tag",
            "update_field",
            "update_status",
            "assign_reviewer",
            "create_payment_request",
        ] {
            assert!(kinds.contains(kind), "no recipe uses {kind}");
        }
    }

    #[test]
    fn all_trigger_events_is_sorted_union_without_duplicates() {
        let catalog = Catalog::builtin();
        let events = catalog.all_trigger_events();

        let mut expected: Vec<&str> = catalog
            .recipes()
            .iter()
            .flat_map(|r| r.trigger_events.iter().map(String::as_str))
            .collect();
        expected.sort_unstable();
        expected.dedup();

        assert_eq!(events, expected);
        assert!(events.windows(2).all(|w| w[0] < w[1]));
        // donation.created is shared by several recipes but listed once.
        assert_eq!(events.iter().filter(|e| **e == "donation.created").count(), 1);
    }

    #[test]
    fn recipes_by_category_preserves_catalog_order() {
        let catalog = Catalog::new(vec![
            slack_recipe("g1", Category::Grants, &["grant.awarded"]),
            slack_recipe("d1", Category::Donations, &["donation.created"]),
            slack_recipe("g2", Category::Grants, &["grant.report.due"]),
        ]);

        let names: Vec<_> = catalog
            .recipes_by_category(Category::Grants)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["g1", "g2"]);
        assert!(catalog.recipes_by_category(Category::Board).is_empty());
    }

    #[test]
    fn builtin_grants_recipes_are_exactly_the_grants_category() {
        let catalog = Catalog::builtin();
        let by_category = catalog.recipes_by_category(Category::Grants);
        let expected: Vec<&Recipe> =
            catalog.recipes().iter().filter(|r| r.category == Category::Grants).collect();
        assert_eq!(by_category, expected);
    }

    #[test]
    fn event_name_pattern() {
        assert!(is_valid_event_name("donation.created"));
        assert!(is_valid_event_name("grant.report.due"));
        assert!(!is_valid_event_name("donation"));
        assert!(!is_valid_event_name("donation."));
        assert!(!is_valid_event_name(".created"));
        assert!(!is_valid_event_name("Donation Created"));
    }

    #[test]
    fn validation_collects_every_issue() {
        let mut no_triggers = slack_recipe("a", Category::Events, &[]);
        no_triggers.actions.clear();
        let bad_name = slack_recipe("b", Category::Events, &["EventCreated"]);
        let duplicate = slack_recipe("b", Category::Events, &["event.created"]);
        let mut bad_template = slack_recipe("c", Category::Events, &["event.created"]);
        bad_template.actions = vec![Action::SlackNotify {
            channel: "#x".into(),
            message_template: "{{oops".into(),
        }];

        let issues = Catalog::new(vec![no_triggers, bad_name, duplicate, bad_template]).validate();
        let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "a: trigger_events is empty",
                "a: actions is empty",
                "b: malformed trigger event 'EventCreated'",
                "b: duplicate recipe name",
                "c: action #0 message_template: unterminated placeholder starting at byte 0",
            ]
        );
    }

    #[test]
    fn malformed_filters_are_reported() {
        let mut typo = slack_recipe("gold members", Category::Membership, &["member.joined"]);
        typo.filters = Some(serde_json::from_value(json!({ "tier": { "in": "gold" } })).unwrap());
        let mut empty = slack_recipe("anyone", Category::Membership, &["member.joined"]);
        empty.filters = Some(serde_json::from_value(json!({ "tier": {} })).unwrap());

        let issues = Catalog::new(vec![typo, empty]).validate();
        assert_eq!(issues.len(), 2, "{issues:#?}");
        assert_eq!(issues[0].recipe, "gold members");
        assert!(issues[0].problem.starts_with("filter 'tier': malformed operator object"));
        assert_eq!(issues[1].to_string(), "anyone: filter 'tier': operator object is empty");
    }

    #[test]
    fn taxonomy_check_reports_structural_issues_once() {
        let mut taxonomy = EventTaxonomy::new();
        taxonomy.declare("member.joined", &["title"]);
        let mut no_actions = slack_recipe("r", Category::Membership, &["member.joined"]);
        no_actions.actions.clear();

        let issues = Catalog::new(vec![no_actions]).validate_against(&taxonomy);
        assert_eq!(
            issues,
            vec![CatalogIssue { recipe: "r".into(), problem: "actions is empty".into() }]
        );
    }

    #[test]
    fn taxonomy_check_reports_undeclared_fields() {
        let mut taxonomy = EventTaxonomy::new();
        taxonomy.declare("grant.awarded", &["grant_id"]);

        let issues = Catalog::new(vec![
            slack_recipe("r", Category::Grants, &["grant.awarded"]),
            slack_recipe("s", Category::Grants, &["grant.closed"]),
        ])
        .validate_against(&taxonomy);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].problem, "action #0 message_template: '{{title}}' is not on 'grant.awarded'");
        assert_eq!(issues[1].problem, "trigger event 'grant.closed' is not in the event taxonomy");
    }

    #[test]
    fn from_json_decodes_and_validates() {
        let ok = json!([{
            "name": "Board vote",
            "description": "",
            "trigger_events": ["board.vote.requested"],
            "actions": [{ "type": "slack_notify", "channel": "#board", "message_template": "vote!" }],
            "category": "board"
        }]);
        let catalog = Catalog::from_json(&ok.to_string()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("Board vote").is_some());

        let invalid = json!([{
            "name": "Empty",
            "description": "",
            "trigger_events": [],
            "actions": [],
            "category": "board"
        }]);
        assert!(matches!(
            Catalog::from_json(&invalid.to_string()),
            Err(EngineError::InvalidCatalog(issues)) if issues.len() == 2
        ));

        assert!(matches!(
            Catalog::from_json("{not json"),
            Err(EngineError::CatalogParse(_))
        ));
    }
}
