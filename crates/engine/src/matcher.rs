//! Event matching: which recipes fire for an event.

use tracing::debug;

use crate::catalog::Catalog;
use crate::filter::passes;
use crate::models::{Event, Recipe};

/// Select every active recipe that listens for `event.event_type` and whose
/// filters pass against the payload, in catalog order.
///
/// All matches are returned; parallel automations on one event are normal.
pub fn matching<'c>(catalog: &'c Catalog, event: &Event) -> Vec<&'c Recipe> {
    catalog
        .recipes()
        .iter()
        .filter(|recipe| recipe.is_active && recipe.listens_for(&event.event_type))
        .filter(|recipe| {
            let ok = passes(recipe.filters.as_ref(), &event.payload);
            if !ok {
                debug!(recipe = %recipe.name, event = %event.event_type, "filtered out");
            }
            ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names<'a>(recipes: &[&'a Recipe]) -> Vec<&'a str> {
        recipes.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn large_repeat_gift_matches_receipt_and_major_gift_only() {
        let catalog = Catalog::builtin();
        let event = Event::new(
            "donation.created",
            json!({ "amount_cents": 150000, "donor_name": "Jane Doe", "is_first_donation": false }),
        );

        let matched = matching(&catalog, &event);
        assert_eq!(
            names(&matched),
            vec!["Donation Receipt (Immediate)", "Major Gift Alert ($1,000+)"]
        );
    }

    #[test]
    fn small_first_gift_matches_receipt_and_welcome() {
        let catalog = Catalog::builtin();
        let event = Event::new(
            "donation.created",
            json!({ "amount_cents": 2500, "donor_name": "Sam", "is_first_donation": true }),
        );
        assert_eq!(
            names(&matching(&catalog, &event)),
            vec!["Donation Receipt (Immediate)", "First-Time Donor Welcome"]
        );
    }

    #[test]
    fn inactive_recipes_never_match() {
        let catalog = Catalog::builtin();
        let event = Event::new(
            "donation.created",
            json!({ "amount_cents": 2500, "is_first_donation": false, "is_recurring": true }),
        );
        let matched = matching(&catalog, &event);
        assert!(!names(&matched).contains(&"Recurring Donor Upgrade Ask"));
    }

    #[test]
    fn unknown_event_matches_nothing() {
        let catalog = Catalog::builtin();
        assert!(matching(&catalog, &Event::new("donation.deleted", json!({}))).is_empty());
    }

    #[test]
    fn missing_filter_field_excludes_the_recipe() {
        let catalog = Catalog::builtin();
        // No amount_cents and no is_first_donation: only the unfiltered receipt fires.
        let event = Event::new("donation.created", json!({ "donor_name": "Anon" }));
        assert_eq!(names(&matching(&catalog, &event)), vec!["Donation Receipt (Immediate)"]);
    }
}
