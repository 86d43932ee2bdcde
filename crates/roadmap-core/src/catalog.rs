//! Static step catalog
//!
//! Four steps in fixed order with 4, 4, 5 and 5 todos.

use crate::types::{ChecklistItem, Step};

struct StepDef {
    id: u32,
    title: &'static str,
    description: &'static str,
    tips: &'static [&'static str],
    todos: &'static [(&'static str, &'static str)],
}

const STEPS: &[StepDef] = &[
    StepDef {
        id: 1,
        title: "Get Your Finances Ready",
        description: "Build a solid financial foundation before house hunting.",
        tips: &[
            "Check and boost your credit score — aim for 620+",
            "Pay down existing debts to improve your debt-to-income ratio",
            "Start saving aggressively for your down payment",
            "Create a monthly budget that accounts for future mortgage payments",
        ],
        todos: &[
            ("1a", "Check your credit score"),
            ("1b", "Create a savings plan"),
            ("1c", "Pay down high-interest debt"),
            ("1d", "Set up a dedicated home savings account"),
        ],
    },
    StepDef {
        id: 2,
        title: "Get Pre-Approved",
        description: "Secure a mortgage pre-approval to know your budget.",
        tips: &[
            "Shop around — compare rates from at least 3 lenders",
            "Gather documents: pay stubs, tax returns, bank statements",
            "Understand the difference between pre-qualification and pre-approval",
            "Don't open new credit cards or make large purchases during this time",
        ],
        todos: &[
            ("2a", "Research mortgage lenders"),
            ("2b", "Gather financial documents"),
            ("2c", "Apply for pre-approval"),
            ("2d", "Compare loan offers"),
        ],
    },
    StepDef {
        id: 3,
        title: "Find Your Home",
        description: "Search, tour, and identify the right home for you.",
        tips: &[
            "Find a good Realtor — choose someone you trust and like!",
            "Think about proximity vs costs when choosing a neighborhood",
            "Make a list of needs vs nice-to-haves",
            "Research areas you might like to live in",
        ],
        todos: &[
            ("3a", "Find a good realtor"),
            ("3b", "Identify your needs vs. nice-to-haves"),
            ("3c", "Research areas you might like to live"),
            ("3d", "Tour at least 5 homes"),
            ("3e", "Make an offer"),
        ],
    },
    StepDef {
        id: 4,
        title: "Close the Deal",
        description: "Navigate inspections, appraisals, and closing day!",
        tips: &[
            "Get a home inspection — don't skip this!",
            "Review closing costs carefully before signing",
            "Get homeowner's insurance set up before closing",
            "Do a final walk-through of the property",
        ],
        todos: &[
            ("4a", "Schedule home inspection"),
            ("4b", "Review and understand closing costs"),
            ("4c", "Set up homeowner's insurance"),
            ("4d", "Final walk-through"),
            ("4e", "Sign closing documents"),
        ],
    },
];

/// Fresh copy of the catalog with every todo incomplete
#[must_use]
pub fn default_steps() -> Vec<Step> {
    STEPS
        .iter()
        .map(|def| Step {
            id: def.id,
            title: def.title.to_string(),
            description: def.description.to_string(),
            tips: def.tips.iter().map(|t| (*t).to_string()).collect(),
            todos: def
                .todos
                .iter()
                .map(|(id, text)| ChecklistItem::new(*id, *text))
                .collect(),
        })
        .collect()
}

/// Frontend ids of every catalog item, in roadmap order
pub fn catalog_item_ids() -> impl Iterator<Item = &'static str> {
    STEPS.iter().flat_map(|def| def.todos.iter().map(|(id, _)| *id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_shape() {
        let steps = default_steps();
        let ids: Vec<u32> = steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let sizes: Vec<usize> = steps.iter().map(|s| s.todos.len()).collect();
        assert_eq!(sizes, vec![4, 4, 5, 5]);

        assert!(steps.iter().flat_map(|s| &s.todos).all(|t| !t.completed));
        assert_eq!(catalog_item_ids().count(), 18);
    }
}
